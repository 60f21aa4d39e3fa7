mod handler;
pub(crate) mod model;

pub use handler::{
    change_password, create_profile, delete_profile, get_profile, update_profile,
    upload_profile_image,
};
