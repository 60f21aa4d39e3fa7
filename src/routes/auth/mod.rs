mod handler;
mod model;

pub use handler::{
    REFRESH_COOKIE, accept_invite, login, logout, refresh_token, signup, social_login,
    validate_invite,
};
