mod handler;
pub(crate) mod model;
pub mod record;

pub use handler::{
    create_match, delete_match, get_match, get_match_games, get_match_record, list_matches,
    record_match, update_match,
};
