mod handler;
pub(crate) mod model;

pub use handler::{get_summary, list_votes, vote};
