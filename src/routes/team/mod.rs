mod handler;
pub(crate) mod model;

pub use handler::{
    add_member, cancel_join_request, create_invite, create_team, delete_member, delete_team,
    get_member, get_my_team, get_team, get_team_stats, join_team, leave_team, list_join_requests,
    list_members, list_my_join_requests, list_public_teams, review_join_request, update_member,
    upload_logo,
};
