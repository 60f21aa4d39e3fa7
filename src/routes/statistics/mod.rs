mod handler;
pub(crate) mod model;

pub use handler::{
    get_assists_ranking, get_attendance_ranking, get_dashboard, get_games_ranking,
    get_goals_ranking, get_rankings, get_team_statistics, get_top10,
};
