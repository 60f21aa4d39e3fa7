//! Read-side reducers over matches, games, records and attendance votes.
//!
//! Loaders in `routes::statistics::model` fetch the rows below for one team;
//! everything in this module is pure so it can be exercised without a
//! database.

mod dashboard;
mod ranking;
mod team;

pub use dashboard::{
    AttendanceSummary, PositionCount, RosterSummary, TeamComposition, attendance_summary,
    roster_summary, team_composition,
};
pub use ranking::{
    ATTENDANCE_RANKING_LIMIT, RankingEntry, Rankings, TOP10_LIMIT, Top10, WIN_RATE_MIN_GAMES,
    WinRateEntry, rank_assists, rank_attendance, rank_games_played, rank_goals, rank_win_rate,
    rankings, top10,
};
pub use team::{GameStatistics, MatchStatistics, TeamStatistics, TotalStatistics, team_statistics};

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{AttendanceStatus, GameResult, GoalType, MemberStatus, Position};

#[derive(Debug, Clone, FromRow)]
pub struct GameLine {
    pub match_id: Uuid,
    pub our_score: i32,
    pub opponent_score: i32,
    pub result: GameResult,
}

#[derive(Debug, Clone)]
pub struct MatchLine {
    pub id: Uuid,
    pub total_our_score: Option<i32>,
    pub total_opponent_score: Option<i32>,
    pub games: Vec<GameLine>,
}

/// One player's line for one game, with the game's result when it is known.
#[derive(Debug, Clone, FromRow)]
pub struct RecordLine {
    pub user_id: Uuid,
    pub game_id: Option<Uuid>,
    pub played: bool,
    pub goals: i32,
    pub assists: i32,
    pub goal_type: Option<GoalType>,
    pub game_result: Option<GameResult>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AttendanceLine {
    pub match_id: Uuid,
    pub user_id: Uuid,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberLine {
    pub user_id: Uuid,
    pub name: String,
    pub status: MemberStatus,
    pub birthdate: Option<NaiveDate>,
    pub positions: Vec<Position>,
}
