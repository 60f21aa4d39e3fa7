//! Enumerations shared by the route modules and the aggregation engine.
//!
//! Each one maps onto a Postgres enum type declared in the initial migration
//! and serializes as the same lowercase tag on the wire.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "auth_provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Email,
    Google,
    Kakao,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "player_position", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    Gk,
    Df,
    Mf,
    Fw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "team_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    Captain,
    ViceCaptain,
    Member,
}

impl TeamRole {
    /// Roles allowed to manage members, matches and invites.
    pub const MANAGERS: [TeamRole; 2] = [TeamRole::Captain, TeamRole::ViceCaptain];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    #[default]
    Active,
    Injured,
    LongTermAbsence,
    ShortTermAbsence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "join_request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "match_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    InProgress,
    Finished,
    Cancelled,
}

impl MatchStatus {
    /// `scheduled -> in_progress -> finished`, or `scheduled -> cancelled`.
    /// Staying in the same state is always allowed.
    pub fn can_transition_to(self, next: MatchStatus) -> bool {
        use MatchStatus::*;
        self == next
            || matches!(
                (self, next),
                (Scheduled, InProgress) | (InProgress, Finished) | (Scheduled, Cancelled)
            )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "game_result", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    Win,
    Draw,
    Loss,
}

impl GameResult {
    pub fn from_scores(our_score: i32, opponent_score: i32) -> Self {
        match our_score.cmp(&opponent_score) {
            std::cmp::Ordering::Greater => GameResult::Win,
            std::cmp::Ordering::Equal => GameResult::Draw,
            std::cmp::Ordering::Less => GameResult::Loss,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attendance_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Attending,
    NotAttending,
    Maybe,
    Late,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "goal_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Field,
    FreeKick,
    Penalty,
    OwnGoal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_status_follows_state_machine() {
        use MatchStatus::*;
        assert!(Scheduled.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Finished));
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(Finished.can_transition_to(Finished));
        assert!(!Finished.can_transition_to(Scheduled));
        assert!(!Cancelled.can_transition_to(InProgress));
        assert!(!Scheduled.can_transition_to(Finished));
    }

    #[test]
    fn game_result_from_scores() {
        assert_eq!(GameResult::from_scores(2, 1), GameResult::Win);
        assert_eq!(GameResult::from_scores(1, 1), GameResult::Draw);
        assert_eq!(GameResult::from_scores(0, 2), GameResult::Loss);
    }

    #[test]
    fn wire_tags_are_snake_case() {
        assert_eq!(serde_json::to_string(&TeamRole::ViceCaptain).unwrap(), "\"vice_captain\"");
        assert_eq!(serde_json::to_string(&Position::Gk).unwrap(), "\"GK\"");
        assert_eq!(
            serde_json::from_str::<AttendanceStatus>("\"not_attending\"").unwrap(),
            AttendanceStatus::NotAttending
        );
        assert_eq!(serde_json::to_string(&GoalType::FreeKick).unwrap(), "\"free_kick\"");
    }
}
