use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{AttendanceStatus, MatchStatus};
use crate::routes::matches::model::Match;
use crate::routes::team::model::TeamMember;

#[derive(Debug, Deserialize)]
pub struct AttendanceVoteRequest {
    pub status: AttendanceStatus,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceView {
    pub match_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub status: AttendanceStatus,
    pub voted_at: DateTime<Utc>,
}

const VOTES_QUERY: &str = r#"
    SELECT a.match_id, a.user_id, u.name AS user_name, a.status, a.voted_at
    FROM match_attendances a
    JOIN users u ON u.id = a.user_id
"#;

pub struct Attendance;

impl Attendance {
    /// Records the caller's vote, replacing an earlier one for the same match.
    pub async fn vote(
        pool: &PgPool,
        match_id: Uuid,
        user_id: Uuid,
        req: AttendanceVoteRequest,
    ) -> AppResult<AttendanceView> {
        let mut conn = pool.acquire().await?;
        let m = Match::find(&mut conn, match_id).await?;
        if TeamMember::membership(&mut conn, m.team_id, user_id)
            .await?
            .is_none()
        {
            return Err(AppError::forbidden("not a member of this team"));
        }
        if m.status == MatchStatus::Cancelled {
            return Err(AppError::bad_request("match has been cancelled"));
        }

        sqlx::query(
            r#"
            INSERT INTO match_attendances (id, match_id, user_id, status, voted_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (match_id, user_id)
            DO UPDATE SET status = EXCLUDED.status, voted_at = EXCLUDED.voted_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(match_id)
        .bind(user_id)
        .bind(req.status)
        .execute(&mut *conn)
        .await?;

        tracing::debug!("user {} voted {:?} for match {}", user_id, req.status, match_id);
        let vote = sqlx::query_as::<_, AttendanceView>(&format!(
            "{} WHERE a.match_id = $1 AND a.user_id = $2",
            VOTES_QUERY
        ))
        .bind(match_id)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(vote)
    }

    pub async fn list(pool: &PgPool, match_id: Uuid) -> AppResult<Vec<AttendanceView>> {
        {
            let mut conn = pool.acquire().await?;
            Match::find(&mut conn, match_id).await?;
        }
        let votes = sqlx::query_as::<_, AttendanceView>(&format!(
            "{} WHERE a.match_id = $1 ORDER BY a.voted_at",
            VOTES_QUERY
        ))
        .bind(match_id)
        .fetch_all(pool)
        .await?;
        Ok(votes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_request_accepts_snake_case_statuses() {
        let req: AttendanceVoteRequest = serde_json::from_str(r#"{"status":"not_attending"}"#).unwrap();
        assert_eq!(req.status, AttendanceStatus::NotAttending);
        assert!(serde_json::from_str::<AttendanceVoteRequest>(r#"{"status":"sometimes"}"#).is_err());
    }
}
