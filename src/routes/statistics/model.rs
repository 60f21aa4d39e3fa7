//! Loaders feeding the reducers in `crate::stats` for one team.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::stats::{
    AttendanceLine, AttendanceSummary, GameLine, MatchLine, MemberLine, RecordLine, TeamComposition,
    TeamStatistics, Top10,
};

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NextMatch {
    pub id: Uuid,
    pub opponent_team_name: String,
    #[serde(rename = "date")]
    pub match_date: NaiveDate,
    #[serde(rename = "time")]
    pub match_time: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub next_match: Option<NextMatch>,
    pub team_composition: TeamComposition,
    pub team_statistics: TeamStatistics,
    pub top10: Top10,
    pub attendance_summary: AttendanceSummary,
}

/// Finished matches with their games.
pub async fn finished_matches(pool: &PgPool, team_id: Uuid) -> AppResult<Vec<MatchLine>> {
    let matches: Vec<(Uuid, Option<i32>, Option<i32>)> = sqlx::query_as(
        "SELECT id, total_our_score, total_opponent_score FROM matches \
         WHERE team_id = $1 AND status = 'finished' ORDER BY match_date",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await?;

    let games = sqlx::query_as::<_, GameLine>(
        r#"
        SELECT g.match_id, g.our_score, g.opponent_score, g.result
        FROM games g
        JOIN matches m ON m.id = g.match_id
        WHERE m.team_id = $1 AND m.status = 'finished'
        ORDER BY g.game_number
        "#,
    )
    .bind(team_id)
    .fetch_all(pool)
    .await?;

    let mut by_match: HashMap<Uuid, Vec<GameLine>> = HashMap::new();
    for game in games {
        by_match.entry(game.match_id).or_default().push(game);
    }

    Ok(matches
        .into_iter()
        .map(|(id, total_our_score, total_opponent_score)| MatchLine {
            games: by_match.remove(&id).unwrap_or_default(),
            id,
            total_our_score,
            total_opponent_score,
        })
        .collect())
}

/// Every player record of the team's matches, whatever their status.
pub async fn team_records(pool: &PgPool, team_id: Uuid) -> AppResult<Vec<RecordLine>> {
    let records = sqlx::query_as::<_, RecordLine>(
        r#"
        SELECT r.user_id, r.game_id, r.played, r.goals, r.assists, r.goal_type,
               g.result AS game_result
        FROM match_records r
        JOIN matches m ON m.id = r.match_id
        LEFT JOIN games g ON g.id = r.game_id
        WHERE m.team_id = $1
        ORDER BY m.match_date, g.game_number
        "#,
    )
    .bind(team_id)
    .fetch_all(pool)
    .await?;
    Ok(records)
}

/// Votes cast for the team's finished matches.
pub async fn finished_attendances(pool: &PgPool, team_id: Uuid) -> AppResult<Vec<AttendanceLine>> {
    let votes = sqlx::query_as::<_, AttendanceLine>(
        r#"
        SELECT a.match_id, a.user_id, a.status
        FROM match_attendances a
        JOIN matches m ON m.id = a.match_id
        WHERE m.team_id = $1 AND m.status = 'finished'
        ORDER BY a.voted_at
        "#,
    )
    .bind(team_id)
    .fetch_all(pool)
    .await?;
    Ok(votes)
}

/// Number of scheduled matches and the votes cast for them.
pub async fn scheduled_votes(pool: &PgPool, team_id: Uuid) -> AppResult<(usize, Vec<AttendanceLine>)> {
    let scheduled: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM matches WHERE team_id = $1 AND status = 'scheduled'",
    )
    .bind(team_id)
    .fetch_one(pool)
    .await?;

    let votes = sqlx::query_as::<_, AttendanceLine>(
        r#"
        SELECT a.match_id, a.user_id, a.status
        FROM match_attendances a
        JOIN matches m ON m.id = a.match_id
        WHERE m.team_id = $1 AND m.status = 'scheduled'
        "#,
    )
    .bind(team_id)
    .fetch_all(pool)
    .await?;
    Ok((scheduled as usize, votes))
}

/// Earliest scheduled match dated after `today`.
pub async fn next_match(pool: &PgPool, team_id: Uuid, today: NaiveDate) -> AppResult<Option<NextMatch>> {
    let scheduled = sqlx::query_as::<_, NextMatch>(
        r#"
        SELECT id, opponent_team_name, match_date, match_time, location
        FROM matches
        WHERE team_id = $1 AND status = 'scheduled' AND match_date > $2
        ORDER BY match_date ASC, match_time ASC NULLS LAST
        "#,
    )
    .bind(team_id)
    .bind(today)
    .fetch_all(pool)
    .await?;
    Ok(first_after(scheduled, today))
}

/// Earliest match strictly after `today`; an untimed match sorts after timed ones on the same day.
pub fn first_after(matches: Vec<NextMatch>, today: NaiveDate) -> Option<NextMatch> {
    matches
        .into_iter()
        .filter(|m| m.match_date > today)
        .min_by(|a, b| {
            a.match_date.cmp(&b.match_date).then_with(|| match (&a.match_time, &b.match_time) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
        })
}

/// Drops lines of users who are no longer on the team.
pub fn members_only<T>(members: &[MemberLine], lines: Vec<T>, user_of: impl Fn(&T) -> Uuid) -> Vec<T> {
    let ids: HashSet<Uuid> = members.iter().map(|m| m.user_id).collect();
    lines.into_iter().filter(|l| ids.contains(&user_of(l))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceStatus, MemberStatus};

    fn fixture(date: NaiveDate, time: Option<&str>) -> NextMatch {
        NextMatch {
            id: Uuid::new_v4(),
            opponent_team_name: "Rovers".into(),
            match_date: date,
            match_time: time.map(str::to_string),
            location: None,
        }
    }

    #[test]
    fn todays_match_is_not_the_next_match() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 4).unwrap();
        let tomorrow = today.succ_opt().unwrap();
        let later = tomorrow.succ_opt().unwrap();

        let next = first_after(
            vec![
                fixture(later, Some("10:00")),
                fixture(today, Some("20:00")),
                fixture(tomorrow, None),
                fixture(tomorrow, Some("18:00")),
            ],
            today,
        )
        .unwrap();
        assert_eq!(next.match_date, tomorrow);
        assert_eq!(next.match_time.as_deref(), Some("18:00"));

        assert!(first_after(vec![fixture(today, None)], today).is_none());
    }

    #[test]
    fn former_members_are_dropped() {
        let current = Uuid::new_v4();
        let members = vec![MemberLine {
            user_id: current,
            name: "Kim".into(),
            status: MemberStatus::Active,
            birthdate: None,
            positions: vec![],
        }];
        let vote = |user_id| AttendanceLine {
            match_id: Uuid::new_v4(),
            user_id,
            status: AttendanceStatus::Attending,
        };
        let kept = members_only(&members, vec![vote(current), vote(Uuid::new_v4())], |v| v.user_id);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].user_id, current);
    }
}
