use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::membership::require_role;
use crate::models::{GameResult, GoalType, MatchStatus, TeamRole};
use crate::routes::team::model::TeamMember;

use super::record::{RecordMatchRequest, RecordPlan, plan_record, total_score};

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: Uuid,
    pub team_id: Uuid,
    pub opponent_team_name: String,
    #[serde(rename = "date")]
    pub match_date: NaiveDate,
    #[serde(rename = "time")]
    pub match_time: Option<String>,
    pub location: Option<String>,
    pub status: MatchStatus,
    pub total_our_score: Option<i32>,
    pub total_opponent_score: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Game {
    pub id: Uuid,
    pub match_id: Uuid,
    pub game_number: i32,
    pub our_score: i32,
    pub opponent_score: i32,
    pub result: GameResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchRequest {
    pub team_id: Uuid,
    pub opponent_team_name: String,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMatchRequest {
    pub opponent_team_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub status: Option<MatchStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMatchesQuery {
    pub team_id: Option<Uuid>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    pub id: Uuid,
    #[serde(skip)]
    pub game_id: Option<Uuid>,
    pub user_id: Uuid,
    pub user_name: String,
    pub played: bool,
    pub goals: i32,
    pub assists: i32,
    pub goal_type: Option<GoalType>,
    pub goal_time: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub id: Uuid,
    pub game_number: i32,
    pub our_score: i32,
    pub opponent_score: i32,
    pub result: GameResult,
    pub records: Vec<RecordView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetail {
    pub id: Uuid,
    pub team_id: Uuid,
    pub opponent_team_name: String,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub location: Option<String>,
    pub status: MatchStatus,
    pub total_our_score: i32,
    pub total_opponent_score: i32,
    pub notes: Option<String>,
    pub games: Vec<GameView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecordSheet {
    pub match_id: Uuid,
    pub games: Vec<GameView>,
    pub notes: Option<String>,
}

/// One row of the match calendar.
#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub id: Uuid,
    pub opponent_team_name: String,
    pub date: NaiveDate,
    pub status: MatchStatus,
    pub game_count: usize,
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    pub total_goals: i32,
    pub total_assists: i64,
    pub total_opponent_goals: i32,
}

/// First and last day of `month`.
pub fn month_range(year: i32, month: u32) -> AppResult<(NaiveDate, NaiveDate)> {
    let invalid = || AppError::bad_request("invalid year or month");
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    let last = next.pred_opt().ok_or_else(invalid)?;
    Ok((first, last))
}

/// Win/draw/loss game counts and goals for one match.
pub fn summarize(m: &Match, games: &[Game], total_assists: i64) -> MatchSummary {
    let count = |r: GameResult| games.iter().filter(|g| g.result == r).count();
    MatchSummary {
        id: m.id,
        opponent_team_name: m.opponent_team_name.clone(),
        date: m.match_date,
        status: m.status,
        game_count: games.len(),
        wins: count(GameResult::Win),
        draws: count(GameResult::Draw),
        losses: count(GameResult::Loss),
        total_goals: total_score(games.iter().map(|g| g.our_score)),
        total_assists,
        total_opponent_goals: total_score(games.iter().map(|g| g.opponent_score)),
    }
}

fn game_views(games: Vec<Game>, records: Vec<RecordView>) -> Vec<GameView> {
    let mut by_game: HashMap<Uuid, Vec<RecordView>> = HashMap::new();
    for record in records {
        if let Some(game_id) = record.game_id {
            by_game.entry(game_id).or_default().push(record);
        }
    }
    games
        .into_iter()
        .map(|g| GameView {
            records: by_game.remove(&g.id).unwrap_or_default(),
            id: g.id,
            game_number: g.game_number,
            our_score: g.our_score,
            opponent_score: g.opponent_score,
            result: g.result,
        })
        .collect()
}

/// Team the caller means: the explicit id when given, otherwise their own.
pub async fn resolve_team(pool: &PgPool, user_id: Uuid, team_id: Option<Uuid>) -> AppResult<Uuid> {
    let found: Option<Uuid> = match team_id {
        Some(team_id) => sqlx::query_scalar("SELECT id FROM teams WHERE id = $1")
            .bind(team_id)
            .fetch_optional(pool)
            .await?,
        None => sqlx::query_scalar("SELECT team_id FROM team_members WHERE user_id = $1 LIMIT 1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?,
    };
    found.ok_or_else(|| match team_id {
        Some(_) => AppError::not_found("team not found"),
        None => AppError::bad_request("teamId is required when you are not on a team"),
    })
}

impl Match {
    pub async fn find(conn: &mut PgConnection, id: Uuid) -> AppResult<Match> {
        sqlx::query_as::<_, Match>("SELECT * FROM matches WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::not_found("match not found"))
    }

    async fn require_manager(conn: &mut PgConnection, team_id: Uuid, user_id: Uuid) -> AppResult<()> {
        require_role(
            TeamMember::membership(conn, team_id, user_id).await?,
            &TeamRole::MANAGERS,
        )?;
        Ok(())
    }

    pub async fn create(pool: &PgPool, user_id: Uuid, req: CreateMatchRequest) -> AppResult<Match> {
        let opponent = req.opponent_team_name.trim();
        if opponent.is_empty() {
            return Err(AppError::bad_request("opponent team name is required"));
        }

        let mut conn = pool.acquire().await?;
        Self::require_manager(&mut conn, req.team_id, user_id).await?;

        let created = sqlx::query_as::<_, Match>(
            r#"
            INSERT INTO matches (id, team_id, opponent_team_name, match_date, match_time, location, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'scheduled')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.team_id)
        .bind(opponent)
        .bind(req.date)
        .bind(&req.time)
        .bind(&req.location)
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!("match {} scheduled for team {}", created.id, created.team_id);
        Ok(created)
    }

    pub async fn update(pool: &PgPool, id: Uuid, user_id: Uuid, req: UpdateMatchRequest) -> AppResult<Match> {
        let mut tx = pool.begin().await?;
        let current = sqlx::query_as::<_, Match>("SELECT * FROM matches WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("match not found"))?;
        Self::require_manager(&mut tx, current.team_id, user_id).await?;

        if let Some(next) = req.status {
            if !current.status.can_transition_to(next) {
                return Err(AppError::bad_request(format!(
                    "cannot change match status from {:?} to {:?}",
                    current.status, next
                )));
            }
        }
        if req
            .opponent_team_name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(AppError::bad_request("opponent team name is required"));
        }

        let updated = sqlx::query_as::<_, Match>(
            r#"
            UPDATE matches
            SET opponent_team_name = COALESCE($2, opponent_team_name),
                match_date = COALESCE($3, match_date),
                match_time = COALESCE($4, match_time),
                location = COALESCE($5, location),
                status = COALESCE($6, status),
                notes = COALESCE($7, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(req.opponent_team_name.as_deref().map(str::trim))
        .bind(req.date)
        .bind(&req.time)
        .bind(&req.location)
        .bind(req.status)
        .bind(&req.notes)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(updated)
    }

    /// Games, records and substitutions go with the match.
    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut tx = pool.begin().await?;
        let current = Self::find(&mut tx, id).await?;
        Self::require_manager(&mut tx, current.team_id, user_id).await?;

        for stmt in [
            "DELETE FROM substitutions WHERE match_id = $1",
            "DELETE FROM match_records WHERE match_id = $1",
            "DELETE FROM match_attendances WHERE match_id = $1",
            "DELETE FROM games WHERE match_id = $1",
            "DELETE FROM matches WHERE id = $1",
        ] {
            sqlx::query(stmt).bind(id).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        tracing::info!("match {} deleted by {}", id, user_id);
        Ok(())
    }

    pub async fn list(pool: &PgPool, team_id: Uuid, month: Option<(NaiveDate, NaiveDate)>) -> AppResult<Vec<MatchSummary>> {
        let matches = match month {
            Some((first, last)) => sqlx::query_as::<_, Match>(
                "SELECT * FROM matches WHERE team_id = $1 AND match_date BETWEEN $2 AND $3 \
                 ORDER BY match_date DESC",
            )
            .bind(team_id)
            .bind(first)
            .bind(last)
            .fetch_all(pool)
            .await?,
            None => sqlx::query_as::<_, Match>(
                "SELECT * FROM matches WHERE team_id = $1 ORDER BY match_date DESC",
            )
            .bind(team_id)
            .fetch_all(pool)
            .await?,
        };

        let ids: Vec<Uuid> = matches.iter().map(|m| m.id).collect();
        let games = sqlx::query_as::<_, Game>(
            "SELECT * FROM games WHERE match_id = ANY($1) ORDER BY game_number",
        )
        .bind(&ids)
        .fetch_all(pool)
        .await?;
        let assists: HashMap<Uuid, i64> = sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT match_id, COALESCE(SUM(assists), 0)::BIGINT FROM match_records \
             WHERE match_id = ANY($1) GROUP BY match_id",
        )
        .bind(&ids)
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect();

        let mut games_by_match: HashMap<Uuid, Vec<Game>> = HashMap::new();
        for game in games {
            games_by_match.entry(game.match_id).or_default().push(game);
        }

        Ok(matches
            .iter()
            .map(|m| {
                let games = games_by_match.remove(&m.id).unwrap_or_default();
                summarize(m, &games, assists.get(&m.id).copied().unwrap_or(0))
            })
            .collect())
    }

    pub async fn games(pool: &PgPool, id: Uuid) -> AppResult<Vec<GameView>> {
        let games = sqlx::query_as::<_, Game>(
            "SELECT * FROM games WHERE match_id = $1 ORDER BY game_number",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;
        let records = sqlx::query_as::<_, RecordView>(
            r#"
            SELECT r.id, r.game_id, r.user_id, u.name AS user_name, r.played, r.goals,
                   r.assists, r.goal_type, r.goal_time
            FROM match_records r
            JOIN users u ON u.id = r.user_id
            WHERE r.match_id = $1
            ORDER BY u.name
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;
        Ok(game_views(games, records))
    }

    /// Detail with games and records; totals are summed from the games.
    pub async fn detail(pool: &PgPool, id: Uuid) -> AppResult<MatchDetail> {
        let m = {
            let mut conn = pool.acquire().await?;
            Self::find(&mut conn, id).await?
        };
        let games = Self::games(pool, id).await?;

        Ok(MatchDetail {
            total_our_score: total_score(games.iter().map(|g| g.our_score)),
            total_opponent_score: total_score(games.iter().map(|g| g.opponent_score)),
            id: m.id,
            team_id: m.team_id,
            opponent_team_name: m.opponent_team_name,
            date: m.match_date,
            time: m.match_time,
            location: m.location,
            status: m.status,
            notes: m.notes,
            games,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }

    pub async fn record_sheet(pool: &PgPool, id: Uuid) -> AppResult<MatchRecordSheet> {
        let m = {
            let mut conn = pool.acquire().await?;
            Self::find(&mut conn, id).await?
        };
        Ok(MatchRecordSheet {
            match_id: m.id,
            games: Self::games(pool, id).await?,
            notes: m.notes,
        })
    }

    /// Replaces every game, record and substitution of the match with the
    /// submitted ones and marks it finished.
    pub async fn record(pool: &PgPool, id: Uuid, user_id: Uuid, req: RecordMatchRequest) -> AppResult<MatchDetail> {
        let plan = plan_record(&req)?;

        let mut tx = pool.begin().await?;
        let current = sqlx::query_as::<_, Match>("SELECT * FROM matches WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("match not found"))?;
        Self::require_manager(&mut tx, current.team_id, user_id).await?;
        ensure_players_exist(&mut tx, &plan).await?;

        sqlx::query("DELETE FROM match_records WHERE match_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM substitutions WHERE match_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM games WHERE match_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        write_plan(&mut tx, id, &plan).await?;

        sqlx::query(
            r#"
            UPDATE matches
            SET total_our_score = $2, total_opponent_score = $3, status = 'finished',
                notes = COALESCE($4, notes), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(plan.total_our_score)
        .bind(plan.total_opponent_score)
        .bind(req.notes.as_deref().filter(|n| !n.is_empty()))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(
            "match {} recorded: {} games, {} records",
            id,
            plan.games.len(),
            plan.records.len()
        );
        Self::detail(pool, id).await
    }
}

/// Players only need an account: people who have since left the team keep
/// their lines when a past match is recorded again.
async fn ensure_players_exist(conn: &mut PgConnection, plan: &RecordPlan) -> AppResult<()> {
    let players = plan.players();
    if players.is_empty() {
        return Ok(());
    }
    let existing: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = ANY($1)")
        .bind(&players)
        .fetch_all(&mut *conn)
        .await?;
    match unknown_players(&players, &existing).first() {
        Some(missing) => Err(AppError::bad_request(format!("unknown player {}", missing))),
        None => Ok(()),
    }
}

fn unknown_players(players: &[Uuid], existing: &[Uuid]) -> Vec<Uuid> {
    players.iter().filter(|p| !existing.contains(p)).copied().collect()
}

async fn write_plan(conn: &mut PgConnection, match_id: Uuid, plan: &RecordPlan) -> AppResult<()> {
    for game in &plan.games {
        sqlx::query(
            "INSERT INTO games (id, match_id, game_number, our_score, opponent_score, result) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(game.id)
        .bind(match_id)
        .bind(game.game_number)
        .bind(game.our_score)
        .bind(game.opponent_score)
        .bind(game.result)
        .execute(&mut *conn)
        .await?;
    }

    for record in &plan.records {
        sqlx::query(
            r#"
            INSERT INTO match_records
                (id, match_id, game_id, user_id, played, goals, assists, goal_type, goal_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(match_id)
        .bind(record.game_id)
        .bind(record.user_id)
        .bind(record.played)
        .bind(record.goals)
        .bind(record.assists)
        .bind(record.goal_type)
        .bind(record.goal_time)
        .execute(&mut *conn)
        .await?;
    }

    for sub in &plan.substitutions {
        sqlx::query(
            "INSERT INTO substitutions (id, match_id, game_id, player_in_id, player_out_id, substitution_time) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(match_id)
        .bind(sub.game_id)
        .bind(sub.player_in_id)
        .bind(sub.player_out_id)
        .bind(sub.minute)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn game(match_id: Uuid, ours: i32, theirs: i32) -> Game {
        Game {
            id: Uuid::new_v4(),
            match_id,
            game_number: 1,
            our_score: ours,
            opponent_score: theirs,
            result: GameResult::from_scores(ours, theirs),
        }
    }

    #[test]
    fn month_range_covers_whole_month() {
        assert_eq!(month_range(2024, 2).unwrap(), (date(2024, 2, 1), date(2024, 2, 29)));
        assert_eq!(month_range(2023, 12).unwrap(), (date(2023, 12, 1), date(2023, 12, 31)));
        assert!(month_range(2024, 13).is_err());
        assert!(month_range(2024, 0).is_err());
    }

    #[test]
    fn summary_counts_games_and_goals() {
        let now = Utc::now();
        let m = Match {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            opponent_team_name: "Rovers".into(),
            match_date: date(2024, 5, 4),
            match_time: None,
            location: None,
            status: MatchStatus::Finished,
            total_our_score: Some(3),
            total_opponent_score: Some(2),
            notes: None,
            created_at: now,
            updated_at: now,
        };
        let games = vec![game(m.id, 2, 1), game(m.id, 1, 1), game(m.id, 0, 0)];
        let summary = summarize(&m, &games, 4);
        assert_eq!((summary.wins, summary.draws, summary.losses), (1, 2, 0));
        assert_eq!((summary.total_goals, summary.total_opponent_goals), (3, 2));
        assert_eq!(summary.total_assists, 4);
        assert_eq!(summary.game_count, 3);

        let huge = vec![game(m.id, i32::MAX, 0), game(m.id, i32::MAX, 0)];
        assert_eq!(summarize(&m, &huge, 0).total_goals, i32::MAX);
    }

    #[test]
    fn former_members_with_an_account_can_be_recorded() {
        let (current, departed, ghost) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let existing = vec![current, departed];
        assert!(unknown_players(&[current, departed], &existing).is_empty());
        assert_eq!(unknown_players(&[current, ghost], &existing), vec![ghost]);
    }

    #[test]
    fn records_attach_to_their_game() {
        let match_id = Uuid::new_v4();
        let (g1, g2) = (game(match_id, 1, 0), game(match_id, 0, 1));
        let record = |game_id| RecordView {
            id: Uuid::new_v4(),
            game_id: Some(game_id),
            user_id: Uuid::new_v4(),
            user_name: "Kim".into(),
            played: true,
            goals: 0,
            assists: 0,
            goal_type: None,
            goal_time: None,
        };
        let views = game_views(
            vec![g1.clone(), g2.clone()],
            vec![record(g1.id), record(g2.id), record(g2.id)],
        );
        assert_eq!(views[0].records.len(), 1);
        assert_eq!(views[1].records.len(), 2);
    }

    #[test]
    fn match_serializes_date_and_time_keys() {
        let now = Utc::now();
        let m = Match {
            id: Uuid::nil(),
            team_id: Uuid::nil(),
            opponent_team_name: "FC".into(),
            match_date: date(2024, 3, 9),
            match_time: Some("10:00".into()),
            location: None,
            status: MatchStatus::Scheduled,
            total_our_score: None,
            total_opponent_score: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["date"], "2024-03-09");
        assert_eq!(json["time"], "10:00");
        assert_eq!(json["opponentTeamName"], "FC");
        assert_eq!(json["status"], "scheduled");
    }
}
