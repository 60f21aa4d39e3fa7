use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::membership::{
    JoinRequestFacts, Membership, MembershipFacts, ensure_can_leave, ensure_removable,
    ensure_role_change_allowed, ensure_vice_captain_slot, require_role, require_team_role, review_transition,
};
use crate::models::{JoinRequestStatus, MemberStatus, Position, TeamRole};
use crate::stats::MemberLine;
use crate::utils::generate_invite_token;

pub const INVITE_VALID_DAYS: i64 = 7;
pub const MAX_JOIN_MESSAGE_LEN: usize = 500;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub region: Option<String>,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub captain_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
    pub status: MemberStatus,
    pub jersey_number: Option<i32>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct JoinRequest {
    pub id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub status: JoinRequestStatus,
}

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    pub region: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub jersey_number: Option<i32>,
    pub status: Option<MemberStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRequest {
    pub jersey_number: Option<i32>,
    pub role: Option<TeamRole>,
    pub status: Option<MemberStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinTeamRequest {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewJoinRequest {
    pub status: JoinRequestStatus,
}

#[derive(Debug, Serialize)]
pub struct CaptainInfo {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDetail {
    pub id: Uuid,
    pub name: String,
    pub region: Option<String>,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub captain: Option<CaptainInfo>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct TeamDetailRow {
    id: Uuid,
    name: String,
    region: Option<String>,
    description: Option<String>,
    logo: Option<String>,
    captain_id: Uuid,
    captain_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<TeamDetailRow> for TeamDetail {
    fn from(row: TeamDetailRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            region: row.region,
            description: row.description,
            logo: row.logo,
            captain: row.captain_name.map(|name| CaptainInfo {
                id: row.captain_id,
                name,
            }),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MyTeam {
    pub team_id: Uuid,
    pub team_name: String,
    pub role: TeamRole,
    pub status: MemberStatus,
}

#[derive(Debug, FromRow)]
struct MemberRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    profile_image: Option<String>,
    jersey_number: Option<i32>,
    role: TeamRole,
    status: MemberStatus,
    phone: Option<String>,
    birthdate: Option<NaiveDate>,
    summary: Option<String>,
    joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub profile_image: Option<String>,
    pub jersey_number: Option<i32>,
    pub role: TeamRole,
    pub status: MemberStatus,
    pub positions: Vec<Position>,
    pub phone: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub summary: Option<String>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct JoinRequestRow {
    id: Uuid,
    user_id: Uuid,
    user_name: String,
    message: Option<String>,
    status: JoinRequestStatus,
    phone: Option<String>,
    birthdate: Option<NaiveDate>,
    summary: Option<String>,
    created_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequestView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub message: Option<String>,
    pub status: JoinRequestStatus,
    pub positions: Vec<Position>,
    pub phone: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MyJoinRequestView {
    pub id: Uuid,
    pub team_id: Uuid,
    pub team_name: String,
    pub message: Option<String>,
    pub status: JoinRequestStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CreatedJoinRequest {
    pub id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub message: Option<String>,
    pub status: JoinRequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub id: Uuid,
    pub status: JoinRequestStatus,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteLink {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoResponse {
    pub logo_url: String,
}

/// Positions for a set of users, in one query.
pub async fn positions_by_user(pool: &PgPool, user_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<Position>>> {
    let rows: Vec<(Uuid, Position)> = sqlx::query_as(
        "SELECT user_id, position FROM user_positions WHERE user_id = ANY($1) ORDER BY position",
    )
    .bind(user_ids)
    .fetch_all(pool)
    .await?;

    let mut map: HashMap<Uuid, Vec<Position>> = HashMap::new();
    for (user_id, position) in rows {
        map.entry(user_id).or_default().push(position);
    }
    Ok(map)
}

const TEAM_DETAIL_QUERY: &str = r#"
    SELECT t.id, t.name, t.region, t.description, t.logo, t.captain_id,
           u.name AS captain_name, t.created_at
    FROM teams t
    LEFT JOIN users u ON u.id = t.captain_id
"#;

impl Team {
    pub async fn find(pool: &PgPool, team_id: Uuid) -> AppResult<Team> {
        sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE id = $1")
            .bind(team_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("team not found"))
    }

    async fn ensure_exists(conn: &mut PgConnection, team_id: Uuid) -> AppResult<()> {
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM teams WHERE id = $1")
            .bind(team_id)
            .fetch_optional(&mut *conn)
            .await?;
        exists.map(|_| ()).ok_or_else(|| AppError::not_found("team not found"))
    }

    /// Locks the team row for the rest of the transaction, serializing roster
    /// changes on the team. `None` when the team doesn't exist.
    async fn lock(conn: &mut PgConnection, team_id: Uuid) -> AppResult<Option<Uuid>> {
        let id = sqlx::query_scalar("SELECT id FROM teams WHERE id = $1 FOR UPDATE")
            .bind(team_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(id)
    }

    /// Creates the team with the caller as its captain.
    pub async fn create(pool: &PgPool, owner_id: Uuid, req: CreateTeamRequest) -> AppResult<Team> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(AppError::bad_request("team name is required"));
        }

        let mut tx = pool.begin().await?;
        TeamMember::membership_facts(&mut tx, owner_id)
            .await?
            .ensure_no_team()?;

        let team = sqlx::query_as::<_, Team>(
            r#"
            INSERT INTO teams (id, name, region, description, captain_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(&req.region)
        .bind(&req.description)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        TeamMember::insert(&mut tx, team.id, owner_id, TeamRole::Captain, None, MemberStatus::Active).await?;
        tx.commit().await?;

        tracing::info!("team {} created by {}", team.id, owner_id);
        Ok(team)
    }

    pub async fn list_public(pool: &PgPool) -> AppResult<Vec<TeamDetail>> {
        let rows = sqlx::query_as::<_, TeamDetailRow>(&format!(
            "{} ORDER BY t.created_at DESC",
            TEAM_DETAIL_QUERY
        ))
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(TeamDetail::from).collect())
    }

    pub async fn detail(pool: &PgPool, team_id: Uuid) -> AppResult<TeamDetail> {
        let row = sqlx::query_as::<_, TeamDetailRow>(&format!("{} WHERE t.id = $1", TEAM_DETAIL_QUERY))
            .bind(team_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("team not found"))?;
        Ok(row.into())
    }

    pub async fn for_user(pool: &PgPool, user_id: Uuid) -> AppResult<Option<MyTeam>> {
        let team = sqlx::query_as::<_, MyTeam>(
            r#"
            SELECT m.team_id, t.name AS team_name, m.role, m.status
            FROM team_members m
            JOIN teams t ON t.id = m.team_id
            WHERE m.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(team)
    }

    /// Captain only. Memberships go first, then the team; everything else
    /// hanging off the team cascades.
    pub async fn delete(pool: &PgPool, team_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut tx = pool.begin().await?;
        Self::ensure_exists(&mut tx, team_id).await?;
        require_role(
            TeamMember::membership(&mut tx, team_id, user_id).await?,
            &[TeamRole::Captain],
        )?;

        sqlx::query("DELETE FROM team_members WHERE team_id = $1")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("team {} deleted by {}", team_id, user_id);
        Ok(())
    }

    pub async fn create_invite(pool: &PgPool, team_id: Uuid, user_id: Uuid) -> AppResult<InviteLink> {
        let mut conn = pool.acquire().await?;
        require_role(
            TeamMember::membership(&mut conn, team_id, user_id).await?,
            &TeamRole::MANAGERS,
        )?;

        let token = generate_invite_token();
        let expires_at = Utc::now() + Duration::days(INVITE_VALID_DAYS);
        sqlx::query(
            r#"
            INSERT INTO team_invites (id, team_id, created_by, token, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(team_id)
        .bind(user_id)
        .bind(&token)
        .bind(expires_at)
        .execute(&mut *conn)
        .await?;

        Ok(InviteLink { token, expires_at })
    }

    /// Captain only. Returns the previous logo URL so the caller can clean it up.
    pub async fn authorize_logo_upload(pool: &PgPool, team_id: Uuid, user_id: Uuid) -> AppResult<Option<String>> {
        let mut conn = pool.acquire().await?;
        require_role(
            TeamMember::membership(&mut conn, team_id, user_id).await?,
            &[TeamRole::Captain],
        )?;
        let logo: Option<Option<String>> = sqlx::query_scalar("SELECT logo FROM teams WHERE id = $1")
            .bind(team_id)
            .fetch_optional(&mut *conn)
            .await?;
        logo.ok_or_else(|| AppError::not_found("team not found"))
    }

    pub async fn set_logo(pool: &PgPool, team_id: Uuid, url: &str) -> AppResult<()> {
        sqlx::query("UPDATE teams SET logo = $2, updated_at = NOW() WHERE id = $1")
            .bind(team_id)
            .bind(url)
            .execute(pool)
            .await?;
        Ok(())
    }
}

impl TeamMember {
    /// The caller's membership in `team_id`, if any.
    pub async fn membership(conn: &mut PgConnection, team_id: Uuid, user_id: Uuid) -> AppResult<Option<Membership>> {
        let row: Option<(Uuid, TeamRole)> =
            sqlx::query_as("SELECT id, role FROM team_members WHERE team_id = $1 AND user_id = $2")
                .bind(team_id)
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?;

        Ok(row.map(|(member_id, role)| Membership {
            member_id,
            team_id,
            user_id,
            role,
        }))
    }

    /// Locks the user row so concurrent membership writes for the same user
    /// serialize, then reads which team they are on.
    pub async fn membership_facts(conn: &mut PgConnection, user_id: Uuid) -> AppResult<MembershipFacts> {
        let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
        if locked.is_none() {
            return Err(AppError::not_found("user not found"));
        }

        let current_team: Option<Uuid> =
            sqlx::query_scalar("SELECT team_id FROM team_members WHERE user_id = $1 LIMIT 1")
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(MembershipFacts { current_team })
    }

    async fn join_request_facts(conn: &mut PgConnection, user_id: Uuid) -> AppResult<JoinRequestFacts> {
        let membership = Self::membership_facts(conn, user_id).await?;
        let pending_team: Option<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT r.team_id, t.name
            FROM team_join_requests r
            JOIN teams t ON t.id = r.team_id
            WHERE r.user_id = $1 AND r.status = 'pending'
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(JoinRequestFacts {
            membership,
            pending_team,
        })
    }

    pub async fn insert(
        conn: &mut PgConnection,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
        jersey_number: Option<i32>,
        status: MemberStatus,
    ) -> AppResult<TeamMember> {
        let member = sqlx::query_as::<_, TeamMember>(
            r#"
            INSERT INTO team_members (id, team_id, user_id, role, status, jersey_number)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(team_id)
        .bind(user_id)
        .bind(role)
        .bind(status)
        .bind(jersey_number)
        .fetch_one(&mut *conn)
        .await?;
        Ok(member)
    }

    async fn find_in_team(conn: &mut PgConnection, team_id: Uuid, member_id: Uuid) -> AppResult<TeamMember> {
        sqlx::query_as::<_, TeamMember>("SELECT * FROM team_members WHERE id = $1 AND team_id = $2")
            .bind(member_id)
            .bind(team_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::not_found("team member not found"))
    }

    pub async fn list(pool: &PgPool, team_id: Uuid) -> AppResult<Vec<MemberView>> {
        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "{} WHERE m.team_id = $1 ORDER BY m.joined_at ASC",
            MEMBER_QUERY
        ))
        .bind(team_id)
        .fetch_all(pool)
        .await?;

        let user_ids: Vec<Uuid> = rows.iter().map(|r| r.user_id).collect();
        let mut positions = positions_by_user(pool, &user_ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let p = positions.remove(&row.user_id).unwrap_or_default();
                member_view(row, p)
            })
            .collect())
    }

    pub async fn get(pool: &PgPool, team_id: Uuid, member_id: Uuid) -> AppResult<MemberView> {
        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "{} WHERE m.team_id = $1 AND m.id = $2",
            MEMBER_QUERY
        ))
        .bind(team_id)
        .bind(member_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("team member not found"))?;

        let mut positions = positions_by_user(pool, &[row.user_id]).await?;
        let p = positions.remove(&row.user_id).unwrap_or_default();
        Ok(member_view(row, p))
    }

    /// Member lines for the aggregation engine.
    pub async fn lines(pool: &PgPool, team_id: Uuid) -> AppResult<Vec<MemberLine>> {
        let rows: Vec<(Uuid, String, MemberStatus, Option<NaiveDate>)> = sqlx::query_as(
            r#"
            SELECT m.user_id, u.name, m.status, u.birthdate
            FROM team_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.team_id = $1
            ORDER BY m.joined_at ASC
            "#,
        )
        .bind(team_id)
        .fetch_all(pool)
        .await?;

        let user_ids: Vec<Uuid> = rows.iter().map(|r| r.0).collect();
        let mut positions = positions_by_user(pool, &user_ids).await?;
        Ok(rows
            .into_iter()
            .map(|(user_id, name, status, birthdate)| MemberLine {
                positions: positions.remove(&user_id).unwrap_or_default(),
                user_id,
                name,
                status,
                birthdate,
            })
            .collect())
    }

    pub async fn add(pool: &PgPool, team_id: Uuid, requester_id: Uuid, req: AddMemberRequest) -> AppResult<TeamMember> {
        let mut tx = pool.begin().await?;
        let team = Team::lock(&mut tx, team_id).await?;
        require_team_role(
            team,
            Self::membership(&mut tx, team_id, requester_id).await?,
            &TeamRole::MANAGERS,
        )?;

        Self::membership_facts(&mut tx, req.user_id)
            .await?
            .ensure_free_for(team_id)?;
        let member = Self::insert(
            &mut tx,
            team_id,
            req.user_id,
            TeamRole::Member,
            req.jersey_number,
            req.status.unwrap_or_default(),
        )
        .await?;
        tx.commit().await?;

        tracing::info!("user {} added to team {} by {}", req.user_id, team_id, requester_id);
        Ok(member)
    }

    pub async fn update(
        pool: &PgPool,
        team_id: Uuid,
        member_id: Uuid,
        requester_id: Uuid,
        req: UpdateMemberRequest,
    ) -> AppResult<TeamMember> {
        let mut tx = pool.begin().await?;
        let team = Team::lock(&mut tx, team_id).await?;
        require_team_role(
            team,
            Self::membership(&mut tx, team_id, requester_id).await?,
            &TeamRole::MANAGERS,
        )?;
        let member = Self::find_in_team(&mut tx, team_id, member_id).await?;
        ensure_role_change_allowed(member.role, req.role)?;

        if req.role == Some(TeamRole::ViceCaptain) {
            // counted under the team row lock taken above
            let vice_captains: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM team_members WHERE team_id = $1 AND role = 'vice_captain'",
            )
            .bind(team_id)
            .fetch_one(&mut *tx)
            .await?;
            ensure_vice_captain_slot(member.role, req.role, vice_captains)?;
        }

        let updated = sqlx::query_as::<_, TeamMember>(
            r#"
            UPDATE team_members
            SET jersey_number = COALESCE($2, jersey_number),
                role = COALESCE($3, role),
                status = COALESCE($4, status)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(member.id)
        .bind(req.jersey_number)
        .bind(req.role)
        .bind(req.status)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(updated)
    }

    pub async fn remove(pool: &PgPool, team_id: Uuid, member_id: Uuid, requester_id: Uuid) -> AppResult<()> {
        let mut tx = pool.begin().await?;
        let team = Team::lock(&mut tx, team_id).await?;
        require_team_role(
            team,
            Self::membership(&mut tx, team_id, requester_id).await?,
            &TeamRole::MANAGERS,
        )?;
        let member = Self::find_in_team(&mut tx, team_id, member_id).await?;
        ensure_removable(member.role)?;

        sqlx::query("DELETE FROM team_members WHERE id = $1")
            .bind(member.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("member {} removed from team {} by {}", member_id, team_id, requester_id);
        Ok(())
    }

    pub async fn leave(pool: &PgPool, team_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut conn = pool.acquire().await?;
        let membership = Self::membership(&mut conn, team_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("team membership not found"))?;
        ensure_can_leave(membership.role)?;

        sqlx::query("DELETE FROM team_members WHERE id = $1")
            .bind(membership.member_id)
            .execute(&mut *conn)
            .await?;

        tracing::info!("user {} left team {}", user_id, team_id);
        Ok(())
    }
}

const MEMBER_QUERY: &str = r#"
    SELECT m.id, m.user_id, u.name, u.profile_image, m.jersey_number, m.role, m.status,
           u.phone, u.birthdate, u.summary, m.joined_at
    FROM team_members m
    JOIN users u ON u.id = m.user_id
"#;

fn member_view(row: MemberRow, positions: Vec<Position>) -> MemberView {
    MemberView {
        id: row.id,
        user_id: row.user_id,
        name: row.name,
        profile_image: row.profile_image,
        jersey_number: row.jersey_number,
        role: row.role,
        status: row.status,
        positions,
        phone: row.phone,
        birthdate: row.birthdate,
        summary: row.summary,
        joined_at: row.joined_at,
    }
}

impl JoinRequest {
    /// Files a pending request. Checked in order: the team exists, the user
    /// isn't on a team, and the user has no pending request anywhere.
    pub async fn create(pool: &PgPool, team_id: Uuid, user_id: Uuid, req: JoinTeamRequest) -> AppResult<CreatedJoinRequest> {
        if req
            .message
            .as_deref()
            .is_some_and(|m| m.chars().count() > MAX_JOIN_MESSAGE_LEN)
        {
            return Err(AppError::bad_request(format!(
                "message must be at most {} characters",
                MAX_JOIN_MESSAGE_LEN
            )));
        }

        let mut tx = pool.begin().await?;
        Team::ensure_exists(&mut tx, team_id).await?;
        TeamMember::join_request_facts(&mut tx, user_id)
            .await?
            .ensure_can_request(team_id)?;

        let created = sqlx::query_as::<_, CreatedJoinRequest>(
            r#"
            INSERT INTO team_join_requests (id, team_id, user_id, message, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING id, team_id, user_id, message, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(team_id)
        .bind(user_id)
        .bind(&req.message)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!("user {} requested to join team {}", user_id, team_id);
        Ok(created)
    }

    pub async fn list_for_team(pool: &PgPool, team_id: Uuid, user_id: Uuid) -> AppResult<Vec<JoinRequestView>> {
        let mut conn = pool.acquire().await?;
        require_role(
            TeamMember::membership(&mut conn, team_id, user_id).await?,
            &TeamRole::MANAGERS,
        )?;

        let rows = sqlx::query_as::<_, JoinRequestRow>(
            r#"
            SELECT r.id, r.user_id, u.name AS user_name, r.message, r.status,
                   u.phone, u.birthdate, u.summary, r.created_at, r.reviewed_at
            FROM team_join_requests r
            JOIN users u ON u.id = r.user_id
            WHERE r.team_id = $1
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(team_id)
        .fetch_all(&mut *conn)
        .await?;
        drop(conn);

        let user_ids: Vec<Uuid> = rows.iter().map(|r| r.user_id).collect();
        let mut positions = positions_by_user(pool, &user_ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| JoinRequestView {
                positions: positions.get(&row.user_id).cloned().unwrap_or_default(),
                id: row.id,
                user_id: row.user_id,
                user_name: row.user_name,
                message: row.message,
                status: row.status,
                phone: row.phone,
                birthdate: row.birthdate,
                summary: row.summary,
                created_at: row.created_at,
                reviewed_at: row.reviewed_at,
            })
            .collect())
    }

    pub async fn list_mine(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<MyJoinRequestView>> {
        let requests = sqlx::query_as::<_, MyJoinRequestView>(
            r#"
            SELECT r.id, r.team_id, t.name AS team_name, r.message, r.status,
                   r.created_at, r.reviewed_at
            FROM team_join_requests r
            JOIN teams t ON t.id = r.team_id
            WHERE r.user_id = $1
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(requests)
    }

    /// Approves or rejects a pending request. Approval re-checks that the
    /// applicant is still free and adds them as an active member.
    pub async fn review(
        pool: &PgPool,
        team_id: Uuid,
        request_id: Uuid,
        reviewer_id: Uuid,
        req: ReviewJoinRequest,
    ) -> AppResult<ReviewResult> {
        let mut tx = pool.begin().await?;
        require_role(
            TeamMember::membership(&mut tx, team_id, reviewer_id).await?,
            &TeamRole::MANAGERS,
        )?;

        let request = sqlx::query_as::<_, JoinRequest>(
            r#"
            SELECT id, team_id, user_id, status
            FROM team_join_requests
            WHERE id = $1 AND team_id = $2
            FOR UPDATE
            "#,
        )
        .bind(request_id)
        .bind(team_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("join request not found"))?;

        let status = review_transition(request.status, req.status)?;
        if status == JoinRequestStatus::Approved {
            TeamMember::membership_facts(&mut tx, request.user_id)
                .await?
                .ensure_free_for(team_id)?;
            TeamMember::insert(
                &mut tx,
                team_id,
                request.user_id,
                TeamRole::Member,
                None,
                MemberStatus::Active,
            )
            .await?;
        }

        let reviewed_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            UPDATE team_join_requests
            SET status = $2, reviewed_by = $3, reviewed_at = NOW()
            WHERE id = $1
            RETURNING reviewed_at
            "#,
        )
        .bind(request.id)
        .bind(status)
        .bind(reviewer_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!("join request {} {:?} by {}", request.id, status, reviewer_id);
        Ok(ReviewResult {
            id: request.id,
            status,
            reviewed_at,
        })
    }

    /// Applicants can withdraw their own request while it is still pending.
    pub async fn cancel(pool: &PgPool, request_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let request = sqlx::query_as::<_, JoinRequest>(
            "SELECT id, team_id, user_id, status FROM team_join_requests WHERE id = $1",
        )
        .bind(request_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("join request not found"))?;

        if request.user_id != user_id {
            return Err(AppError::forbidden("only your own join request can be cancelled"));
        }
        if request.status != JoinRequestStatus::Pending {
            return Err(AppError::bad_request(
                "a reviewed join request cannot be cancelled",
            ));
        }

        sqlx::query("DELETE FROM team_join_requests WHERE id = $1 AND status = 'pending'")
            .bind(request.id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captain_is_only_rendered_when_known() {
        let row = TeamDetailRow {
            id: Uuid::new_v4(),
            name: "Rovers".into(),
            region: None,
            description: None,
            logo: None,
            captain_id: Uuid::new_v4(),
            captain_name: None,
            created_at: Utc::now(),
        };
        assert!(TeamDetail::from(row).captain.is_none());
    }

    #[test]
    fn member_requests_use_camel_case() {
        let req: AddMemberRequest = serde_json::from_str(&format!(
            r#"{{"userId":"{}","jerseyNumber":7,"status":"injured"}}"#,
            Uuid::nil()
        ))
        .unwrap();
        assert_eq!(req.jersey_number, Some(7));
        assert_eq!(req.status, Some(MemberStatus::Injured));

        let update: UpdateMemberRequest = serde_json::from_str(r#"{"role":"vice_captain"}"#).unwrap();
        assert_eq!(update.role, Some(TeamRole::ViceCaptain));
        assert!(update.jersey_number.is_none());
    }
}
