use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{AuthProvider, MemberStatus, TeamRole};
use crate::routes::team::model::TeamMember;
use crate::routes::user::model::User;
use crate::utils::{
    generate_refresh_token, generate_token, token_digest, verify_password, verify_refresh_token,
};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialLoginRequest {
    pub provider: AuthProvider,
    pub provider_id: String,
    pub email: String,
    pub name: String,
    pub profile_image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthUserInfo {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

/// Body of every token-issuing response. The refresh token itself only
/// travels in the cookie.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub expires_at: i64,
    pub user: AuthUserInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteInfo {
    pub valid: bool,
    pub team_id: Uuid,
    pub team_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInviteResponse {
    pub success: bool,
    pub team_id: Uuid,
}

#[derive(Debug, FromRow)]
struct InviteRow {
    id: Uuid,
    team_id: Uuid,
    team_name: String,
    expires_at: DateTime<Utc>,
    used: bool,
}

pub fn validate_credentials(email: &str, password: &str) -> AppResult<()> {
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_email {
        return Err(AppError::bad_request("invalid email address"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Issues a fresh token pair and stores the digest of the refresh token,
/// invalidating any previous one.
pub async fn issue_tokens(pool: &PgPool, config: &Config, user: &User) -> AppResult<(AuthResponse, String)> {
    let user_id = user.id.to_string();
    let (access_token, expires_at) = generate_token(&user_id, &user.email, config)
        .map_err(|e| AppError::Internal(format!("failed to sign access token: {}", e)))?;
    let refresh_token = generate_refresh_token(&user_id, config)
        .map_err(|e| AppError::Internal(format!("failed to sign refresh token: {}", e)))?;

    User::set_refresh_digest(pool, user.id, Some(&token_digest(&refresh_token))).await?;

    let response = AuthResponse {
        access_token,
        expires_at,
        user: AuthUserInfo {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        },
    };
    Ok((response, refresh_token))
}

pub async fn login(pool: &PgPool, req: &LoginRequest) -> AppResult<User> {
    let invalid = || AppError::unauthorized("invalid credentials");

    let user = User::find_by_email(pool, &req.email).await?.ok_or_else(invalid)?;
    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !verify_password(&req.password, hash)? {
        tracing::debug!("bad password for user {}", user.id);
        return Err(invalid());
    }
    Ok(user)
}

pub async fn signup(pool: &PgPool, config: &Config, req: &SignupRequest) -> AppResult<User> {
    validate_credentials(&req.email, &req.password)?;
    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    if User::find_by_email(pool, &req.email).await?.is_some() {
        return Err(AppError::conflict("user already exists"));
    }

    User::create_with_password(
        pool,
        &req.email,
        &req.password,
        req.name.trim(),
        config.profile_default_image.as_deref(),
    )
    .await
}

/// Finds the account for a social identity, linking it to an existing email
/// account or creating a new one when needed.
pub async fn social_login(pool: &PgPool, config: &Config, req: &SocialLoginRequest) -> AppResult<User> {
    if req.provider == AuthProvider::Email {
        return Err(AppError::bad_request("email is not a social provider"));
    }

    if let Some(user) = User::find_by_provider(pool, req.provider, &req.provider_id).await? {
        return Ok(user);
    }

    if let Some(existing) = User::find_by_email(pool, &req.email).await? {
        tracing::info!("linking {:?} identity to user {}", req.provider, existing.id);
        return User::link_social(
            pool,
            existing.id,
            req.provider,
            &req.provider_id,
            req.profile_image.as_deref(),
        )
        .await;
    }

    let profile_image = req
        .profile_image
        .as_deref()
        .or(config.profile_default_image.as_deref());
    User::create_social(
        pool,
        req.provider,
        &req.provider_id,
        &req.email,
        &req.name,
        profile_image,
    )
    .await
}

/// Checks the refresh token against the stored digest and returns its owner.
pub async fn redeem_refresh_token(pool: &PgPool, config: &Config, token: &str) -> AppResult<User> {
    let invalid = || AppError::unauthorized("invalid refresh token");

    let claims = verify_refresh_token(token, config).map_err(|_| invalid())?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| invalid())?;
    let user = User::find_by_id(pool, user_id).await?.ok_or_else(invalid)?;

    if user.refresh_token_digest.as_deref() != Some(token_digest(token).as_str()) {
        tracing::warn!("stale refresh token presented for user {}", user.id);
        return Err(invalid());
    }
    Ok(user)
}

pub async fn logout(pool: &PgPool, user_id: Uuid) -> AppResult<()> {
    User::get(pool, user_id).await?;
    User::set_refresh_digest(pool, user_id, None).await
}

fn check_invite(invite: &InviteRow, now: DateTime<Utc>) -> AppResult<()> {
    if invite.used {
        return Err(AppError::conflict("invite token already used"));
    }
    if now > invite.expires_at {
        return Err(AppError::conflict("invite token expired"));
    }
    Ok(())
}

const INVITE_QUERY: &str = r#"
    SELECT i.id, i.team_id, t.name AS team_name, i.expires_at, i.used
    FROM team_invites i
    JOIN teams t ON t.id = i.team_id
    WHERE i.token = $1
"#;

pub async fn validate_invite(pool: &PgPool, token: &str) -> AppResult<InviteInfo> {
    let invite = sqlx::query_as::<_, InviteRow>(INVITE_QUERY)
        .bind(token)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("invalid invite token"))?;
    check_invite(&invite, Utc::now())?;

    Ok(InviteInfo {
        valid: true,
        team_id: invite.team_id,
        team_name: invite.team_name,
    })
}

/// Joins the invite's team as a plain member and burns the invite.
pub async fn accept_invite(pool: &PgPool, token: &str, user_id: Uuid) -> AppResult<AcceptInviteResponse> {
    let mut tx = pool.begin().await?;

    let invite = sqlx::query_as::<_, InviteRow>(&format!("{} FOR UPDATE OF i", INVITE_QUERY))
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("invalid invite token"))?;
    check_invite(&invite, Utc::now())?;

    TeamMember::membership_facts(&mut tx, user_id)
        .await?
        .ensure_free_for(invite.team_id)?;
    TeamMember::insert(
        &mut tx,
        invite.team_id,
        user_id,
        TeamRole::Member,
        None,
        MemberStatus::Active,
    )
    .await?;

    sqlx::query("UPDATE team_invites SET used = TRUE WHERE id = $1")
        .bind(invite.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!("user {} joined team {} by invite", user_id, invite.team_id);
    Ok(AcceptInviteResponse {
        success: true,
        team_id: invite.team_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invite(used: bool, expires_in: Duration) -> InviteRow {
        InviteRow {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            team_name: "Rovers".into(),
            expires_at: Utc::now() + expires_in,
            used,
        }
    }

    #[test]
    fn used_or_expired_invites_conflict() {
        let now = Utc::now();
        assert!(check_invite(&invite(false, Duration::days(7)), now).is_ok());
        assert!(matches!(
            check_invite(&invite(true, Duration::days(7)), now),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            check_invite(&invite(false, Duration::seconds(-1)), now),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn credentials_are_validated() {
        assert!(validate_credentials("kim@example.com", "secret1").is_ok());
        assert!(validate_credentials("kim.example.com", "secret1").is_err());
        assert!(validate_credentials("@example.com", "secret1").is_err());
        assert!(validate_credentials("kim@example.com", "short").is_err());
    }

    #[test]
    fn social_login_request_uses_camel_case() {
        let req: SocialLoginRequest = serde_json::from_str(
            r#"{"provider":"kakao","providerId":"42","email":"a@b.co","name":"Lee"}"#,
        )
        .unwrap();
        assert_eq!(req.provider, AuthProvider::Kakao);
        assert_eq!(req.provider_id, "42");
        assert!(req.profile_image.is_none());
    }
}
