use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{AuthProvider, Position};
use crate::utils::{hash_password, verify_password};

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub name: String,
    pub birthdate: Option<NaiveDate>,
    pub phone: Option<String>,
    pub profile_image: Option<String>,
    pub provider: AuthProvider,
    pub provider_id: Option<String>,
    pub summary: Option<String>,
    pub refresh_token_digest: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    pub name: String,
    pub birthdate: Option<NaiveDate>,
    pub phone: Option<String>,
    pub positions: Vec<Position>,
    pub summary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub phone: Option<String>,
    pub positions: Option<Vec<Position>>,
    pub summary: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub birthdate: Option<NaiveDate>,
    pub phone: Option<String>,
    pub profile_image: Option<String>,
    pub summary: Option<String>,
    pub positions: Vec<Position>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub image_url: String,
}

const USER_COLUMNS: &str = "id, email, password_hash, name, birthdate, phone, profile_image, \
     provider, provider_id, summary, refresh_token_digest, created_at, updated_at";

/// `010-XXXX-XXXX`
pub fn validate_phone(phone: &str) -> AppResult<()> {
    let parts: Vec<&str> = phone.split('-').collect();
    let valid = matches!(parts.as_slice(), ["010", mid, last]
        if mid.len() == 4 && last.len() == 4
            && mid.chars().all(|c| c.is_ascii_digit())
            && last.chars().all(|c| c.is_ascii_digit()));
    if !valid {
        return Err(AppError::bad_request(
            "phone number must be in format 010-XXXX-XXXX",
        ));
    }
    Ok(())
}

/// Order-preserving deduplication.
pub fn unique_positions(positions: &[Position]) -> Vec<Position> {
    let mut unique = Vec::with_capacity(positions.len());
    for p in positions {
        if !unique.contains(p) {
            unique.push(*p);
        }
    }
    unique
}

impl User {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> AppResult<User> {
        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> AppResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
                .bind(email)
                .fetch_optional(pool)
                .await?;
        Ok(user)
    }

    pub async fn find_by_provider(
        pool: &PgPool,
        provider: AuthProvider,
        provider_id: &str,
    ) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE provider = $1 AND provider_id = $2",
            USER_COLUMNS
        ))
        .bind(provider)
        .bind(provider_id)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    pub async fn create_with_password(
        pool: &PgPool,
        email: &str,
        password: &str,
        name: &str,
        profile_image: Option<&str>,
    ) -> AppResult<User> {
        let password_hash = hash_password(password)?;
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, name, provider, profile_image)
            VALUES ($1, $2, $3, $4, 'email', $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .bind(profile_image)
        .fetch_one(pool)
        .await?;

        tracing::info!("user {} signed up", user.id);
        Ok(user)
    }

    pub async fn create_social(
        pool: &PgPool,
        provider: AuthProvider,
        provider_id: &str,
        email: &str,
        name: &str,
        profile_image: Option<&str>,
    ) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, name, provider, provider_id, profile_image)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(name)
        .bind(provider)
        .bind(provider_id)
        .bind(profile_image)
        .fetch_one(pool)
        .await?;

        tracing::info!("user {} signed up with {:?}", user.id, provider);
        Ok(user)
    }

    /// Attaches a social identity to an existing account.
    pub async fn link_social(
        pool: &PgPool,
        id: Uuid,
        provider: AuthProvider,
        provider_id: &str,
        profile_image: Option<&str>,
    ) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET provider = $2, provider_id = $3,
                profile_image = COALESCE($4, profile_image), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(provider)
        .bind(provider_id)
        .bind(profile_image)
        .fetch_one(pool)
        .await?;
        Ok(user)
    }

    pub async fn set_refresh_digest(pool: &PgPool, id: Uuid, digest: Option<&str>) -> AppResult<()> {
        sqlx::query("UPDATE users SET refresh_token_digest = $2 WHERE id = $1")
            .bind(id)
            .bind(digest)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn positions(pool: &PgPool, id: Uuid) -> AppResult<Vec<Position>> {
        let positions = sqlx::query_scalar::<_, Position>(
            "SELECT position FROM user_positions WHERE user_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;
        Ok(positions)
    }

    pub async fn profile(pool: &PgPool, id: Uuid) -> AppResult<ProfileResponse> {
        let user = Self::get(pool, id).await?;
        let positions = Self::positions(pool, id).await?;
        Ok(ProfileResponse {
            id: user.id,
            email: user.email,
            name: user.name,
            birthdate: user.birthdate,
            phone: user.phone,
            profile_image: user.profile_image,
            summary: user.summary,
            positions,
            created_at: user.created_at,
            updated_at: user.updated_at,
        })
    }

    async fn replace_positions(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        positions: &[Position],
    ) -> AppResult<()> {
        sqlx::query("DELETE FROM user_positions WHERE user_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        for position in unique_positions(positions) {
            sqlx::query("INSERT INTO user_positions (id, user_id, position) VALUES ($1, $2, $3)")
                .bind(Uuid::new_v4())
                .bind(id)
                .bind(position)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    /// Overwrites the profile fields and the whole position set.
    pub async fn create_profile(pool: &PgPool, id: Uuid, req: CreateProfileRequest) -> AppResult<ProfileResponse> {
        if let Some(phone) = &req.phone {
            validate_phone(phone)?;
        }

        let mut tx = pool.begin().await?;
        let updated = sqlx::query(
            r#"
            UPDATE users
            SET name = $2, birthdate = COALESCE($3, birthdate), phone = $4, summary = $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(req.birthdate)
        .bind(&req.phone)
        .bind(&req.summary)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::not_found("user not found"));
        }

        Self::replace_positions(&mut tx, id, &req.positions).await?;
        tx.commit().await?;

        Self::profile(pool, id).await
    }

    /// Patches only the supplied fields; positions are replaced only when present.
    pub async fn update_profile(pool: &PgPool, id: Uuid, req: UpdateProfileRequest) -> AppResult<ProfileResponse> {
        if let Some(phone) = &req.phone {
            validate_phone(phone)?;
        }

        let mut tx = pool.begin().await?;
        let updated = sqlx::query(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                birthdate = COALESCE($3, birthdate),
                phone = COALESCE($4, phone),
                summary = COALESCE($5, summary),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(req.birthdate)
        .bind(&req.phone)
        .bind(&req.summary)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::not_found("user not found"));
        }

        if let Some(positions) = &req.positions {
            Self::replace_positions(&mut tx, id, positions).await?;
        }
        tx.commit().await?;

        Self::profile(pool, id).await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> AppResult<()> {
        let captain_of: Option<Uuid> = sqlx::query_scalar("SELECT id FROM teams WHERE captain_id = $1 LIMIT 1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        if captain_of.is_some() {
            return Err(AppError::bad_request(
                "a captain must delete the team before deleting the account",
            ));
        }

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::not_found("user not found"));
        }

        tracing::info!("user {} deleted", id);
        Ok(())
    }

    pub async fn change_password(pool: &PgPool, id: Uuid, req: ChangePasswordRequest) -> AppResult<()> {
        let user = Self::get(pool, id).await?;
        let current_hash = user.password_hash.as_deref().ok_or_else(|| {
            AppError::bad_request("password change is not available for social login accounts")
        })?;

        if !verify_password(&req.current_password, current_hash)? {
            return Err(AppError::unauthorized("current password is incorrect"));
        }
        if verify_password(&req.new_password, current_hash)? {
            return Err(AppError::bad_request(
                "new password must be different from the current password",
            ));
        }

        let new_hash = hash_password(&req.new_password)?;
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(new_hash)
            .execute(pool)
            .await?;

        tracing::info!("user {} changed password", id);
        Ok(())
    }

    pub async fn set_profile_image(pool: &PgPool, id: Uuid, url: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET profile_image = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(url)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_format() {
        assert!(validate_phone("010-1234-5678").is_ok());
        assert!(validate_phone("011-1234-5678").is_err());
        assert!(validate_phone("010-123-5678").is_err());
        assert!(validate_phone("010-abcd-5678").is_err());
        assert!(validate_phone("01012345678").is_err());
    }

    #[test]
    fn positions_are_deduplicated_in_order() {
        let positions = [Position::Mf, Position::Gk, Position::Mf, Position::Fw, Position::Gk];
        assert_eq!(
            unique_positions(&positions),
            vec![Position::Mf, Position::Gk, Position::Fw]
        );
    }

    #[test]
    fn profile_request_uses_camel_case() {
        let req: UpdateProfileRequest =
            serde_json::from_str(r#"{"name":"Kim","positions":["GK","DF"]}"#).unwrap();
        assert_eq!(req.name.as_deref(), Some("Kim"));
        assert_eq!(req.positions, Some(vec![Position::Gk, Position::Df]));
        assert!(req.phone.is_none());

        let pw: ChangePasswordRequest =
            serde_json::from_str(r#"{"currentPassword":"a","newPassword":"b"}"#).unwrap();
        assert_eq!(pw.new_password, "b");
    }
}
