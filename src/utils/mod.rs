use axum::Json;
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::Config;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

/// Access token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // user id
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

/// Refresh token payload, signed with the refresh secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub kind: String,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

const REFRESH_KIND: &str = "refresh";

pub fn generate_token(
    user_id: &str,
    email: &str,
    config: &Config,
) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = (now + Duration::seconds(config.jwt_expiration().as_secs() as i64)).timestamp();

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        exp: expiration,
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok((token, expiration))
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

pub fn generate_refresh_token(
    user_id: &str,
    config: &Config,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = RefreshClaims {
        sub: user_id.to_string(),
        kind: REFRESH_KIND.to_string(),
        jti: Uuid::new_v4().to_string(),
        exp: (now + Duration::seconds(config.refresh_token_expiration().as_secs() as i64)).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_refresh_secret.as_bytes()),
    )
}

pub fn verify_refresh_token(
    token: &str,
    config: &Config,
) -> Result<RefreshClaims, jsonwebtoken::errors::Error> {
    let token_data = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(config.jwt_refresh_secret.as_bytes()),
        &Validation::default(),
    )?;

    if token_data.claims.kind != REFRESH_KIND {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidToken.into());
    }

    Ok(token_data.claims)
}

/// Only the digest of the live refresh token is persisted.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// 32 random bytes, hex encoded.
pub fn generate_invite_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Common API envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// 0 on success
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resp_data: Option<T>,
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: error_codes::SUCCESS,
        msg: "success".into(),
        resp_data: Some(data),
    })
}

/// Success envelope whose `resp_data` is left out when there is nothing to
/// return.
pub fn optional_to_api_response<T: Serialize>(data: Option<T>) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: error_codes::SUCCESS,
        msg: "success".into(),
        resp_data: data,
    })
}

pub fn error_to_api_response<T>(code: i32, msg: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code,
        msg,
        resp_data: None,
    })
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const CONFLICT: i32 = 1001;
    pub const AUTH_FAILED: i32 = 1002;
    pub const PERMISSION_DENIED: i32 = 1003;
    pub const NOT_FOUND: i32 = 1004;
    pub const RATE_LIMIT: i32 = 1005;
    pub const INTERNAL_ERROR: i32 = 5000;
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/squad_test".into(),
        redis_url: "redis://127.0.0.1/".into(),
        jwt_secret: "access-secret".into(),
        jwt_refresh_secret: "refresh-secret".into(),
        jwt_expiration_secs: 3600,
        refresh_token_expiration_secs: 30 * 24 * 3600,
        rate_limit_window_secs: 60,
        rate_limit_requests: 100,
        server_host: "127.0.0.1".into(),
        server_port: 3000,
        api_base_uri: "/api".into(),
        cors_origin: None,
        cookie_secure: false,
        profile_default_image: None,
        storage_url: None,
        storage_service_key: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_round_trips_subject() {
        let config = test_config();
        let (token, exp) = generate_token("user-1", "a@b.c", &config).unwrap();
        let claims = verify_token(&token, &config).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "a@b.c");
        assert_eq!(claims.exp, exp);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let config = test_config();
        let refresh = generate_refresh_token("user-1", &config).unwrap();
        assert!(verify_token(&refresh, &config).is_err());
        assert_eq!(verify_refresh_token(&refresh, &config).unwrap().sub, "user-1");
    }

    #[test]
    fn access_token_is_rejected_as_refresh() {
        let config = test_config();
        let (access, _) = generate_token("user-1", "a@b.c", &config).unwrap();
        assert!(verify_refresh_token(&access, &config).is_err());
    }

    #[test]
    fn rotated_refresh_tokens_differ() {
        let config = test_config();
        let a = generate_refresh_token("user-1", &config).unwrap();
        let b = generate_refresh_token("user-1", &config).unwrap();
        assert_ne!(a, b);
        assert_ne!(token_digest(&a), token_digest(&b));
    }

    #[test]
    fn invite_tokens_are_64_hex_chars() {
        let token = generate_invite_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_invite_token());
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_to(1.25, 1), 1.3);
        assert_eq!(round_to(0.666, 2), 0.67);
        assert_eq!(round_to(2.0 / 3.0, 1), 0.7);
    }

    #[test]
    fn missing_optional_data_is_left_out_of_the_envelope() {
        let Json(empty) = optional_to_api_response(None::<String>);
        let json = serde_json::to_value(&empty).unwrap();
        assert_eq!(json["code"], error_codes::SUCCESS);
        assert!(json.get("resp_data").is_none());

        let Json(full) = optional_to_api_response(Some("Rovers"));
        assert_eq!(serde_json::to_value(&full).unwrap()["resp_data"], "Rovers");
    }

    #[test]
    fn password_hash_verifies() {
        let hashed = hash_password("secret1").unwrap();
        assert!(verify_password("secret1", &hashed).unwrap());
        assert!(!verify_password("secret2", &hashed).unwrap());
    }
}
