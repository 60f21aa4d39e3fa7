use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::utils::verify_token;

/// The authenticated caller, inserted as a request extension.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> AppResult<Response> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::unauthorized("missing bearer token"))?;

    let claims = verify_token(bearer.token(), &state.config).map_err(|e| {
        tracing::debug!("rejected access token: {}", e);
        AppError::unauthorized("invalid or expired token")
    })?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::unauthorized("invalid or expired token"))?;

    // the account may have been deleted after the token was issued
    let email: Option<String> = sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?;
    let email = email.ok_or_else(|| AppError::unauthorized("user no longer exists"))?;

    req.extensions_mut().insert(AuthUser { id: user_id, email });
    Ok(next.run(req).await)
}
