use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{
    AppState,
    config::Config,
    error::{AppError, AppResult},
    middleware::AuthUser,
    routes::MessageResponse,
    utils::success_to_api_response,
};

use super::model::{self, LoginRequest, SignupRequest, SocialLoginRequest};

pub const REFRESH_COOKIE: &str = "refreshToken";

/// HttpOnly cookie carrying the refresh token. Cross-site front-ends need
/// `Secure` + `SameSite=None`; otherwise `Lax` is enough.
fn refresh_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(if config.cookie_secure {
            SameSite::None
        } else {
            SameSite::Lax
        })
        .path("/")
        .max_age(time::Duration::seconds(
            config.refresh_token_expiration_secs as i64,
        ))
        .build()
}

fn cleared_cookie(config: &Config) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE)
        .http_only(true)
        .secure(config.cookie_secure)
        .path("/")
        .build()
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let user = model::login(&state.pool, &req).await?;
    let (response, refresh) = model::issue_tokens(&state.pool, &state.config, &user).await?;

    Ok((
        StatusCode::OK,
        jar.add(refresh_cookie(refresh, &state.config)),
        success_to_api_response(response),
    ))
}

#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SignupRequest>,
) -> AppResult<impl IntoResponse> {
    let user = model::signup(&state.pool, &state.config, &req).await?;
    let (response, refresh) = model::issue_tokens(&state.pool, &state.config, &user).await?;

    Ok((
        StatusCode::CREATED,
        jar.add(refresh_cookie(refresh, &state.config)),
        success_to_api_response(response),
    ))
}

#[axum::debug_handler]
pub async fn social_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SocialLoginRequest>,
) -> AppResult<impl IntoResponse> {
    let user = model::social_login(&state.pool, &state.config, &req).await?;
    let (response, refresh) = model::issue_tokens(&state.pool, &state.config, &user).await?;

    Ok((
        StatusCode::OK,
        jar.add(refresh_cookie(refresh, &state.config)),
        success_to_api_response(response),
    ))
}

/// Rotates the token pair using the refresh cookie.
#[axum::debug_handler]
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::unauthorized("refresh token not found in cookies"))?;

    let user = model::redeem_refresh_token(&state.pool, &state.config, &token).await?;
    let (response, refresh) = model::issue_tokens(&state.pool, &state.config, &user).await?;

    Ok((
        StatusCode::OK,
        jar.add(refresh_cookie(refresh, &state.config)),
        success_to_api_response(response),
    ))
}

#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    model::logout(&state.pool, user.id).await?;
    tracing::info!("user {} logged out", user.id);

    Ok((
        StatusCode::OK,
        jar.remove(cleared_cookie(&state.config)),
        success_to_api_response(MessageResponse::new("logged out successfully")),
    ))
}

#[axum::debug_handler]
pub async fn validate_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<impl IntoResponse> {
    let info = model::validate_invite(&state.pool, &token).await?;
    Ok((StatusCode::OK, success_to_api_response(info)))
}

#[axum::debug_handler]
pub async fn accept_invite(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(token): Path<String>,
) -> AppResult<impl IntoResponse> {
    let accepted = model::accept_invite(&state.pool, &token, user.id).await?;
    Ok((StatusCode::OK, success_to_api_response(accepted)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_cookie_is_http_only() {
        let mut config = crate::utils::test_config();
        let cookie = refresh_cookie("tok".into(), &config);
        assert_eq!(cookie.name(), REFRESH_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));

        config.cookie_secure = true;
        let cookie = refresh_cookie("tok".into(), &config);
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
    }
}
