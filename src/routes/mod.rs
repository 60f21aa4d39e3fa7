use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart},
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, AppResult},
    middleware::{auth_middleware, log_errors},
    storage::{ImageUpload, MAX_IMAGE_BYTES, validate_image},
};

pub mod attendance;
pub mod auth;
pub mod matches;
pub mod statistics;
pub mod team;
pub mod user;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

/// `?teamId=`; the caller's own team is used when absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamQuery {
    pub team_id: Option<Uuid>,
}

/// Reads the multipart field `field` and validates it as an image.
pub(crate) async fn read_image(mut multipart: Multipart, field: &str) -> AppResult<ImageUpload> {
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("invalid multipart body: {}", e)))?
    {
        if part.name() != Some(field) {
            continue;
        }
        let content_type = part.content_type().map(str::to_string);
        let file_name = part.file_name().map(str::to_string);
        let bytes = part
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(format!("failed to read upload: {}", e)))?;
        return validate_image(content_type.as_deref(), file_name.as_deref(), bytes.to_vec());
    }
    Err(AppError::bad_request(format!("missing file field '{}'", field)))
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/social", post(auth::social_login))
        .route("/auth/refresh", post(auth::refresh_token))
        .route("/auth/invite/{token}", get(auth::validate_invite))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    // multipart framing on top of the largest accepted image
    let upload_limit = DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024);

    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/invite/{token}/accept", post(auth::accept_invite))
        // users
        .route(
            "/users/profile",
            get(user::get_profile)
                .post(user::create_profile)
                .put(user::update_profile)
                .delete(user::delete_profile),
        )
        .route("/users/password", put(user::change_password))
        .route(
            "/users/profile/image",
            post(user::upload_profile_image).layer(upload_limit.clone()),
        )
        // teams
        .route("/teams", post(team::create_team))
        .route("/teams/public", get(team::list_public_teams))
        .route("/teams/my-team", get(team::get_my_team))
        .route("/teams/join-requests/my", get(team::list_my_join_requests))
        .route(
            "/teams/join-requests/{request_id}",
            delete(team::cancel_join_request),
        )
        .route("/teams/{team_id}", get(team::get_team).delete(team::delete_team))
        .route("/teams/{team_id}/stats", get(team::get_team_stats))
        .route("/teams/{team_id}/join", post(team::join_team))
        .route("/teams/{team_id}/leave", delete(team::leave_team))
        .route("/teams/{team_id}/invite", post(team::create_invite))
        .route(
            "/teams/{team_id}/logo",
            post(team::upload_logo).layer(upload_limit),
        )
        .route(
            "/teams/{team_id}/members",
            get(team::list_members).post(team::add_member),
        )
        .route(
            "/teams/{team_id}/members/{member_id}",
            get(team::get_member)
                .put(team::update_member)
                .delete(team::delete_member),
        )
        .route(
            "/teams/{team_id}/join-requests",
            get(team::list_join_requests),
        )
        .route(
            "/teams/{team_id}/join-requests/{request_id}",
            put(team::review_join_request),
        )
        // matches
        .route(
            "/matches",
            get(matches::list_matches).post(matches::create_match),
        )
        .route(
            "/matches/{match_id}",
            get(matches::get_match)
                .put(matches::update_match)
                .delete(matches::delete_match),
        )
        .route("/matches/{match_id}/games", get(matches::get_match_games))
        .route(
            "/matches/{match_id}/record",
            get(matches::get_match_record).post(matches::record_match),
        )
        .route(
            "/matches/{match_id}/attendance",
            get(attendance::list_votes).post(attendance::vote),
        )
        .route("/attendance/summary", get(attendance::get_summary))
        // aggregates
        .route("/statistics/team", get(statistics::get_team_statistics))
        .route("/statistics/top10", get(statistics::get_top10))
        .route("/rankings", get(statistics::get_rankings))
        .route("/rankings/attendance", get(statistics::get_attendance_ranking))
        .route("/rankings/games", get(statistics::get_games_ranking))
        .route("/rankings/goals", get(statistics::get_goals_ranking))
        .route("/rankings/assists", get(statistics::get_assists_ranking))
        .route("/dashboard/summary", get(statistics::get_dashboard))
        .layer(axum::middleware::from_fn_with_state(state, auth_middleware))
}

/// Every route nested under the configured base path, with auth, error
/// logging and request tracing applied. Rate limiting and CORS are added by
/// the binary.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(public_routes())
        .merge(protected_routes(state.clone()));

    Router::new()
        .nest(&state.config.api_base_uri, api)
        .layer(axum::middleware::from_fn(log_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_query_reads_camel_case() {
        let id = Uuid::new_v4();
        let query: TeamQuery = serde_json::from_str(&format!(r#"{{"teamId":"{}"}}"#, id)).unwrap();
        assert_eq!(query.team_id, Some(id));
        let empty: TeamQuery = serde_json::from_str("{}").unwrap();
        assert!(empty.team_id.is_none());
    }

    #[test]
    fn message_response_marks_success() {
        let json = serde_json::to_value(MessageResponse::new("done")).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "done");
    }
}
