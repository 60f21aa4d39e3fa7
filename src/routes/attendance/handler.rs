use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::AppResult,
    middleware::AuthUser,
    routes::{TeamQuery, matches::model::resolve_team, statistics::model as loaders},
    stats::attendance_summary,
    utils::success_to_api_response,
};

use super::model::{Attendance, AttendanceVoteRequest};

#[axum::debug_handler]
pub async fn vote(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(match_id): Path<Uuid>,
    Json(req): Json<AttendanceVoteRequest>,
) -> AppResult<impl IntoResponse> {
    let vote = Attendance::vote(&state.pool, match_id, user.id, req).await?;
    Ok((StatusCode::OK, success_to_api_response(vote)))
}

#[axum::debug_handler]
pub async fn list_votes(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let votes = Attendance::list(&state.pool, match_id).await?;
    Ok((StatusCode::OK, success_to_api_response(votes)))
}

/// Vote counts over the team's scheduled matches.
#[axum::debug_handler]
pub async fn get_summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TeamQuery>,
) -> AppResult<impl IntoResponse> {
    let team_id = resolve_team(&state.pool, user.id, query.team_id).await?;
    let (scheduled, votes) = loaders::scheduled_votes(&state.pool, team_id).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(attendance_summary(scheduled, &votes)),
    ))
}
