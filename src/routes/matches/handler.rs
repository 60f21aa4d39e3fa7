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
    routes::MessageResponse,
    utils::success_to_api_response,
};

use super::model::{
    CreateMatchRequest, ListMatchesQuery, Match, UpdateMatchRequest, month_range, resolve_team,
};
use super::record::RecordMatchRequest;

#[axum::debug_handler]
pub async fn create_match(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateMatchRequest>,
) -> AppResult<impl IntoResponse> {
    let created = Match::create(&state.pool, user.id, req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(created)))
}

/// `year` and `month` narrow the list only when both are given.
#[axum::debug_handler]
pub async fn list_matches(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListMatchesQuery>,
) -> AppResult<impl IntoResponse> {
    let team_id = resolve_team(&state.pool, user.id, query.team_id).await?;
    let month = match (query.year, query.month) {
        (Some(year), Some(month)) => Some(month_range(year, month)?),
        _ => None,
    };
    let matches = Match::list(&state.pool, team_id, month).await?;
    Ok((StatusCode::OK, success_to_api_response(matches)))
}

#[axum::debug_handler]
pub async fn get_match(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let detail = Match::detail(&state.pool, match_id).await?;
    Ok((StatusCode::OK, success_to_api_response(detail)))
}

#[axum::debug_handler]
pub async fn update_match(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(match_id): Path<Uuid>,
    Json(req): Json<UpdateMatchRequest>,
) -> AppResult<impl IntoResponse> {
    let updated = Match::update(&state.pool, match_id, user.id, req).await?;
    Ok((StatusCode::OK, success_to_api_response(updated)))
}

#[axum::debug_handler]
pub async fn delete_match(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(match_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Match::delete(&state.pool, match_id, user.id).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(MessageResponse::new("match deleted")),
    ))
}

#[axum::debug_handler]
pub async fn get_match_games(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let games = Match::games(&state.pool, match_id).await?;
    Ok((StatusCode::OK, success_to_api_response(games)))
}

#[axum::debug_handler]
pub async fn record_match(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(match_id): Path<Uuid>,
    Json(req): Json<RecordMatchRequest>,
) -> AppResult<impl IntoResponse> {
    let detail = Match::record(&state.pool, match_id, user.id, req).await?;
    Ok((StatusCode::OK, success_to_api_response(detail)))
}

#[axum::debug_handler]
pub async fn get_match_record(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let sheet = Match::record_sheet(&state.pool, match_id).await?;
    Ok((StatusCode::OK, success_to_api_response(sheet)))
}
