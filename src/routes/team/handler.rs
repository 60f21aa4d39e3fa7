use axum::{
    extract::{Extension, Json, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    error::AppResult,
    middleware::AuthUser,
    routes::{MessageResponse, read_image},
    stats::roster_summary,
    storage::{TEAM_LOGO_BUCKET, team_logo_path},
    utils::{optional_to_api_response, success_to_api_response},
};

use super::model::{
    AddMemberRequest, CreateTeamRequest, JoinRequest, JoinTeamRequest, LogoResponse,
    ReviewJoinRequest, Team, TeamMember, UpdateMemberRequest,
};

#[axum::debug_handler]
pub async fn create_team(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateTeamRequest>,
) -> AppResult<impl IntoResponse> {
    let team = Team::create(&state.pool, user.id, req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(team)))
}

#[axum::debug_handler]
pub async fn list_public_teams(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let teams = Team::list_public(&state.pool).await?;
    Ok((StatusCode::OK, success_to_api_response(teams)))
}

/// `resp_data` is omitted when the caller has no team.
#[axum::debug_handler]
pub async fn get_my_team(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    let team = Team::for_user(&state.pool, user.id).await?;
    Ok((StatusCode::OK, optional_to_api_response(team)))
}

#[axum::debug_handler]
pub async fn get_team(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let team = Team::detail(&state.pool, team_id).await?;
    Ok((StatusCode::OK, success_to_api_response(team)))
}

#[axum::debug_handler]
pub async fn delete_team(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Team::delete(&state.pool, team_id, user.id).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(MessageResponse::new("team deleted")),
    ))
}

#[axum::debug_handler]
pub async fn get_team_stats(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Team::find(&state.pool, team_id).await?;
    let members = TeamMember::lines(&state.pool, team_id).await?;
    let summary = roster_summary(&members, Utc::now().date_naive());
    Ok((StatusCode::OK, success_to_api_response(summary)))
}

#[axum::debug_handler]
pub async fn join_team(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
    body: Option<Json<JoinTeamRequest>>,
) -> AppResult<impl IntoResponse> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let request = JoinRequest::create(&state.pool, team_id, user.id, req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(request)))
}

#[axum::debug_handler]
pub async fn leave_team(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    TeamMember::leave(&state.pool, team_id, user.id).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(MessageResponse::new("left the team")),
    ))
}

#[axum::debug_handler]
pub async fn list_members(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let members = TeamMember::list(&state.pool, team_id).await?;
    Ok((StatusCode::OK, success_to_api_response(members)))
}

#[axum::debug_handler]
pub async fn get_member(
    State(state): State<AppState>,
    Path((team_id, member_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let member = TeamMember::get(&state.pool, team_id, member_id).await?;
    Ok((StatusCode::OK, success_to_api_response(member)))
}

#[axum::debug_handler]
pub async fn add_member(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> AppResult<impl IntoResponse> {
    let member = TeamMember::add(&state.pool, team_id, user.id, req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(member)))
}

#[axum::debug_handler]
pub async fn update_member(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, member_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateMemberRequest>,
) -> AppResult<impl IntoResponse> {
    let member = TeamMember::update(&state.pool, team_id, member_id, user.id, req).await?;
    Ok((StatusCode::OK, success_to_api_response(member)))
}

#[axum::debug_handler]
pub async fn delete_member(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, member_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    TeamMember::remove(&state.pool, team_id, member_id, user.id).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(MessageResponse::new("member removed")),
    ))
}

#[axum::debug_handler]
pub async fn create_invite(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let invite = Team::create_invite(&state.pool, team_id, user.id).await?;
    Ok((StatusCode::CREATED, success_to_api_response(invite)))
}

#[axum::debug_handler]
pub async fn upload_logo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let storage = state.storage()?;
    let previous = Team::authorize_logo_upload(&state.pool, team_id, user.id).await?;
    let image = read_image(multipart, "logo").await?;

    let path = team_logo_path(team_id, &image.extension);
    let logo_url = storage.upload(TEAM_LOGO_BUCKET, &path, image).await?;
    Team::set_logo(&state.pool, team_id, &logo_url).await?;

    storage
        .remove_quietly(TEAM_LOGO_BUCKET, previous.as_deref())
        .await;

    Ok((StatusCode::OK, success_to_api_response(LogoResponse { logo_url })))
}

#[axum::debug_handler]
pub async fn list_join_requests(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let requests = JoinRequest::list_for_team(&state.pool, team_id, user.id).await?;
    Ok((StatusCode::OK, success_to_api_response(requests)))
}

#[axum::debug_handler]
pub async fn review_join_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, request_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ReviewJoinRequest>,
) -> AppResult<impl IntoResponse> {
    let reviewed = JoinRequest::review(&state.pool, team_id, request_id, user.id, req).await?;
    Ok((StatusCode::OK, success_to_api_response(reviewed)))
}

#[axum::debug_handler]
pub async fn list_my_join_requests(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    let requests = JoinRequest::list_mine(&state.pool, user.id).await?;
    Ok((StatusCode::OK, success_to_api_response(requests)))
}

#[axum::debug_handler]
pub async fn cancel_join_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(request_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    JoinRequest::cancel(&state.pool, request_id, user.id).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(MessageResponse::new("join request cancelled")),
    ))
}
