use axum::{
    extract::{Extension, Json, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::{AppError, AppResult},
    middleware::AuthUser,
    routes::{MessageResponse, read_image},
    storage::{PROFILE_BUCKET, profile_image_path},
    utils::success_to_api_response,
};

use super::model::{
    ChangePasswordRequest, CreateProfileRequest, ImageResponse, UpdateProfileRequest, User,
};

#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    let profile = User::profile(&state.pool, user.id).await?;
    Ok((StatusCode::OK, success_to_api_response(profile)))
}

#[axum::debug_handler]
pub async fn create_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateProfileRequest>,
) -> AppResult<impl IntoResponse> {
    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    let profile = User::create_profile(&state.pool, user.id, req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(profile)))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<impl IntoResponse> {
    let profile = User::update_profile(&state.pool, user.id, req).await?;
    Ok((StatusCode::OK, success_to_api_response(profile)))
}

#[axum::debug_handler]
pub async fn delete_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    User::delete(&state.pool, user.id).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(MessageResponse::new("user deleted successfully")),
    ))
}

#[axum::debug_handler]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<impl IntoResponse> {
    User::change_password(&state.pool, user.id, req).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(MessageResponse::new("password changed successfully")),
    ))
}

#[axum::debug_handler]
pub async fn upload_profile_image(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let storage = state.storage()?;
    let image = read_image(multipart, "image").await?;
    let current = User::get(&state.pool, user.id).await?;

    let path = profile_image_path(user.id, &image.extension);
    let image_url = storage.upload(PROFILE_BUCKET, &path, image).await?;
    User::set_profile_image(&state.pool, user.id, &image_url).await?;

    storage
        .remove_quietly(PROFILE_BUCKET, current.profile_image.as_deref())
        .await;

    Ok((StatusCode::OK, success_to_api_response(ImageResponse { image_url })))
}
