use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{
        envelope::ApiResponse,
        settings::{SettingsResponse, SettingsUpdate},
        users::CurrentUser,
    },
    db::{errors::DbError, handlers::Settings, models::settings::SettingsUpdateDBRequest},
    errors::Result,
};

/// Current moderation settings, created with defaults on first read
#[utoipa::path(
    get,
    path = "/settings",
    tag = "settings",
    responses(
        (status = 200, description = "Settings", body = SettingsResponse),
        (status = 401, description = "Unauthorized"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_settings(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ApiResponse<SettingsResponse>>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let settings = Settings::new(&mut conn).get_or_create(current_user.id).await?;
    Ok(Json(ApiResponse::ok(settings.into())))
}

#[utoipa::path(
    put,
    path = "/settings",
    tag = "settings",
    request_body = SettingsUpdate,
    responses(
        (status = 200, description = "Updated settings", body = SettingsResponse),
        (status = 422, description = "Unknown field or invalid value"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_settings(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<ApiResponse<SettingsResponse>>> {
    let request = SettingsUpdateDBRequest::from(update);
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let settings = Settings::new(&mut conn).update(current_user.id, &request).await?;
    Ok(Json(ApiResponse::with_message(settings.into(), "Settings updated")))
}

/// Flip auto-commenting on or off
#[utoipa::path(
    post,
    path = "/settings/toggle-auto-comment",
    tag = "settings",
    responses(
        (status = 200, description = "Updated settings", body = SettingsResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn toggle_auto_comment(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ApiResponse<SettingsResponse>>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let settings = Settings::new(&mut conn).toggle_auto_comment(current_user.id).await?;
    let message = if settings.auto_comment_enabled {
        "Auto-commenting enabled"
    } else {
        "Auto-commenting disabled"
    };
    Ok(Json(ApiResponse::with_message(settings.into(), message)))
}
