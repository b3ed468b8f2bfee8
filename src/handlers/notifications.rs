use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::notifications::Notification;
use crate::{auth::AuthUser, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// List the calling user's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    summary = "List notifications",
    params(("limit" = Option<usize>, Query, description = "Maximum entries to return (default: 50)")),
    responses(
        (status = 200, description = "Notifications retrieved"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationsQuery>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<Vec<Notification>>>, ServiceError> {
    let user_id = Uuid::parse_str(&auth_user.user_id)
        .map_err(|_| ServiceError::Unauthorized("Token subject is not a valid ID".to_string()))?;

    let limit = query.limit.clamp(1, 200);
    let notifications = state
        .services
        .notifications
        .get_user_notifications(user_id, limit)
        .await?;

    Ok(Json(ApiResponse::success(notifications)))
}

/// Mark a notification as read
#[utoipa::path(
    post,
    path = "/api/v1/notifications/{id}/read",
    summary = "Mark notification read",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked as read"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Notification not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    let user_id = Uuid::parse_str(&auth_user.user_id)
        .map_err(|_| ServiceError::Unauthorized("Token subject is not a valid ID".to_string()))?;

    // Another user's notification reads as unknown rather than revealing
    // that it exists.
    match state.services.notifications.get_notification(id).await? {
        Some(notification) if notification.user_id == user_id => {
            state.services.notifications.mark_as_read(id).await?;
            Ok(Json(ApiResponse::success(())))
        }
        _ => Err(ServiceError::NotFound(format!(
            "Notification {} not found",
            id
        ))),
    }
}
