use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json,
};
use hallpass_campus::PrimaryKey;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    serialized::{Notification, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "notifications",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Notification>)
    )
)]
async fn list_notifications(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Notification>>> {
    let notifications = context
        .campus
        .notifications
        .for_user(session.user().id)
        .await?;

    Ok(Json(notifications.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/api/notifications/{id}/read",
    tag = "notifications",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Notification)
    )
)]
async fn mark_read(
    session: Session,
    State(context): State<ServerContext>,
    Path(notification_id): Path<PrimaryKey>,
) -> ServerResult<Json<Notification>> {
    let notification = context
        .campus
        .notifications
        .mark_read(notification_id, session.user().id)
        .await?;

    Ok(Json(notification.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    tag = "notifications",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "All notifications were marked as read")
    )
)]
async fn mark_all_read(session: Session, State(context): State<ServerContext>) -> ServerResult<()> {
    context
        .campus
        .notifications
        .mark_all_read(session.user().id)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/read-all", post(mark_all_read))
        .route("/:id/read", post(mark_read))
}
