//! Notification inbox and the live unread-count stream.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt, future, stream};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    AppState,
    api::models::{
        envelope::ApiResponse,
        notifications::{ListNotificationsQuery, MarkAllReadResponse, NotificationResponse, UnreadCountResponse},
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    db::{
        errors::DbError,
        handlers::{Notifications, notifications::NotificationFilter},
    },
    errors::{Error, Result},
    notifications::{NotificationEvent, Subscription},
    types::{NotificationId, UserId},
};

async fn unread_count(state: &AppState, user_id: UserId) -> Result<i64> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    Ok(Notifications::new(&mut conn).unread_count(user_id).await?)
}

#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    params(ListNotificationsQuery),
    responses(
        (status = 200, description = "Page of notifications, newest first", body = PaginatedResponse<NotificationResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<PaginatedResponse<NotificationResponse>>>> {
    let (skip, limit) = query.pagination.params();
    let filter = NotificationFilter {
        user_id: current_user.id,
        is_read: query.is_read,
        needs_approval: query.needs_approval,
        platform: query.platform,
        skip,
        limit,
    };

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut repo = Notifications::new(&mut conn);
    let notifications = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(ApiResponse::ok(PaginatedResponse::new(
        notifications.into_iter().map(Into::into).collect(),
        total,
        skip,
        limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/notifications/count",
    tag = "notifications",
    responses(
        (status = 200, description = "Unread notification count", body = UnreadCountResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_unread_count(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ApiResponse<UnreadCountResponse>>> {
    let unread = unread_count(&state, current_user.id).await?;
    Ok(Json(ApiResponse::ok(UnreadCountResponse { unread })))
}

#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "notifications",
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked read", body = NotificationResponse),
        (status = 404, description = "Notification not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<NotificationResponse>>> {
    let notification = {
        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        Notifications::new(&mut conn)
            .mark_read(current_user.id, id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Notification".to_string(),
                id: id.to_string(),
            })?
    };

    state.moderation.publish_unread(current_user.id).await;
    Ok(Json(ApiResponse::ok(notification.into())))
}

#[utoipa::path(
    post,
    path = "/notifications/read-all",
    tag = "notifications",
    responses(
        (status = 200, description = "Number of notifications marked read", body = MarkAllReadResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn mark_all_read(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ApiResponse<MarkAllReadResponse>>> {
    let updated = {
        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        Notifications::new(&mut conn).mark_all_read(current_user.id).await?
    };

    state.moderation.publish_unread(current_user.id).await;
    Ok(Json(ApiResponse::ok(MarkAllReadResponse { updated })))
}

/// Current unread count first, then every published update until the client leaves or the
/// server shuts down. Lagged receivers skip the missed events.
fn notification_events(
    initial: NotificationEvent,
    subscription: Subscription,
    shutdown: CancellationToken,
) -> impl Stream<Item = NotificationEvent> {
    let updates = subscription.filter_map(|message| {
        future::ready(match message {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Notification stream lagged");
                None
            }
        })
    });

    stream::once(future::ready(initial))
        .chain(updates)
        .take_until(shutdown.cancelled_owned())
}

/// Server-sent events carrying the unread count and the latest notification
#[utoipa::path(
    get,
    path = "/notifications/stream",
    tag = "notifications",
    responses(
        (status = 200, description = "Stream of `notification` events", content_type = "text/event-stream", body = NotificationEvent),
        (status = 401, description = "Unauthorized"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn notification_stream(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>> {
    // subscribe before counting so nothing published in between is lost
    let subscription = state.moderation.hub().stream(current_user.id);
    let initial = NotificationEvent {
        unread_count: unread_count(&state, current_user.id).await?,
        latest: None,
    };

    let events = notification_events(initial, subscription, state.shutdown.clone())
        .map(|event| Event::default().event("notification").json_data(event));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::notifications::NotificationUpsertDBRequest;
    use crate::notifications::{LatestNotification, NotificationHub};
    use crate::test_utils::{create_test_app, create_test_user, session_token};
    use crate::types::{Platform, SentimentLabel};
    use axum::http::StatusCode;
    use serde_json::Value;
    use sqlx::SqlitePool;
    use uuid::Uuid;

    async fn notify(pool: &SqlitePool, user_id: UserId, external_id: &str, needs_approval: bool) {
        let mut conn = pool.acquire().await.unwrap();
        Notifications::new(&mut conn)
            .upsert(&NotificationUpsertDBRequest {
                user_id,
                platform: Platform::Instagram,
                external_id: external_id.to_string(),
                media_id: Some("media-1".to_string()),
                comment_text: "you idiot".to_string(),
                sentiment_label: Some(SentimentLabel::Hate),
                needs_approval,
                ai_response: None,
            })
            .await
            .unwrap();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_inbox_flow(pool: SqlitePool) {
        let user = create_test_user(&pool, "owner").await;
        let other = create_test_user(&pool, "other").await;
        notify(&pool, user.id, "c1", true).await;
        notify(&pool, user.id, "c2", false).await;
        notify(&pool, other.id, "c3", true).await;
        let token = session_token(&user);
        let server = create_test_app(pool);

        let body: Value = server.get("/notifications/count").authorization_bearer(&token).await.json();
        assert_eq!(body["data"]["unread"], 2);

        let body: Value = server
            .get("/notifications")
            .add_query_param("needs_approval", "true")
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(body["data"]["total_count"], 1);
        let id = body["data"]["data"][0]["id"].as_str().unwrap().to_string();

        let body: Value = server
            .post(&format!("/notifications/{id}/read"))
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(body["data"]["is_read"], true);

        let body: Value = server.post("/notifications/read-all").authorization_bearer(&token).await.json();
        assert_eq!(body["data"]["updated"], 1);

        let body: Value = server.get("/notifications/count").authorization_bearer(&token).await.json();
        assert_eq!(body["data"]["unread"], 0);
    }

    #[sqlx::test]
    async fn test_mark_read_of_foreign_notification(pool: SqlitePool) {
        let owner = create_test_user(&pool, "owner").await;
        let intruder = create_test_user(&pool, "intruder").await;
        notify(&pool, owner.id, "c1", true).await;
        let server = create_test_app(pool);

        let body: Value = server.get("/notifications").authorization_bearer(session_token(&owner)).await.json();
        let id = body["data"]["data"][0]["id"].as_str().unwrap().to_string();

        server
            .post(&format!("/notifications/{id}/read"))
            .authorization_bearer(session_token(&intruder))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server.get("/notifications/stream").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_event_stream_starts_with_count_and_ends_on_shutdown() {
        let hub = NotificationHub::new();
        let user = Uuid::new_v4();
        let shutdown = CancellationToken::new();

        let mut events = Box::pin(notification_events(
            NotificationEvent {
                unread_count: 4,
                latest: None,
            },
            hub.stream(user),
            shutdown.clone(),
        ));

        assert_eq!(events.next().await.unwrap().unread_count, 4);

        let latest = LatestNotification {
            id: Uuid::new_v4(),
            text: "is this in stock?".to_string(),
            label: Some(SentimentLabel::Neutral),
            needs_approval: false,
        };
        hub.publish(
            user,
            NotificationEvent {
                unread_count: 5,
                latest: Some(latest.clone()),
            },
        );
        let event = events.next().await.unwrap();
        assert_eq!(event.unread_count, 5);
        assert_eq!(event.latest, Some(latest));

        shutdown.cancel();
        assert!(events.next().await.is_none());

        // the closed stream leaves nothing registered for the user
        drop(events);
        assert_eq!(hub.subscriber_count(user), 0);
    }
}
