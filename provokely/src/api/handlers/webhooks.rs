//! Meta webhook endpoints for Instagram and the stored delivery log.
//!
//! Deliveries are acknowledged with 200 even when the body cannot be parsed, so Meta does not
//! keep retrying a payload that will never succeed. Only a bad signature is rejected.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    AppState,
    api::models::{
        envelope::ApiResponse,
        users::CurrentUser,
        webhooks::{ListWebhookRecordsQuery, WebhookReceivedResponse, WebhookRecordResponse, WebhookVerifyQuery},
    },
    db::{
        errors::DbError,
        handlers::{WebhookRecords, instagram::WebhookRecordFilter},
    },
    errors::{Error, Result},
    platforms::signing::{SIGNATURE_HEADER, verify_signature},
    types::WebhookRecordId,
};

/// Subscription handshake: echo `hub.challenge` when the verify token matches
#[utoipa::path(
    get,
    path = "/instagram/webhook",
    tag = "webhooks",
    params(WebhookVerifyQuery),
    responses(
        (status = 200, description = "Challenge echoed", content_type = "text/plain", body = String),
        (status = 403, description = "Verification failed"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn verify_instagram_webhook(State(state): State<AppState>, Query(query): Query<WebhookVerifyQuery>) -> Result<Response> {
    let expected = state.config.instagram.verify_token.as_deref();
    let verified = query.mode.as_deref() == Some("subscribe") && expected.is_some() && query.verify_token.as_deref() == expected;

    match (verified, query.challenge) {
        (true, Some(challenge)) => {
            info!("Instagram webhook subscription verified");
            Ok(([(header::CONTENT_TYPE, "text/plain")], challenge).into_response())
        }
        _ => Err(Error::Forbidden {
            message: "Webhook verification failed".to_string(),
        }),
    }
}

fn check_signature(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<()> {
    let Some(secret) = state.config.instagram.app_secret.as_deref() else {
        return Ok(());
    };
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
    if verify_signature(body, signature, secret) {
        Ok(())
    } else {
        Err(Error::Forbidden {
            message: "Invalid webhook signature".to_string(),
        })
    }
}

fn parse_body(body: &[u8]) -> Option<Value> {
    match serde_json::from_slice(body) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!("Ignoring unparseable webhook body: {e}");
            None
        }
    }
}

fn received(created: usize) -> Json<ApiResponse<WebhookReceivedResponse>> {
    Json(ApiResponse::with_message(WebhookReceivedResponse { created }, "Webhook received"))
}

/// Store each change and run comment changes through moderation
#[utoipa::path(
    post,
    path = "/instagram/webhook",
    tag = "webhooks",
    request_body(content = Object, description = "Meta webhook delivery"),
    responses(
        (status = 200, description = "Delivery acknowledged", body = WebhookReceivedResponse),
        (status = 403, description = "Signature missing or wrong"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn handle_instagram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookReceivedResponse>>> {
    check_signature(&state, &headers, &body)?;
    let Some(payload) = parse_body(&body) else {
        return Ok(received(0));
    };

    let created = match state.moderation.handle_instagram_webhook(&payload).await {
        Ok(created) => created,
        Err(e) => {
            warn!("Instagram webhook handling failed: {e}");
            0
        }
    };
    Ok(received(created))
}

/// Store each change without processing it
#[utoipa::path(
    post,
    path = "/instagram/webhook/receive",
    tag = "webhooks",
    request_body(content = Object, description = "Meta webhook delivery"),
    responses(
        (status = 200, description = "Delivery stored", body = WebhookReceivedResponse),
        (status = 403, description = "Signature missing or wrong"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn receive_instagram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookReceivedResponse>>> {
    check_signature(&state, &headers, &body)?;
    let Some(payload) = parse_body(&body) else {
        return Ok(received(0));
    };

    let created = match state.moderation.store_instagram_webhook(&payload).await {
        Ok(created) => created,
        Err(e) => {
            warn!("Instagram webhook storage failed: {e}");
            0
        }
    };
    Ok(received(created))
}

#[utoipa::path(
    get,
    path = "/instagram/webhooks",
    tag = "webhooks",
    params(ListWebhookRecordsQuery),
    responses(
        (status = 200, description = "Stored deliveries for the caller's accounts", body = Vec<WebhookRecordResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_webhook_records(
    State(state): State<AppState>,
    Query(query): Query<ListWebhookRecordsQuery>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<WebhookRecordResponse>>>> {
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let records = WebhookRecords::new(&mut conn)
        .list(&WebhookRecordFilter {
            user_id: current_user.id,
            account_id: query.account_id,
            processed: query.processed,
            skip,
            limit,
        })
        .await?;

    Ok(Json(ApiResponse::ok(records.into_iter().map(Into::into).collect())))
}

#[utoipa::path(
    post,
    path = "/instagram/webhooks/{id}/processed",
    tag = "webhooks",
    params(("id" = String, Path, description = "Webhook record ID")),
    responses(
        (status = 200, description = "Record marked processed", body = WebhookRecordResponse),
        (status = 404, description = "Record not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn mark_webhook_processed(
    State(state): State<AppState>,
    Path(id): Path<WebhookRecordId>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<WebhookRecordResponse>>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let record = WebhookRecords::new(&mut conn)
        .mark_processed(current_user.id, id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Webhook record".to_string(),
            id: id.to_string(),
        })?;

    Ok(Json(ApiResponse::ok(record.into())))
}

#[cfg(test)]
mod tests {
    use crate::platforms::signing::{SIGNATURE_HEADER, sign_payload};
    use crate::test_utils::{
        FakeInstagram, create_test_app, create_test_instagram_account, create_test_server, create_test_state, create_test_state_with,
        create_test_user, graph_comment, session_token,
    };
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use serde_json::{Value, json};
    use sqlx::SqlitePool;
    use std::sync::Arc;

    fn comment_delivery(ig_id: &str, comment_id: &str) -> Value {
        json!({
            "object": "instagram",
            "entry": [{
                "id": ig_id,
                "time": 1717000000,
                "changes": [{"field": "comments", "value": {"id": comment_id, "text": "hi", "media": {"id": "m1"}}}]
            }]
        })
    }

    #[sqlx::test]
    async fn test_subscription_handshake(pool: SqlitePool) {
        let mut state = create_test_state(pool);
        state.config.instagram.verify_token = Some("verify-me".to_string());
        let server = create_test_server(state);

        let response = server
            .get("/instagram/webhook")
            .add_query_param("hub.mode", "subscribe")
            .add_query_param("hub.verify_token", "verify-me")
            .add_query_param("hub.challenge", "1158201444")
            .await;
        response.assert_status_ok();
        response.assert_text("1158201444");

        let response = server
            .get("/instagram/webhook")
            .add_query_param("hub.mode", "subscribe")
            .add_query_param("hub.verify_token", "wrong")
            .add_query_param("hub.challenge", "1158201444")
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(response.json::<Value>()["error"]["code"], "FORBIDDEN");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delivery_is_processed_and_logged(pool: SqlitePool) {
        let user = create_test_user(&pool, "owner").await;
        let account = create_test_instagram_account(&pool, user.id, "1789").await;
        let token = session_token(&user);
        let instagram = Arc::new(FakeInstagram {
            comments: vec![graph_comment("c1", "you idiot", "m1")],
            ..Default::default()
        });
        let server = create_test_server(create_test_state_with(pool, None, instagram));

        let body: Value = server.post("/instagram/webhook").json(&comment_delivery("1789", "c1")).await.json();
        assert_eq!(body["data"]["created"], 1);
        assert_eq!(body["message"], "Webhook received");

        // replay
        let body: Value = server.post("/instagram/webhook").json(&comment_delivery("1789", "c1")).await.json();
        assert_eq!(body["data"]["created"], 0);

        let body: Value = server.get("/comments").authorization_bearer(&token).await.json();
        assert_eq!(body["data"]["total_count"], 1);
        assert_eq!(body["data"]["data"][0]["content"], "you idiot");

        let body: Value = server.get("/notifications/count").authorization_bearer(&token).await.json();
        assert_eq!(body["data"]["unread"], 1);

        let body: Value = server
            .get("/instagram/webhooks")
            .add_query_param("account_id", account.id.to_string())
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["processed"], true);
    }

    #[sqlx::test]
    async fn test_receive_only_stores(pool: SqlitePool) {
        let user = create_test_user(&pool, "owner").await;
        create_test_instagram_account(&pool, user.id, "1789").await;
        let token = session_token(&user);
        let server = create_test_app(pool);

        let body: Value = server
            .post("/instagram/webhook/receive")
            .json(&comment_delivery("1789", "c1"))
            .await
            .json();
        assert_eq!(body["data"]["created"], 1);

        let body: Value = server.get("/comments").authorization_bearer(&token).await.json();
        assert_eq!(body["data"]["total_count"], 0);

        let body: Value = server
            .get("/instagram/webhooks")
            .add_query_param("processed", "false")
            .authorization_bearer(&token)
            .await
            .json();
        let id = body["data"][0]["id"].as_str().unwrap().to_string();

        let body: Value = server
            .post(&format!("/instagram/webhooks/{id}/processed"))
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(body["data"]["processed"], true);
    }

    #[sqlx::test]
    async fn test_garbage_and_unknown_accounts_are_acknowledged(pool: SqlitePool) {
        let server = create_test_app(pool);

        let response = server.post("/instagram/webhook").text("not json").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["data"]["created"], 0);

        let body: Value = server.post("/instagram/webhook").json(&comment_delivery("unknown", "c1")).await.json();
        assert_eq!(body["data"]["created"], 0);
    }

    #[sqlx::test]
    async fn test_signature_required_when_secret_configured(pool: SqlitePool) {
        let user = create_test_user(&pool, "owner").await;
        create_test_instagram_account(&pool, user.id, "1789").await;
        let mut state = create_test_state(pool);
        state.config.instagram.app_secret = Some("app-secret".to_string());
        let server = create_test_server(state);

        let body = serde_json::to_vec(&comment_delivery("1789", "c1")).unwrap();
        let header = HeaderName::from_static(SIGNATURE_HEADER);

        server
            .post("/instagram/webhook")
            .add_header(header.clone(), HeaderValue::from_static("sha256=deadbeef"))
            .bytes(body.clone().into())
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let signature = sign_payload(&body, "app-secret").unwrap();
        let response = server
            .post("/instagram/webhook")
            .add_header(header, HeaderValue::from_str(&signature).unwrap())
            .bytes(body.into())
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["data"]["created"], 1);
    }
}
