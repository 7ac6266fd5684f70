use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::warn;

use crate::{
    AppState,
    api::models::{
        envelope::ApiResponse,
        instagram::{
            AccountStatisticsResponse, InstagramAccountCreate, InstagramAccountResponse, MobileStatusResponse, SyncCommentsRequest,
            SyncCommentsResponse, SyncPostsResponse,
        },
        pagination::Pagination,
        users::CurrentUser,
    },
    db::{
        errors::DbError,
        handlers::{
            Comments, InstagramAccounts, Notifications, Posts, Repository, Settings, comments::CommentFilter,
            instagram::InstagramAccountFilter, posts::PostFilter,
        },
        models::instagram::InstagramAccountUpdateDBRequest,
    },
    errors::{Error, Result},
    types::{InstagramAccountId, Platform, abbrev_uuid},
};

/// Connect an Instagram business account
#[utoipa::path(
    post,
    path = "/instagram/accounts",
    tag = "instagram",
    request_body = InstagramAccountCreate,
    responses(
        (status = 201, description = "Account connected", body = InstagramAccountResponse),
        (status = 409, description = "Account already connected"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_account(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<InstagramAccountCreate>,
) -> Result<(StatusCode, Json<ApiResponse<InstagramAccountResponse>>)> {
    if request.instagram_user_id.trim().is_empty() || request.access_token.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "instagram_user_id and access_token are required".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let account = InstagramAccounts::new(&mut conn).create(&request.into_db(current_user.id)).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(account.into(), "Instagram account connected")),
    ))
}

#[utoipa::path(
    get,
    path = "/instagram/accounts",
    tag = "instagram",
    params(Pagination),
    responses(
        (status = 200, description = "Connected accounts", body = Vec<InstagramAccountResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_accounts(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<InstagramAccountResponse>>>> {
    let (skip, limit) = pagination.params();
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let accounts = InstagramAccounts::new(&mut conn)
        .list(&InstagramAccountFilter {
            user_id: current_user.id,
            skip,
            limit,
        })
        .await?;

    Ok(Json(ApiResponse::ok(accounts.into_iter().map(Into::into).collect())))
}

#[utoipa::path(
    get,
    path = "/instagram/accounts/{id}",
    tag = "instagram",
    params(("id" = String, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account", body = InstagramAccountResponse),
        (status = 404, description = "Account not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<InstagramAccountId>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<InstagramAccountResponse>>> {
    let account = state.moderation.owned_account(current_user.id, id).await?;
    Ok(Json(ApiResponse::ok(account.into())))
}

/// Disconnect an account. Its posts and comments are kept.
#[utoipa::path(
    delete,
    path = "/instagram/accounts/{id}",
    tag = "instagram",
    params(("id" = String, Path, description = "Account ID")),
    responses(
        (status = 204, description = "Account disconnected"),
        (status = 404, description = "Account not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_account(State(state): State<AppState>, Path(id): Path<InstagramAccountId>, current_user: CurrentUser) -> Result<StatusCode> {
    let account = state.moderation.owned_account(current_user.id, id).await?;
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    InstagramAccounts::new(&mut conn).delete(account.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Import the account's recent media as posts
#[utoipa::path(
    post,
    path = "/instagram/accounts/{id}/sync-posts",
    tag = "instagram",
    params(("id" = String, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Sync result", body = SyncPostsResponse),
        (status = 502, description = "Instagram request failed"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn sync_posts(
    State(state): State<AppState>,
    Path(id): Path<InstagramAccountId>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<SyncPostsResponse>>> {
    let outcome = state.moderation.sync_posts(current_user.id, id).await?;
    Ok(Json(ApiResponse::ok(outcome.into())))
}

/// Fetch and moderate the comments on one media item
#[utoipa::path(
    post,
    path = "/instagram/accounts/{id}/sync-comments",
    tag = "instagram",
    params(("id" = String, Path, description = "Account ID")),
    request_body = SyncCommentsRequest,
    responses(
        (status = 200, description = "Processed comments", body = SyncCommentsResponse),
        (status = 400, description = "post_id missing"),
        (status = 502, description = "Instagram request failed"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn sync_comments(
    State(state): State<AppState>,
    Path(id): Path<InstagramAccountId>,
    current_user: CurrentUser,
    Json(request): Json<SyncCommentsRequest>,
) -> Result<Json<ApiResponse<SyncCommentsResponse>>> {
    let media_id = request
        .post_id
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| Error::BadRequest {
            message: "post_id is required".to_string(),
        })?;

    let processed = state.moderation.sync_comments(current_user.id, id, &media_id).await?;
    let created = processed.iter().filter(|p| p.created).count();

    Ok(Json(ApiResponse::ok(SyncCommentsResponse {
        processed: processed.len(),
        created,
        comments: processed.into_iter().map(Into::into).collect(),
    })))
}

/// Profile counters, refreshed from Instagram when reachable, plus local moderation totals
#[utoipa::path(
    get,
    path = "/instagram/accounts/{id}/statistics",
    tag = "instagram",
    params(("id" = String, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account statistics", body = AccountStatisticsResponse),
        (status = 404, description = "Account not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn account_statistics(
    State(state): State<AppState>,
    Path(id): Path<InstagramAccountId>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<AccountStatisticsResponse>>> {
    let mut account = state.moderation.owned_account(current_user.id, id).await?;

    // no connection is held while Instagram is called
    let profile = state
        .moderation
        .instagram()
        .fetch_profile(&account.instagram_user_id, &account.access_token)
        .await;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    match profile {
        Ok(profile) => {
            let update = InstagramAccountUpdateDBRequest {
                profile_picture_url: profile.profile_picture_url,
                followers_count: profile.followers_count,
                following_count: profile.follows_count,
                media_count: profile.media_count,
                ..Default::default()
            };
            account = InstagramAccounts::new(&mut conn).update(account.id, &update).await?;
        }
        Err(e) => warn!(account_id = %abbrev_uuid(&account.id), "Using stored profile counters: {e}"),
    }

    let posts_tracked = Posts::new(&mut conn)
        .count(&PostFilter {
            user_id: current_user.id,
            platform: Some(Platform::Instagram),
            skip: 0,
            limit: 0,
        })
        .await?;
    let comments = Comments::new(&mut conn).statistics(current_user.id).await?;

    Ok(Json(ApiResponse::ok(AccountStatisticsResponse {
        username: account.username,
        followers_count: account.followers_count,
        following_count: account.following_count,
        media_count: account.media_count,
        posts_tracked,
        comments_total: comments.total,
        pending_approval: comments.pending_approval,
        responses_posted: comments.responses_posted,
    })))
}

/// Connection state and badge counts for the mobile app
#[utoipa::path(
    get,
    path = "/instagram/mobile-status",
    tag = "instagram",
    responses(
        (status = 200, description = "Mobile status", body = MobileStatusResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn mobile_status(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ApiResponse<MobileStatusResponse>>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let account = InstagramAccounts::new(&mut conn).get_active_for_user(current_user.id).await?;
    let settings = Settings::new(&mut conn).get_or_create(current_user.id).await?;
    let unread_notifications = Notifications::new(&mut conn).unread_count(current_user.id).await?;
    let pending_approvals = Comments::new(&mut conn)
        .count(&CommentFilter {
            requires_approval: Some(true),
            ..CommentFilter::new(current_user.id, 0, 0)
        })
        .await?;

    Ok(Json(ApiResponse::ok(MobileStatusResponse {
        connected: account.is_some(),
        account: account.map(Into::into),
        auto_comment_enabled: settings.auto_comment_enabled,
        unread_notifications,
        pending_approvals,
    })))
}

#[cfg(test)]
mod tests {
    use crate::platforms::instagram::MediaItem;
    use crate::test_utils::{
        FakeInstagram, create_test_app, create_test_instagram_account, create_test_server, create_test_state_with, create_test_user,
        graph_comment, session_token,
    };
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::SqlitePool;
    use std::sync::Arc;

    fn media(id: &str) -> MediaItem {
        MediaItem {
            id: id.to_string(),
            caption: Some(format!("caption {id}")),
            media_type: Some("IMAGE".to_string()),
            permalink: Some(format!("https://instagram.com/p/{id}")),
            timestamp: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_connect_list_and_disconnect(pool: SqlitePool) {
        let user = create_test_user(&pool, "owner").await;
        let token = session_token(&user);
        let server = create_test_app(pool);

        let response = server
            .post("/instagram/accounts")
            .authorization_bearer(&token)
            .json(&json!({
                "username": "brand",
                "instagram_user_id": "1789",
                "access_token": "IGQV-secret",
                "expires_in": 5_184_000
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert!(body["data"].get("access_token").is_none());
        assert!(body["data"]["token_expires_at"].is_string());
        let id = body["data"]["id"].as_str().unwrap().to_string();

        server
            .post("/instagram/accounts")
            .authorization_bearer(&token)
            .json(&json!({"username": "brand", "instagram_user_id": "1789", "access_token": "again"}))
            .await
            .assert_status(StatusCode::CONFLICT);

        let body: Value = server.get("/instagram/accounts").authorization_bearer(&token).await.json();
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let body: Value = server.get("/instagram/mobile-status").authorization_bearer(&token).await.json();
        assert_eq!(body["data"]["connected"], true);
        assert_eq!(body["data"]["account"]["username"], "brand");

        server
            .delete(&format!("/instagram/accounts/{id}"))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(&format!("/instagram/accounts/{id}"))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let body: Value = server.get("/instagram/mobile-status").authorization_bearer(&token).await.json();
        assert_eq!(body["data"]["connected"], false);
        assert!(body["data"]["account"].is_null());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sync_posts_comments_and_statistics(pool: SqlitePool) {
        let user = create_test_user(&pool, "owner").await;
        let account = create_test_instagram_account(&pool, user.id, "1789").await;
        let token = session_token(&user);
        let instagram = Arc::new(FakeInstagram {
            media: vec![media("m1"), media("m2")],
            comments: vec![
                graph_comment("c1", "love this", "m1"),
                graph_comment("c2", "you idiot", "m1"),
                graph_comment("c3", "when is the restock?", "m2"),
            ],
            ..Default::default()
        });
        let server = create_test_server(create_test_state_with(pool, None, instagram));

        let body: Value = server
            .post(&format!("/instagram/accounts/{}/sync-posts", account.id))
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(body["data"]["fetched"], 2);
        assert_eq!(body["data"]["created"], 2);

        let body: Value = server
            .post(&format!("/instagram/accounts/{}/sync-comments", account.id))
            .authorization_bearer(&token)
            .json(&json!({"post_id": "m1"}))
            .await
            .json();
        assert_eq!(body["data"]["processed"], 2);
        assert_eq!(body["data"]["created"], 2);

        let body: Value = server
            .post(&format!("/instagram/accounts/{}/sync-comments", account.id))
            .authorization_bearer(&token)
            .json(&json!({"post_id": "m1"}))
            .await
            .json();
        assert_eq!(body["data"]["created"], 0);

        let response = server
            .post(&format!("/instagram/accounts/{}/sync-comments", account.id))
            .authorization_bearer(&token)
            .json(&json!({}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_ERROR");

        let body: Value = server
            .get(&format!("/instagram/accounts/{}/statistics", account.id))
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(body["data"]["followers_count"], 120);
        assert_eq!(body["data"]["following_count"], 80);
        assert_eq!(body["data"]["media_count"], 2);
        assert_eq!(body["data"]["posts_tracked"], 2);
        assert_eq!(body["data"]["comments_total"], 2);
    }

    #[sqlx::test]
    async fn test_foreign_account_is_not_found(pool: SqlitePool) {
        let owner = create_test_user(&pool, "owner").await;
        let intruder = create_test_user(&pool, "intruder").await;
        let account = create_test_instagram_account(&pool, owner.id, "1789").await;
        let server = create_test_app(pool);

        server
            .post(&format!("/instagram/accounts/{}/sync-posts", account.id))
            .authorization_bearer(session_token(&intruder))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
