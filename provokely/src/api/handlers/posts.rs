use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        comments::CommentResponse,
        envelope::ApiResponse,
        pagination::{Pagination, PaginatedResponse},
        posts::{ListPostsQuery, PlatformCount, PostCreate, PostResponse, PostStatisticsResponse},
        users::CurrentUser,
    },
    db::{
        errors::DbError,
        handlers::{Comments, Posts, Repository, comments::CommentFilter, posts::PostFilter},
        models::posts::{PostCreateDBRequest, PostDBResponse},
    },
    errors::{Error, Result},
    types::{PostId, UserId},
};

async fn owned_post(state: &AppState, user_id: UserId, id: PostId) -> Result<PostDBResponse> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    Posts::new(&mut conn)
        .get_by_id(id)
        .await?
        .filter(|p| p.user_id == user_id)
        .ok_or_else(|| Error::NotFound {
            resource: "Post".to_string(),
            id: id.to_string(),
        })
}

#[utoipa::path(
    get,
    path = "/posts",
    tag = "posts",
    params(ListPostsQuery),
    responses(
        (status = 200, description = "Page of posts", body = PaginatedResponse<PostResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<PaginatedResponse<PostResponse>>>> {
    let (skip, limit) = query.pagination.params();
    let filter = PostFilter {
        user_id: current_user.id,
        platform: query.platform,
        skip,
        limit,
    };

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut repo = Posts::new(&mut conn);
    let posts = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(ApiResponse::ok(PaginatedResponse::new(
        posts.into_iter().map(Into::into).collect(),
        total,
        skip,
        limit,
    ))))
}

/// Register a post, returning the existing one for a known `(platform, external_id)`
#[utoipa::path(
    post,
    path = "/posts",
    tag = "posts",
    request_body = PostCreate,
    responses(
        (status = 201, description = "Post created", body = PostResponse),
        (status = 200, description = "Post already tracked", body = PostResponse),
        (status = 409, description = "Post belongs to another account"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_post(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<PostCreate>,
) -> Result<(StatusCode, Json<ApiResponse<PostResponse>>)> {
    if request.external_id.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "external_id is required".to_string(),
        });
    }

    let (post, created) = state
        .moderation
        .create_post(&PostCreateDBRequest {
            user_id: current_user.id,
            platform: request.platform,
            external_id: request.external_id.trim().to_string(),
            content: request.content,
            author: request.author,
            url: request.url,
        })
        .await?;

    if post.user_id != current_user.id {
        return Err(Error::Conflict {
            message: "Post is already tracked by another account".to_string(),
        });
    }

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(ApiResponse::ok(post.into()))))
}

/// Post counts per platform
#[utoipa::path(
    get,
    path = "/posts/statistics",
    tag = "posts",
    responses(
        (status = 200, description = "Post statistics", body = PostStatisticsResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn post_statistics(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ApiResponse<PostStatisticsResponse>>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let counts = Posts::new(&mut conn).counts_by_platform(current_user.id).await?;

    let by_platform: Vec<PlatformCount> = counts
        .into_iter()
        .map(|c| PlatformCount {
            platform: c.platform,
            count: c.count,
        })
        .collect();

    Ok(Json(ApiResponse::ok(PostStatisticsResponse {
        total: by_platform.iter().map(|c| c.count).sum(),
        by_platform,
    })))
}

#[utoipa::path(
    get,
    path = "/posts/{id}",
    tag = "posts",
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post", body = PostResponse),
        (status = 404, description = "Post not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_post(State(state): State<AppState>, Path(id): Path<PostId>, current_user: CurrentUser) -> Result<Json<ApiResponse<PostResponse>>> {
    let post = owned_post(&state, current_user.id, id).await?;
    Ok(Json(ApiResponse::ok(post.into())))
}

/// Comments left on a post
#[utoipa::path(
    get,
    path = "/posts/{id}/comments",
    tag = "posts",
    params(("id" = String, Path, description = "Post ID"), Pagination),
    responses(
        (status = 200, description = "Page of comments", body = PaginatedResponse<CommentResponse>),
        (status = 404, description = "Post not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn post_comments(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
    Query(pagination): Query<Pagination>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<PaginatedResponse<CommentResponse>>>> {
    let post = owned_post(&state, current_user.id, id).await?;
    let (skip, limit) = pagination.params();
    let filter = CommentFilter {
        platform: Some(post.platform),
        post_external_id: Some(post.external_id),
        ..CommentFilter::new(current_user.id, skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut repo = Comments::new(&mut conn);
    let comments = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(ApiResponse::ok(PaginatedResponse::new(
        comments.into_iter().map(Into::into).collect(),
        total,
        skip,
        limit,
    ))))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{create_test_app, create_test_user, session_token};
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::SqlitePool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_posts_and_their_comments(pool: SqlitePool) {
        let user = create_test_user(&pool, "owner").await;
        let token = session_token(&user);
        let server = create_test_app(pool);

        let response = server
            .post("/posts")
            .authorization_bearer(&token)
            .json(&json!({"platform": "instagram", "external_id": "m1", "content": "launch day"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let post_id = response.json::<Value>()["data"]["id"].as_str().unwrap().to_string();

        server
            .post("/posts")
            .authorization_bearer(&token)
            .json(&json!({"platform": "instagram", "external_id": "m1", "content": "edited"}))
            .await
            .assert_status_ok();
        server
            .post("/posts")
            .authorization_bearer(&token)
            .json(&json!({"platform": "youtube", "external_id": "v1"}))
            .await
            .assert_status(StatusCode::CREATED);

        for (id, post) in [("c1", "m1"), ("c2", "m1"), ("c3", "other")] {
            server
                .post("/comments")
                .authorization_bearer(&token)
                .json(&json!({"platform": "instagram", "external_id": id, "post_external_id": post, "content": "nice"}))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let body: Value = server
            .get(&format!("/posts/{post_id}/comments"))
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(body["data"]["total_count"], 2);

        let body: Value = server.get(&format!("/posts/{post_id}")).authorization_bearer(&token).await.json();
        assert_eq!(body["data"]["content"], "launch day");

        let body: Value = server
            .get("/posts")
            .add_query_param("platform", "youtube")
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(body["data"]["total_count"], 1);

        let body: Value = server.get("/posts/statistics").authorization_bearer(&token).await.json();
        assert_eq!(body["data"]["total"], 2);
        assert_eq!(body["data"]["by_platform"].as_array().unwrap().len(), 2);
    }

    #[sqlx::test]
    async fn test_other_users_post_is_hidden(pool: SqlitePool) {
        let alice = create_test_user(&pool, "alice").await;
        let bob = create_test_user(&pool, "bob").await;
        let server = create_test_app(pool);

        let body: Value = server
            .post("/posts")
            .authorization_bearer(session_token(&alice))
            .json(&json!({"platform": "twitter", "external_id": "t1"}))
            .await
            .json();
        let post_id = body["data"]["id"].as_str().unwrap().to_string();

        server
            .get(&format!("/posts/{post_id}"))
            .authorization_bearer(session_token(&bob))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post("/posts")
            .authorization_bearer(session_token(&bob))
            .json(&json!({"platform": "twitter", "external_id": "t1"}))
            .await
            .assert_status(StatusCode::CONFLICT);
    }
}
