use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        comments::{
            ApproveRequest, CommentCreate, CommentResponse, CommentStatisticsResponse, ListCommentsQuery, ProcessedCommentResponse,
            SentimentAnalysisResponse,
        },
        envelope::ApiResponse,
        pagination::{Pagination, PaginatedResponse},
        users::CurrentUser,
    },
    db::{
        errors::DbError,
        handlers::{Comments, Repository, comments::CommentFilter},
    },
    errors::{Error, Result},
    moderation::IncomingComment,
    types::CommentId,
};

/// List comments, newest first
#[utoipa::path(
    get,
    path = "/comments",
    tag = "comments",
    params(ListCommentsQuery),
    responses(
        (status = 200, description = "Page of comments", body = PaginatedResponse<CommentResponse>),
        (status = 401, description = "Not authenticated"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<ListCommentsQuery>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<PaginatedResponse<CommentResponse>>>> {
    let (skip, limit) = query.pagination.params();
    let filter = CommentFilter {
        user_id: current_user.id,
        platform: query.platform,
        sentiment_label: query.sentiment_label,
        post_external_id: None,
        response_posted: query.response_posted,
        requires_approval: query.requires_approval,
        approved: query.approved,
        since: query.since,
        search: query.search.filter(|s| !s.trim().is_empty()),
        skip,
        limit,
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

/// Run a comment through the moderation pipeline
#[utoipa::path(
    post,
    path = "/comments",
    tag = "comments",
    request_body = CommentCreate,
    responses(
        (status = 201, description = "Comment processed", body = ProcessedCommentResponse),
        (status = 400, description = "Missing content or external id"),
        (status = 409, description = "Comment belongs to another account"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_comment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<CommentCreate>,
) -> Result<(StatusCode, Json<ApiResponse<ProcessedCommentResponse>>)> {
    if request.external_id.trim().is_empty() || request.content.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "external_id and content are required".to_string(),
        });
    }

    let processed = state
        .moderation
        .process_comment(IncomingComment {
            user_id: current_user.id,
            platform: request.platform,
            external_id: request.external_id.trim().to_string(),
            post_external_id: request.post_external_id,
            content: request.content,
        })
        .await?;

    let status = if processed.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(ApiResponse::ok(processed.into()))))
}

/// Comments waiting for the owner's approval
#[utoipa::path(
    get,
    path = "/comments/pending",
    tag = "comments",
    params(Pagination),
    responses(
        (status = 200, description = "Pending comments", body = PaginatedResponse<CommentResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn pending_approvals(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<PaginatedResponse<CommentResponse>>>> {
    let (skip, limit) = pagination.params();
    let filter = CommentFilter {
        requires_approval: Some(true),
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

/// Counts by sentiment label and moderation state
#[utoipa::path(
    get,
    path = "/comments/statistics",
    tag = "comments",
    responses(
        (status = 200, description = "Comment statistics", body = CommentStatisticsResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn comment_statistics(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<CommentStatisticsResponse>>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let stats = Comments::new(&mut conn).statistics(current_user.id).await?;
    Ok(Json(ApiResponse::ok(stats.into())))
}

#[utoipa::path(
    get,
    path = "/comments/{id}",
    tag = "comments",
    params(("id" = String, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment", body = CommentResponse),
        (status = 404, description = "Comment not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<CommentId>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<CommentResponse>>> {
    let comment = state.moderation.owned_comment(current_user.id, id).await?;
    Ok(Json(ApiResponse::ok(comment.into())))
}

#[utoipa::path(
    delete,
    path = "/comments/{id}",
    tag = "comments",
    params(("id" = String, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment deleted"),
        (status = 404, description = "Comment not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_comment(State(state): State<AppState>, Path(id): Path<CommentId>, current_user: CurrentUser) -> Result<Json<ApiResponse<()>>> {
    let comment = state.moderation.owned_comment(current_user.id, id).await?;
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    Comments::new(&mut conn).delete(comment.id).await?;
    Ok(Json(ApiResponse::with_message((), "Comment deleted")))
}

/// Post the (optionally edited) reply to a pending comment
#[utoipa::path(
    post,
    path = "/comments/{id}/approve",
    tag = "comments",
    params(("id" = String, Path, description = "Comment ID")),
    request_body(content = ApproveRequest, description = "Optional replacement reply"),
    responses(
        (status = 200, description = "Reply posted, or already posted", body = CommentResponse),
        (status = 400, description = "Unsupported platform, missing reply text or no connected account"),
        (status = 502, description = "The platform rejected the reply"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn approve_comment(
    State(state): State<AppState>,
    Path(id): Path<CommentId>,
    current_user: CurrentUser,
    request: Option<Json<ApproveRequest>>,
) -> Result<Json<ApiResponse<CommentResponse>>> {
    let reply = request.and_then(|Json(r)| r.reply_text);
    let outcome = state.moderation.approve(current_user.id, id, reply).await?;
    Ok(Json(ApiResponse::with_message(outcome.comment.into(), outcome.message)))
}

#[utoipa::path(
    post,
    path = "/comments/{id}/decline",
    tag = "comments",
    params(("id" = String, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Declined, or already replied", body = CommentResponse),
        (status = 404, description = "Comment not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn decline_comment(
    State(state): State<AppState>,
    Path(id): Path<CommentId>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<CommentResponse>>> {
    let outcome = state.moderation.decline(current_user.id, id).await?;
    Ok(Json(ApiResponse::with_message(outcome.comment.into(), outcome.message)))
}

/// Re-classify a stored comment
#[utoipa::path(
    post,
    path = "/comments/{id}/analyze-sentiment",
    tag = "comments",
    params(("id" = String, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Updated classification", body = SentimentAnalysisResponse),
        (status = 404, description = "Comment not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn analyze_sentiment(
    State(state): State<AppState>,
    Path(id): Path<CommentId>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<SentimentAnalysisResponse>>> {
    let (comment, sentiment) = state.moderation.analyze_comment_sentiment(current_user.id, id).await?;
    Ok(Json(ApiResponse::ok(SentimentAnalysisResponse {
        comment: comment.into(),
        sentiment,
    })))
}
