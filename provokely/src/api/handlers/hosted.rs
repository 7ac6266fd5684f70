//! Hosted AI-proxy API used by the browser extension and SaaS validator.
//!
//! Accounts are keyed by email only; the JWT from `POST /api/auth` is the sole credential.

use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    api::models::{
        envelope::ApiResponse,
        hosted::{
            AiRequest, AiResponse, HostedAccountResponse, HostedAuthRequest, HostedAuthResponse, SubscriptionStatusQuery,
            SubscriptionStatusResponse, UsageLogResponse,
        },
        pagination::{PaginatedResponse, Pagination},
    },
    auth::{current_user::HostedUser, hosted::create_hosted_token},
    billing::{self, GenerationRequest},
    db::{errors::DbError, handlers::ApiUsers},
    errors::{Error, Result},
};

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::BadRequest {
            message: "A valid email is required".to_string(),
        });
    }
    Ok(email)
}

/// Sign in with an email, creating a free account on first use
#[utoipa::path(
    post,
    path = "/api/auth",
    tag = "hosted",
    request_body = HostedAuthRequest,
    responses(
        (status = 200, description = "Token issued", body = HostedAuthResponse),
        (status = 400, description = "Invalid email"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn hosted_auth(State(state): State<AppState>, Json(request): Json<HostedAuthRequest>) -> Result<Json<ApiResponse<HostedAuthResponse>>> {
    let email = normalize_email(&request.email)?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let user = ApiUsers::new(&mut conn).get_or_create(&email, state.config.hosted.free_projects).await?;
    let token = create_hosted_token(&user, &state.config)?;

    Ok(Json(ApiResponse::ok(HostedAuthResponse {
        token,
        user: HostedAccountResponse::from(user),
    })))
}

/// Proxy one prompt to the chat model and meter it
#[utoipa::path(
    post,
    path = "/api/ai",
    tag = "hosted",
    request_body = AiRequest,
    responses(
        (status = 200, description = "Model response", body = AiResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Email mismatch or no projects remaining"),
        (status = 502, description = "Model request failed"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn generate(
    State(state): State<AppState>,
    HostedUser(user): HostedUser,
    Json(request): Json<AiRequest>,
) -> Result<Json<ApiResponse<AiResponse>>> {
    if request.prompt.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "prompt is required".to_string(),
        });
    }

    let generation = billing::generate(
        &state.db,
        state.llm.as_deref(),
        &state.config.hosted,
        &user,
        GenerationRequest {
            prompt: request.prompt,
            email: request.email,
            is_new_project: request.is_new_project,
            model: request.options.model,
            max_tokens: request.options.max_tokens,
        },
    )
    .await?;

    Ok(Json(ApiResponse::ok(AiResponse {
        response: generation.response,
        tokens_used: generation.tokens_used,
        cost: generation.cost,
    })))
}

#[utoipa::path(
    get,
    path = "/api/subscription-status",
    tag = "hosted",
    params(SubscriptionStatusQuery),
    responses(
        (status = 200, description = "Plan and remaining projects", body = SubscriptionStatusResponse),
        (status = 404, description = "No account for this email"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn subscription_status(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionStatusQuery>,
) -> Result<Json<ApiResponse<SubscriptionStatusResponse>>> {
    let email = normalize_email(&query.email)?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let user = ApiUsers::new(&mut conn)
        .get_by_email(&email)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Account".to_string(),
            id: email,
        })?;

    Ok(Json(ApiResponse::ok(SubscriptionStatusResponse {
        is_pro: user.is_pro,
        projects_remaining: user.projects_remaining,
    })))
}

/// The caller's usage log, newest first
#[utoipa::path(
    get,
    path = "/api/usage",
    tag = "hosted",
    params(Pagination),
    responses(
        (status = 200, description = "Page of usage entries", body = PaginatedResponse<UsageLogResponse>),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_usage(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    HostedUser(user): HostedUser,
) -> Result<Json<ApiResponse<PaginatedResponse<UsageLogResponse>>>> {
    let (skip, limit) = pagination.params();
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut repo = ApiUsers::new(&mut conn);
    let entries = repo.list_usage(user.id, skip, limit).await?;
    let total = repo.count_usage(user.id).await?;

    Ok(Json(ApiResponse::ok(PaginatedResponse::new(
        entries.into_iter().map(Into::into).collect(),
        total,
        skip,
        limit,
    ))))
}
