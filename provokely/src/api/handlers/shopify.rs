use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::Value;
use tracing::info;
use url::Url;

use crate::{
    AppState,
    api::models::{
        envelope::ApiResponse,
        shopify::{JudgeMeAck, ListReviewsQuery, ReviewResponse, StoreCreate, StoreResponse},
        users::CurrentUser,
    },
    db::{
        errors::DbError,
        handlers::{Reviews, Stores, shopify::ReviewFilter},
        models::shopify::{ReviewUpsertDBRequest, StoreCreateDBRequest},
    },
    errors::{Error, Result},
    types::StoreId,
};

const SHOPIFY_SUFFIX: &str = ".myshopify.com";

/// `Brand`, `brand.myshopify.com` and `https://brand.myshopify.com/admin` all become
/// `brand.myshopify.com`. Bare names are read as the host of an `https` URL.
pub fn normalize_shop_domain(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let url = if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("https://{raw}"))
    }
    .ok()?;

    let host = url.host_str()?.trim_end_matches('.').to_lowercase();
    if host.is_empty() {
        return None;
    }
    if host.ends_with(SHOPIFY_SUFFIX) {
        Some(host)
    } else {
        Some(format!("{host}{SHOPIFY_SUFFIX}"))
    }
}

#[utoipa::path(
    get,
    path = "/shopify/stores",
    tag = "shopify",
    responses(
        (status = 200, description = "Connected stores", body = Vec<StoreResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_stores(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ApiResponse<Vec<StoreResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let stores = Stores::new(&mut conn).list_for_user(current_user.id).await?;
    Ok(Json(ApiResponse::ok(stores.into_iter().map(Into::into).collect())))
}

/// Connect a store with an Admin API token obtained by the client
#[utoipa::path(
    post,
    path = "/shopify/stores",
    tag = "shopify",
    request_body = StoreCreate,
    responses(
        (status = 201, description = "Store connected", body = StoreResponse),
        (status = 409, description = "Store already connected"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_store(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<StoreCreate>,
) -> Result<(StatusCode, Json<ApiResponse<StoreResponse>>)> {
    let shop_domain = normalize_shop_domain(&request.shop_domain).ok_or_else(|| Error::BadRequest {
        message: "shop_domain is required".to_string(),
    })?;
    if request.access_token.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "access_token is required".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let store = Stores::new(&mut conn)
        .create(&StoreCreateDBRequest {
            user_id: current_user.id,
            shop_domain,
            access_token: request.access_token,
            store_name: request.store_name,
        })
        .await?;

    info!(shop = %store.shop_domain, "Connected Shopify store");
    Ok((StatusCode::CREATED, Json(ApiResponse::with_message(store.into(), "Store connected"))))
}

#[utoipa::path(
    delete,
    path = "/shopify/stores/{id}",
    tag = "shopify",
    params(("id" = String, Path, description = "Store ID")),
    responses(
        (status = 204, description = "Store disconnected"),
        (status = 404, description = "Store not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_store(State(state): State<AppState>, Path(id): Path<StoreId>, current_user: CurrentUser) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    if Stores::new(&mut conn).delete(current_user.id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound {
            resource: "Store".to_string(),
            id: id.to_string(),
        })
    }
}

#[utoipa::path(
    get,
    path = "/shopify/reviews",
    tag = "shopify",
    params(ListReviewsQuery),
    responses(
        (status = 200, description = "Reviews across the caller's stores", body = Vec<ReviewResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ListReviewsQuery>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<ReviewResponse>>>> {
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let reviews = Reviews::new(&mut conn)
        .list(&ReviewFilter {
            user_id: current_user.id,
            store_id: query.store_id,
            skip,
            limit,
        })
        .await?;

    Ok(Json(ApiResponse::ok(reviews.into_iter().map(Into::into).collect())))
}

/// JudgeMe sends ids as numbers; anything scalar is accepted.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn bad_request(message: &str) -> Error {
    Error::BadRequest {
        message: message.to_string(),
    }
}

/// Store a review delivered by JudgeMe
#[utoipa::path(
    post,
    path = "/webhooks/judgeme",
    tag = "shopify",
    request_body(content = Object, description = "JudgeMe review webhook"),
    responses(
        (status = 200, description = "Review stored", body = JudgeMeAck),
        (status = 400, description = "Invalid JSON, no review data or no shop domain"),
        (status = 404, description = "Store not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn judgeme_webhook(State(state): State<AppState>, body: Bytes) -> Result<Json<JudgeMeAck>> {
    let payload: Value = serde_json::from_slice(&body).map_err(|_| bad_request("Invalid JSON"))?;

    let review = payload
        .get("review")
        .filter(|r| r.as_object().is_some_and(|o| !o.is_empty()))
        .ok_or_else(|| bad_request("No review data"))?;
    let product = payload.get("product");

    let shop_domain = payload
        .get("shop_domain")
        .and_then(Value::as_str)
        .and_then(normalize_shop_domain)
        .ok_or_else(|| bad_request("No shop domain"))?;
    let review_id = review.get("id").and_then(scalar_string).ok_or_else(|| bad_request("Review id is required"))?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let store = Stores::new(&mut conn)
        .get_by_domain(&shop_domain)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| Error::NotFound {
            resource: "Store".to_string(),
            id: shop_domain.clone(),
        })?;

    let text = |value: Option<&Value>, key: &str| value.and_then(|v| v.get(key)).and_then(Value::as_str).map(str::to_string);
    let stored = Reviews::new(&mut conn)
        .upsert(&ReviewUpsertDBRequest {
            store_id: store.id,
            review_id,
            rating: review.get("rating").and_then(Value::as_i64).unwrap_or(0),
            title: text(Some(review), "title"),
            body: text(Some(review), "body").unwrap_or_default(),
            reviewer_name: text(review.get("reviewer"), "name").unwrap_or_else(|| "Anonymous".to_string()),
            product_title: text(product, "title").unwrap_or_else(|| "Unknown Product".to_string()),
            product_image_url: text(product, "image"),
        })
        .await?;

    info!(shop = %store.shop_domain, review_id = %stored.review_id, rating = stored.rating, "Stored JudgeMe review");
    Ok(Json(JudgeMeAck {
        status: "received".to_string(),
        review_id: stored.review_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_app, create_test_store, create_test_user, session_token};
    use serde_json::json;
    use sqlx::SqlitePool;

    #[test]
    fn test_normalize_shop_domain() {
        assert_eq!(normalize_shop_domain("Brand").as_deref(), Some("brand.myshopify.com"));
        assert_eq!(normalize_shop_domain("brand.myshopify.com").as_deref(), Some("brand.myshopify.com"));
        assert_eq!(
            normalize_shop_domain("https://brand.myshopify.com/admin/apps").as_deref(),
            Some("brand.myshopify.com")
        );
        assert_eq!(
            normalize_shop_domain("HTTPS://Brand.myshopify.com").as_deref(),
            Some("brand.myshopify.com")
        );
        assert_eq!(normalize_shop_domain("brand.myshopify.com:443").as_deref(), Some("brand.myshopify.com"));
        assert_eq!(
            normalize_shop_domain("https://brand.myshopify.com?x=1").as_deref(),
            Some("brand.myshopify.com")
        );
        assert_eq!(normalize_shop_domain("http://brand:8080/admin").as_deref(), Some("brand.myshopify.com"));
        assert_eq!(normalize_shop_domain("  "), None);
        assert_eq!(normalize_shop_domain("https://"), None);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_connect_and_disconnect_store(pool: SqlitePool) {
        let user = create_test_user(&pool, "merchant").await;
        let token = session_token(&user);
        let server = create_test_app(pool);

        let response = server
            .post("/shopify/stores")
            .authorization_bearer(&token)
            .json(&json!({"shop_domain": "Brand", "access_token": "shpat_abc", "store_name": "Brand"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["data"]["shop_domain"], "brand.myshopify.com");
        assert!(body["data"].get("access_token").is_none());
        let id = body["data"]["id"].as_str().unwrap().to_string();

        server
            .post("/shopify/stores")
            .authorization_bearer(&token)
            .json(&json!({"shop_domain": "brand.myshopify.com", "access_token": "shpat_def"}))
            .await
            .assert_status(StatusCode::CONFLICT);

        let body: Value = server.get("/shopify/stores").authorization_bearer(&token).await.json();
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        server
            .delete(&format!("/shopify/stores/{id}"))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete(&format!("/shopify/stores/{id}"))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_judgeme_review_is_stored(pool: SqlitePool) {
        let user = create_test_user(&pool, "merchant").await;
        create_test_store(&pool, user.id, "brand.myshopify.com").await;
        let token = session_token(&user);
        let server = create_test_app(pool);

        let body: Value = server
            .post("/webhooks/judgeme")
            .json(&json!({
                "shop_domain": "brand.myshopify.com",
                "review": {"id": 991, "rating": 5, "body": "Fits perfectly"},
                "product": {"image": "https://cdn.example.com/p.png"}
            }))
            .await
            .json();
        assert_eq!(body, json!({"status": "received", "review_id": "991"}));

        let body: Value = server.get("/shopify/reviews").authorization_bearer(&token).await.json();
        let review = &body["data"][0];
        assert_eq!(review["reviewer_name"], "Anonymous");
        assert_eq!(review["product_title"], "Unknown Product");
        assert_eq!(review["rating"], 5);
    }

    #[sqlx::test]
    async fn test_judgeme_rejections(pool: SqlitePool) {
        let server = create_test_app(pool);

        let response = server.post("/webhooks/judgeme").text("{not json").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"]["message"], "Invalid JSON");

        let response = server.post("/webhooks/judgeme").json(&json!({"shop_domain": "brand"})).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"]["message"], "No review data");

        let response = server.post("/webhooks/judgeme").json(&json!({"review": {"id": 1}})).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"]["message"], "No shop domain");

        server
            .post("/webhooks/judgeme")
            .json(&json!({"shop_domain": "ghost.myshopify.com", "review": {"id": 1}}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
