//! API request/response models for Shopify stores and JudgeMe reviews.

use crate::api::models::pagination::Pagination;
use crate::db::models::shopify::{ReviewDBResponse, StoreDBResponse};
use crate::types::{ReviewId, StoreId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoreCreate {
    /// Bare shop name or any `*.myshopify.com` form
    pub shop_domain: String,
    pub access_token: String,
    pub store_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoreResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: StoreId,
    pub shop_domain: String,
    pub store_name: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<StoreDBResponse> for StoreResponse {
    fn from(db: StoreDBResponse) -> Self {
        Self {
            id: db.id,
            shop_domain: db.shop_domain,
            store_name: db.store_name,
            logo_url: db.logo_url,
            primary_color: db.primary_color,
            is_active: db.is_active,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ReviewId,
    #[schema(value_type = String, format = "uuid")]
    pub store_id: StoreId,
    pub review_id: String,
    pub rating: i64,
    pub title: Option<String>,
    pub body: String,
    pub reviewer_name: String,
    pub product_title: String,
    pub product_image_url: Option<String>,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ReviewDBResponse> for ReviewResponse {
    fn from(db: ReviewDBResponse) -> Self {
        Self {
            id: db.id,
            store_id: db.store_id,
            review_id: db.review_id,
            rating: db.rating,
            title: db.title,
            body: db.body,
            reviewer_name: db.reviewer_name,
            product_title: db.product_title,
            product_image_url: db.product_image_url,
            processed: db.processed,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JudgeMeAck {
    pub status: String,
    pub review_id: String,
}

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListReviewsQuery {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<String>, format = "uuid")]
    pub store_id: Option<StoreId>,

    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}
