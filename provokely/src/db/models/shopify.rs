//! Database models for Shopify stores and their JudgeMe reviews.

use crate::types::{ReviewId, StoreId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct StoreCreateDBRequest {
    pub user_id: UserId,
    pub shop_domain: String,
    pub access_token: String,
    pub store_name: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct StoreDBResponse {
    pub id: StoreId,
    pub user_id: UserId,
    pub shop_domain: String,
    pub access_token: String,
    pub store_name: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ReviewUpsertDBRequest {
    pub store_id: StoreId,
    pub review_id: String,
    pub rating: i64,
    pub title: Option<String>,
    pub body: String,
    pub reviewer_name: String,
    pub product_title: String,
    pub product_image_url: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ReviewDBResponse {
    pub id: ReviewId,
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
