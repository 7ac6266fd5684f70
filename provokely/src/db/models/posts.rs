//! Database models for monitored social posts.

use crate::types::{Platform, PostId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct PostCreateDBRequest {
    pub user_id: UserId,
    pub platform: Platform,
    pub external_id: String,
    pub content: String,
    pub author: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PostDBResponse {
    pub id: PostId,
    pub user_id: UserId,
    pub platform: Platform,
    pub external_id: String,
    pub content: String,
    pub author: Option<String>,
    pub url: Option<String>,
    pub is_monitored: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
