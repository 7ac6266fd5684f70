//! Database models for connected Instagram accounts and their webhook log.

use crate::types::{InstagramAccountId, UserId, WebhookRecordId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::types::Json;

#[derive(Debug, Clone)]
pub struct InstagramAccountCreateDBRequest {
    pub user_id: UserId,
    pub username: String,
    pub instagram_user_id: String,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Option<i64>,
    pub profile_picture_url: Option<String>,
}

/// Partial update; `None` leaves the column unchanged. A new `access_token` restarts the token clock.
#[derive(Debug, Clone, Default)]
pub struct InstagramAccountUpdateDBRequest {
    pub username: Option<String>,
    pub access_token: Option<String>,
    pub expires_in: Option<i64>,
    pub profile_picture_url: Option<String>,
    pub followers_count: Option<i64>,
    pub following_count: Option<i64>,
    pub media_count: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, FromRow)]
pub struct InstagramAccountDBResponse {
    pub id: InstagramAccountId,
    pub user_id: UserId,
    pub username: String,
    pub instagram_user_id: String,
    pub access_token: String,
    pub token_type: String,
    /// Token lifetime in seconds, counted from `token_created_at`
    pub expires_in: Option<i64>,
    pub token_created_at: Option<DateTime<Utc>>,
    pub profile_picture_url: Option<String>,
    pub followers_count: i64,
    pub following_count: i64,
    pub media_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstagramAccountDBResponse {
    pub fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        let created = self.token_created_at?;
        let expires_in = self.expires_in?;
        Some(created + chrono::Duration::seconds(expires_in))
    }
}

#[derive(Debug, Clone)]
pub struct WebhookRecordCreateDBRequest {
    pub webhook_id: String,
    pub account_id: InstagramAccountId,
    pub event_type: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, FromRow)]
pub struct WebhookRecordDBResponse {
    pub id: WebhookRecordId,
    pub webhook_id: String,
    pub account_id: InstagramAccountId,
    pub event_type: String,
    pub payload: Json<serde_json::Value>,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}
