//! Database models for the per-user comment inbox.

use crate::types::{NotificationId, Platform, SentimentLabel, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Upserted on `(user_id, platform, external_id)`. Updates reset `is_read`.
#[derive(Debug, Clone)]
pub struct NotificationUpsertDBRequest {
    pub user_id: UserId,
    pub platform: Platform,
    pub external_id: String,
    pub media_id: Option<String>,
    pub comment_text: String,
    pub sentiment_label: Option<SentimentLabel>,
    pub needs_approval: bool,
    pub ai_response: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct NotificationDBResponse {
    pub id: NotificationId,
    pub user_id: UserId,
    pub platform: Platform,
    pub external_id: String,
    pub media_id: Option<String>,
    pub comment_text: String,
    pub sentiment_label: Option<SentimentLabel>,
    pub needs_approval: bool,
    pub ai_response: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
