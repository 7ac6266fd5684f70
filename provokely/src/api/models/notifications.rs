//! API request/response models for the notification inbox.

use crate::api::models::pagination::Pagination;
use crate::db::models::notifications::NotificationDBResponse;
use crate::types::{NotificationId, Platform, SentimentLabel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: NotificationId,
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

impl From<NotificationDBResponse> for NotificationResponse {
    fn from(db: NotificationDBResponse) -> Self {
        Self {
            id: db.id,
            platform: db.platform,
            external_id: db.external_id,
            media_id: db.media_id,
            comment_text: db.comment_text,
            sentiment_label: db.sentiment_label,
            needs_approval: db.needs_approval,
            ai_response: db.ai_response,
            is_read: db.is_read,
            created_at: db.created_at,
        }
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListNotificationsQuery {
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub is_read: Option<bool>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub needs_approval: Option<bool>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<Platform>)]
    pub platform: Option<Platform>,

    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}
