//! API request and response models for Instagram webhook endpoints.

use crate::api::models::pagination::Pagination;
use crate::db::models::instagram::WebhookRecordDBResponse;
use crate::types::{InstagramAccountId, WebhookRecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Meta's subscription handshake parameters.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct WebhookVerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,

    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,

    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookReceivedResponse {
    /// Number of deliveries stored for the first time
    pub created: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookRecordResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: WebhookRecordId,
    pub webhook_id: String,
    #[schema(value_type = String, format = "uuid")]
    pub account_id: InstagramAccountId,
    pub event_type: String,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<WebhookRecordDBResponse> for WebhookRecordResponse {
    fn from(db: WebhookRecordDBResponse) -> Self {
        Self {
            id: db.id,
            webhook_id: db.webhook_id,
            account_id: db.account_id,
            event_type: db.event_type,
            payload: db.payload.0,
            processed: db.processed,
            created_at: db.created_at,
        }
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListWebhookRecordsQuery {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<String>, format = "uuid")]
    pub account_id: Option<InstagramAccountId>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub processed: Option<bool>,

    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}
