//! API request/response models for per-user moderation settings.

use crate::db::models::settings::{SettingsUpdateDBRequest, UserSettings};
use crate::types::ResponseStyle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingsResponse {
    pub auto_comment_enabled: bool,
    pub require_approval_for_hate: bool,
    pub require_approval_for_negative: bool,
    pub auto_respond_to_positive: bool,
    pub auto_respond_to_negative: bool,
    pub auto_respond_to_hate: bool,
    pub response_style: ResponseStyle,
    pub notify_on_positive: bool,
    pub notify_on_negative: bool,
    pub notify_on_hate: bool,
    pub notify_on_neutral: bool,
    pub notify_on_purchase_intent: bool,
    pub notify_on_question: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<UserSettings> for SettingsResponse {
    fn from(db: UserSettings) -> Self {
        Self {
            auto_comment_enabled: db.auto_comment_enabled,
            require_approval_for_hate: db.require_approval_for_hate,
            require_approval_for_negative: db.require_approval_for_negative,
            auto_respond_to_positive: db.auto_respond_to_positive,
            auto_respond_to_negative: db.auto_respond_to_negative,
            auto_respond_to_hate: db.auto_respond_to_hate,
            response_style: db.response_style,
            notify_on_positive: db.notify_on_positive,
            notify_on_negative: db.notify_on_negative,
            notify_on_hate: db.notify_on_hate,
            notify_on_neutral: db.notify_on_neutral,
            notify_on_purchase_intent: db.notify_on_purchase_intent,
            notify_on_question: db.notify_on_question,
            updated_at: db.updated_at,
        }
    }
}

/// Partial update; omitted fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SettingsUpdate {
    pub auto_comment_enabled: Option<bool>,
    pub require_approval_for_hate: Option<bool>,
    pub require_approval_for_negative: Option<bool>,
    pub auto_respond_to_positive: Option<bool>,
    pub auto_respond_to_negative: Option<bool>,
    pub auto_respond_to_hate: Option<bool>,
    pub response_style: Option<ResponseStyle>,
    pub notify_on_positive: Option<bool>,
    pub notify_on_negative: Option<bool>,
    pub notify_on_hate: Option<bool>,
    pub notify_on_neutral: Option<bool>,
    pub notify_on_purchase_intent: Option<bool>,
    pub notify_on_question: Option<bool>,
}

impl From<SettingsUpdate> for SettingsUpdateDBRequest {
    fn from(update: SettingsUpdate) -> Self {
        Self {
            auto_comment_enabled: update.auto_comment_enabled,
            require_approval_for_hate: update.require_approval_for_hate,
            require_approval_for_negative: update.require_approval_for_negative,
            auto_respond_to_positive: update.auto_respond_to_positive,
            auto_respond_to_negative: update.auto_respond_to_negative,
            auto_respond_to_hate: update.auto_respond_to_hate,
            response_style: update.response_style,
            notify_on_positive: update.notify_on_positive,
            notify_on_negative: update.notify_on_negative,
            notify_on_hate: update.notify_on_hate,
            notify_on_neutral: update.notify_on_neutral,
            notify_on_purchase_intent: update.notify_on_purchase_intent,
            notify_on_question: update.notify_on_question,
        }
    }
}
