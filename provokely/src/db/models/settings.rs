//! Database models for per-user moderation settings.

use crate::types::{ResponseStyle, SentimentLabel, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// One row per user, created lazily with the column defaults.
#[derive(Debug, Clone, FromRow)]
pub struct UserSettings {
    pub user_id: UserId,
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserSettings {
    /// Whether replies are generated for comments with this label. Neutral comments never get one.
    pub fn auto_respond_to(&self, label: SentimentLabel) -> bool {
        match label {
            SentimentLabel::Positive => self.auto_respond_to_positive,
            SentimentLabel::Negative => self.auto_respond_to_negative,
            SentimentLabel::Hate => self.auto_respond_to_hate,
            SentimentLabel::Neutral => false,
        }
    }

    /// Approval toggles exist only for negative and hate comments.
    pub fn require_approval_for(&self, label: SentimentLabel) -> bool {
        match label {
            SentimentLabel::Negative => self.require_approval_for_negative,
            SentimentLabel::Hate => self.require_approval_for_hate,
            SentimentLabel::Positive | SentimentLabel::Neutral => false,
        }
    }

    pub fn notify_on(&self, label: SentimentLabel) -> bool {
        match label {
            SentimentLabel::Positive => self.notify_on_positive,
            SentimentLabel::Negative => self.notify_on_negative,
            SentimentLabel::Hate => self.notify_on_hate,
            SentimentLabel::Neutral => self.notify_on_neutral,
        }
    }
}

/// Partial update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdateDBRequest {
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
