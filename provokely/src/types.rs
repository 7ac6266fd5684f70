//! Common type definitions shared across the API, database and moderation layers.
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases for readability:
//!
//! - [`UserId`]: dashboard user account
//! - [`CommentId`], [`PostId`], [`NotificationId`]: moderated social content
//! - [`InstagramAccountId`], [`WebhookRecordId`]: connected Instagram accounts and their webhook log
//! - [`ApiUserId`], [`UsageLogId`]: hosted AI-proxy accounts and metering rows
//! - [`StoreId`], [`ReviewId`]: Shopify stores and JudgeMe reviews
//!
//! # Enumerations
//!
//! [`Platform`], [`SentimentLabel`], [`NuancedLabel`] and [`ResponseStyle`] are stored as lowercase
//! text and serialized the same way over the API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type CommentId = Uuid;
pub type PostId = Uuid;
pub type NotificationId = Uuid;
pub type InstagramAccountId = Uuid;
pub type WebhookRecordId = Uuid;
pub type ApiUserId = Uuid;
pub type UsageLogId = Uuid;
pub type StoreId = Uuid;
pub type ReviewId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Social platform a post or comment lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Facebook,
    Youtube,
    Twitter,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Youtube => "youtube",
            Platform::Twitter => "twitter",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instagram" => Ok(Platform::Instagram),
            "facebook" => Ok(Platform::Facebook),
            "youtube" => Ok(Platform::Youtube),
            "twitter" => Ok(Platform::Twitter),
            other => Err(format!("unknown platform '{other}'")),
        }
    }
}

/// Primary sentiment classification of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
    Hate,
}

impl SentimentLabel {
    pub const ALL: [SentimentLabel; 4] = [
        SentimentLabel::Positive,
        SentimentLabel::Negative,
        SentimentLabel::Neutral,
        SentimentLabel::Hate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Hate => "hate",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SentimentLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| format!("unknown sentiment label '{s}'"))
    }
}

/// Finer-grained intent detected alongside the primary label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NuancedLabel {
    Love,
    Appreciation,
    BuyingDesire,
    MoreLikeThisDesire,
    Resist,
    Complaint,
    Question,
    #[default]
    None,
}

impl NuancedLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NuancedLabel::Love => "love",
            NuancedLabel::Appreciation => "appreciation",
            NuancedLabel::BuyingDesire => "buying_desire",
            NuancedLabel::MoreLikeThisDesire => "more_like_this_desire",
            NuancedLabel::Resist => "resist",
            NuancedLabel::Complaint => "complaint",
            NuancedLabel::Question => "question",
            NuancedLabel::None => "none",
        }
    }
}

impl fmt::Display for NuancedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tone the account owner wants replies written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ResponseStyle {
    #[default]
    Professional,
    Casual,
    Controversial,
    Sarcastic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&uuid), "550e8400");
    }

    #[test]
    fn test_platform_parse_and_display() {
        assert_eq!("instagram".parse::<Platform>().unwrap(), Platform::Instagram);
        assert_eq!(Platform::Youtube.to_string(), "youtube");
        assert!("myspace".parse::<Platform>().is_err());
        assert_eq!("hate".parse::<SentimentLabel>().unwrap(), SentimentLabel::Hate);
    }

    #[test]
    fn test_labels_serialize_lowercase() {
        assert_eq!(serde_json::to_value(SentimentLabel::Hate).unwrap(), "hate");
        assert_eq!(serde_json::to_value(NuancedLabel::BuyingDesire).unwrap(), "buying_desire");
        assert_eq!(serde_json::to_value(ResponseStyle::Sarcastic).unwrap(), "sarcastic");
    }
}
