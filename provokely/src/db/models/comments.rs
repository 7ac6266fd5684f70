//! Database models for ingested comments.

use crate::types::{CommentId, NuancedLabel, Platform, SentimentLabel, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Moderation state derived from the comment's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommentState {
    /// No reply generated
    Unprocessed,
    /// Reply generated (and possibly posted) without review
    Responded,
    PendingApproval,
    ApprovedAndPosted,
    Declined,
}

/// Inserted on first sight of `(platform, external_id)`, overwritten on replay.
#[derive(Debug, Clone)]
pub struct CommentUpsertDBRequest {
    pub user_id: UserId,
    pub platform: Platform,
    pub external_id: String,
    pub post_external_id: Option<String>,
    pub content: String,
    pub sentiment_score: Option<f64>,
    pub sentiment_label: Option<SentimentLabel>,
    pub nuanced_label: Option<NuancedLabel>,
    pub ai_response: Option<String>,
    pub response_posted: bool,
    pub requires_approval: bool,
}

/// Partial update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct CommentUpdateDBRequest {
    pub sentiment_score: Option<f64>,
    pub sentiment_label: Option<SentimentLabel>,
    pub nuanced_label: Option<NuancedLabel>,
    pub ai_response: Option<String>,
    pub response_posted: Option<bool>,
    pub requires_approval: Option<bool>,
    pub approved: Option<bool>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CommentDBResponse {
    pub id: CommentId,
    pub user_id: UserId,
    pub platform: Platform,
    pub external_id: String,
    pub post_external_id: Option<String>,
    pub content: String,
    pub sentiment_score: Option<f64>,
    pub sentiment_label: Option<SentimentLabel>,
    pub nuanced_label: Option<NuancedLabel>,
    pub ai_response: Option<String>,
    pub response_posted: bool,
    pub requires_approval: bool,
    pub approved: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommentDBResponse {
    pub fn state(&self) -> CommentState {
        match (self.approved, self.response_posted, self.requires_approval) {
            (Some(true), true, _) => CommentState::ApprovedAndPosted,
            (Some(false), _, _) => CommentState::Declined,
            (_, _, true) => CommentState::PendingApproval,
            _ if self.ai_response.is_some() => CommentState::Responded,
            _ => CommentState::Unprocessed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn comment() -> CommentDBResponse {
        CommentDBResponse {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            platform: Platform::Instagram,
            external_id: "c1".to_string(),
            post_external_id: None,
            content: "hi".to_string(),
            sentiment_score: None,
            sentiment_label: None,
            nuanced_label: None,
            ai_response: None,
            response_posted: false,
            requires_approval: false,
            approved: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_state_from_flags() {
        let mut c = comment();
        assert_eq!(c.state(), CommentState::Unprocessed);

        c.ai_response = Some("thanks".to_string());
        assert_eq!(c.state(), CommentState::Responded);

        c.requires_approval = true;
        assert_eq!(c.state(), CommentState::PendingApproval);

        c.requires_approval = false;
        c.approved = Some(false);
        assert_eq!(c.state(), CommentState::Declined);

        c.approved = Some(true);
        c.response_posted = true;
        assert_eq!(c.state(), CommentState::ApprovedAndPosted);
    }
}
