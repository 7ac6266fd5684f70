//! API request/response models for comments and the approval queue.

use crate::api::models::pagination::Pagination;
use crate::db::handlers::comments::CommentStatistics;
use crate::db::models::comments::{CommentDBResponse, CommentState};
use crate::moderation::ProcessedComment;
use crate::moderation::sentiment::SentimentResult;
use crate::types::{CommentId, NuancedLabel, Platform, SentimentLabel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CommentId,
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
    pub state: CommentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CommentDBResponse> for CommentResponse {
    fn from(db: CommentDBResponse) -> Self {
        let state = db.state();
        Self {
            id: db.id,
            platform: db.platform,
            external_id: db.external_id,
            post_external_id: db.post_external_id,
            content: db.content,
            sentiment_score: db.sentiment_score,
            sentiment_label: db.sentiment_label,
            nuanced_label: db.nuanced_label,
            ai_response: db.ai_response,
            response_posted: db.response_posted,
            requires_approval: db.requires_approval,
            approved: db.approved,
            state,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Submit a comment to the moderation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentCreate {
    pub platform: Platform,
    pub external_id: String,
    pub post_external_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessedCommentResponse {
    pub comment: CommentResponse,
    pub sentiment: SentimentResult,
    pub ai_response: Option<String>,
    pub requires_approval: bool,
    pub created: bool,
}

impl From<ProcessedComment> for ProcessedCommentResponse {
    fn from(processed: ProcessedComment) -> Self {
        Self {
            comment: processed.comment.into(),
            sentiment: processed.sentiment,
            ai_response: processed.ai_response,
            requires_approval: processed.requires_approval,
            created: processed.created,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ApproveRequest {
    /// Replaces the generated reply when given
    pub reply_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SentimentAnalysisResponse {
    pub comment: CommentResponse,
    pub sentiment: SentimentResult,
}

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListCommentsQuery {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<Platform>)]
    pub platform: Option<Platform>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<SentimentLabel>)]
    pub sentiment_label: Option<SentimentLabel>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub response_posted: Option<bool>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub requires_approval: Option<bool>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub approved: Option<bool>,

    /// Only comments created at or after this RFC 3339 timestamp
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<String>, format = DateTime)]
    pub since: Option<DateTime<Utc>>,

    /// Case-insensitive substring of the comment text
    pub search: Option<String>,

    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentStatisticsResponse {
    pub total: i64,
    pub positive: i64,
    pub negative: i64,
    pub neutral: i64,
    pub hate: i64,
    pub unanalyzed: i64,
    pub pending_approval: i64,
    pub responses_posted: i64,
}

impl From<CommentStatistics> for CommentStatisticsResponse {
    fn from(stats: CommentStatistics) -> Self {
        Self {
            total: stats.total,
            positive: stats.positive,
            negative: stats.negative,
            neutral: stats.neutral,
            hate: stats.hate,
            unanalyzed: stats.unanalyzed,
            pending_approval: stats.pending_approval,
            responses_posted: stats.responses_posted,
        }
    }
}
