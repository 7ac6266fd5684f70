//! API request/response models for connected Instagram accounts.
//!
//! Access tokens are write-only: they are accepted on create but never returned.

use crate::api::models::comments::ProcessedCommentResponse;
use crate::db::models::instagram::{InstagramAccountCreateDBRequest, InstagramAccountDBResponse};
use crate::moderation::SyncOutcome;
use crate::types::{InstagramAccountId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Connect an account with a token the client already obtained from Meta.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InstagramAccountCreate {
    pub username: String,
    pub instagram_user_id: String,
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Token lifetime in seconds
    pub expires_in: Option<i64>,
    pub profile_picture_url: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl InstagramAccountCreate {
    pub fn into_db(self, user_id: UserId) -> InstagramAccountCreateDBRequest {
        InstagramAccountCreateDBRequest {
            user_id,
            username: self.username,
            instagram_user_id: self.instagram_user_id,
            access_token: self.access_token,
            token_type: self.token_type,
            expires_in: self.expires_in,
            profile_picture_url: self.profile_picture_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InstagramAccountResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: InstagramAccountId,
    pub username: String,
    pub instagram_user_id: String,
    pub token_type: String,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub profile_picture_url: Option<String>,
    pub followers_count: i64,
    pub following_count: i64,
    pub media_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<InstagramAccountDBResponse> for InstagramAccountResponse {
    fn from(db: InstagramAccountDBResponse) -> Self {
        Self {
            token_expires_at: db.token_expires_at(),
            id: db.id,
            username: db.username,
            instagram_user_id: db.instagram_user_id,
            token_type: db.token_type,
            profile_picture_url: db.profile_picture_url,
            followers_count: db.followers_count,
            following_count: db.following_count,
            media_count: db.media_count,
            is_active: db.is_active,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SyncCommentsRequest {
    /// Instagram media id whose comments are fetched
    pub post_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SyncPostsResponse {
    pub fetched: usize,
    pub created: usize,
}

impl From<SyncOutcome> for SyncPostsResponse {
    fn from(outcome: SyncOutcome) -> Self {
        Self {
            fetched: outcome.fetched,
            created: outcome.created,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SyncCommentsResponse {
    pub processed: usize,
    pub created: usize,
    pub comments: Vec<ProcessedCommentResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountStatisticsResponse {
    pub username: String,
    pub followers_count: i64,
    pub following_count: i64,
    pub media_count: i64,
    pub posts_tracked: i64,
    pub comments_total: i64,
    pub pending_approval: i64,
    pub responses_posted: i64,
}

/// What the mobile app needs on launch.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MobileStatusResponse {
    pub connected: bool,
    pub account: Option<InstagramAccountResponse>,
    pub auto_comment_enabled: bool,
    pub unread_notifications: i64,
    pub pending_approvals: i64,
}
