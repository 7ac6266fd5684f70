//! API request/response models for monitored posts.

use crate::api::models::pagination::Pagination;
use crate::db::models::posts::PostDBResponse;
use crate::types::{Platform, PostId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PostId,
    pub platform: Platform,
    pub external_id: String,
    pub content: String,
    pub author: Option<String>,
    pub url: Option<String>,
    pub is_monitored: bool,
    pub created_at: DateTime<Utc>,
}

impl From<PostDBResponse> for PostResponse {
    fn from(db: PostDBResponse) -> Self {
        Self {
            id: db.id,
            platform: db.platform,
            external_id: db.external_id,
            content: db.content,
            author: db.author,
            url: db.url,
            is_monitored: db.is_monitored,
            created_at: db.created_at,
        }
    }
}

/// Register a post; an existing `(platform, external_id)` is returned unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostCreate {
    pub platform: Platform,
    pub external_id: String,
    #[serde(default)]
    pub content: String,
    pub author: Option<String>,
    pub url: Option<String>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListPostsQuery {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<Platform>)]
    pub platform: Option<Platform>,

    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlatformCount {
    pub platform: Platform,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostStatisticsResponse {
    pub total: i64,
    pub by_platform: Vec<PlatformCount>,
}
