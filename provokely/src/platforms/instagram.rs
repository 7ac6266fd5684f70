//! Meta Graph API client for Instagram business accounts.
//!
//! Every call takes the account's access token explicitly; tokens live on the
//! `instagram_accounts` rows and are refreshed by the moderation service before posting.

use crate::config::InstagramConfig;
use crate::db::models::instagram::InstagramAccountDBResponse;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

/// Media fetched per sync.
const MEDIA_PAGE_SIZE: u32 = 10;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Graph API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("invalid Graph API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub caption: Option<String>,
    pub media_type: Option<String>,
    pub permalink: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GraphComment {
    pub id: String,
    pub text: Option<String>,
    pub username: Option<String>,
    pub timestamp: Option<String>,
    pub media: Option<MediaRef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Profile {
    pub username: Option<String>,
    pub profile_picture_url: Option<String>,
    pub followers_count: Option<i64>,
    pub follows_count: Option<i64>,
    pub media_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExchangedToken {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DataPage<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ReplyCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: GraphErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GraphErrorDetail {
    message: String,
}

#[async_trait]
pub trait InstagramApi: Send + Sync {
    /// Recent media of an Instagram business user.
    async fn fetch_media(&self, instagram_user_id: &str, access_token: &str) -> Result<Vec<MediaItem>, PlatformError>;

    async fn fetch_comments(&self, media_id: &str, access_token: &str) -> Result<Vec<GraphComment>, PlatformError>;

    /// A single comment including the media it belongs to.
    async fn fetch_comment(&self, comment_id: &str, access_token: &str) -> Result<GraphComment, PlatformError>;

    async fn fetch_profile(&self, instagram_user_id: &str, access_token: &str) -> Result<Profile, PlatformError>;

    /// Reply under a comment. Returns the new reply's id.
    async fn reply_to_comment(&self, comment_id: &str, message: &str, access_token: &str) -> Result<String, PlatformError>;

    /// Re-exchange a long-lived token for a fresh one.
    async fn exchange_token(&self, access_token: &str) -> Result<ExchangedToken, PlatformError>;
}

/// True when the token expires within `margin` of `now`. Accounts without expiry data never refresh.
pub fn should_refresh_token(account: &InstagramAccountDBResponse, margin: std::time::Duration, now: DateTime<Utc>) -> bool {
    let Some(expires_at) = account.token_expires_at() else {
        return false;
    };
    let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::MAX);
    now.checked_add_signed(margin).is_none_or(|horizon| expires_at <= horizon)
}

/// reqwest-backed [`InstagramApi`].
pub struct GraphClient {
    client: Client,
    base_url: Url,
    version: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl GraphClient {
    pub fn new(config: &InstagramConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.graph_base_url.clone(),
            version: config.graph_version.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, PlatformError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{}/{path}", self.version))?)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PlatformError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GraphErrorBody>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        warn!(status = status.as_u16(), "Graph API request failed: {message}");
        Err(PlatformError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T, PlatformError> {
        let url = self.url(path)?;
        debug!("GET {}", url);
        let response = self.client.get(url).query(params).send().await?;
        Self::read(response).await
    }
}

#[async_trait]
impl InstagramApi for GraphClient {
    #[instrument(skip(self, access_token))]
    async fn fetch_media(&self, instagram_user_id: &str, access_token: &str) -> Result<Vec<MediaItem>, PlatformError> {
        let limit = MEDIA_PAGE_SIZE.to_string();
        let page: DataPage<MediaItem> = self
            .get(
                &format!("{instagram_user_id}/media"),
                &[
                    ("fields", "id,caption,media_type,permalink,timestamp"),
                    ("limit", &limit),
                    ("access_token", access_token),
                ],
            )
            .await?;
        Ok(page.data)
    }

    #[instrument(skip(self, access_token))]
    async fn fetch_comments(&self, media_id: &str, access_token: &str) -> Result<Vec<GraphComment>, PlatformError> {
        let page: DataPage<GraphComment> = self
            .get(
                &format!("{media_id}/comments"),
                &[("fields", "id,text,username,timestamp"), ("access_token", access_token)],
            )
            .await?;
        Ok(page.data)
    }

    #[instrument(skip(self, access_token))]
    async fn fetch_comment(&self, comment_id: &str, access_token: &str) -> Result<GraphComment, PlatformError> {
        self.get(comment_id, &[("fields", "id,text,username,media{id}"), ("access_token", access_token)])
            .await
    }

    #[instrument(skip(self, access_token))]
    async fn fetch_profile(&self, instagram_user_id: &str, access_token: &str) -> Result<Profile, PlatformError> {
        self.get(
            instagram_user_id,
            &[
                ("fields", "username,profile_picture_url,followers_count,follows_count,media_count"),
                ("access_token", access_token),
            ],
        )
        .await
    }

    #[instrument(skip(self, message, access_token))]
    async fn reply_to_comment(&self, comment_id: &str, message: &str, access_token: &str) -> Result<String, PlatformError> {
        let url = self.url(&format!("{comment_id}/replies"))?;
        let response = self
            .client
            .post(url)
            .form(&[("message", message), ("access_token", access_token)])
            .send()
            .await?;
        let created: ReplyCreated = Self::read(response).await?;
        Ok(created.id)
    }

    #[instrument(skip_all)]
    async fn exchange_token(&self, access_token: &str) -> Result<ExchangedToken, PlatformError> {
        let client_id = self.client_id.as_deref().ok_or(PlatformError::NotConfigured("instagram.client_id"))?;
        let client_secret = self
            .client_secret
            .as_deref()
            .ok_or(PlatformError::NotConfigured("instagram.client_secret"))?;

        self.get(
            "oauth/access_token",
            &[
                ("grant_type", "fb_exchange_token"),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("fb_exchange_token", access_token),
            ],
        )
        .await
    }
}
