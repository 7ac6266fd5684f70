//! Fixtures shared by unit and HTTP-level tests.
//!
//! Database fixtures take the pool handed out by `#[sqlx::test]`. [`ScriptedChat`] and
//! [`FakeInstagram`] stand in for the OpenAI and Graph clients so the moderation pipeline runs
//! without network access.

use crate::api::models::users::{CurrentUser, UserResponse};
use crate::config::{Config, DatabaseConfig, PoolSettings};
use crate::db::handlers::{InstagramAccounts, Repository, Stores, Users};
use crate::db::models::{
    instagram::{InstagramAccountCreateDBRequest, InstagramAccountDBResponse},
    shopify::{StoreCreateDBRequest, StoreDBResponse},
    users::{UserCreateDBRequest, UserDBResponse},
};
use crate::llm::{ChatClient, ChatCompletion, ChatRequest, LlmError};
use crate::moderation::ModerationService;
use crate::notifications::NotificationHub;
use crate::platforms::{ExchangedToken, GraphComment, InstagramApi, MediaItem, PlatformError, Profile};
use crate::platforms::instagram::MediaRef;
use crate::types::UserId;
use crate::{AppState, Application};
use async_trait::async_trait;
use axum_test::TestServer;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub fn create_test_config() -> Config {
    let mut config = Config {
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            pool: PoolSettings {
                max_connections: 1,
                min_connections: 0,
                ..Default::default()
            },
        },
        port: 0,
        ..Default::default()
    };
    // axum-test talks plain HTTP
    config.auth.session.cookie_secure = false;
    config
}

pub fn create_test_state_with(pool: SqlitePool, llm: Option<Arc<dyn ChatClient>>, instagram: Arc<dyn InstagramApi>) -> AppState {
    let config = create_test_config();
    let moderation = ModerationService::new(pool.clone(), &config, llm.clone(), instagram, NotificationHub::new());

    AppState::builder()
        .db(pool)
        .config(config)
        .moderation(moderation)
        .maybe_llm(llm)
        .shutdown(CancellationToken::new())
        .build()
}

pub fn create_test_state(pool: SqlitePool) -> AppState {
    create_test_state_with(pool, None, Arc::new(FakeInstagram::default()))
}

/// Full router over `state`, served in-process.
pub fn create_test_server(state: AppState) -> TestServer {
    Application::from_state(state)
        .expect("Failed to build router")
        .into_test_server()
}

pub fn create_test_app(pool: SqlitePool) -> TestServer {
    create_test_server(create_test_state(pool))
}

pub async fn create_test_user(pool: &SqlitePool, username: &str) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: None,
            is_admin: false,
        })
        .await
        .expect("Failed to create test user")
}

/// Session JWT for a dashboard user, signed with the test secret.
pub fn session_token(user: &UserDBResponse) -> String {
    let current = CurrentUser::from(UserResponse::from(user.clone()));
    crate::auth::session::create_session_token(&current, &create_test_config()).expect("Failed to sign session token")
}

pub async fn create_test_instagram_account(pool: &SqlitePool, user_id: UserId, instagram_user_id: &str) -> InstagramAccountDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    InstagramAccounts::new(&mut conn)
        .create(&InstagramAccountCreateDBRequest {
            user_id,
            username: format!("ig_{instagram_user_id}"),
            instagram_user_id: instagram_user_id.to_string(),
            access_token: "test-access-token".to_string(),
            token_type: "bearer".to_string(),
            expires_in: Some(60 * 24 * 60 * 60),
            profile_picture_url: None,
        })
        .await
        .expect("Failed to create test Instagram account")
}

pub async fn create_test_store(pool: &SqlitePool, user_id: UserId, shop_domain: &str) -> StoreDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Stores::new(&mut conn)
        .create(&StoreCreateDBRequest {
            user_id,
            shop_domain: shop_domain.to_string(),
            access_token: "shpat_test".to_string(),
            store_name: Some("Test Store".to_string()),
        })
        .await
        .expect("Failed to create test store")
}

/// Chat client that answers every request with the same completion, or fails.
#[derive(Default)]
pub struct ScriptedChat {
    reply: Option<String>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            requests: Mutex::default(),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, LlmError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        match &self.reply {
            Some(content) => Ok(ChatCompletion {
                content: content.clone(),
                total_tokens: 42,
                model,
            }),
            None => Err(LlmError::Api {
                status: 500,
                body: "scripted failure".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedReply {
    pub comment_id: String,
    pub message: String,
    pub access_token: String,
}

/// In-memory Graph API: serves fixed media and comments and records posted replies.
#[derive(Default)]
pub struct FakeInstagram {
    pub media: Vec<MediaItem>,
    pub comments: Vec<GraphComment>,
    pub fail_replies: bool,
    /// Token handed out by `exchange_token`; `None` makes the exchange fail
    pub refreshed_token: Option<String>,
    pub posted: Mutex<Vec<PostedReply>>,
}

impl FakeInstagram {
    pub fn replies(&self) -> Vec<PostedReply> {
        self.posted.lock().unwrap().clone()
    }
}

fn not_found(what: &str) -> PlatformError {
    PlatformError::Api {
        status: 404,
        message: format!("{what} does not exist"),
    }
}

#[async_trait]
impl InstagramApi for FakeInstagram {
    async fn fetch_media(&self, _instagram_user_id: &str, _access_token: &str) -> Result<Vec<MediaItem>, PlatformError> {
        Ok(self.media.clone())
    }

    async fn fetch_comments(&self, media_id: &str, _access_token: &str) -> Result<Vec<GraphComment>, PlatformError> {
        Ok(self
            .comments
            .iter()
            .filter(|c| c.media.as_ref().is_none_or(|m| m.id == media_id))
            .cloned()
            .collect())
    }

    async fn fetch_comment(&self, comment_id: &str, _access_token: &str) -> Result<GraphComment, PlatformError> {
        self.comments
            .iter()
            .find(|c| c.id == comment_id)
            .cloned()
            .ok_or_else(|| not_found("Comment"))
    }

    async fn fetch_profile(&self, instagram_user_id: &str, _access_token: &str) -> Result<Profile, PlatformError> {
        Ok(Profile {
            username: Some(format!("ig_{instagram_user_id}")),
            profile_picture_url: None,
            followers_count: Some(120),
            follows_count: Some(80),
            media_count: Some(self.media.len() as i64),
        })
    }

    async fn reply_to_comment(&self, comment_id: &str, message: &str, access_token: &str) -> Result<String, PlatformError> {
        if self.fail_replies {
            return Err(PlatformError::Api {
                status: 400,
                message: "Reply rejected".to_string(),
            });
        }
        let mut posted = self.posted.lock().unwrap();
        posted.push(PostedReply {
            comment_id: comment_id.to_string(),
            message: message.to_string(),
            access_token: access_token.to_string(),
        });
        Ok(format!("reply-{}", posted.len()))
    }

    async fn exchange_token(&self, _access_token: &str) -> Result<ExchangedToken, PlatformError> {
        self.refreshed_token
            .clone()
            .map(|access_token| ExchangedToken {
                access_token,
                token_type: Some("bearer".to_string()),
                expires_in: Some(60 * 24 * 60 * 60),
            })
            .ok_or(PlatformError::NotConfigured("instagram.client_id"))
    }
}

pub fn graph_comment(id: &str, text: &str, media_id: &str) -> GraphComment {
    GraphComment {
        id: id.to_string(),
        text: Some(text.to_string()),
        username: Some("commenter".to_string()),
        timestamp: None,
        media: Some(MediaRef { id: media_id.to_string() }),
    }
}
