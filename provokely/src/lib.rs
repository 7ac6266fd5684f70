//! # provokely: comment moderation and auto-reply for social accounts
//!
//! `provokely` ingests comments from connected platforms (Instagram via the Graph API, Shopify
//! product reviews via Judge.me webhooks, and comments submitted directly over the API), scores
//! their sentiment, and either replies automatically or queues them for a human decision. It
//! also meters a small hosted text-generation API with per-user project allowances.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum); persistence is SQLite through
//! sqlx. Handlers stay thin: anything that touches more than one table or calls out to a
//! platform lives in [`moderation::ModerationService`] or [`billing`].
//!
//! ### Comment flow
//!
//! 1. A comment arrives (webhook delivery, sync from the Graph API, or `POST /comments`)
//! 2. It is stored idempotently, keyed on `(platform, external_id)`
//! 3. The sentiment analyzer classifies it, using the configured LLM or a keyword fallback
//! 4. Depending on the user's [settings](db::models::settings), a reply is generated and either
//!    posted to the platform or held for approval
//! 5. Negative comments and pending approvals raise notifications, which are pushed to open
//!    `/notifications/stream` connections
//!
//! ## Configuration
//!
//! Loaded from a YAML file with `PROVOKELY_`-prefixed environment overrides. See [`config`].
//!
//! ## Getting started
//!
//! ```no_run
//! use provokely::{Application, Config, telemetry};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::default();
//! telemetry::init_telemetry(config.enable_otel_export)?;
//! Application::new(config).await?.serve(std::future::pending()).await
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod billing;
pub mod config;
pub mod db;
pub mod errors;
pub mod llm;
pub mod moderation;
pub mod notifications;
mod openapi;
pub mod platforms;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::config::CorsOrigin;
use crate::llm::{ChatClient, OpenAiClient};
use crate::moderation::ModerationService;
use crate::notifications::NotificationHub;
use crate::openapi::ApiDoc;
use crate::platforms::GraphClient;
use axum::{
    Json, Router, http,
    http::HeaderValue,
    routing::{delete, get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::UserId;

/// State shared by every handler.
///
/// `llm` is `None` when no OpenAI key is configured; the moderation service then runs on its
/// rule-based fallbacks and `/api/ai` answers with an upstream error. Cancelling `shutdown`
/// closes open notification streams.
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .moderation(moderation)
///     .shutdown(CancellationToken::new())
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub moderation: ModerationService,
    pub llm: Option<Arc<dyn ChatClient>>,
    pub shutdown: CancellationToken,
}

/// Get the provokely database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Open the SQLite pool and bring the schema up to date.
async fn setup_database(config: &Config) -> anyhow::Result<SqlitePool> {
    let settings = &config.database.pool;
    let options = SqliteConnectOptions::from_str(&config.database.url)?
        .create_if_missing(true)
        .busy_timeout(settings.busy_timeout)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect_with(options)
        .await?;

    migrator().run(&pool).await?;
    info!("Database ready");

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.cors;
    let allow_origin = if cors_config.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(cors_config.allow_credentials)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::DELETE,
            http::Method::OPTIONS,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// Layers, outermost first: tracing, optional Prometheus metrics, CORS.
///
/// # Errors
///
/// Returns an error if an allowed CORS origin is not a valid header value.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers::{auth, comments, hosted, instagram, notifications, posts, settings, shopify, webhooks};

    let auth_routes = Router::new()
        .route("/authentication/register", post(auth::register))
        .route("/authentication/login", post(auth::login))
        .route("/authentication/logout", post(auth::logout))
        .route("/authentication/me", get(auth::me));

    let moderation_routes = Router::new()
        // Comments
        .route("/comments", get(comments::list_comments).post(comments::create_comment))
        .route("/comments/pending", get(comments::pending_approvals))
        .route("/comments/statistics", get(comments::comment_statistics))
        .route("/comments/{id}", get(comments::get_comment).delete(comments::delete_comment))
        .route("/comments/{id}/approve", post(comments::approve_comment))
        .route("/comments/{id}/decline", post(comments::decline_comment))
        .route("/comments/{id}/analyze-sentiment", post(comments::analyze_sentiment))
        // Posts
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/statistics", get(posts::post_statistics))
        .route("/posts/{id}", get(posts::get_post))
        .route("/posts/{id}/comments", get(posts::post_comments))
        // Settings
        .route("/settings", get(settings::get_settings).put(settings::update_settings))
        .route("/settings/toggle-auto-comment", post(settings::toggle_auto_comment))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/count", get(notifications::get_unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/stream", get(notifications::notification_stream))
        .route("/notifications/{id}/read", post(notifications::mark_read));

    let instagram_routes = Router::new()
        .route("/instagram/accounts", get(instagram::list_accounts).post(instagram::create_account))
        .route(
            "/instagram/accounts/{id}",
            get(instagram::get_account).delete(instagram::delete_account),
        )
        .route("/instagram/accounts/{id}/sync-posts", post(instagram::sync_posts))
        .route("/instagram/accounts/{id}/sync-comments", post(instagram::sync_comments))
        .route("/instagram/accounts/{id}/statistics", get(instagram::account_statistics))
        .route("/instagram/mobile-status", get(instagram::mobile_status))
        // Webhook delivery (platform-facing) and the audit log
        .route(
            "/instagram/webhook",
            get(webhooks::verify_instagram_webhook).post(webhooks::handle_instagram_webhook),
        )
        .route("/instagram/webhook/receive", post(webhooks::receive_instagram_webhook))
        .route("/instagram/webhooks", get(webhooks::list_webhook_records))
        .route("/instagram/webhooks/{id}/processed", post(webhooks::mark_webhook_processed));

    let shopify_routes = Router::new()
        .route("/shopify/stores", get(shopify::list_stores).post(shopify::create_store))
        .route("/shopify/stores/{id}", delete(shopify::delete_store))
        .route("/shopify/reviews", get(shopify::list_reviews))
        .route("/webhooks/judgeme", post(shopify::judgeme_webhook));

    // Hosted generation API, authenticated with its own token
    let hosted_routes = Router::new()
        .route("/api/auth", post(hosted::hosted_auth))
        .route("/api/ai", post(hosted::generate))
        .route("/api/subscription-status", get(hosted::subscription_status))
        .route("/api/usage", get(hosted::list_usage));

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(auth_routes)
        .merge(moderation_routes)
        .merge(instagram_routes)
        .merge(shopify_routes)
        .merge(hosted_routes)
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

pub struct Application {
    router: Router,
    app_state: AppState,
    config: Config,
    pool: SqlitePool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting provokely with configuration: {:#?}", config);

        let pool = setup_database(&config).await?;

        let llm: Option<Arc<dyn ChatClient>> = match OpenAiClient::from_config(&config.openai)? {
            Some(client) => {
                info!("LLM enabled (model {})", config.openai.model);
                Some(Arc::new(client))
            }
            None => {
                info!("No OpenAI key configured, using rule-based sentiment and template replies");
                None
            }
        };
        let instagram = Arc::new(GraphClient::new(&config.instagram)?);
        let moderation = ModerationService::new(pool.clone(), &config, llm.clone(), instagram, NotificationHub::new());

        let app_state = AppState::builder()
            .db(pool)
            .config(config)
            .moderation(moderation)
            .maybe_llm(llm)
            .shutdown(CancellationToken::new())
            .build();

        Self::from_state(app_state)
    }

    /// Wrap an already assembled state, building the router over it.
    pub fn from_state(app_state: AppState) -> anyhow::Result<Self> {
        let router = build_router(&app_state)?;
        Ok(Self {
            router,
            config: app_state.config.clone(),
            pool: app_state.db.clone(),
            app_state,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("provokely listening on http://{}", bind_addr);

        // Notification streams never finish on their own, so end them before draining connections
        let streams = self.app_state.shutdown.clone();
        let shutdown = async move {
            shutdown.await;
            streams.cancel();
        };

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
