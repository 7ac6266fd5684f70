//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `PROVOKELY_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `PROVOKELY_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `PROVOKELY_OPENAI__API_KEY=sk-...` sets the `openai.api_key` field.
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port`
//! - **Database**: `database.url`, `database.pool`
//! - **Security**: `secret_key`, `auth.session`, `auth.cors`
//! - **LLM**: `openai` - chat-completion endpoint used for sentiment, replies and the hosted proxy
//! - **Instagram**: `instagram` - Graph API endpoint, webhook verify token and app secret
//! - **Hosted API**: `hosted` - token lifetime and free project allowance
//! - **Features**: `enable_metrics`, `enable_otel_export`
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! PROVOKELY_PORT=8080
//! DATABASE_URL="sqlite://provokely.db"
//! PROVOKELY_SECRET_KEY=change-me
//! PROVOKELY_INSTAGRAM__VERIFY_TOKEN=my-verify-token
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "PROVOKELY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Override for `database.url`, populated from `DATABASE_URL`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    pub database: DatabaseConfig,
    /// Secret key for session and hosted API JWT signing (required)
    pub secret_key: Option<String>,
    pub auth: AuthConfig,
    pub openai: OpenAiConfig,
    pub instagram: InstagramConfig,
    pub hosted: HostedApiConfig,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_url: None,
            database: DatabaseConfig::default(),
            secret_key: None,
            auth: AuthConfig::default(),
            openai: OpenAiConfig::default(),
            instagram: InstagramConfig::default(),
            hosted: HostedApiConfig::default(),
            enable_metrics: false,
            enable_otel_export: false,
        }
    }
}

/// SQLite database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection URL, e.g. `sqlite://provokely.db`
    pub url: String,
    pub pool: PoolSettings,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://provokely.db".to_string(),
            pool: PoolSettings::default(),
        }
    }
}

/// Connection pool parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
    /// How long SQLite waits on a locked database before failing a statement
    #[serde(with = "humantime_serde")]
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 8,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Dashboard authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Allow self-service account registration
    pub allow_registration: bool,
    pub session: SessionConfig,
    pub password: PasswordConfig,
    pub cors: CorsConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allow_registration: true,
            session: SessionConfig::default(),
            password: PasswordConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub cookie_secure: bool,
    /// JWT token expiry duration
    #[serde(with = "humantime_serde")]
    pub jwt_expiry: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "provokely_session".to_string(),
            cookie_secure: true,
            jwt_expiry: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    pub allowed_origins: Vec<CorsOrigin>,
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Url(Url::parse("http://localhost:3000").expect("static URL is valid"))],
            allow_credentials: true,
            max_age: Some(3600),
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

/// OpenAI-compatible chat-completion endpoint.
///
/// Without an `api_key` the sentiment analyzer and reply generator run on their rule-based
/// fallbacks and the hosted `/api/ai` proxy is unavailable.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: Url,
    /// Model used for sentiment classification and reply generation
    pub model: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Url::parse("https://api.openai.com/v1/").expect("static URL is valid"),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Meta Graph API and webhook configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstagramConfig {
    pub graph_base_url: Url,
    pub graph_version: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Token echoed back during webhook subscription verification
    pub verify_token: Option<String>,
    /// When set, `X-Hub-Signature-256` is required on webhook deliveries
    pub app_secret: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Tokens expiring within this window are re-exchanged before posting
    #[serde(with = "humantime_serde")]
    pub refresh_margin: Duration,
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            graph_base_url: Url::parse("https://graph.facebook.com/").expect("static URL is valid"),
            graph_version: "v23.0".to_string(),
            client_id: None,
            client_secret: None,
            verify_token: None,
            app_secret: None,
            timeout: Duration::from_secs(30),
            refresh_margin: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Hosted AI-proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostedApiConfig {
    #[serde(with = "humantime_serde")]
    pub jwt_expiry: Duration,
    /// Projects granted to a newly created free account
    pub free_projects: i64,
    /// Default `max_tokens` for proxied completions
    pub default_max_tokens: u32,
}

impl Default for HostedApiConfig {
    fn default() -> Self {
        Self {
            jwt_expiry: Duration::from_secs(30 * 24 * 60 * 60),
            free_projects: 3,
            default_max_tokens: 4000,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.secret_key.as_deref().is_none_or(str::is_empty) {
            return Err(Error::Internal {
                operation: "Config validation: secret_key is not configured. \
                     Please set PROVOKELY_SECRET_KEY environment variable or add secret_key to config file."
                    .to_string(),
            });
        }

        if self.auth.password.min_length < 1 || self.auth.password.min_length > self.auth.password.max_length {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: Invalid password configuration: min_length ({}) must be between 1 and max_length ({})",
                    self.auth.password.min_length, self.auth.password.max_length
                ),
            });
        }

        if self.auth.session.jwt_expiry.as_secs() < 300 {
            return Err(Error::Internal {
                operation: "Config validation: JWT expiry duration is too short (minimum 5 minutes)".to_string(),
            });
        }

        if self.auth.session.jwt_expiry.as_secs() > 86400 * 30 || self.hosted.jwt_expiry.as_secs() > 86400 * 30 {
            return Err(Error::Internal {
                operation: "Config validation: JWT expiry duration is too long (maximum 30 days)".to_string(),
            });
        }

        if self.auth.cors.allowed_origins.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: CORS allowed_origins cannot be empty. Add at least one allowed origin.".to_string(),
            });
        }

        let has_wildcard = self
            .auth
            .cors
            .allowed_origins
            .iter()
            .any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && self.auth.cors.allow_credentials {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins."
                    .to_string(),
            });
        }

        if self.database.pool.max_connections == 0 {
            return Err(Error::Internal {
                operation: "Config validation: database.pool.max_connections must be at least 1".to_string(),
            });
        }

        if self.hosted.free_projects < 0 {
            return Err(Error::Internal {
                operation: "Config validation: hosted.free_projects cannot be negative".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("PROVOKELY_").ignore(&["CONFIG"]).split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args() -> Args {
        Args {
            config: "test.yaml".to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_yaml_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
secret_key: hello
port: 9000
openai:
  api_key: sk-test
  model: gpt-4o
  timeout: 10s
instagram:
  verify_token: verify-me
  refresh_margin: 3days
hosted:
  free_projects: 5
"#,
            )?;

            let config = Config::load(&args())?;

            assert_eq!(config.port, 9000);
            assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
            assert_eq!(config.openai.model, "gpt-4o");
            assert_eq!(config.openai.timeout, Duration::from_secs(10));
            assert_eq!(config.instagram.verify_token.as_deref(), Some("verify-me"));
            assert_eq!(config.instagram.refresh_margin, Duration::from_secs(3 * 86400));
            assert_eq!(config.instagram.graph_version, "v23.0"); // default
            assert_eq!(config.hosted.free_projects, 5);

            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "secret_key: hello\nport: 9000\n")?;

            jail.set_env("PROVOKELY_PORT", "8080");
            jail.set_env("PROVOKELY_INSTAGRAM__APP_SECRET", "shh");
            jail.set_env("DATABASE_URL", "sqlite://elsewhere.db");

            let config = Config::load(&args())?;

            assert_eq!(config.port, 8080);
            assert_eq!(config.instagram.app_secret.as_deref(), Some("shh"));
            assert_eq!(config.database.url, "sqlite://elsewhere.db");

            Ok(())
        });
    }

    #[test]
    fn test_missing_secret_key_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "port: 9000\n")?;

            let result = Config::load(&args());
            assert!(result.is_err());
            assert!(result.unwrap_err().to_string().contains("secret_key"));

            Ok(())
        });
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "secret_key: hello\nnot_a_field: true\n")?;

            assert!(Config::load(&args()).is_err());

            Ok(())
        });
    }

    #[test]
    fn test_wildcard_cors_with_credentials_is_rejected() {
        let mut config = Config {
            secret_key: Some("hello".to_string()),
            ..Default::default()
        };
        config.auth.cors.allowed_origins = vec![CorsOrigin::Wildcard];
        config.auth.cors.allow_credentials = true;
        assert!(config.validate().is_err());

        config.auth.cors.allow_credentials = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_jwt_expiry_bounds() {
        let mut config = Config {
            secret_key: Some("hello".to_string()),
            ..Default::default()
        };
        config.auth.session.jwt_expiry = Duration::from_secs(60);
        assert!(config.validate().is_err());

        config.auth.session.jwt_expiry = Duration::from_secs(86400 * 31);
        assert!(config.validate().is_err());
    }
}
