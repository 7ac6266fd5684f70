//! HTTP request handlers, one module per resource.
//!
//! - [`auth`]: dashboard registration, login, logout and the current user
//! - [`comments`]: comment ingestion, listing, approval workflow and statistics
//! - [`posts`]: monitored posts and their comments
//! - [`settings`]: per-user moderation settings
//! - [`notifications`]: notification inbox and the SSE unread stream
//! - [`instagram`]: connected Instagram accounts and Graph sync
//! - [`webhooks`]: Meta webhook verification, delivery and the stored log
//! - [`hosted`]: email-only AI proxy with project metering
//! - [`shopify`]: Shopify stores and JudgeMe review webhooks
//!
//! Dashboard handlers authenticate with [`CurrentUser`](crate::api::models::users::CurrentUser);
//! hosted handlers with [`HostedUser`](crate::auth::current_user::HostedUser). Errors are
//! [`crate::errors::Error`], rendered as the standard error envelope.

pub mod auth;
pub mod comments;
pub mod hosted;
pub mod instagram;
pub mod notifications;
pub mod posts;
pub mod settings;
pub mod shopify;
pub mod webhooks;
