//! API request and response data models.
//!
//! These types define the public JSON contract and are kept apart from the database records in
//! [`crate::db::models`], converting from them with `From` impls. Every model carries `utoipa`
//! annotations for the generated OpenAPI document.
//!
//! - [`envelope`]: the `{success, data|error}` wrapper
//! - [`pagination`]: `skip`/`limit` query parameters and paged responses
//! - [`users`]: registration, login and the authenticated user
//! - [`comments`], [`posts`], [`settings`], [`notifications`]: the moderation dashboard
//! - [`instagram`], [`webhooks`]: connected accounts and Meta webhooks
//! - [`hosted`]: the hosted AI-proxy API (camelCase)
//! - [`shopify`]: stores and JudgeMe reviews

pub mod comments;
pub mod envelope;
pub mod hosted;
pub mod instagram;
pub mod notifications;
pub mod pagination;
pub mod posts;
pub mod settings;
pub mod shopify;
pub mod users;
pub mod webhooks;
