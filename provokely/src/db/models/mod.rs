//! Database record models matching table schemas.
//!
//! Each struct either mirrors a table row (`*DBResponse`, deriving `sqlx::FromRow`) or carries the
//! inputs to a write (`*DBRequest`). API models in [`crate::api::models`] convert from these so the
//! storage and wire representations can evolve independently.
//!
//! - [`users`], [`settings`]: dashboard accounts and their moderation toggles
//! - [`posts`], [`comments`], [`notifications`]: moderated social content and the inbox
//! - [`instagram`]: connected accounts and the raw webhook log
//! - [`api_users`]: hosted AI-proxy accounts and usage metering
//! - [`shopify`]: stores and JudgeMe reviews

pub mod api_users;
pub mod comments;
pub mod instagram;
pub mod notifications;
pub mod posts;
pub mod settings;
pub mod shopify;
pub mod users;
