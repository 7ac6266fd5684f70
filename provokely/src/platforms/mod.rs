//! Outbound integrations with social platforms.
//!
//! - [`instagram`]: Meta Graph API client behind the [`InstagramApi`] trait
//! - [`signing`]: `X-Hub-Signature-256` verification for inbound Meta webhooks

pub mod instagram;
pub mod signing;

pub use instagram::{ExchangedToken, GraphClient, GraphComment, InstagramApi, MediaItem, PlatformError, Profile};
