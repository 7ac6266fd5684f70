//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `SqliteConnection` (a pooled connection or an open
//! transaction), so the caller decides the transactional scope:
//!
//! ```ignore
//! use provokely::db::handlers::{Comments, Repository};
//!
//! async fn example(pool: &sqlx::SqlitePool, id: uuid::Uuid) -> anyhow::Result<()> {
//!     let mut tx = pool.begin().await?;
//!     let comment = Comments::new(&mut tx).get_by_id(id).await?;
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```
//!
//! Repositories with the full create/read/list/update/delete surface implement [`Repository`];
//! the rest expose only the operations their table needs.

pub mod api_users;
pub mod comments;
pub mod instagram;
pub mod notifications;
pub mod posts;
pub mod repository;
pub mod settings;
pub mod shopify;
pub mod users;

pub use api_users::ApiUsers;
pub use comments::Comments;
pub use instagram::{InstagramAccounts, WebhookRecords};
pub use notifications::Notifications;
pub use posts::Posts;
pub use repository::Repository;
pub use settings::Settings;
pub use shopify::{Reviews, Stores};
pub use users::Users;
