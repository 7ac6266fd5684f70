//! Database layer for data persistence and access.
//!
//! Persistence is SQLite through SQLx, organised with the Repository pattern:
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers, moderation service)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │   SQLite    │
//! └─────────────┘
//! ```
//!
//! UUIDs are stored as 16-byte blobs, timestamps as RFC 3339 text and money as integer units of
//! 1/10000 dollar. Migrations live in `migrations/` and run on startup via [`crate::migrator`].
//!
//! Take a transaction for anything that writes more than one row:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let settings = Settings::new(&mut tx).get_or_create(user_id).await?;
//! tx.commit().await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;

use crate::config::DatabaseConfig;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

/// Open the connection pool, creating the database file if needed.
///
/// Connections run in WAL mode with foreign keys enforced, so readers don't block the single writer.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(config.pool.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.pool.max_connections)
        .min_connections(config.pool.min_connections)
        .acquire_timeout(config.pool.acquire_timeout)
        .connect_with(options)
        .await?;

    info!("Connected to database at {}", config.url);
    Ok(pool)
}
