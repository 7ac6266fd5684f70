//! Database repository for per-user moderation settings.

use crate::db::{
    errors::Result,
    models::settings::{SettingsUpdateDBRequest, UserSettings},
};
use crate::types::{UserId, abbrev_uuid};
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;

pub struct Settings<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Settings<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Fetch the user's settings, inserting the defaults on first access.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_or_create(&mut self, user_id: UserId) -> Result<UserSettings> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO user_settings (user_id, created_at, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&mut *self.db)
        .await?;

        let settings = sqlx::query_as::<_, UserSettings>("SELECT * FROM user_settings WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(settings)
    }

    /// Apply a partial update, creating the row first if needed.
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn update(&mut self, user_id: UserId, request: &SettingsUpdateDBRequest) -> Result<UserSettings> {
        self.get_or_create(user_id).await?;

        let settings = sqlx::query_as::<_, UserSettings>(
            r#"
            UPDATE user_settings SET
                auto_comment_enabled = COALESCE(?, auto_comment_enabled),
                require_approval_for_hate = COALESCE(?, require_approval_for_hate),
                require_approval_for_negative = COALESCE(?, require_approval_for_negative),
                auto_respond_to_positive = COALESCE(?, auto_respond_to_positive),
                auto_respond_to_negative = COALESCE(?, auto_respond_to_negative),
                auto_respond_to_hate = COALESCE(?, auto_respond_to_hate),
                response_style = COALESCE(?, response_style),
                notify_on_positive = COALESCE(?, notify_on_positive),
                notify_on_negative = COALESCE(?, notify_on_negative),
                notify_on_hate = COALESCE(?, notify_on_hate),
                notify_on_neutral = COALESCE(?, notify_on_neutral),
                notify_on_purchase_intent = COALESCE(?, notify_on_purchase_intent),
                notify_on_question = COALESCE(?, notify_on_question),
                updated_at = ?
            WHERE user_id = ?
            RETURNING *
            "#,
        )
        .bind(request.auto_comment_enabled)
        .bind(request.require_approval_for_hate)
        .bind(request.require_approval_for_negative)
        .bind(request.auto_respond_to_positive)
        .bind(request.auto_respond_to_negative)
        .bind(request.auto_respond_to_hate)
        .bind(request.response_style)
        .bind(request.notify_on_positive)
        .bind(request.notify_on_negative)
        .bind(request.notify_on_hate)
        .bind(request.notify_on_neutral)
        .bind(request.notify_on_purchase_intent)
        .bind(request.notify_on_question)
        .bind(Utc::now())
        .bind(user_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(settings)
    }

    /// Flip `auto_comment_enabled` and return the new settings.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn toggle_auto_comment(&mut self, user_id: UserId) -> Result<UserSettings> {
        self.get_or_create(user_id).await?;

        let settings = sqlx::query_as::<_, UserSettings>(
            r#"
            UPDATE user_settings
            SET auto_comment_enabled = NOT auto_comment_enabled, updated_at = ?
            WHERE user_id = ?
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(user_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(settings)
    }
}
