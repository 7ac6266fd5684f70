//! Database repository for the notification inbox.

use crate::db::{
    errors::Result,
    models::notifications::{NotificationDBResponse, NotificationUpsertDBRequest},
};
use crate::types::{NotificationId, Platform, UserId, abbrev_uuid};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub user_id: UserId,
    pub is_read: Option<bool>,
    pub needs_approval: Option<bool>,
    pub platform: Option<Platform>,
    pub skip: i64,
    pub limit: i64,
}

impl NotificationFilter {
    fn push_conditions(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        query.push(" WHERE user_id = ");
        query.push_bind(self.user_id);
        if let Some(is_read) = self.is_read {
            query.push(" AND is_read = ");
            query.push_bind(is_read);
        }
        if let Some(needs_approval) = self.needs_approval {
            query.push(" AND needs_approval = ");
            query.push_bind(needs_approval);
        }
        if let Some(platform) = self.platform {
            query.push(" AND platform = ");
            query.push_bind(platform);
        }
    }
}

pub struct Notifications<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Notifications<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Create the notification, or refresh the existing one for the same comment and mark it unread.
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), external_id = %request.external_id), err)]
    pub async fn upsert(&mut self, request: &NotificationUpsertDBRequest) -> Result<NotificationDBResponse> {
        let notification = sqlx::query_as::<_, NotificationDBResponse>(
            r#"
            INSERT INTO notifications (
                id, user_id, platform, external_id, media_id, comment_text,
                sentiment_label, needs_approval, ai_response, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, platform, external_id) DO UPDATE SET
                media_id = COALESCE(excluded.media_id, notifications.media_id),
                comment_text = excluded.comment_text,
                sentiment_label = excluded.sentiment_label,
                needs_approval = excluded.needs_approval,
                ai_response = excluded.ai_response,
                is_read = FALSE
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.platform)
        .bind(&request.external_id)
        .bind(&request.media_id)
        .bind(&request.comment_text)
        .bind(request.sentiment_label)
        .bind(request.needs_approval)
        .bind(&request.ai_response)
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(notification)
    }

    /// Newest first.
    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &NotificationFilter) -> Result<Vec<NotificationDBResponse>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM notifications");
        filter.push_conditions(&mut query);
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let notifications = query
            .build_query_as::<NotificationDBResponse>()
            .fetch_all(&mut *self.db)
            .await?;
        Ok(notifications)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &NotificationFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM notifications");
        filter.push_conditions(&mut query);

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn unread_count(&mut self, user_id: UserId) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = FALSE")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count.0)
    }

    /// Mark one of the user's notifications read. `None` if it doesn't exist or isn't theirs.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), notification_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_read(&mut self, user_id: UserId, id: NotificationId) -> Result<Option<NotificationDBResponse>> {
        let notification = sqlx::query_as::<_, NotificationDBResponse>(
            "UPDATE notifications SET is_read = TRUE WHERE id = ? AND user_id = ? RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(notification)
    }

    /// Returns the number of notifications that changed.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn mark_all_read(&mut self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = ? AND is_read = FALSE")
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }

    /// Close out the notification for a comment after an approval decision: read, no longer
    /// awaiting approval, and carrying the final reply text when one was posted.
    #[instrument(skip(self, final_reply), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn resolve(&mut self, user_id: UserId, platform: Platform, external_id: &str, final_reply: Option<&str>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, needs_approval = FALSE, ai_response = COALESCE(?, ai_response)
            WHERE user_id = ? AND platform = ? AND external_id = ?
            "#,
        )
        .bind(final_reply)
        .bind(user_id)
        .bind(platform)
        .bind(external_id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
