//! Database repositories for connected Instagram accounts and the webhook log.

use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::instagram::{
        InstagramAccountCreateDBRequest, InstagramAccountDBResponse, InstagramAccountUpdateDBRequest, WebhookRecordCreateDBRequest,
        WebhookRecordDBResponse,
    },
};
use crate::types::{InstagramAccountId, UserId, WebhookRecordId, abbrev_uuid};
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct InstagramAccountFilter {
    pub user_id: UserId,
    pub skip: i64,
    pub limit: i64,
}

pub struct InstagramAccounts<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for InstagramAccounts<'c> {
    type CreateRequest = InstagramAccountCreateDBRequest;
    type UpdateRequest = InstagramAccountUpdateDBRequest;
    type Response = InstagramAccountDBResponse;
    type Id = InstagramAccountId;
    type Filter = InstagramAccountFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), username = %request.username), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let account = sqlx::query_as::<_, InstagramAccountDBResponse>(
            r#"
            INSERT INTO instagram_accounts (
                id, user_id, username, instagram_user_id, access_token, token_type, expires_in,
                token_created_at, profile_picture_url, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(&request.username)
        .bind(&request.instagram_user_id)
        .bind(&request.access_token)
        .bind(&request.token_type)
        .bind(request.expires_in)
        .bind(now)
        .bind(&request.profile_picture_url)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(account)
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let account = sqlx::query_as::<_, InstagramAccountDBResponse>("SELECT * FROM instagram_accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(account)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let accounts = sqlx::query_as::<_, InstagramAccountDBResponse>(
            "SELECT * FROM instagram_accounts WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(filter.user_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(accounts)
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM instagram_accounts WHERE id = ?")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let account = sqlx::query_as::<_, InstagramAccountDBResponse>(
            r#"
            UPDATE instagram_accounts SET
                username = COALESCE(?1, username),
                token_created_at = CASE WHEN ?2 IS NOT NULL THEN ?10 ELSE token_created_at END,
                access_token = COALESCE(?2, access_token),
                expires_in = COALESCE(?3, expires_in),
                profile_picture_url = COALESCE(?4, profile_picture_url),
                followers_count = COALESCE(?5, followers_count),
                following_count = COALESCE(?6, following_count),
                media_count = COALESCE(?7, media_count),
                is_active = COALESCE(?8, is_active),
                updated_at = ?10
            WHERE id = ?9
            RETURNING *
            "#,
        )
        .bind(&request.username)
        .bind(&request.access_token)
        .bind(request.expires_in)
        .bind(&request.profile_picture_url)
        .bind(request.followers_count)
        .bind(request.following_count)
        .bind(request.media_count)
        .bind(request.is_active)
        .bind(id)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(account)
    }
}

impl<'c> InstagramAccounts<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Resolve the account a webhook entry refers to.
    #[instrument(skip(self), err)]
    pub async fn get_by_instagram_user_id(&mut self, instagram_user_id: &str) -> Result<Option<InstagramAccountDBResponse>> {
        let account = sqlx::query_as::<_, InstagramAccountDBResponse>("SELECT * FROM instagram_accounts WHERE instagram_user_id = ?")
            .bind(instagram_user_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(account)
    }

    /// The user's most recently connected active account, used for posting replies.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_active_for_user(&mut self, user_id: UserId) -> Result<Option<InstagramAccountDBResponse>> {
        let account = sqlx::query_as::<_, InstagramAccountDBResponse>(
            "SELECT * FROM instagram_accounts WHERE user_id = ? AND is_active = TRUE ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(account)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WebhookRecordFilter {
    pub user_id: UserId,
    pub account_id: Option<InstagramAccountId>,
    pub processed: Option<bool>,
    pub skip: i64,
    pub limit: i64,
}

pub struct WebhookRecords<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> WebhookRecords<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Store a delivery unless one with the same `webhook_id` exists. Returns `None` for duplicates.
    #[instrument(skip(self, request), fields(webhook_id = %request.webhook_id, event_type = %request.event_type), err)]
    pub async fn insert_once(&mut self, request: &WebhookRecordCreateDBRequest) -> Result<Option<WebhookRecordDBResponse>> {
        let record = sqlx::query_as::<_, WebhookRecordDBResponse>(
            r#"
            INSERT INTO instagram_webhooks (id, webhook_id, account_id, event_type, payload, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (webhook_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.webhook_id)
        .bind(request.account_id)
        .bind(&request.event_type)
        .bind(Json(&request.payload))
        .bind(Utc::now())
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(record)
    }

    /// Records for accounts owned by `filter.user_id`, newest first.
    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &WebhookRecordFilter) -> Result<Vec<WebhookRecordDBResponse>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT w.* FROM instagram_webhooks w JOIN instagram_accounts a ON a.id = w.account_id WHERE a.user_id = ",
        );
        query.push_bind(filter.user_id);
        if let Some(account_id) = filter.account_id {
            query.push(" AND w.account_id = ");
            query.push_bind(account_id);
        }
        if let Some(processed) = filter.processed {
            query.push(" AND w.processed = ");
            query.push_bind(processed);
        }
        query.push(" ORDER BY w.created_at DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let records = query
            .build_query_as::<WebhookRecordDBResponse>()
            .fetch_all(&mut *self.db)
            .await?;
        Ok(records)
    }

    /// Mark a record processed if it belongs to one of the user's accounts.
    #[instrument(skip(self), fields(record_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_processed(&mut self, user_id: UserId, id: WebhookRecordId) -> Result<Option<WebhookRecordDBResponse>> {
        let record = sqlx::query_as::<_, WebhookRecordDBResponse>(
            r#"
            UPDATE instagram_webhooks SET processed = TRUE
            WHERE id = ? AND account_id IN (SELECT id FROM instagram_accounts WHERE user_id = ?)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(record)
    }

    #[instrument(skip(self), err)]
    pub async fn mark_processed_by_webhook_id(&mut self, webhook_id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE instagram_webhooks SET processed = TRUE WHERE webhook_id = ?")
            .bind(webhook_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
