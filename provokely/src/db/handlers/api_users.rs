//! Database repository for hosted AI-proxy accounts and their usage log.

use crate::db::{
    errors::Result,
    models::api_users::{ApiUserDBResponse, UsageLogCreateDBRequest, UsageLogDBResponse},
};
use crate::types::{ApiUserId, abbrev_uuid};
use chrono::Utc;
use sqlx::{Connection, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

pub struct ApiUsers<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> ApiUsers<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(api_user_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: ApiUserId) -> Result<Option<ApiUserDBResponse>> {
        let user = sqlx::query_as::<_, ApiUserDBResponse>("SELECT * FROM api_users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<ApiUserDBResponse>> {
        let user = sqlx::query_as::<_, ApiUserDBResponse>("SELECT * FROM api_users WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    /// Fetch the account for `email`, creating a free one with `free_projects` on first sight.
    #[instrument(skip(self, email), err)]
    pub async fn get_or_create(&mut self, email: &str, free_projects: i64) -> Result<ApiUserDBResponse> {
        let email = email.trim().to_lowercase();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO api_users (id, email, projects_remaining, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(free_projects)
        .bind(now)
        .bind(now)
        .execute(&mut *self.db)
        .await?;

        let user = sqlx::query_as::<_, ApiUserDBResponse>("SELECT * FROM api_users WHERE email = ?")
            .bind(&email)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(user)
    }

    /// Spend one project from the allowance. Returns false when none are left.
    #[instrument(skip(self), fields(api_user_id = %abbrev_uuid(&id)), err)]
    pub async fn consume_project(&mut self, id: ApiUserId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE api_users SET projects_remaining = projects_remaining - 1, updated_at = ? WHERE id = ? AND projects_remaining > 0",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Pro status is owned by the billing provider; this only mirrors it.
    #[instrument(skip(self), fields(api_user_id = %abbrev_uuid(&id)), err)]
    pub async fn set_pro(&mut self, id: ApiUserId, is_pro: bool) -> Result<ApiUserDBResponse> {
        let user = sqlx::query_as::<_, ApiUserDBResponse>("UPDATE api_users SET is_pro = ?, updated_at = ? WHERE id = ? RETURNING *")
            .bind(is_pro)
            .bind(Utc::now())
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(user)
    }

    /// Write a usage row and add it to the account totals atomically.
    #[instrument(skip(self, request), fields(api_user_id = %abbrev_uuid(&request.api_user_id), tokens = request.tokens_used), err)]
    pub async fn record_usage(&mut self, request: &UsageLogCreateDBRequest) -> Result<UsageLogDBResponse> {
        let mut tx = self.db.begin().await?;
        let now = Utc::now();

        let log = sqlx::query_as::<_, UsageLogDBResponse>(
            r#"
            INSERT INTO usage_logs (id, api_user_id, timestamp, action, tokens_used, cost_units, model, prompt_length)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.api_user_id)
        .bind(now)
        .bind(&request.action)
        .bind(request.tokens_used)
        .bind(request.cost_units)
        .bind(&request.model)
        .bind(request.prompt_length)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE api_users SET
                total_requests = total_requests + 1,
                total_tokens_used = total_tokens_used + ?,
                total_cost_units = total_cost_units + ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(request.tokens_used)
        .bind(request.cost_units)
        .bind(now)
        .bind(request.api_user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(log)
    }

    /// Newest first.
    #[instrument(skip(self), fields(api_user_id = %abbrev_uuid(&api_user_id)), err)]
    pub async fn list_usage(&mut self, api_user_id: ApiUserId, skip: i64, limit: i64) -> Result<Vec<UsageLogDBResponse>> {
        let logs = sqlx::query_as::<_, UsageLogDBResponse>(
            "SELECT * FROM usage_logs WHERE api_user_id = ? ORDER BY timestamp DESC LIMIT ? OFFSET ?",
        )
        .bind(api_user_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(logs)
    }

    #[instrument(skip(self), fields(api_user_id = %abbrev_uuid(&api_user_id)), err)]
    pub async fn count_usage(&mut self, api_user_id: ApiUserId) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM usage_logs WHERE api_user_id = ?")
            .bind(api_user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_or_create_normalizes_email(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ApiUsers::new(&mut conn);

        let user = repo.get_or_create(" Maker@Example.com ", 3).await.unwrap();
        assert_eq!(user.email, "maker@example.com");
        assert_eq!(user.projects_remaining, 3);
        assert!(!user.is_pro);

        // Existing accounts keep their allowance
        let again = repo.get_or_create("maker@example.com", 10).await.unwrap();
        assert_eq!(again.id, user.id);
        assert_eq!(again.projects_remaining, 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_consume_project_stops_at_zero(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ApiUsers::new(&mut conn);

        let user = repo.get_or_create("one@example.com", 1).await.unwrap();
        assert!(repo.consume_project(user.id).await.unwrap());
        assert!(!repo.consume_project(user.id).await.unwrap());
        assert_eq!(repo.get_by_id(user.id).await.unwrap().unwrap().projects_remaining, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_record_usage_updates_totals(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ApiUsers::new(&mut conn);

        let user = repo.get_or_create("meter@example.com", 3).await.unwrap();
        for tokens in [100, 250] {
            repo.record_usage(&UsageLogCreateDBRequest {
                api_user_id: user.id,
                action: "ai_generation".to_string(),
                tokens_used: tokens,
                cost_units: tokens / 50,
                model: "gpt-4o-mini".to_string(),
                prompt_length: 12,
            })
            .await
            .unwrap();
        }

        let user = repo.get_by_email("meter@example.com").await.unwrap().unwrap();
        assert_eq!(user.total_requests, 2);
        assert_eq!(user.total_tokens_used, 350);
        assert_eq!(user.total_cost_units, 7);

        let logs = repo.list_usage(user.id, 0, 10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(repo.count_usage(user.id).await.unwrap(), 2);
    }
}
