//! Database repository for comments.

use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::comments::{CommentDBResponse, CommentUpdateDBRequest, CommentUpsertDBRequest},
};
use crate::types::{CommentId, Platform, SentimentLabel, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing comments. Every field except `user_id` is optional.
#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    pub user_id: UserId,
    pub platform: Option<Platform>,
    pub sentiment_label: Option<SentimentLabel>,
    pub post_external_id: Option<String>,
    pub response_posted: Option<bool>,
    pub requires_approval: Option<bool>,
    pub approved: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    /// Case-insensitive substring match on the content
    pub search: Option<String>,
    pub skip: i64,
    pub limit: i64,
}

impl CommentFilter {
    pub fn new(user_id: UserId, skip: i64, limit: i64) -> Self {
        Self {
            user_id,
            skip,
            limit,
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        query.push(" WHERE user_id = ");
        query.push_bind(self.user_id);
        if let Some(platform) = self.platform {
            query.push(" AND platform = ");
            query.push_bind(platform);
        }
        if let Some(label) = self.sentiment_label {
            query.push(" AND sentiment_label = ");
            query.push_bind(label);
        }
        if let Some(post) = &self.post_external_id {
            query.push(" AND post_external_id = ");
            query.push_bind(post.clone());
        }
        if let Some(posted) = self.response_posted {
            query.push(" AND response_posted = ");
            query.push_bind(posted);
        }
        if let Some(pending) = self.requires_approval {
            query.push(" AND requires_approval = ");
            query.push_bind(pending);
        }
        if let Some(approved) = self.approved {
            query.push(" AND approved = ");
            query.push_bind(approved);
        }
        if let Some(since) = self.since {
            query.push(" AND julianday(created_at) >= julianday(");
            query.push_bind(since);
            query.push(")");
        }
        if let Some(search) = &self.search {
            query.push(" AND LOWER(content) LIKE ");
            query.push_bind(format!("%{}%", search.to_lowercase()));
        }
    }
}

/// Aggregate counts over one user's comments.
#[derive(Debug, Clone, Default, FromRow)]
pub struct CommentStatistics {
    pub total: i64,
    pub positive: i64,
    pub negative: i64,
    pub neutral: i64,
    pub hate: i64,
    pub unanalyzed: i64,
    pub pending_approval: i64,
    pub responses_posted: i64,
}

pub struct Comments<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Comments<'c> {
    type CreateRequest = CommentUpsertDBRequest;
    type UpdateRequest = CommentUpdateDBRequest;
    type Response = CommentDBResponse;
    type Id = CommentId;
    type Filter = CommentFilter;

    #[instrument(skip(self, request), fields(platform = %request.platform, external_id = %request.external_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let comment = sqlx::query_as::<_, CommentDBResponse>(
            r#"
            INSERT INTO comments (
                id, user_id, platform, external_id, post_external_id, content,
                sentiment_score, sentiment_label, nuanced_label, ai_response,
                response_posted, requires_approval, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.platform)
        .bind(&request.external_id)
        .bind(&request.post_external_id)
        .bind(&request.content)
        .bind(request.sentiment_score)
        .bind(request.sentiment_label)
        .bind(request.nuanced_label)
        .bind(&request.ai_response)
        .bind(request.response_posted)
        .bind(request.requires_approval)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(comment)
    }

    #[instrument(skip(self), fields(comment_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let comment = sqlx::query_as::<_, CommentDBResponse>("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(comment)
    }

    /// Newest first.
    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM comments");
        filter.push_conditions(&mut query);
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let comments = query.build_query_as::<CommentDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(comments)
    }

    #[instrument(skip(self), fields(comment_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(comment_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let comment = sqlx::query_as::<_, CommentDBResponse>(
            r#"
            UPDATE comments SET
                sentiment_score = COALESCE(?, sentiment_score),
                sentiment_label = COALESCE(?, sentiment_label),
                nuanced_label = COALESCE(?, nuanced_label),
                ai_response = COALESCE(?, ai_response),
                response_posted = COALESCE(?, response_posted),
                requires_approval = COALESCE(?, requires_approval),
                approved = COALESCE(?, approved),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(request.sentiment_score)
        .bind(request.sentiment_label)
        .bind(request.nuanced_label)
        .bind(&request.ai_response)
        .bind(request.response_posted)
        .bind(request.requires_approval)
        .bind(request.approved)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(comment)
    }
}

impl<'c> Comments<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_external_id(&mut self, platform: Platform, external_id: &str) -> Result<Option<CommentDBResponse>> {
        let comment = sqlx::query_as::<_, CommentDBResponse>("SELECT * FROM comments WHERE platform = ? AND external_id = ?")
            .bind(platform)
            .bind(external_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(comment)
    }

    /// Insert the comment, or overwrite the analysis fields of the existing row with the same
    /// `(platform, external_id)`. The flag is true when a row was created. `approved` is never
    /// touched here, and the reply fields of a row that was already posted or reviewed are kept.
    #[instrument(skip(self, request), fields(platform = %request.platform, external_id = %request.external_id), err)]
    pub async fn upsert(&mut self, request: &CommentUpsertDBRequest) -> Result<(CommentDBResponse, bool)> {
        let mut tx = self.db.begin().await?;

        let existing = sqlx::query_as::<_, (CommentId,)>("SELECT id FROM comments WHERE platform = ? AND external_id = ?")
            .bind(request.platform)
            .bind(&request.external_id)
            .fetch_optional(&mut *tx)
            .await?;

        let result = match existing {
            None => (Comments::new(&mut tx).create(request).await?, true),
            Some((id,)) => {
                let comment = sqlx::query_as::<_, CommentDBResponse>(
                    r#"
                    UPDATE comments SET
                        post_external_id = COALESCE(?, post_external_id),
                        content = ?,
                        sentiment_score = ?,
                        sentiment_label = ?,
                        nuanced_label = ?,
                        ai_response = CASE WHEN response_posted OR approved IS NOT NULL THEN ai_response ELSE ? END,
                        response_posted = CASE WHEN response_posted OR approved IS NOT NULL THEN response_posted ELSE ? END,
                        requires_approval = CASE WHEN response_posted OR approved IS NOT NULL THEN requires_approval ELSE ? END,
                        updated_at = ?
                    WHERE id = ?
                    RETURNING *
                    "#,
                )
                .bind(&request.post_external_id)
                .bind(&request.content)
                .bind(request.sentiment_score)
                .bind(request.sentiment_label)
                .bind(request.nuanced_label)
                .bind(&request.ai_response)
                .bind(request.response_posted)
                .bind(request.requires_approval)
                .bind(Utc::now())
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
                (comment, false)
            }
        };

        tx.commit().await?;
        Ok(result)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &CommentFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM comments");
        filter.push_conditions(&mut query);

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn statistics(&mut self, user_id: UserId) -> Result<CommentStatistics> {
        let stats = sqlx::query_as::<_, CommentStatistics>(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(sentiment_label = 'positive'), 0) AS positive,
                COALESCE(SUM(sentiment_label = 'negative'), 0) AS negative,
                COALESCE(SUM(sentiment_label = 'neutral'), 0) AS neutral,
                COALESCE(SUM(sentiment_label = 'hate'), 0) AS hate,
                COALESCE(SUM(sentiment_label IS NULL), 0) AS unanalyzed,
                COALESCE(SUM(requires_approval), 0) AS pending_approval,
                COALESCE(SUM(response_posted), 0) AS responses_posted
            FROM comments
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(stats)
    }
}
