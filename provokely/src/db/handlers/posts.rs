//! Database repository for monitored posts.

use crate::db::{
    errors::Result,
    models::posts::{PostCreateDBRequest, PostDBResponse},
};
use crate::types::{Platform, PostId, UserId, abbrev_uuid};
use chrono::Utc;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing posts
#[derive(Debug, Clone)]
pub struct PostFilter {
    pub user_id: UserId,
    pub platform: Option<Platform>,
    pub skip: i64,
    pub limit: i64,
}

/// Per-platform post count for one user.
#[derive(Debug, Clone, FromRow)]
pub struct PlatformPostCount {
    pub platform: Platform,
    pub count: i64,
}

pub struct Posts<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Posts<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Return the post for `(platform, external_id)`, inserting it if unseen. The flag is true when
    /// a row was created.
    #[instrument(skip(self, request), fields(platform = %request.platform, external_id = %request.external_id), err)]
    pub async fn get_or_create(&mut self, request: &PostCreateDBRequest) -> Result<(PostDBResponse, bool)> {
        let now = Utc::now();
        let inserted = sqlx::query_as::<_, PostDBResponse>(
            r#"
            INSERT INTO posts (id, user_id, platform, external_id, content, author, url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (platform, external_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.platform)
        .bind(&request.external_id)
        .bind(&request.content)
        .bind(&request.author)
        .bind(&request.url)
        .bind(now)
        .bind(now)
        .fetch_optional(&mut *self.db)
        .await?;

        if let Some(post) = inserted {
            return Ok((post, true));
        }

        let existing = sqlx::query_as::<_, PostDBResponse>("SELECT * FROM posts WHERE platform = ? AND external_id = ?")
            .bind(request.platform)
            .bind(&request.external_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok((existing, false))
    }

    #[instrument(skip(self), fields(post_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: PostId) -> Result<Option<PostDBResponse>> {
        let post = sqlx::query_as::<_, PostDBResponse>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(post)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &PostFilter) -> Result<Vec<PostDBResponse>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM posts WHERE user_id = ");
        query.push_bind(filter.user_id);
        if let Some(platform) = filter.platform {
            query.push(" AND platform = ");
            query.push_bind(platform);
        }
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let posts = query.build_query_as::<PostDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(posts)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &PostFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts WHERE user_id = ");
        query.push_bind(filter.user_id);
        if let Some(platform) = filter.platform {
            query.push(" AND platform = ");
            query.push_bind(platform);
        }

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn counts_by_platform(&mut self, user_id: UserId) -> Result<Vec<PlatformPostCount>> {
        let counts = sqlx::query_as::<_, PlatformPostCount>(
            "SELECT platform, COUNT(*) AS count FROM posts WHERE user_id = ? GROUP BY platform ORDER BY platform",
        )
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_user;
    use sqlx::SqlitePool;

    fn request(user_id: UserId, platform: Platform, external_id: &str) -> PostCreateDBRequest {
        PostCreateDBRequest {
            user_id,
            platform,
            external_id: external_id.to_string(),
            content: "New drop".to_string(),
            author: Some("shop".to_string()),
            url: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_or_create_is_idempotent(pool: SqlitePool) {
        let user = create_test_user(&pool, "frank").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Posts::new(&mut conn);

        let (first, created) = repo.get_or_create(&request(user.id, Platform::Instagram, "m1")).await.unwrap();
        assert!(created);
        assert!(first.is_monitored);

        let (second, created) = repo.get_or_create(&request(user.id, Platform::Instagram, "m1")).await.unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);

        // Same external id on another platform is a different post
        let (_, created) = repo.get_or_create(&request(user.id, Platform::Youtube, "m1")).await.unwrap();
        assert!(created);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_and_platform_counts(pool: SqlitePool) {
        let user = create_test_user(&pool, "gina").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Posts::new(&mut conn);

        for id in ["a", "b", "c"] {
            repo.get_or_create(&request(user.id, Platform::Instagram, id)).await.unwrap();
        }
        repo.get_or_create(&request(user.id, Platform::Facebook, "d")).await.unwrap();

        let filter = PostFilter {
            user_id: user.id,
            platform: Some(Platform::Instagram),
            skip: 0,
            limit: 2,
        };
        assert_eq!(repo.list(&filter).await.unwrap().len(), 2);
        assert_eq!(repo.count(&filter).await.unwrap(), 3);

        let counts = repo.counts_by_platform(user.id).await.unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].platform, Platform::Facebook);
        assert_eq!(counts[0].count, 1);
        assert_eq!(counts[1].count, 3);
    }
}
