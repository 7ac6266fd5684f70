//! Database repositories for Shopify stores and JudgeMe reviews.

use crate::db::{
    errors::Result,
    models::shopify::{ReviewDBResponse, ReviewUpsertDBRequest, StoreCreateDBRequest, StoreDBResponse},
};
use crate::types::{StoreId, UserId, abbrev_uuid};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

pub struct Stores<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Stores<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// `shop_domain` must already be normalized.
    #[instrument(skip(self, request), fields(shop_domain = %request.shop_domain), err)]
    pub async fn create(&mut self, request: &StoreCreateDBRequest) -> Result<StoreDBResponse> {
        let now = Utc::now();
        let store = sqlx::query_as::<_, StoreDBResponse>(
            r#"
            INSERT INTO shopify_stores (id, user_id, shop_domain, access_token, store_name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(&request.shop_domain)
        .bind(&request.access_token)
        .bind(&request.store_name)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(store)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_domain(&mut self, shop_domain: &str) -> Result<Option<StoreDBResponse>> {
        let store = sqlx::query_as::<_, StoreDBResponse>("SELECT * FROM shopify_stores WHERE shop_domain = ?")
            .bind(shop_domain)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(store)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_for_user(&mut self, user_id: UserId) -> Result<Vec<StoreDBResponse>> {
        let stores = sqlx::query_as::<_, StoreDBResponse>("SELECT * FROM shopify_stores WHERE user_id = ? ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(stores)
    }

    /// Delete one of the user's stores and its reviews.
    #[instrument(skip(self), fields(store_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, user_id: UserId, id: StoreId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM shopify_stores WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    pub user_id: UserId,
    pub store_id: Option<StoreId>,
    pub skip: i64,
    pub limit: i64,
}

pub struct Reviews<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Reviews<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Insert a review, or refresh the stored copy when JudgeMe re-sends it.
    #[instrument(skip(self, request), fields(review_id = %request.review_id), err)]
    pub async fn upsert(&mut self, request: &ReviewUpsertDBRequest) -> Result<ReviewDBResponse> {
        let review = sqlx::query_as::<_, ReviewDBResponse>(
            r#"
            INSERT INTO judge_reviews (
                id, store_id, review_id, rating, title, body, reviewer_name, product_title,
                product_image_url, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (review_id) DO UPDATE SET
                rating = excluded.rating,
                title = excluded.title,
                body = excluded.body,
                reviewer_name = excluded.reviewer_name,
                product_title = excluded.product_title,
                product_image_url = excluded.product_image_url
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.store_id)
        .bind(&request.review_id)
        .bind(request.rating)
        .bind(&request.title)
        .bind(&request.body)
        .bind(&request.reviewer_name)
        .bind(&request.product_title)
        .bind(&request.product_image_url)
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(review)
    }

    /// Reviews across the user's stores, newest first.
    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &ReviewFilter) -> Result<Vec<ReviewDBResponse>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT r.* FROM judge_reviews r JOIN shopify_stores s ON s.id = r.store_id WHERE s.user_id = ",
        );
        query.push_bind(filter.user_id);
        if let Some(store_id) = filter.store_id {
            query.push(" AND r.store_id = ");
            query.push_bind(store_id);
        }
        query.push(" ORDER BY r.created_at DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let reviews = query.build_query_as::<ReviewDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_store, create_test_user};
    use sqlx::SqlitePool;

    fn review(store_id: StoreId, review_id: &str, rating: i64) -> ReviewUpsertDBRequest {
        ReviewUpsertDBRequest {
            store_id,
            review_id: review_id.to_string(),
            rating,
            title: None,
            body: "Fits well".to_string(),
            reviewer_name: "Anonymous".to_string(),
            product_title: "Unknown Product".to_string(),
            product_image_url: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_review_upsert_and_scoped_list(pool: SqlitePool) {
        let owner = create_test_user(&pool, "uma").await;
        let other = create_test_user(&pool, "vic").await;
        let store = create_test_store(&pool, owner.id, "uma-shop.myshopify.com").await;
        let other_store = create_test_store(&pool, other.id, "vic-shop.myshopify.com").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reviews::new(&mut conn);

        let first = repo.upsert(&review(store.id, "r1", 4)).await.unwrap();
        let updated = repo.upsert(&review(store.id, "r1", 5)).await.unwrap();
        assert_eq!(updated.id, first.id);
        assert_eq!(updated.rating, 5);
        repo.upsert(&review(other_store.id, "r2", 1)).await.unwrap();

        let filter = ReviewFilter {
            user_id: owner.id,
            limit: 10,
            ..Default::default()
        };
        let reviews = repo.list(&filter).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].review_id, "r1");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_store_lookup_and_delete(pool: SqlitePool) {
        let owner = create_test_user(&pool, "walt").await;
        let store = create_test_store(&pool, owner.id, "walt.myshopify.com").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Stores::new(&mut conn);

        assert_eq!(repo.get_by_domain("walt.myshopify.com").await.unwrap().unwrap().id, store.id);
        assert_eq!(repo.list_for_user(owner.id).await.unwrap().len(), 1);
        assert!(repo.delete(owner.id, store.id).await.unwrap());
        assert!(repo.get_by_domain("walt.myshopify.com").await.unwrap().is_none());
    }
}
