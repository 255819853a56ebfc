mod models;

pub use models::*;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

use crate::error::BackendError;
use crate::models::{OrderRecord, OrderStatus, ReviewDetails, RewardCode};
use crate::traits::{OrderRecordStore, RewardCodePool};

pub type DbPool = Arc<PgPool>;

pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Order records and discount codes kept in Postgres. Every state change is a
/// single conditional statement, so concurrent instances cannot double-write.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[async_trait]
impl OrderRecordStore for PgStore {
    async fn find(&self, order_id: &str) -> Result<Option<OrderRecord>, BackendError> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM review_orders WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(row.map(OrderRow::into_record))
    }

    async fn create(
        &self,
        order_id: &str,
        status: OrderStatus,
        details: &ReviewDetails,
    ) -> Result<Option<String>, BackendError> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO review_orders (order_id, status, client_email, review_text, customer_name, star_rating, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (order_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(order_id)
        .bind(status.as_str())
        .bind(&details.email)
        .bind(&details.review_text)
        .bind(&details.customer_name)
        .bind(i16::from(details.star_rating))
        .bind(&details.image_url)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(id.map(|id| id.to_string()))
    }

    async fn transition(
        &self,
        order_id: &str,
        expected: OrderStatus,
        next: OrderStatus,
        details: &ReviewDetails,
    ) -> Result<bool, BackendError> {
        let result = sqlx::query(
            r#"
            UPDATE review_orders
            SET status = $3,
                client_email = COALESCE($4, client_email),
                review_text = COALESCE($5, review_text),
                customer_name = COALESCE($6, customer_name),
                star_rating = COALESCE($7, star_rating),
                image_url = COALESCE($8, image_url),
                updated_at = now()
            WHERE order_id = $1 AND status = $2
            "#,
        )
        .bind(order_id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(non_empty(&details.email))
        .bind(non_empty(&details.review_text))
        .bind(non_empty(&details.customer_name))
        .bind((details.star_rating > 0).then(|| i16::from(details.star_rating)))
        .bind(&details.image_url)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }
}

#[async_trait]
impl RewardCodePool for PgStore {
    async fn fetch_available(&self) -> Result<Option<RewardCode>, BackendError> {
        let row = sqlx::query_as::<_, DiscountCodeRow>(
            r#"
            SELECT id, code, status, order_id, client_email
            FROM discount_codes
            WHERE status = 'available'
            ORDER BY id
            LIMIT 1
            "#,
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(DiscountCodeRow::into_code))
    }

    async fn mark_assigned(
        &self,
        code: &RewardCode,
        order_id: &str,
        email: &str,
    ) -> Result<bool, BackendError> {
        let id: i64 = code
            .pool_ref
            .parse()
            .map_err(|_| BackendError::Unavailable(format!("invalid code reference {}", code.pool_ref)))?;

        let result = sqlx::query(
            r#"
            UPDATE discount_codes
            SET status = 'assigned', order_id = $2, client_email = $3, assigned_at = now()
            WHERE id = $1 AND status = 'available'
            "#,
        )
        .bind(id)
        .bind(order_id)
        .bind(email)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
