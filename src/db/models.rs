use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::models::{OrderRecord, OrderStatus, PoolStatus, RewardCode};

#[derive(Debug, FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub order_id: String,
    pub status: String,
    pub client_email: String,
    pub review_text: String,
    pub customer_name: String,
    pub star_rating: i16,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    /// Unknown status strings are treated as not yet reviewed.
    pub fn into_record(self) -> OrderRecord {
        OrderRecord {
            order_id: self.order_id,
            status: OrderStatus::parse(&self.status).unwrap_or(OrderStatus::NotYetReviewed),
            record_ref: self.id.to_string(),
            associated_email: self.client_email,
            review_text: self.review_text,
            customer_name: self.customer_name,
            star_rating: u8::try_from(self.star_rating).unwrap_or(0),
            image_url: self.image_url,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct DiscountCodeRow {
    pub id: i64,
    pub code: String,
    pub status: String,
    pub order_id: Option<String>,
    pub client_email: Option<String>,
}

impl DiscountCodeRow {
    pub fn into_code(self) -> RewardCode {
        RewardCode {
            pool_ref: self.id.to_string(),
            code: self.code,
            status: if self.status == "assigned" {
                PoolStatus::Assigned
            } else {
                PoolStatus::Available
            },
            assigned_order_id: self.order_id,
            assigned_email: self.client_email,
        }
    }
}
