//! Collaborator contracts the pipeline is driven through.
//!
//! Every external system sits behind one of these traits and is constructed
//! once at startup, then injected into [`Pipeline`](crate::pipeline::Pipeline).
//!
//! ```text
//!   images ──► ContentClassifier        (vision model)
//!          ──► BlobStore × N            (tried in order)
//!   order  ──► OrderRecordStore         (compare-and-set on status)
//!   reward ──► RewardCodePool           (compare-and-set on assignment)
//!          ──► Notifier                 (fire and report)
//! ```

use async_trait::async_trait;

use crate::error::{BackendError, ClassifierError};
use crate::models::{
    ClassifierVerdict, Notification, OrderRecord, OrderStatus, ReviewDetails, RewardCode,
};

/// External vision model scoring a product photo.
#[async_trait]
pub trait ContentClassifier: Send + Sync {
    /// Classifies one image. A failure is reported as [`ClassifierError`],
    /// never disguised as a reject.
    async fn classify(
        &self,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<ClassifierVerdict, ClassifierError>;

    /// Whether credentials are present; reported by the status endpoint.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Durable storage for uploaded images.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend label, recorded on each stored image.
    fn name(&self) -> &str;

    /// Stores `bytes` under `key` and returns a durable URL.
    async fn upload(&self, bytes: &[u8], key: &str, mime_type: &str)
        -> Result<String, BackendError>;
}

/// External order-tracking store, one record per order.
///
/// Writes are conditional so concurrent submissions for the same order
/// serialize on the store rather than on process-local locks.
#[async_trait]
pub trait OrderRecordStore: Send + Sync {
    async fn find(&self, order_id: &str) -> Result<Option<OrderRecord>, BackendError>;

    /// Inserts a record unless one already exists. Returns the new record
    /// reference, or `None` when another writer created it first.
    async fn create(
        &self,
        order_id: &str,
        status: OrderStatus,
        details: &ReviewDetails,
    ) -> Result<Option<String>, BackendError>;

    /// Moves the record from `expected` to `next`. Returns `false` without
    /// writing when the stored status no longer equals `expected`.
    async fn transition(
        &self,
        order_id: &str,
        expected: OrderStatus,
        next: OrderStatus,
        details: &ReviewDetails,
    ) -> Result<bool, BackendError>;

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Finite pool of pre-generated discount codes.
#[async_trait]
pub trait RewardCodePool: Send + Sync {
    /// Returns some currently available code, or `None` when the pool is empty.
    async fn fetch_available(&self) -> Result<Option<RewardCode>, BackendError>;

    /// Marks `code` assigned to the order. Returns `false` when the code was
    /// no longer available (another order claimed it first).
    async fn mark_assigned(
        &self,
        code: &RewardCode,
        order_id: &str,
        email: &str,
    ) -> Result<bool, BackendError>;
}

/// Outbound message channel (email).
#[async_trait]
pub trait Notifier: Send + Sync {
    fn kind(&self) -> &str;

    async fn send(&self, message: &Notification) -> Result<(), BackendError>;
}
