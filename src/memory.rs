//! In-memory order store and reward pool for tests and local runs.
//!
//! Both honour the same conditional-write semantics as the Postgres
//! implementations: a write only lands while the stored state still matches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::BackendError;
use crate::models::{OrderRecord, OrderStatus, PoolStatus, ReviewDetails, RewardCode};
use crate::traits::{OrderRecordStore, RewardCodePool};

pub struct InMemoryOrderStore {
    records: RwLock<HashMap<String, OrderRecord>>,
    next_ref: AtomicU64,
    writes: AtomicUsize,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_ref: AtomicU64::new(1),
            writes: AtomicUsize::new(0),
        }
    }

    /// Seeds a record directly, bypassing the state rules.
    pub fn insert(&self, record: OrderRecord) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(record.order_id.clone(), record);
    }

    pub fn get(&self, order_id: &str) -> Option<OrderRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(order_id).cloned()
    }

    /// Number of successful creates and transitions.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_details(record: &mut OrderRecord, details: &ReviewDetails) {
    if !details.email.is_empty() {
        record.associated_email = details.email.clone();
    }
    if !details.review_text.is_empty() {
        record.review_text = details.review_text.clone();
    }
    if !details.customer_name.is_empty() {
        record.customer_name = details.customer_name.clone();
    }
    if details.star_rating > 0 {
        record.star_rating = details.star_rating;
    }
    if details.image_url.is_some() {
        record.image_url = details.image_url.clone();
    }
}

#[async_trait]
impl OrderRecordStore for InMemoryOrderStore {
    async fn find(&self, order_id: &str) -> Result<Option<OrderRecord>, BackendError> {
        Ok(self.get(order_id))
    }

    async fn create(
        &self,
        order_id: &str,
        status: OrderStatus,
        details: &ReviewDetails,
    ) -> Result<Option<String>, BackendError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        if records.contains_key(order_id) {
            return Ok(None);
        }

        let record_ref = format!("rec{}", self.next_ref.fetch_add(1, Ordering::SeqCst));
        records.insert(
            order_id.to_string(),
            OrderRecord {
                order_id: order_id.to_string(),
                status,
                record_ref: record_ref.clone(),
                associated_email: details.email.clone(),
                review_text: details.review_text.clone(),
                customer_name: details.customer_name.clone(),
                star_rating: details.star_rating,
                image_url: details.image_url.clone(),
                updated_at: Utc::now(),
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(Some(record_ref))
    }

    async fn transition(
        &self,
        order_id: &str,
        expected: OrderStatus,
        next: OrderStatus,
        details: &ReviewDetails,
    ) -> Result<bool, BackendError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        match records.get_mut(order_id) {
            Some(record) if record.status == expected => {
                record.status = next;
                apply_details(record, details);
                record.updated_at = Utc::now();
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

pub struct InMemoryRewardPool {
    codes: Mutex<Vec<RewardCode>>,
    fetch_calls: AtomicUsize,
}

impl InMemoryRewardPool {
    pub fn new() -> Self {
        Self::with_codes(std::iter::empty::<&str>())
    }

    pub fn with_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes = codes
            .into_iter()
            .enumerate()
            .map(|(i, code)| RewardCode {
                pool_ref: format!("code{}", i + 1),
                code: code.into(),
                status: PoolStatus::Available,
                assigned_order_id: None,
                assigned_email: None,
            })
            .collect();

        Self {
            codes: Mutex::new(codes),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<RewardCode> {
        self.codes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for InMemoryRewardPool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RewardCodePool for InMemoryRewardPool {
    async fn fetch_available(&self) -> Result<Option<RewardCode>, BackendError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let codes = self.codes.lock().unwrap_or_else(|e| e.into_inner());
        Ok(codes
            .iter()
            .find(|c| c.status == PoolStatus::Available)
            .cloned())
    }

    async fn mark_assigned(
        &self,
        code: &RewardCode,
        order_id: &str,
        email: &str,
    ) -> Result<bool, BackendError> {
        let mut codes = self.codes.lock().unwrap_or_else(|e| e.into_inner());
        match codes.iter_mut().find(|c| c.pool_ref == code.pool_ref) {
            Some(stored) if stored.status == PoolStatus::Available => {
                stored.status = PoolStatus::Assigned;
                stored.assigned_order_id = Some(order_id.to_string());
                stored.assigned_email = Some(email.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
