//! Order state machine and the one-reward-per-order gate.
//!
//! ```text
//!   Absent ─────────┬─► Accepted   (reward)
//!                   └─► Rejected
//!   NotYetReviewed ─┬─► Accepted   (reward)
//!                   └─► Rejected
//!   Rejected ───────┬─► Accepted   (reward)
//!                   └─  no write
//!   Accepted        ──  refused
//! ```

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{bounded, Error};
use crate::models::{OrderRecord, OrderStatus, ReviewDetails};
use crate::traits::OrderRecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Create(OrderStatus),
    Update { from: OrderStatus, to: OrderStatus },
    Skip,
    Refuse,
}

/// Decides the write for a submission outcome given the stored status.
pub fn plan(current: Option<OrderStatus>, qualified: bool) -> Plan {
    let next = if qualified {
        OrderStatus::Accepted
    } else {
        OrderStatus::Rejected
    };

    match current {
        None => Plan::Create(next),
        Some(OrderStatus::Accepted) => Plan::Refuse,
        Some(OrderStatus::Rejected) if next == OrderStatus::Rejected => Plan::Skip,
        Some(from) => Plan::Update { from, to: next },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Created { status: OrderStatus, record_ref: String },
    Updated { from: OrderStatus, to: OrderStatus, record_ref: String },
    Unchanged { status: OrderStatus },
}

impl Transition {
    /// Record reference when this submission moved the order into `Accepted`.
    /// Only such a transition may lead to a reward.
    pub fn fresh_acceptance(&self) -> Option<&str> {
        match self {
            Transition::Created { status: OrderStatus::Accepted, record_ref }
            | Transition::Updated { to: OrderStatus::Accepted, record_ref, .. } => {
                Some(record_ref.as_str())
            }
            _ => None,
        }
    }
}

pub struct OrderStateReconciler {
    records: Arc<dyn OrderRecordStore>,
    timeout: Duration,
}

impl OrderStateReconciler {
    pub fn new(records: Arc<dyn OrderRecordStore>, timeout: Duration) -> Self {
        Self { records, timeout }
    }

    /// Looks up the order and refuses it outright when already accepted.
    pub async fn precheck(&self, order_id: &str) -> Result<Option<OrderRecord>, Error> {
        let record = bounded(self.timeout, self.records.find(order_id)).await?;

        match &record {
            Some(r) if r.status == OrderStatus::Accepted => {
                info!("Order {} already has an accepted review, refusing", order_id);
                Err(Error::AlreadyAccepted { order_id: order_id.to_string() })
            }
            Some(r) => {
                info!("Order {} has status '{}', proceeding", order_id, r.status.as_str());
                Ok(record)
            }
            None => {
                info!("Order {} not found, a new record will be created", order_id);
                Ok(None)
            }
        }
    }

    /// Writes the outcome of a submission. `prior` is the record seen by
    /// [`precheck`](Self::precheck); the write only lands if it is still current.
    pub async fn commit(
        &self,
        order_id: &str,
        prior: Option<&OrderRecord>,
        qualified: bool,
        details: &ReviewDetails,
    ) -> Result<Transition, Error> {
        match plan(prior.map(|r| r.status), qualified) {
            Plan::Refuse => Err(Error::AlreadyAccepted { order_id: order_id.to_string() }),
            Plan::Skip => {
                info!("Order {} rejected again, record left unchanged", order_id);
                Ok(Transition::Unchanged { status: OrderStatus::Rejected })
            }
            Plan::Create(status) => {
                let created =
                    bounded(self.timeout, self.records.create(order_id, status, details)).await?;
                match created {
                    Some(record_ref) => {
                        info!("Order {} recorded as '{}' ({})", order_id, status.as_str(), record_ref);
                        Ok(Transition::Created { status, record_ref })
                    }
                    None => Err(self.lost_race(order_id).await),
                }
            }
            Plan::Update { from, to } => {
                let applied = bounded(
                    self.timeout,
                    self.records.transition(order_id, from, to, details),
                )
                .await?;
                if !applied {
                    return Err(self.lost_race(order_id).await);
                }
                let record_ref = prior.map(|r| r.record_ref.clone()).unwrap_or_default();
                info!("Order {} moved from '{}' to '{}'", order_id, from.as_str(), to.as_str());
                Ok(Transition::Updated { from, to, record_ref })
            }
        }
    }

    async fn lost_race(&self, order_id: &str) -> Error {
        warn!("Order {} changed while this submission was processed", order_id);
        match bounded(self.timeout, self.records.find(order_id)).await {
            Ok(Some(current)) if current.status == OrderStatus::Accepted => {
                Error::AlreadyAccepted { order_id: order_id.to_string() }
            }
            Ok(_) => Error::ConcurrentUpdate { order_id: order_id.to_string() },
            Err(e) => Error::RecordStore(e),
        }
    }
}
