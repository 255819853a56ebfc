use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::bounded;
use crate::models::Notification;
use crate::templates::Templates;
use crate::traits::{Notifier, RewardCodePool};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_CLAIM_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedReward {
    pub code: String,
    /// `false` when the code was generated locally because the pool was
    /// empty or unreachable.
    pub from_pool: bool,
    pub delivery_confirmed: bool,
}

/// Generates a code of the form `PREFIX-XXXX-XXXX`.
pub fn generate_fallback_code(prefix: &str) -> String {
    let mut rng = rand::rng();
    let mut group = || -> String {
        (0..4)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    };
    let first = group();
    let second = group();
    format!("{}-{}-{}", prefix, first, second)
}

pub struct RewardIssuer {
    pool: Arc<dyn RewardCodePool>,
    notifier: Arc<dyn Notifier>,
    templates: Arc<Templates>,
    code_prefix: String,
    timeout: Duration,
}

impl RewardIssuer {
    pub fn new(
        pool: Arc<dyn RewardCodePool>,
        notifier: Arc<dyn Notifier>,
        templates: Arc<Templates>,
        code_prefix: String,
        timeout: Duration,
    ) -> Self {
        Self {
            pool,
            notifier,
            templates,
            code_prefix,
            timeout,
        }
    }

    /// Assigns a code to the order and tries to deliver it. Must only be
    /// called after the order moved into `Accepted` for the first time.
    pub async fn issue(&self, order_id: &str, email: &str, customer_name: &str) -> IssuedReward {
        let (code, from_pool) = match self.claim_pool_code(order_id, email).await {
            Some(code) => (code, true),
            None => {
                let code = generate_fallback_code(&self.code_prefix);
                warn!("Using generated fallback code {} for order {}", code, order_id);
                (code, false)
            }
        };

        let delivery_confirmed = self.deliver(&code, order_id, email, customer_name).await;

        IssuedReward {
            code,
            from_pool,
            delivery_confirmed,
        }
    }

    async fn claim_pool_code(&self, order_id: &str, email: &str) -> Option<String> {
        for attempt in 1..=MAX_CLAIM_ATTEMPTS {
            let candidate = match bounded(self.timeout, self.pool.fetch_available()).await {
                Ok(Some(code)) => code,
                Ok(None) => {
                    warn!("Reward code pool is exhausted");
                    return None;
                }
                Err(e) => {
                    warn!("Reward code pool unavailable: {}", e);
                    return None;
                }
            };

            match bounded(self.timeout, self.pool.mark_assigned(&candidate, order_id, email)).await {
                Ok(true) => {
                    info!("Discount code {} assigned to order {}", candidate.code, order_id);
                    return Some(candidate.code);
                }
                Ok(false) => {
                    warn!(
                        "Discount code {} was claimed concurrently (attempt {}/{})",
                        candidate.code, attempt, MAX_CLAIM_ATTEMPTS
                    );
                }
                Err(e) => {
                    warn!("Failed to assign discount code {}: {}", candidate.code, e);
                    return None;
                }
            }
        }
        None
    }

    async fn deliver(&self, code: &str, order_id: &str, email: &str, customer_name: &str) -> bool {
        let html_body = match self.templates.discount_email(code, order_id, customer_name) {
            Ok(body) => body,
            Err(e) => {
                warn!("Could not render discount email: {}", e);
                return false;
            }
        };

        let message = Notification {
            to: email.to_string(),
            subject: format!("Your discount code for reviewing order {}", order_id),
            html_body,
        };

        match bounded(self.timeout, self.notifier.send(&message)).await {
            Ok(()) => {
                info!("Discount code email sent to {} via {}", email, self.notifier.kind());
                true
            }
            Err(e) => {
                warn!("Discount code email to {} failed: {}", email, e);
                false
            }
        }
    }
}
