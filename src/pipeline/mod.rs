//! Submission pipeline.
//!
//! ```text
//! validate ─► precheck order ─► per image (concurrent):
//!                                 constraints ─► upload ─► classify ─► normalize
//!                              ─► join ─► summarize
//!   normal: commit order state ─► reward (fresh acceptance only) ─► respond
//!   fix:    merge with previously accepted ───────────────────────► respond
//! ```

pub mod aggregate;
pub mod constraints;
pub mod fix_mode;
pub mod images;
pub mod input;
pub mod reconcile;
pub mod respond;
pub mod reward;

use std::sync::Arc;
use tracing::info;

use crate::config::PipelineSettings;
use crate::error::Error;
use crate::models::{ImageOutcome, ReviewDetails, SubmissionMode, SubmissionRequest};
use crate::storage::BlobChain;
use crate::templates::Templates;
use crate::traits::{BlobStore, ContentClassifier, Notifier, OrderRecordStore, RewardCodePool};

use constraints::ImageConstraints;
use images::ImageStage;
use reconcile::OrderStateReconciler;
use respond::{SubmissionEcho, SubmissionResponse};
use reward::RewardIssuer;

/// External systems the pipeline talks to, built once at startup.
pub struct Collaborators {
    pub classifier: Arc<dyn ContentClassifier>,
    pub blob_stores: Vec<Arc<dyn BlobStore>>,
    pub records: Arc<dyn OrderRecordStore>,
    pub reward_pool: Arc<dyn RewardCodePool>,
    pub notifier: Arc<dyn Notifier>,
    pub templates: Arc<Templates>,
}

/// Read-only view of how the pipeline is wired, for the status endpoint.
#[derive(Debug, Clone)]
pub struct PipelineInfo {
    pub classifier_configured: bool,
    pub blob_backends: Vec<String>,
    pub notifier: String,
}

pub struct Pipeline {
    settings: PipelineSettings,
    images: ImageStage,
    reconciler: OrderStateReconciler,
    rewards: RewardIssuer,
    records: Arc<dyn OrderRecordStore>,
    info: PipelineInfo,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings, collaborators: Collaborators) -> Self {
        let blobs = Arc::new(BlobChain::new(collaborators.blob_stores, settings.call_timeout));

        let info = PipelineInfo {
            classifier_configured: collaborators.classifier.is_configured(),
            blob_backends: blobs.backend_names(),
            notifier: collaborators.notifier.kind().to_string(),
        };

        let images = ImageStage {
            constraints: ImageConstraints::from_settings(&settings),
            acceptance_threshold: settings.acceptance_threshold,
            fallback: settings.classifier_fallback,
            timeout: settings.call_timeout,
            classifier: collaborators.classifier,
            blobs,
        };

        let reconciler =
            OrderStateReconciler::new(collaborators.records.clone(), settings.call_timeout);

        let rewards = RewardIssuer::new(
            collaborators.reward_pool,
            collaborators.notifier,
            collaborators.templates,
            settings.reward_code_prefix.clone(),
            settings.call_timeout,
        );

        Self {
            settings,
            images,
            reconciler,
            rewards,
            records: collaborators.records,
            info,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn info(&self) -> &PipelineInfo {
        &self.info
    }

    pub async fn record_store_reachable(&self) -> bool {
        crate::error::bounded(self.settings.call_timeout, self.records.ping())
            .await
            .is_ok()
    }

    /// Runs one submission to completion.
    pub async fn submit(&self, request: SubmissionRequest) -> Result<SubmissionResponse, Error> {
        input::validate_request(&request, &self.settings)?;

        let echo = SubmissionEcho::of(&request);
        info!(
            "Submission for order {} ({:?} mode, {} images)",
            echo.order_id,
            echo.mode,
            request.images.len()
        );

        let prior = match echo.mode {
            SubmissionMode::Normal => self.reconciler.precheck(&echo.order_id).await?,
            SubmissionMode::Fix => None,
        };

        let SubmissionRequest { images, fix_context, .. } = request;
        let fresh = self.images.process_all(&echo.order_id, images).await;

        match echo.mode {
            SubmissionMode::Fix => {
                let previously_accepted = fix_context
                    .map(|c| c.previously_accepted)
                    .unwrap_or_default();
                let merged = fix_mode::merge(previously_accepted, fresh);
                let summary = aggregate::summarize(&merged);
                let qualified = aggregate::qualifies(&summary, self.settings.min_accepted_for_reward);
                info!(
                    "Fix mode for order {}: {}/{} accepted after merge, no order state touched",
                    echo.order_id, summary.accepted, summary.total
                );
                Ok(respond::respond(&echo, merged, &summary, qualified, None, None))
            }
            SubmissionMode::Normal => {
                let summary = aggregate::summarize(&fresh);
                let qualified = aggregate::qualifies(&summary, self.settings.min_accepted_for_reward);
                info!(
                    "Order {}: {}/{} images accepted, average score {:.2}",
                    echo.order_id, summary.accepted, summary.total, summary.average_score
                );

                let details = ReviewDetails {
                    email: echo.email.clone(),
                    review_text: echo.review_text.clone(),
                    customer_name: echo.customer_name.clone(),
                    star_rating: echo.star_rating,
                    image_url: first_accepted_url(&fresh),
                };

                let transition = self
                    .reconciler
                    .commit(&echo.order_id, prior.as_ref(), qualified, &details)
                    .await?;

                let (review_id, reward) = match transition.fresh_acceptance() {
                    Some(record_ref) => {
                        let reward = self
                            .rewards
                            .issue(&echo.order_id, &echo.email, &echo.customer_name)
                            .await;
                        (Some(record_ref.to_string()), Some(reward))
                    }
                    None => (None, None),
                };

                Ok(respond::respond(&echo, fresh, &summary, qualified, review_id, reward))
            }
        }
    }
}

fn first_accepted_url(outcomes: &[ImageOutcome]) -> Option<String> {
    outcomes
        .iter()
        .filter(|o| o.is_accepted())
        .find_map(|o| o.stored_url.clone())
}
