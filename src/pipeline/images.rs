use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::agents;
use crate::config::ClassifierFallback;
use crate::error::ClassifierError;
use crate::models::{ClassifierVerdict, ImageCandidate, ImageOutcome};
use crate::storage::{object_key, BlobChain};
use crate::traits::ContentClassifier;

use super::constraints::ImageConstraints;

/// Per-image work: local gate, storage, classification, normalization.
#[derive(Clone)]
pub struct ImageStage {
    pub constraints: ImageConstraints,
    pub acceptance_threshold: u8,
    pub fallback: ClassifierFallback,
    pub timeout: Duration,
    pub classifier: Arc<dyn ContentClassifier>,
    pub blobs: Arc<BlobChain>,
}

impl ImageStage {
    /// Processes every image concurrently and returns the outcomes in
    /// submission order once all of them are known.
    pub async fn process_all(&self, order_id: &str, images: Vec<ImageCandidate>) -> Vec<ImageOutcome> {
        let handles: Vec<_> = images
            .into_iter()
            .map(|candidate| {
                let filename = candidate.filename.clone();
                let stage = self.clone();
                let order_id = order_id.to_string();
                let handle = tokio::spawn(async move { stage.process(&order_id, candidate).await });
                (filename, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (filename, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!("Processing of {} aborted: {}", filename, e);
                    outcomes.push(ImageOutcome::rejected(
                        filename,
                        "Image processing failed. Please try again.",
                    ));
                }
            }
        }
        outcomes
    }

    pub async fn process(&self, order_id: &str, candidate: ImageCandidate) -> ImageOutcome {
        info!("Processing image {} ({} bytes)", candidate.filename, candidate.byte_size());

        let dimensions = match self.constraints.check(&candidate) {
            Ok(dimensions) => dimensions,
            Err(rejected) => {
                info!("Image {} failed local checks: {}", candidate.filename, rejected.feedback);
                return rejected;
            }
        };

        let key = object_key(order_id, &candidate.filename);
        let stored = self.blobs.upload(&candidate.bytes, &key, &candidate.mime_type).await;

        let mut outcome = match self.classify(&candidate).await {
            Ok(verdict) => {
                agents::normalize(&candidate.filename, verdict, self.acceptance_threshold)
            }
            Err(e) => {
                warn!("Classifier failed for {}: {}, applying {:?} fallback", candidate.filename, e, self.fallback);
                agents::fallback_outcome(&candidate.filename, &e, self.fallback)
            }
        };

        if let Some(stored) = stored {
            outcome.stored_url = Some(stored.url);
            outcome.stored_by = Some(stored.backend);
        }

        info!(
            target: "validation",
            filename = %outcome.filename,
            size = candidate.byte_size(),
            dimensions = %format!("{}x{}", dimensions.width, dimensions.height),
            decision = ?outcome.decision,
            score = outcome.quality_score,
            people = outcome.contains_people,
            "image validated"
        );

        outcome
    }

    async fn classify(&self, candidate: &ImageCandidate) -> Result<ClassifierVerdict, ClassifierError> {
        match tokio::time::timeout(
            self.timeout,
            self.classifier.classify(&candidate.bytes, &candidate.mime_type),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout),
        }
    }
}
