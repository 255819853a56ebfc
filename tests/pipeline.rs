use async_trait::async_trait;
use chrono::Utc;
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use ugc_review::config::{ClassifierFallback, PipelineSettings};
use ugc_review::error::{BackendError, ClassifierError, Error};
use ugc_review::memory::{InMemoryOrderStore, InMemoryRewardPool};
use ugc_review::models::{
    ClassifierVerdict, Decision, FixContext, ImageCandidate, ImageOutcome, Notification,
    OrderRecord, OrderStatus, ReviewDetails, SubmissionMode, SubmissionRequest,
};
use ugc_review::pipeline::{Collaborators, Pipeline};
use ugc_review::storage::LocalDiskStore;
use ugc_review::templates::Templates;
use ugc_review::traits::{BlobStore, ContentClassifier, Notifier, OrderRecordStore};

/// Answers with a verdict chosen by the exact image bytes.
#[derive(Default)]
struct StubClassifier {
    verdicts: HashMap<Vec<u8>, Result<ClassifierVerdict, ClassifierError>>,
}

impl StubClassifier {
    fn answer(mut self, image: &ImageCandidate, verdict: Result<ClassifierVerdict, ClassifierError>) -> Self {
        self.verdicts.insert(image.bytes.clone(), verdict);
        self
    }
}

#[async_trait]
impl ContentClassifier for StubClassifier {
    async fn classify(&self, bytes: &[u8], _mime_type: &str) -> Result<ClassifierVerdict, ClassifierError> {
        self.verdicts
            .get(bytes)
            .cloned()
            .unwrap_or(Err(ClassifierError::NotConfigured))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn kind(&self) -> &str {
        "recording"
    }

    async fn send(&self, message: &Notification) -> Result<(), BackendError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

struct UnreachableRecords;

#[async_trait]
impl OrderRecordStore for UnreachableRecords {
    async fn find(&self, _order_id: &str) -> Result<Option<OrderRecord>, BackendError> {
        Err(BackendError::Unavailable("connection refused".into()))
    }

    async fn create(
        &self,
        _order_id: &str,
        _status: OrderStatus,
        _details: &ReviewDetails,
    ) -> Result<Option<String>, BackendError> {
        Err(BackendError::Unavailable("connection refused".into()))
    }

    async fn transition(
        &self,
        _order_id: &str,
        _expected: OrderStatus,
        _next: OrderStatus,
        _details: &ReviewDetails,
    ) -> Result<bool, BackendError> {
        Err(BackendError::Unavailable("connection refused".into()))
    }
}

fn png(name: &str, width: u32, shade: u8) -> ImageCandidate {
    let img = RgbImage::from_pixel(width, 300, Rgb([shade, 120, 200]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    ImageCandidate {
        filename: name.to_string(),
        mime_type: "image/png".to_string(),
        bytes: buf.into_inner(),
    }
}

fn verdict(score: f64, people: bool, decision: &str) -> Result<ClassifierVerdict, ClassifierError> {
    Ok(ClassifierVerdict {
        contains_people: people,
        score,
        decision: Some(decision.to_string()),
        feedback: Some("Looks fine".to_string()),
    })
}

fn request(order_id: &str, images: Vec<ImageCandidate>) -> SubmissionRequest {
    SubmissionRequest {
        order_id: order_id.to_string(),
        order_email: "jan@example.com".to_string(),
        review_text: "Great product, works well".to_string(),
        customer_name: "Jan Kowalski".to_string(),
        star_rating: 4,
        images,
        mode: SubmissionMode::Normal,
        fix_context: None,
    }
}

struct Harness {
    pipeline: Pipeline,
    records: Arc<InMemoryOrderStore>,
    pool: Arc<InMemoryRewardPool>,
    notifier: Arc<RecordingNotifier>,
}

fn harness(classifier: StubClassifier, blob_stores: Vec<Arc<dyn BlobStore>>) -> Harness {
    harness_with(classifier, blob_stores, PipelineSettings::default())
}

fn harness_with(
    classifier: StubClassifier,
    blob_stores: Vec<Arc<dyn BlobStore>>,
    settings: PipelineSettings,
) -> Harness {
    let records = Arc::new(InMemoryOrderStore::new());
    let pool = Arc::new(InMemoryRewardPool::with_codes(["SUMMER-10", "SUMMER-11"]));
    let notifier = Arc::new(RecordingNotifier::default());

    let pipeline = Pipeline::new(
        settings,
        Collaborators {
            classifier: Arc::new(classifier),
            blob_stores,
            records: records.clone(),
            reward_pool: pool.clone(),
            notifier: notifier.clone(),
            templates: Arc::new(Templates::new().unwrap()),
        },
    );

    Harness {
        pipeline,
        records,
        pool,
        notifier,
    }
}

#[tokio::test]
async fn three_good_images_earn_a_reward() {
    let images = vec![png("a.png", 800, 1), png("b.png", 800, 2), png("c.png", 800, 3)];
    let classifier = images
        .iter()
        .fold(StubClassifier::default(), |c, img| c.answer(img, verdict(90.0, false, "accept")));
    let h = harness(classifier, Vec::new());

    let response = h.pipeline.submit(request("ORD-100", images)).await.unwrap();

    assert_eq!(response.summary.total, 3);
    assert_eq!(response.summary.accepted, 3);
    assert_eq!(response.summary.rejected, 0);
    assert_eq!(response.summary.average_score, 90.0);
    assert!(response.qualified);
    assert!(response.review_id.is_some());
    assert_eq!(response.reward_code.as_deref(), Some("SUMMER-10"));
    assert_eq!(response.delivery_confirmed, Some(true));

    let record = h.records.get("ORD-100").unwrap();
    assert_eq!(record.status, OrderStatus::Accepted);
    assert_eq!(record.star_rating, 4);
    assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);
    assert_eq!(h.notifier.sent.lock().unwrap()[0].to, "jan@example.com");
}

#[tokio::test]
async fn a_person_in_one_image_blocks_the_reward() {
    let images = vec![png("a.png", 800, 1), png("b.png", 800, 2), png("c.png", 800, 3)];
    let classifier = StubClassifier::default()
        .answer(&images[0], verdict(99.0, true, "accept"))
        .answer(&images[1], verdict(85.0, false, "accept"))
        .answer(&images[2], verdict(85.0, false, "accept"));
    let h = harness(classifier, Vec::new());

    let response = h.pipeline.submit(request("ORD-200", images)).await.unwrap();

    assert_eq!(response.summary.total, 3);
    assert_eq!(response.summary.accepted, 2);
    assert_eq!(response.summary.rejected, 1);
    assert!(!response.qualified);
    assert_eq!(response.per_image_results[0].decision, Decision::Reject);
    assert!(response.per_image_results[0].contains_people);
    assert!(response.reward_code.is_none());
    assert!(response.review_id.is_none());
    assert_eq!(h.pool.fetch_calls(), 0);
    assert_eq!(h.records.get("ORD-200").unwrap().status, OrderStatus::Rejected);
}

#[tokio::test]
async fn resubmitting_an_accepted_order_is_refused_before_any_work() {
    let images = vec![png("a.png", 800, 1), png("b.png", 800, 2), png("c.png", 800, 3)];
    let classifier = images
        .iter()
        .fold(StubClassifier::default(), |c, img| c.answer(img, verdict(100.0, false, "accept")));
    let h = harness(classifier, Vec::new());
    h.records.insert(OrderRecord {
        order_id: "ORD-300".to_string(),
        status: OrderStatus::Accepted,
        record_ref: "rec-old".to_string(),
        associated_email: "jan@example.com".to_string(),
        review_text: "Earlier review text here".to_string(),
        customer_name: "Jan Kowalski".to_string(),
        star_rating: 5,
        image_url: None,
        updated_at: Utc::now(),
    });

    let err = h.pipeline.submit(request("ORD-300", images)).await.unwrap_err();

    assert!(matches!(err, Error::AlreadyAccepted { ref order_id } if order_id == "ORD-300"));
    assert!(err.to_string().contains("already has an accepted review"), "{}", err);
    assert_eq!(h.pool.fetch_calls(), 0);
    assert_eq!(h.records.write_count(), 0);
    assert!(h.notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn rejected_order_can_be_accepted_later() {
    let good = vec![png("a.png", 800, 1), png("b.png", 800, 2), png("c.png", 800, 3)];
    let dark = png("d.png", 800, 4);
    let classifier = good
        .iter()
        .fold(StubClassifier::default(), |c, img| c.answer(img, verdict(88.0, false, "accept")))
        .answer(&dark, verdict(30.0, false, "reject"));
    let h = harness(classifier, Vec::new());

    let first = vec![good[0].clone(), good[1].clone(), dark];
    let response = h.pipeline.submit(request("ORD-400", first)).await.unwrap();
    assert!(!response.qualified);
    assert_eq!(h.records.get("ORD-400").unwrap().status, OrderStatus::Rejected);

    let response = h.pipeline.submit(request("ORD-400", good)).await.unwrap();
    assert!(response.qualified);
    assert!(response.reward_code.is_some());
    assert_eq!(h.records.get("ORD-400").unwrap().status, OrderStatus::Accepted);
    assert_eq!(h.pool.fetch_calls(), 1);
}

#[tokio::test]
async fn narrow_image_is_rejected_without_calling_the_classifier() {
    let images = vec![png("a.png", 800, 1), png("b.png", 800, 2), png("thin.png", 399, 3)];
    let classifier = StubClassifier::default()
        .answer(&images[0], verdict(90.0, false, "accept"))
        .answer(&images[1], verdict(90.0, false, "accept"))
        .answer(&images[2], verdict(100.0, false, "accept"));
    let h = harness(classifier, Vec::new());

    let response = h.pipeline.submit(request("ORD-500", images)).await.unwrap();

    let thin = &response.per_image_results[2];
    assert_eq!(thin.filename, "thin.png");
    assert_eq!(thin.decision, Decision::Reject);
    assert_eq!(thin.quality_score, 0);
    assert!(thin.feedback.contains("400"), "{}", thin.feedback);
    assert!(!response.qualified);
}

#[tokio::test]
async fn classifier_outage_follows_the_configured_fallback() {
    let images = vec![png("a.png", 800, 1), png("b.png", 800, 2), png("c.png", 800, 3)];

    let h = harness(StubClassifier::default(), Vec::new());
    let response = h.pipeline.submit(request("ORD-600", images.clone())).await.unwrap();
    assert_eq!(response.summary.accepted, 0);
    assert!(response.per_image_results.iter().all(|o| o.quality_score == 0));

    let settings = PipelineSettings {
        classifier_fallback: ClassifierFallback::Accept,
        ..PipelineSettings::default()
    };
    let h = harness_with(StubClassifier::default(), Vec::new(), settings);
    let response = h.pipeline.submit(request("ORD-601", images)).await.unwrap();
    assert_eq!(response.summary.accepted, 3);
    assert!(response.qualified);
}

#[tokio::test]
async fn record_store_outage_is_retryable() {
    let images = vec![png("a.png", 800, 1), png("b.png", 800, 2), png("c.png", 800, 3)];
    let pool = Arc::new(InMemoryRewardPool::with_codes(["X-1"]));
    let pipeline = Pipeline::new(
        PipelineSettings::default(),
        Collaborators {
            classifier: Arc::new(StubClassifier::default()),
            blob_stores: Vec::new(),
            records: Arc::new(UnreachableRecords),
            reward_pool: pool.clone(),
            notifier: Arc::new(RecordingNotifier::default()),
            templates: Arc::new(Templates::new().unwrap()),
        },
    );

    let err = pipeline.submit(request("ORD-700", images)).await.unwrap_err();

    assert!(matches!(err, Error::RecordStore(_)));
    assert!(err.retryable());
    assert_eq!(err.status_code(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(pool.fetch_calls(), 0);
}

#[tokio::test]
async fn invalid_submission_reports_reasons_and_touches_nothing() {
    let images = vec![png("a.png", 800, 1)];
    let h = harness(StubClassifier::default(), Vec::new());
    let mut bad = request("ORD 800", images);
    bad.star_rating = 0;

    let err = h.pipeline.submit(bad).await.unwrap_err();

    match err {
        Error::Validation(reasons) => assert_eq!(reasons.len(), 3, "{:?}", reasons),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(h.records.write_count(), 0);
}

#[tokio::test]
async fn accepted_images_are_stored_and_linked_on_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn BlobStore> =
        Arc::new(LocalDiskStore::new(dir.path().to_path_buf(), "http://cdn.test/uploads"));
    let images = vec![png("a.png", 800, 1), png("b.png", 800, 2), png("c.png", 800, 3)];
    let classifier = images
        .iter()
        .fold(StubClassifier::default(), |c, img| c.answer(img, verdict(75.0, false, "accept")));
    let h = harness(classifier, vec![store]);

    let response = h.pipeline.submit(request("ORD-900", images)).await.unwrap();

    for outcome in &response.per_image_results {
        let url = outcome.stored_url.as_deref().unwrap();
        assert!(url.starts_with("http://cdn.test/uploads/ugc/ORD-900/"), "{}", url);
        assert_eq!(outcome.stored_by.as_deref(), Some("local"));
    }
    let record = h.records.get("ORD-900").unwrap();
    assert_eq!(record.image_url, response.per_image_results[0].stored_url);
}

#[tokio::test]
async fn fix_mode_merges_without_touching_order_state() {
    let replacement = png("new.png", 800, 9);
    let classifier = StubClassifier::default().answer(&replacement, verdict(80.0, false, "accept"));
    let h = harness(classifier, Vec::new());

    let kept = |name: &str| ImageOutcome {
        filename: name.to_string(),
        decision: Decision::Accept,
        quality_score: 90,
        contains_people: false,
        feedback: "ok".to_string(),
        stored_url: None,
        stored_by: None,
    };
    let mut fix = request("ORD-1000", vec![replacement]);
    fix.mode = SubmissionMode::Fix;
    fix.fix_context = Some(FixContext {
        previously_rejected: vec![ImageOutcome::rejected("old.png", "too dark")],
        previously_accepted: vec![kept("a.png"), kept("b.png")],
    });

    let response = h.pipeline.submit(fix).await.unwrap();

    let names: Vec<_> = response.per_image_results.iter().map(|o| o.filename.as_str()).collect();
    assert_eq!(names, ["a.png", "b.png", "new.png"]);
    assert_eq!(response.summary.accepted, 3);
    assert!(response.qualified);
    assert!(response.reward_code.is_none());
    assert!(response.review_id.is_none());
    assert_eq!(h.records.write_count(), 0);
    assert_eq!(h.pool.fetch_calls(), 0);
}
