//! Domain types shared by the pipeline, the stores and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Verdict on a single image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    /// Parses the classifier's decision field. Anything but accept/reject is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "accept" => Some(Decision::Accept),
            "reject" => Some(Decision::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionMode {
    Normal,
    Fix,
}

/// Prior per-image results the client carries into a fix-mode submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixContext {
    pub previously_rejected: Vec<ImageOutcome>,
    pub previously_accepted: Vec<ImageOutcome>,
}

/// An uploaded image, owned until it has been stored and classified.
#[derive(Debug, Clone)]
pub struct ImageCandidate {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageCandidate {
    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub order_id: String,
    pub order_email: String,
    pub review_text: String,
    pub customer_name: String,
    pub star_rating: i64,
    pub images: Vec<ImageCandidate>,
    pub mode: SubmissionMode,
    pub fix_context: Option<FixContext>,
}

/// Canonical per-image result. Never `Accept` while `contains_people` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOutcome {
    pub filename: String,
    pub decision: Decision,
    #[serde(rename = "score")]
    pub quality_score: u8,
    #[serde(rename = "people")]
    pub contains_people: bool,
    pub feedback: String,
    #[serde(default, alias = "cloudinaryUrl", skip_serializing_if = "Option::is_none")]
    pub stored_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_by: Option<String>,
}

impl ImageOutcome {
    pub fn rejected(filename: impl Into<String>, feedback: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            decision: Decision::Reject,
            quality_score: 0,
            contains_people: false,
            feedback: feedback.into(),
            stored_url: None,
            stored_by: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.decision == Decision::Accept
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub average_score: f64,
}

/// Raw classifier answer before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierVerdict {
    pub contains_people: bool,
    pub score: f64,
    pub decision: Option<String>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[serde(rename = "not_yet")]
    NotYetReviewed,
    Accepted,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::NotYetReviewed => "not_yet",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "not_yet" => Some(OrderStatus::NotYetReviewed),
            "accepted" => Some(OrderStatus::Accepted),
            "rejected" => Some(OrderStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub order_id: String,
    pub status: OrderStatus,
    pub record_ref: String,
    pub associated_email: String,
    pub review_text: String,
    pub customer_name: String,
    pub star_rating: u8,
    pub image_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Review fields written alongside a status change. Empty strings keep the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewDetails {
    pub email: String,
    pub review_text: String,
    pub customer_name: String,
    pub star_rating: u8,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    Available,
    Assigned,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RewardCode {
    pub pool_ref: String,
    pub code: String,
    pub status: PoolStatus,
    pub assigned_order_id: Option<String>,
    pub assigned_email: Option<String>,
}

/// Outbound message for the notification channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}
