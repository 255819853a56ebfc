use chrono::Utc;
use serde::Serialize;

use crate::models::{BatchSummary, ImageOutcome, SubmissionMode, SubmissionRequest};

use super::reward::IssuedReward;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub average_score: f64,
}

impl From<&BatchSummary> for SummaryView {
    fn from(summary: &BatchSummary) -> Self {
        Self {
            total: summary.total,
            accepted: summary.accepted,
            rejected: summary.rejected,
            average_score: (summary.average_score * 100.0).round() / 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEcho {
    pub order_id: String,
    pub email: String,
    pub review_text: String,
}

/// Caller-facing result of a submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub success: bool,
    pub mode: SubmissionMode,
    pub per_image_results: Vec<ImageOutcome>,
    pub summary: SummaryView,
    pub qualified: bool,
    pub reward_code: Option<String>,
    pub review_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_confirmed: Option<bool>,
    pub order_echo: OrderEcho,
    pub timestamp: String,
}

/// Identity of the submission, kept after the images have been consumed.
#[derive(Debug, Clone)]
pub struct SubmissionEcho {
    pub order_id: String,
    pub email: String,
    pub review_text: String,
    pub customer_name: String,
    pub star_rating: u8,
    pub mode: SubmissionMode,
}

impl SubmissionEcho {
    pub fn of(request: &SubmissionRequest) -> Self {
        Self {
            order_id: request.order_id.clone(),
            email: request.order_email.clone(),
            review_text: request.review_text.clone(),
            customer_name: request.customer_name.clone(),
            star_rating: u8::try_from(request.star_rating).unwrap_or(0),
            mode: request.mode,
        }
    }
}

/// Shapes the response. `reward` and `review_id` are only ever set for a
/// fresh acceptance in normal mode.
pub fn respond(
    echo: &SubmissionEcho,
    outcomes: Vec<ImageOutcome>,
    summary: &BatchSummary,
    qualified: bool,
    review_id: Option<String>,
    reward: Option<IssuedReward>,
) -> SubmissionResponse {
    let (reward_code, delivery_confirmed) = match reward {
        Some(r) => (Some(r.code), Some(r.delivery_confirmed)),
        None => (None, None),
    };

    SubmissionResponse {
        success: true,
        mode: echo.mode,
        per_image_results: outcomes,
        summary: SummaryView::from(summary),
        qualified,
        reward_code,
        review_id,
        delivery_confirmed,
        order_echo: OrderEcho {
            order_id: echo.order_id.clone(),
            email: echo.email.clone(),
            review_text: echo.review_text.clone(),
        },
        timestamp: Utc::now().to_rfc3339(),
    }
}
