//! Request parsing and input validation. Everything here runs before any
//! external call and reports every violated rule at once.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::PipelineSettings;
use crate::error::Error;
use crate::models::{FixContext, ImageCandidate, ImageOutcome, SubmissionMode, SubmissionRequest};

static ORDER_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static pattern"));
static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static pattern"));
static REVIEW_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N}\s.,!?()-]+$").expect("static pattern"));
static CUSTOMER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\s]+$").expect("static pattern"));

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 100;

/// Raw multipart fields as received.
#[derive(Debug, Default)]
pub struct SubmissionForm {
    pub order_number: String,
    pub order_email: String,
    pub text_review: String,
    pub customer_name: String,
    pub star_rating: String,
    pub fix_mode: String,
    pub rejected_images: Option<String>,
    pub accepted_images: Option<String>,
    pub images: Vec<ImageCandidate>,
}

impl SubmissionForm {
    pub fn into_request(self) -> Result<SubmissionRequest, Error> {
        let mut reasons = Vec::new();

        // An unreadable rating is reported by validate_request alongside the other rules.
        let star_rating = self.star_rating.trim().parse::<i64>().unwrap_or(0);

        let mode = if self.fix_mode.trim().eq_ignore_ascii_case("true") {
            SubmissionMode::Fix
        } else {
            SubmissionMode::Normal
        };

        let fix_context = match mode {
            SubmissionMode::Normal => None,
            SubmissionMode::Fix => {
                let rejected = match self.rejected_images.as_deref() {
                    Some(raw) => parse_outcomes("rejectedImages", raw, &mut reasons),
                    None => {
                        reasons.push(
                            "Fix mode requires the list of previously rejected images".to_string(),
                        );
                        Vec::new()
                    }
                };
                let accepted = self
                    .accepted_images
                    .as_deref()
                    .map(|raw| parse_outcomes("acceptedImages", raw, &mut reasons))
                    .unwrap_or_default();
                Some(FixContext {
                    previously_rejected: rejected,
                    previously_accepted: accepted,
                })
            }
        };

        if !reasons.is_empty() {
            return Err(Error::Validation(reasons));
        }

        Ok(SubmissionRequest {
            order_id: self.order_number.trim().to_string(),
            order_email: self.order_email.trim().to_string(),
            review_text: self.text_review.trim().to_string(),
            customer_name: self.customer_name.trim().to_string(),
            star_rating,
            images: self.images,
            mode,
            fix_context,
        })
    }
}

fn parse_outcomes(field: &str, raw: &str, reasons: &mut Vec<String>) -> Vec<ImageOutcome> {
    match serde_json::from_str::<Vec<ImageOutcome>>(raw) {
        Ok(outcomes) => outcomes,
        Err(e) => {
            reasons.push(format!("{} is not a valid list of image results: {}", field, e));
            Vec::new()
        }
    }
}

/// Checks every submission rule and collects all violations.
pub fn validate_request(request: &SubmissionRequest, settings: &PipelineSettings) -> Result<(), Error> {
    let mut reasons = Vec::new();

    if request.order_id.is_empty() {
        reasons.push("Order number is required".to_string());
    } else if !ORDER_NUMBER.is_match(&request.order_id) {
        reasons.push(
            "Order number may only contain letters, digits, hyphens and underscores".to_string(),
        );
    }

    if !EMAIL_SHAPE.is_match(&request.order_email) {
        reasons.push("Please enter a valid email address".to_string());
    }

    let text_len = request.review_text.chars().count();
    if text_len < settings.review_text_min || text_len > settings.review_text_max {
        reasons.push(format!(
            "Review must be between {} and {} characters long (currently {})",
            settings.review_text_min, settings.review_text_max, text_len
        ));
    } else if !REVIEW_TEXT.is_match(&request.review_text) {
        reasons.push(
            "Review may only contain letters, digits, spaces and basic punctuation".to_string(),
        );
    }

    let name_len = request.customer_name.chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&name_len) {
        reasons.push(format!(
            "Name must be between {} and {} characters long",
            NAME_MIN, NAME_MAX
        ));
    } else if !CUSTOMER_NAME.is_match(&request.customer_name) {
        reasons.push("Name may only contain letters and spaces".to_string());
    }

    if !(1..=5).contains(&request.star_rating) {
        reasons.push("Star rating must be between 1 and 5".to_string());
    }

    check_image_count(request, settings, &mut reasons);

    for image in &request.images {
        if !settings.allowed_mime_types.iter().any(|m| m == &image.mime_type) {
            reasons.push(format!(
                "{} has an unsupported format ({}). Allowed: {}",
                image.filename,
                image.mime_type,
                settings.allowed_mime_types.join(", ")
            ));
        }
    }

    if let Some(context) = &request.fix_context {
        if context
            .previously_accepted
            .iter()
            .any(|o| !o.is_accepted() || o.contains_people || o.quality_score > 100)
        {
            reasons.push("acceptedImages may only contain accepted image results".to_string());
        }
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(reasons))
    }
}

fn check_image_count(request: &SubmissionRequest, settings: &PipelineSettings, reasons: &mut Vec<String>) {
    let received = request.images.len();
    match request.mode {
        SubmissionMode::Normal => {
            if received != settings.required_images {
                reasons.push(format!(
                    "Exactly {} photos are required, received {}",
                    settings.required_images, received
                ));
            }
        }
        SubmissionMode::Fix => {
            let expected = request
                .fix_context
                .as_ref()
                .map_or(0, |c| c.previously_rejected.len());
            if expected > settings.required_images {
                reasons.push(format!(
                    "At most {} photos can be replaced",
                    settings.required_images
                ));
            } else if received != expected {
                reasons.push(format!(
                    "Fix mode expects {} replacement photos, received {}",
                    expected, received
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Decision;

    fn image(name: &str) -> ImageCandidate {
        ImageCandidate {
            filename: name.to_string(),
            mime_type: "image/jpeg".to_string(),
            bytes: vec![1, 2, 3],
        }
    }

    fn form() -> SubmissionForm {
        SubmissionForm {
            order_number: "ORD-2024_01".to_string(),
            order_email: "anna@example.com".to_string(),
            text_review: "Solid greenhouse, easy to assemble!".to_string(),
            customer_name: "Anna Żółć".to_string(),
            star_rating: "4".to_string(),
            fix_mode: "false".to_string(),
            images: vec![image("1.jpg"), image("2.jpg"), image("3.jpg")],
            ..Default::default()
        }
    }

    fn reasons(result: Result<(), Error>) -> Vec<String> {
        match result {
            Err(Error::Validation(reasons)) => reasons,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn valid_normal_submission_passes() {
        let request = form().into_request().unwrap();
        assert_eq!(request.mode, SubmissionMode::Normal);
        assert!(validate_request(&request, &PipelineSettings::default()).is_ok());
    }

    #[test]
    fn every_violation_is_reported() {
        let mut bad = form();
        bad.order_number = "ORD 1".to_string();
        bad.order_email = "not-an-email".to_string();
        bad.text_review = "too short".to_string();
        bad.customer_name = "R2D2".to_string();
        bad.star_rating = "6".to_string();
        bad.images.pop();
        let request = bad.into_request().unwrap();

        let reasons = reasons(validate_request(&request, &PipelineSettings::default()));
        assert_eq!(reasons.len(), 6, "{:?}", reasons);
        assert!(reasons.iter().any(|r| r.contains("Exactly 3 photos")));
        assert!(reasons.iter().any(|r| r.contains("between 20 and 500")));
    }

    #[test]
    fn review_length_bounds_are_inclusive() {
        let settings = PipelineSettings::default();
        let mut request = form().into_request().unwrap();

        request.review_text = "a".repeat(20);
        assert!(validate_request(&request, &settings).is_ok());
        request.review_text = "a".repeat(500);
        assert!(validate_request(&request, &settings).is_ok());
        request.review_text = "a".repeat(19);
        assert!(validate_request(&request, &settings).is_err());
        request.review_text = "a".repeat(501);
        assert!(validate_request(&request, &settings).is_err());
    }

    #[test]
    fn unsupported_mime_type_is_rejected() {
        let mut request = form().into_request().unwrap();
        request.images[1].mime_type = "image/gif".to_string();
        let reasons = reasons(validate_request(&request, &PipelineSettings::default()));
        assert!(reasons[0].contains("2.jpg has an unsupported format (image/gif)"));
    }

    #[test]
    fn non_numeric_rating_is_reported_with_other_rules() {
        let mut bad = form();
        bad.star_rating = "five".to_string();
        bad.order_email = String::new();
        let request = bad.into_request().unwrap();
        let reasons = reasons(validate_request(&request, &PipelineSettings::default()));
        assert_eq!(reasons.len(), 2, "{:?}", reasons);
        assert!(reasons.iter().any(|r| r.contains("Star rating")));
    }

    #[test]
    fn fix_mode_counts_against_rejected_list() {
        let mut fix = form();
        fix.fix_mode = "true".to_string();
        fix.rejected_images = Some(
            r#"[{"filename":"3.jpg","decision":"reject","score":20,"people":false,"feedback":"dark"}]"#
                .to_string(),
        );
        fix.accepted_images = Some(
            r#"[{"filename":"1.jpg","decision":"accept","score":90,"people":false,"feedback":"ok"},
                {"filename":"2.jpg","decision":"accept","score":80,"people":false,"feedback":"ok"}]"#
                .to_string(),
        );
        fix.images = vec![image("3b.jpg")];

        let request = fix.into_request().unwrap();
        assert_eq!(request.mode, SubmissionMode::Fix);
        let context = request.fix_context.as_ref().unwrap();
        assert_eq!(context.previously_accepted.len(), 2);
        assert_eq!(context.previously_rejected[0].decision, Decision::Reject);
        assert!(validate_request(&request, &PipelineSettings::default()).is_ok());

        let mut too_many = request.clone();
        too_many.images.push(image("extra.jpg"));
        let reasons = reasons(validate_request(&too_many, &PipelineSettings::default()));
        assert!(reasons[0].contains("expects 1 replacement photos, received 2"));
    }

    #[test]
    fn fix_mode_rejects_malformed_context() {
        let mut fix = form();
        fix.fix_mode = "true".to_string();
        fix.rejected_images = Some("{not json".to_string());
        assert!(matches!(fix.into_request(), Err(Error::Validation(_))));

        let mut missing = form();
        missing.fix_mode = "true".to_string();
        assert!(matches!(missing.into_request(), Err(Error::Validation(_))));
    }

    #[test]
    fn forged_accepted_results_are_refused() {
        let mut fix = form();
        fix.fix_mode = "true".to_string();
        fix.rejected_images = Some("[]".to_string());
        fix.accepted_images = Some(
            r#"[{"filename":"1.jpg","decision":"accept","score":100,"people":true,"feedback":"ok"}]"#
                .to_string(),
        );
        fix.images = Vec::new();
        let request = fix.into_request().unwrap();
        let reasons = reasons(validate_request(&request, &PipelineSettings::default()));
        assert!(reasons[0].contains("acceptedImages"));
    }
}
