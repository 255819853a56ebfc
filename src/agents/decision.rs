use crate::config::ClassifierFallback;
use crate::error::ClassifierError;
use crate::models::{ClassifierVerdict, Decision, ImageOutcome};

pub const PEOPLE_DETECTED_FEEDBACK: &str =
    "The photo contains people - please remove them from the frame";

const FALLBACK_ACCEPT_SCORE: u8 = 85;

/// Turns a raw classifier answer into the canonical outcome.
///
/// The people override runs last and unconditionally, so an upstream
/// `accept` with a perfect score still ends up rejected.
pub fn normalize(filename: &str, verdict: ClassifierVerdict, threshold: u8) -> ImageOutcome {
    let score = clamp_score(verdict.score);

    let decision = verdict
        .decision
        .as_deref()
        .and_then(Decision::parse)
        .unwrap_or(if score >= threshold && !verdict.contains_people {
            Decision::Accept
        } else {
            Decision::Reject
        });

    let feedback = verdict
        .feedback
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| default_feedback(decision).to_string());

    enforce_people_rule(ImageOutcome {
        filename: filename.to_string(),
        decision,
        quality_score: score,
        contains_people: verdict.contains_people,
        feedback,
        stored_url: None,
        stored_by: None,
    })
}

/// Forces a reject with the fixed message whenever people were detected.
pub fn enforce_people_rule(mut outcome: ImageOutcome) -> ImageOutcome {
    if outcome.contains_people {
        outcome.decision = Decision::Reject;
        outcome.feedback = PEOPLE_DETECTED_FEEDBACK.to_string();
    }
    outcome
}

/// Outcome used when the classifier could not answer.
pub fn fallback_outcome(
    filename: &str,
    error: &ClassifierError,
    policy: ClassifierFallback,
) -> ImageOutcome {
    match policy {
        ClassifierFallback::Accept => ImageOutcome {
            filename: filename.to_string(),
            decision: Decision::Accept,
            quality_score: FALLBACK_ACCEPT_SCORE,
            contains_people: false,
            feedback: "Photo accepted without automated review (analysis unavailable)".to_string(),
            stored_url: None,
            stored_by: None,
        },
        ClassifierFallback::Reject => ImageOutcome::rejected(filename, failure_feedback(error)),
    }
}

fn failure_feedback(error: &ClassifierError) -> &'static str {
    match error {
        ClassifierError::Unauthorized | ClassifierError::NotConfigured => {
            "Photo analysis is not available right now. Please try again later."
        }
        ClassifierError::RateLimited => {
            "Photo analysis is busy right now. Please try again in a moment."
        }
        ClassifierError::BadRequest(_) => {
            "The photo could not be analysed. Please try a different file."
        }
        ClassifierError::Timeout => "Photo analysis timed out. Please try again.",
        ClassifierError::Transport(_) | ClassifierError::MalformedResponse(_) => {
            "Photo analysis failed. Please try again."
        }
    }
}

fn default_feedback(decision: Decision) -> &'static str {
    match decision {
        Decision::Accept => "The product is clearly visible and the photo quality is good",
        Decision::Reject => "The photo does not meet the quality requirements",
    }
}

fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.clamp(0.0, 100.0).round() as u8
}
