use crate::models::{BatchSummary, ImageOutcome};

/// Counts and averages outcomes. Rejected images contribute their score
/// (usually 0) to the average; an empty batch averages to 0.
pub fn summarize(outcomes: &[ImageOutcome]) -> BatchSummary {
    let total = outcomes.len();
    let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
    let score_sum: f64 = outcomes.iter().map(|o| f64::from(o.quality_score)).sum();

    BatchSummary {
        total,
        accepted,
        rejected: total - accepted,
        average_score: if total == 0 { 0.0 } else { score_sum / total as f64 },
    }
}

/// Whether enough images were accepted to earn a reward.
pub fn qualifies(summary: &BatchSummary, min_accepted: usize) -> bool {
    summary.accepted >= min_accepted
}
