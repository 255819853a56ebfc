use crate::models::ImageOutcome;

/// Puts the previously accepted outcomes first, then the fresh ones, each
/// group in its original order. Nothing here touches order state.
pub fn merge(previously_accepted: Vec<ImageOutcome>, fresh: Vec<ImageOutcome>) -> Vec<ImageOutcome> {
    let mut merged = previously_accepted;
    merged.extend(fresh);
    merged
}
