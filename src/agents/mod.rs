mod decision;
mod vision;

pub use decision::{enforce_people_rule, fallback_outcome, normalize, PEOPLE_DETECTED_FEEDBACK};
pub use vision::{parse_answer, OpenAiClassifier};
