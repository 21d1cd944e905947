//! Step Evaluation
//!
//! Maps the tutor model's spoken judgment onto a progress status. The
//! classifier is a coarse keyword match: the judgment prompt asks the model to
//! say "Awesome, step complete" when a step is done, and this module only
//! listens for that phrase and a couple of warning words.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The progress status of the step currently being worked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    InProgress,
    Complete,
    NeedsAttention,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::InProgress => write!(f, "in_progress"),
            StepStatus::Complete => write!(f, "complete"),
            StepStatus::NeedsAttention => write!(f, "needs_attention"),
        }
    }
}

/// Classifies a model utterance.
///
/// Matching is case-insensitive and substring based, in this order:
/// both "awesome" and "complete" means the step is done; otherwise "danger" or
/// "wrong" means the user needs a warning; anything else is still in progress.
/// Negations are not understood, so "not dangerous" still needs attention.
pub fn classify(text: &str) -> StepStatus {
    let t = text.to_lowercase();
    if t.contains("awesome") && t.contains("complete") {
        StepStatus::Complete
    } else if t.contains("danger") || t.contains("wrong") {
        StepStatus::NeedsAttention
    } else {
        StepStatus::InProgress
    }
}
