//! Per-session step cursor.

use crate::evaluator::StepStatus;
use crate::steps::{Step, StepCatalog};
use std::sync::Arc;

/// Raised when `advance` is called on a session that has no steps left.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot advance past the last step (cursor {cursor} of {len})")]
pub struct PreconditionError {
    pub cursor: usize,
    pub len: usize,
}

/// Tracks which step of the catalog a live session is on.
///
/// The cursor only moves forward. Once a step is marked complete it stays
/// complete, even if a later judgment disagrees.
#[derive(Debug, Clone)]
pub struct SessionState {
    catalog: Arc<StepCatalog>,
    cursor: usize,
    last_status: Option<StepStatus>,
}

impl SessionState {
    pub fn new(catalog: Arc<StepCatalog>) -> Self {
        Self {
            catalog,
            cursor: 0,
            last_status: None,
        }
    }

    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    /// Zero-based index of the current step. Equal to the catalog length once done.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The step being worked on, or `None` once every step is complete.
    pub fn current_step(&self) -> Option<&Step> {
        self.catalog.get(self.cursor)
    }

    pub fn advance(&mut self) -> Result<(), PreconditionError> {
        if self.is_done() {
            return Err(PreconditionError {
                cursor: self.cursor,
                len: self.catalog.len(),
            });
        }
        self.cursor += 1;
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.catalog.len()
    }

    pub fn record_status(&mut self, status: StepStatus) {
        self.last_status = Some(status);
    }

    pub fn last_status(&self) -> Option<StepStatus> {
        self.last_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(n: usize) -> Arc<StepCatalog> {
        Arc::new(StepCatalog::from_steps(
            (0..n)
                .map(|i| Step::new(format!("Step {}", i), format!("Do thing {}", i)))
                .collect(),
        ))
    }

    #[test]
    fn test_new_session_starts_at_first_step() {
        let state = SessionState::new(catalog(3));

        assert_eq!(state.cursor(), 0);
        assert_eq!(state.current_step().unwrap().title, "Step 0");
        assert_eq!(state.last_status(), None);
        assert!(!state.is_done());
    }

    #[test]
    fn test_advance_is_monotonic_until_done() {
        let n = 4;
        let mut state = SessionState::new(catalog(n));

        for k in 0..n {
            assert!(!state.is_done());
            assert_eq!(state.current_step().unwrap().title, format!("Step {}", k));
            state.advance().unwrap();
            assert_eq!(state.cursor(), k + 1);
        }

        assert!(state.is_done());
        assert!(state.current_step().is_none());
    }

    #[test]
    fn test_advance_past_end_fails_and_keeps_cursor() {
        let mut state = SessionState::new(catalog(1));
        state.advance().unwrap();

        let err = state.advance().unwrap_err();
        assert_eq!(err, PreconditionError { cursor: 1, len: 1 });
        assert_eq!(state.cursor(), 1);
        assert!(state.is_done());
    }

    #[test]
    fn test_empty_catalog_is_done_immediately() {
        let mut state = SessionState::new(catalog(0));

        assert!(state.is_done());
        assert!(state.current_step().is_none());
        assert!(state.advance().is_err());
    }

    #[test]
    fn test_record_status_keeps_latest() {
        let mut state = SessionState::new(catalog(2));
        state.record_status(StepStatus::NeedsAttention);
        state.record_status(StepStatus::InProgress);

        assert_eq!(state.last_status(), Some(StepStatus::InProgress));
    }
}
