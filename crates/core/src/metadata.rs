//! Session Metadata
//!
//! Course data a client attaches when it joins a live tutoring session.
//! Metadata is best effort: unreadable JSON or missing fields fall back to the
//! course defaults instead of refusing the session.

use crate::steps::{ConfigurationError, CourseDefaults, StepCatalog, StepSpec};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub course_title: Option<String>,
    pub steps: Option<Vec<StepSpec>>,
}

impl SessionMetadata {
    /// Parses a metadata document, falling back to empty metadata (and so to
    /// the defaults) when the document is absent, blank, or not valid JSON.
    pub fn from_json(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            info!("No session metadata supplied, using course defaults");
            return Self::default();
        };
        match serde_json::from_str::<SessionMetadata>(raw) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(error = %e, "Unreadable session metadata, using course defaults");
                Self::default()
            }
        }
    }

    /// Resolves the course title and step catalog for a session.
    ///
    /// Fails only when a non-empty step list contains an entry without a title
    /// or description.
    pub fn into_session_parts(
        self,
        defaults: &CourseDefaults,
    ) -> Result<(String, StepCatalog), ConfigurationError> {
        let course_title = self
            .course_title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| defaults.course_title.clone());
        let catalog = StepCatalog::build(self.steps, defaults)?;
        info!(course = %course_title, steps = catalog.len(), "Resolved session course");
        Ok((course_title, catalog))
    }
}
