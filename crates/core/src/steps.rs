//! Step Catalog
//!
//! The ordered list of steps a tutoring session walks the user through. A
//! catalog is built once per session and never mutated afterwards; a step's
//! identity is its position in the list.

use serde::{Deserialize, Serialize};

/// A single unit of a guided task, spoken to the user by the tutor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub title: String,
    pub description: String,
}

impl Step {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// A caller-supplied step entry, before validation.
///
/// Both fields are optional here so that a malformed entry can be reported
/// precisely instead of failing deserialization of the whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl From<Step> for StepSpec {
    fn from(step: Step) -> Self {
        Self {
            title: Some(step.title),
            description: Some(step.description),
        }
    }
}

/// Raised when a supplied step list cannot be turned into a catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("step {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },
}

/// The fallback course used when a session is started without course data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseDefaults {
    pub course_title: String,
    pub steps: Vec<Step>,
}

impl CourseDefaults {
    /// The built-in six-step light switch walkthrough.
    pub fn light_switch() -> Self {
        Self {
            course_title: "Replacing a light switch".to_string(),
            steps: vec![
                Step::new(
                    "Turn off power",
                    "Go to your circuit breaker and switch off the power to the room.",
                ),
                Step::new(
                    "Remove the switch plate",
                    "Use a screwdriver to remove the screws and gently pull off the plate.",
                ),
                Step::new(
                    "Unscrew the old switch",
                    "Loosen the screws on the sides and pull it out of the box.",
                ),
                Step::new(
                    "Disconnect the wires",
                    "Unscrew or unclip the wires from the old switch carefully.",
                ),
                Step::new(
                    "Install the new switch",
                    "Connect the wires to the new switch and tighten the screws.",
                ),
                Step::new(
                    "Reattach the plate and test",
                    "Screw the plate back on, turn on power, and test the switch.",
                ),
            ],
        }
    }
}

impl Default for CourseDefaults {
    fn default() -> Self {
        Self::light_switch()
    }
}

/// An ordered, immutable sequence of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StepCatalog {
    steps: Vec<Step>,
}

impl StepCatalog {
    /// Builds a catalog from a supplied list, or from `defaults` when the list
    /// is absent or empty.
    ///
    /// Every supplied entry must carry a non-empty title and description.
    pub fn build(
        source: Option<Vec<StepSpec>>,
        defaults: &CourseDefaults,
    ) -> Result<Self, ConfigurationError> {
        let specs = match source {
            Some(specs) if !specs.is_empty() => specs,
            _ => return Ok(Self::from_steps(defaults.steps.clone())),
        };

        let steps = specs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| {
                let title = required(spec.title, index, "title")?;
                let description = required(spec.description, index, "description")?;
                Ok(Step { title, description })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { steps })
    }

    /// Wraps an already-validated list of steps.
    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    pub fn as_slice(&self) -> &[Step] {
        &self.steps
    }
}

fn required(
    value: Option<String>,
    index: usize,
    field: &'static str,
) -> Result<String, ConfigurationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigurationError::MissingField { index, field }),
    }
}
