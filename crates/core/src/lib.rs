//! Foundry Core
//!
//! The step-progression tutoring loop and the course model it is fed from.
//! Nothing in this crate knows about HTTP, databases, or a particular realtime
//! provider; those sit behind [`channel::ConversationChannel`] and
//! [`course_gen::CourseGenerator`].

pub mod cancel;
pub mod channel;
pub mod course;
pub mod course_gen;
pub mod evaluator;
pub mod metadata;
pub mod prompts;
pub mod session;
pub mod steps;
pub mod tutor;

pub use channel::{ChannelError, ConversationChannel, Prompt, Reply};
pub use evaluator::{StepStatus, classify};
pub use session::{PreconditionError, SessionState};
pub use steps::{ConfigurationError, CourseDefaults, Step, StepCatalog, StepSpec};
pub use tutor::{SessionOutcome, TickReport, TutorConfig, TutorError, TutoringLoop};
