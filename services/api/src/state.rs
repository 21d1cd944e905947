//! Shared Application State
//!
//! Everything a handler or WebSocket session needs, created once at startup.

use crate::config::Config;
use foundry_core::{CourseDefaults, course_gen::CourseGenerator};
use std::sync::Arc;

/// The shared application state, passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<crate::db::Db>,
    pub course_generator: Arc<dyn CourseGenerator>,
    /// Course used when a live session starts without usable metadata.
    pub course_defaults: Arc<CourseDefaults>,
    pub config: Arc<Config>,
}
