//! Foundry API Library Crate
//!
//! The web service around the tutoring core: configuration, course storage,
//! REST handlers, the live tutoring WebSocket, and routing. The binaries are
//! thin wrappers around this library.

pub mod audio_utils;
pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
