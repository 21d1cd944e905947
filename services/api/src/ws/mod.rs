//! WebSocket Session Management
//!
//! Live tutoring sessions over WebSockets:
//!
//! - `protocol`: The JSON message format between browser and server.
//! - `session`: Connection lifecycle, from the `init` handshake to teardown.
//! - `provider`: The upstream realtime model connection (Gemini Live).

pub mod protocol;
mod provider;
pub mod session;

pub use session::ws_handler;
