//! Recorder HTTP API
//!
//! REST endpoints over the recording orchestrator and the rule engine.

pub mod routes;
pub mod server;

pub use routes::{api_router, AppState};
pub use server::RecorderServer;
