//! Browser recording engine
//!
//! This module provides:
//! - Session registry with a per-session liveness monitor
//! - Event-to-step mapping into Gherkin lines
//! - The capture script injected into recorded pages
//! - The orchestrator tying sessions, mapping and scoring together

pub mod registry;
pub mod script;
pub mod service;
pub mod session;
pub mod step_mapper;

pub use registry::{MonitorHook, SessionRegistry, SharedSession};
pub use script::CaptureScript;
pub use service::{
    scenario_text, EventRequest, LocatorsUsed, PingStatus, RecorderService, RecordingSummary,
    StartedSession, SCENARIO_HEADER,
};
pub use session::{ActionKind, RecordedEvent, Session};
pub use step_mapper::{LocatorContext, StepKind, StepMapper, StepTemplate};
