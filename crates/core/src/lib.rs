//! Tandem Core Library
//!
//! Coordination core for paired real-time co-storytelling: the session
//! registry, room lifecycle and countdown, and the narration orchestrator.
//! All state is in-memory and process-lifetime; the narration backend is an
//! opaque fallible collaborator behind the [`Narrator`] trait.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod world;

pub use config::{ConfigError, NarratorConfig, ServerConfig};
pub use error::{Error, Result};
pub use models::*;
pub use orchestrator::{
    NarrationRequest, Narrator, NarratorError, OrchestrationMode, Orchestrator, RoomEvent,
    RoomNotifier, FALLBACK_NARRATION,
};
pub use registry::{EndReason, JoinOutcome, SessionRegistry};
pub use world::WorldState;
