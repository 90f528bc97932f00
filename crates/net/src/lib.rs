//! Tandem Network Library
//!
//! TCP transport for the story server: length-prefixed JSON frames, the
//! client/server protocol envelopes, the server accept loop, and a small
//! client used by frontends and tests. The server is also the broadcast
//! adapter: it implements [`tandem_core::RoomNotifier`] by fanning each
//! room event out to both occupants with per-recipient views.

pub mod client;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod server;

pub use client::{Client, ServerEvent};
pub use error::{Error, Result};
pub use protocol::{ClientMessage, ServerMessage, MAX_CONTENT_CHARS, MIN_CONTENT_CHARS};
pub use server::Server;
