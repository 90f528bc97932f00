//! Wire protocol message types
//!
//! All messages are JSON-serialized and length-prefixed on the wire. The
//! protocol is asymmetric: clients send [`ClientMessage`], servers send
//! [`ServerMessage`]. Room views are computed per recipient, so the same
//! event produces different payloads for the two occupants.

use serde::{Deserialize, Serialize};

use tandem_core::{Attribute, Genre, RoomView};

/// Inclusive bounds on `send_message` content length, in characters.
pub const MIN_CONTENT_CHARS: usize = 1;
pub const MAX_CONTENT_CHARS: usize = 500;

/// Validate turn content at the boundary, before it reaches the core.
pub fn validate_content(content: &str) -> std::result::Result<(), String> {
    let chars = content.chars().count();
    if !(MIN_CONTENT_CHARS..=MAX_CONTENT_CHARS).contains(&chars) {
        return Err(format!(
            "Message must be between {} and {} characters",
            MIN_CONTENT_CHARS, MAX_CONTENT_CHARS
        ));
    }
    Ok(())
}

/// Messages from a participant's client to the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create or join the room for `code`. The code is validated
    /// server-side before reaching the registry.
    JoinRoom {
        code: String,
        attribute: Attribute,
        genre: Genre,
    },

    /// Submit a turn.
    SendMessage { content: String },

    /// End the story for both occupants.
    EndStory,

    /// Leave the room (the connection stays open).
    LeaveRoom,
}

/// Messages from the server to a participant's client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Join succeeded; the view reflects the recipient's slot.
    RoomJoined { room: RoomView },

    /// Room state changed.
    RoomUpdated { room: RoomView },

    /// Interim signal: the narrator is working on this turn.
    AiThinking { room: RoomView },

    /// Terminal: the story has ended.
    StoryEnded { room: RoomView },

    /// A per-connection error. Never fatal to the room or the process.
    Error { message: String },
}
