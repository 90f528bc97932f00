//! Per-identity room projection sent over the wire
//!
//! The view is asymmetric: each occupant sees their own attribute, their own
//! slot, and only the *attribute* of their partner - never the partner's
//! connection identity.

use serde::{Deserialize, Serialize};

use crate::world::WorldState;

use super::{Attribute, Genre, RoomCode, RoomState, Slot, TurnEntry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomView {
    pub code: RoomCode,
    pub genre: Genre,
    pub attribute: Attribute,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_attribute: Option<Attribute>,
    pub slot: Slot,
    pub state: RoomState,
    pub current_turn: Slot,
    pub transcript: Vec<TurnEntry>,
    /// Epoch milliseconds, present once the room has been active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    /// Seconds left in the session, present only while active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<u64>,
    pub world: WorldState,
}
