//! Participant positions and personalization traits

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the two participant positions in a room.
///
/// Serialized as `user1`/`user2` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    #[serde(rename = "user1")]
    One,
    #[serde(rename = "user2")]
    Two,
}

impl Slot {
    /// The other slot.
    pub fn other(self) -> Slot {
        match self {
            Slot::One => Slot::Two,
            Slot::Two => Slot::One,
        }
    }

    /// Wire/prompt label for this slot.
    pub fn label(self) -> &'static str {
        match self {
            Slot::One => "user1",
            Slot::Two => "user2",
        }
    }
}

/// A participant-chosen trait used only to personalize narration.
///
/// Never drives coordination logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Him,
    Her,
    #[default]
    Neutral,
}

impl Attribute {
    pub fn as_str(self) -> &'static str {
        match self {
            Attribute::Him => "him",
            Attribute::Her => "her",
            Attribute::Neutral => "neutral",
        }
    }
}

/// A participant bound to a room slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupant {
    pub identity: Uuid,
    pub attribute: Attribute,
}
