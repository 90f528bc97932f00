//! Transcript entries - the immutable items that make up a story

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Slot;

/// What kind of transcript entry this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Authored by a participant; `sender` names the slot.
    #[serde(rename = "user")]
    Participant,
    /// Authored by the narration backend.
    #[serde(rename = "ai")]
    Narration,
    Ambience,
    System,
}

/// One immutable item in a room's transcript.
///
/// Created once, appended once, never mutated or reordered. Insertion order
/// is the story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub content: String,
    /// Authoring slot, present only for participant entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Slot>,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl TurnEntry {
    fn new(kind: EntryKind, content: String, sender: Option<Slot>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            content,
            sender,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn participant(slot: Slot, content: String) -> Self {
        Self::new(EntryKind::Participant, content, Some(slot))
    }

    pub fn narration(content: String) -> Self {
        Self::new(EntryKind::Narration, content, None)
    }

    pub fn ambience(content: String) -> Self {
        Self::new(EntryKind::Ambience, content, None)
    }

    pub fn system(content: String) -> Self {
        Self::new(EntryKind::System, content, None)
    }
}
