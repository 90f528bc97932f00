//! Room model - one paired story session

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::world::WorldState;

use super::{Genre, Occupant, RoomCode, Slot, TurnEntry};

/// Lifecycle state of a room. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Waiting,
    Active,
    Ended,
}

/// A paired story session.
///
/// At most two occupants; `Active` means both slots are filled. The
/// transcript is append-only. The session countdown task is owned by the
/// room record itself, so cancelling it is part of the room's own state
/// transitions rather than separate bookkeeping.
#[derive(Debug)]
pub struct Room {
    pub code: RoomCode,
    pub genre: Genre,
    pub state: RoomState,
    pub slot1: Option<Occupant>,
    pub slot2: Option<Occupant>,
    /// Which slot may submit next; meaningful only while active.
    pub current_turn: Slot,
    pub transcript: Vec<TurnEntry>,
    /// Epoch milliseconds, set on the waiting -> active transition.
    pub started_at: Option<i64>,
    /// Epoch milliseconds, set on the transition to ended.
    pub ended_at: Option<i64>,
    pub world: WorldState,
    countdown: Option<JoinHandle<()>>,
}

impl Room {
    pub fn new(code: RoomCode, genre: Genre, first: Occupant) -> Self {
        Self {
            code,
            genre,
            state: RoomState::Waiting,
            slot1: Some(first),
            slot2: None,
            current_turn: Slot::One,
            transcript: Vec::new(),
            started_at: None,
            ended_at: None,
            world: WorldState::default(),
            countdown: None,
        }
    }

    pub fn occupant(&self, slot: Slot) -> Option<&Occupant> {
        match slot {
            Slot::One => self.slot1.as_ref(),
            Slot::Two => self.slot2.as_ref(),
        }
    }

    /// The slot an identity occupies, if any.
    pub fn slot_of(&self, identity: Uuid) -> Option<Slot> {
        if self.slot1.map(|o| o.identity) == Some(identity) {
            Some(Slot::One)
        } else if self.slot2.map(|o| o.identity) == Some(identity) {
            Some(Slot::Two)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slot1.is_none() && self.slot2.is_none()
    }

    pub fn clear_slot(&mut self, slot: Slot) {
        match slot {
            Slot::One => self.slot1 = None,
            Slot::Two => self.slot2 = None,
        }
    }

    /// Store the session countdown task, replacing (and aborting) any
    /// prior one. At most one live countdown per room.
    pub fn arm_countdown(&mut self, handle: JoinHandle<()>) {
        if let Some(prior) = self.countdown.replace(handle) {
            prior.abort();
        }
    }

    /// Cancel the countdown if one is armed.
    pub fn disarm_countdown(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
    }

    /// Take the countdown handle without aborting it. The expiry path uses
    /// this so the countdown task never aborts itself mid-run.
    pub fn take_countdown(&mut self) -> Option<JoinHandle<()>> {
        self.countdown.take()
    }
}
