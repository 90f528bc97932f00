//! Session registry - owns all live rooms and identity bindings
//!
//! The registry is the single authority over room state: every mutation
//! goes through its operations. Rooms live behind their own mutex so
//! mutations on one room are serialized while distinct rooms proceed
//! concurrently. The room map and the identity bindings are guarded
//! separately; no operation holds more than one guard at a time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    Attribute, Genre, Occupant, Room, RoomCode, RoomState, RoomView, Slot, TurnEntry,
};

/// Why a room ended. Rendered into the terminal system entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// An occupant asked to end the story.
    Requested,
    /// The session countdown ran out.
    Expired,
    /// The story metrics crossed an ending threshold.
    Concluded,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EndReason::Requested => "The story was brought to a close.",
            EndReason::Expired => "Time ran out. The story has ended.",
            EndReason::Concluded => "The story reached its natural end.",
        })
    }
}

/// Result of a join request.
#[derive(Debug)]
pub struct JoinOutcome {
    pub room: Arc<Mutex<Room>>,
    pub slot: Slot,
    pub is_new: bool,
    /// True when this join filled the second slot and flipped the room to
    /// active - the caller starts the session countdown.
    pub activated: bool,
}

/// In-memory store of live rooms and identity -> room bindings.
pub struct SessionRegistry {
    session_secs: u64,
    rooms: RwLock<HashMap<RoomCode, Arc<Mutex<Room>>>>,
    bindings: RwLock<HashMap<Uuid, RoomCode>>,
}

impl SessionRegistry {
    pub fn new(session_secs: u64) -> Self {
        Self {
            session_secs,
            rooms: RwLock::new(HashMap::new()),
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Configured session length in seconds.
    pub fn session_secs(&self) -> u64 {
        self.session_secs
    }

    /// Create the room for `code` or join the existing one.
    ///
    /// A joiner whose identity already occupies a slot gets their existing
    /// assignment back. The second distinct identity fills slot two and
    /// activates the room; anyone after that is rejected.
    pub async fn create_or_join(
        &self,
        identity: Uuid,
        code: RoomCode,
        attribute: Attribute,
        genre: Genre,
    ) -> Result<JoinOutcome> {
        let occupant = Occupant {
            identity,
            attribute,
        };

        let (room_arc, created) = {
            let mut rooms = self.rooms.write().await;
            match rooms.get(&code) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let room = Arc::new(Mutex::new(Room::new(code.clone(), genre, occupant)));
                    rooms.insert(code.clone(), room.clone());
                    (room, true)
                }
            }
        };

        if created {
            self.bindings.write().await.insert(identity, code.clone());
            tracing::info!(code = %code, genre = ?genre, "Room created");
            return Ok(JoinOutcome {
                room: room_arc,
                slot: Slot::One,
                is_new: true,
                activated: false,
            });
        }

        let outcome = {
            let mut room = room_arc.lock().await;
            if room.genre != genre {
                return Err(Error::GenreMismatch);
            }
            if let Some(slot) = room.slot_of(identity) {
                // Same identity rejoining: idempotent.
                (slot, false)
            } else if room.state == RoomState::Ended {
                return Err(Error::RoomNotActive);
            } else if room.slot2.is_none() && room.slot1.is_some() {
                room.slot2 = Some(occupant);
                room.state = RoomState::Active;
                room.started_at = Some(Utc::now().timestamp_millis());
                room.current_turn = Slot::One;
                (Slot::Two, true)
            } else {
                return Err(Error::RoomFull);
            }
        };

        self.bindings.write().await.insert(identity, code.clone());
        if outcome.1 {
            tracing::info!(code = %code, "Room activated");
        }
        Ok(JoinOutcome {
            room: room_arc,
            slot: outcome.0,
            is_new: false,
            activated: outcome.1,
        })
    }

    /// Look up a room by code.
    pub async fn room(&self, code: &RoomCode) -> Option<Arc<Mutex<Room>>> {
        self.rooms.read().await.get(code).cloned()
    }

    /// Look up the room an identity is bound to.
    pub async fn room_for_identity(&self, identity: Uuid) -> Option<(RoomCode, Arc<Mutex<Room>>)> {
        let code = self.bindings.read().await.get(&identity).cloned()?;
        let room = self.room(&code).await?;
        Some((code, room))
    }

    /// Append a transcript entry. No-op when the room is absent; callers
    /// validate room existence before reaching this path.
    pub async fn append_turn(&self, code: &RoomCode, entry: TurnEntry) {
        if let Some(room) = self.room(code).await {
            room.lock().await.transcript.push(entry);
        }
    }

    /// Flip `current_turn` to the other slot.
    pub async fn advance_turn(&self, code: &RoomCode) {
        if let Some(room) = self.room(code).await {
            let mut room = room.lock().await;
            room.current_turn = room.current_turn.other();
        }
    }

    /// Transition a room to ended. Idempotent: only the first call per room
    /// returns true, so a countdown expiry racing a manual end produces
    /// exactly one terminal broadcast.
    pub async fn end_room(&self, code: &RoomCode, reason: EndReason) -> bool {
        let Some(room) = self.room(code).await else {
            return false;
        };
        let mut room = room.lock().await;
        if room.state == RoomState::Ended {
            return false;
        }
        room.state = RoomState::Ended;
        room.ended_at = Some(Utc::now().timestamp_millis());
        match reason {
            // The expiry path runs inside the countdown task; take the
            // handle without aborting so the task can finish its broadcast.
            EndReason::Expired => {
                room.take_countdown();
            }
            _ => room.disarm_countdown(),
        }
        room.transcript.push(TurnEntry::system(reason.to_string()));
        tracing::info!(code = %code, reason = ?reason, "Room ended");
        true
    }

    /// Unbind an identity and clear its slot. Deletes the room (cancelling
    /// its countdown) once both slots are empty, so one-sided disconnects
    /// cannot leak rooms.
    pub async fn remove_identity(&self, identity: Uuid) {
        let Some(code) = self.bindings.write().await.remove(&identity) else {
            return;
        };
        let Some(room_arc) = self.room(&code).await else {
            return;
        };

        let now_empty = {
            let mut room = room_arc.lock().await;
            if let Some(slot) = room.slot_of(identity) {
                room.clear_slot(slot);
            }
            room.is_empty()
        };

        if now_empty {
            let removed = self.rooms.write().await.remove(&code);
            if let Some(room) = removed {
                room.lock().await.disarm_countdown();
            }
            tracing::info!(code = %code, "Room abandoned, deleted");
        }
    }

    /// Store the session countdown task in its room. If the room is already
    /// gone the task is aborted immediately.
    pub async fn attach_countdown(&self, code: &RoomCode, handle: JoinHandle<()>) {
        match self.room(code).await {
            Some(room) => room.lock().await.arm_countdown(handle),
            None => handle.abort(),
        }
    }

    /// Project a room into the view appropriate for one occupant. Returns
    /// `None` for identities not bound to the room.
    pub fn snapshot_for(&self, room: &Room, identity: Uuid) -> Option<RoomView> {
        let slot = room.slot_of(identity)?;
        let own = room.occupant(slot)?;
        let partner = room.occupant(slot.other());

        let time_remaining = match (room.state, room.started_at) {
            (RoomState::Active, Some(start)) => {
                let elapsed = (Utc::now().timestamp_millis() - start).max(0) as u64 / 1000;
                Some(self.session_secs.saturating_sub(elapsed))
            }
            _ => None,
        };

        Some(RoomView {
            code: room.code.clone(),
            genre: room.genre,
            attribute: own.attribute,
            partner_attribute: partner.map(|o| o.attribute),
            slot,
            state: room.state,
            current_turn: room.current_turn,
            transcript: room.transcript.clone(),
            started_at: room.started_at,
            time_remaining,
            world: room.world,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryKind;

    fn code() -> RoomCode {
        RoomCode::parse("123456").unwrap()
    }

    async fn active_pair(registry: &SessionRegistry) -> (Uuid, Uuid) {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry
            .create_or_join(a, code(), Attribute::Her, Genre::HorrorAuto)
            .await
            .unwrap();
        registry
            .create_or_join(b, code(), Attribute::Him, Genre::HorrorAuto)
            .await
            .unwrap();
        (a, b)
    }

    #[tokio::test]
    async fn test_create_then_join_activates() {
        let registry = SessionRegistry::new(600);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let first = registry
            .create_or_join(a, code(), Attribute::Her, Genre::HorrorAuto)
            .await
            .unwrap();
        assert!(first.is_new);
        assert!(!first.activated);
        assert_eq!(first.slot, Slot::One);
        assert_eq!(first.room.lock().await.state, RoomState::Waiting);

        let second = registry
            .create_or_join(b, code(), Attribute::Him, Genre::HorrorAuto)
            .await
            .unwrap();
        assert!(!second.is_new);
        assert!(second.activated);
        assert_eq!(second.slot, Slot::Two);

        let room = second.room.lock().await;
        assert_eq!(room.state, RoomState::Active);
        assert!(room.started_at.is_some());
        assert_eq!(room.current_turn, Slot::One);
    }

    #[tokio::test]
    async fn test_genre_mismatch_leaves_room_waiting() {
        let registry = SessionRegistry::new(600);
        let a = Uuid::new_v4();
        registry
            .create_or_join(a, code(), Attribute::Neutral, Genre::BackToSchool)
            .await
            .unwrap();

        let err = registry
            .create_or_join(Uuid::new_v4(), code(), Attribute::Neutral, Genre::HorrorAuto)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GenreMismatch));

        let room = registry.room(&code()).await.unwrap();
        let room = room.lock().await;
        assert_eq!(room.state, RoomState::Waiting);
        assert!(room.slot2.is_none());
    }

    #[tokio::test]
    async fn test_third_identity_rejected() {
        let registry = SessionRegistry::new(600);
        active_pair(&registry).await;

        let err = registry
            .create_or_join(Uuid::new_v4(), code(), Attribute::Neutral, Genre::HorrorAuto)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RoomFull));
    }

    #[tokio::test]
    async fn test_rejoin_same_identity_is_idempotent() {
        let registry = SessionRegistry::new(600);
        let (a, _b) = active_pair(&registry).await;

        let again = registry
            .create_or_join(a, code(), Attribute::Her, Genre::HorrorAuto)
            .await
            .unwrap();
        assert_eq!(again.slot, Slot::One);
        assert!(!again.activated);
        assert_eq!(again.room.lock().await.state, RoomState::Active);
    }

    #[tokio::test]
    async fn test_never_more_than_two_identities() {
        let registry = SessionRegistry::new(600);
        active_pair(&registry).await;

        for _ in 0..5 {
            let _ = registry
                .create_or_join(Uuid::new_v4(), code(), Attribute::Neutral, Genre::HorrorAuto)
                .await;
        }
        let room = registry.room(&code()).await.unwrap();
        let room = room.lock().await;
        assert!(room.slot1.is_some());
        assert!(room.slot2.is_some());
    }

    #[tokio::test]
    async fn test_append_and_advance() {
        let registry = SessionRegistry::new(600);
        active_pair(&registry).await;

        registry
            .append_turn(&code(), TurnEntry::participant(Slot::One, "hi".to_string()))
            .await;
        registry.advance_turn(&code()).await;

        let room = registry.room(&code()).await.unwrap();
        let room = room.lock().await;
        assert_eq!(room.transcript.len(), 1);
        assert_eq!(room.current_turn, Slot::Two);
    }

    #[tokio::test]
    async fn test_append_to_absent_room_is_noop() {
        let registry = SessionRegistry::new(600);
        registry
            .append_turn(&code(), TurnEntry::system("x".to_string()))
            .await;
        assert!(registry.room(&code()).await.is_none());
    }

    #[tokio::test]
    async fn test_end_room_is_idempotent() {
        let registry = SessionRegistry::new(600);
        active_pair(&registry).await;

        assert!(registry.end_room(&code(), EndReason::Requested).await);
        assert!(!registry.end_room(&code(), EndReason::Expired).await);

        let room = registry.room(&code()).await.unwrap();
        let room = room.lock().await;
        assert_eq!(room.state, RoomState::Ended);
        assert!(room.ended_at.is_some());
        let system_entries = room
            .transcript
            .iter()
            .filter(|e| e.kind == EntryKind::System)
            .count();
        assert_eq!(system_entries, 1);
    }

    #[tokio::test]
    async fn test_remove_one_of_two_keeps_room() {
        let registry = SessionRegistry::new(600);
        let (a, _b) = active_pair(&registry).await;

        registry.remove_identity(a).await;

        let room = registry.room(&code()).await.unwrap();
        let room = room.lock().await;
        assert!(room.slot1.is_none());
        assert!(room.slot2.is_some());
        assert_eq!(room.state, RoomState::Active);
    }

    #[tokio::test]
    async fn test_remove_last_occupant_deletes_room() {
        let registry = SessionRegistry::new(600);
        let a = Uuid::new_v4();
        registry
            .create_or_join(a, code(), Attribute::Neutral, Genre::MidnightParcel)
            .await
            .unwrap();

        registry.remove_identity(a).await;
        assert!(registry.room(&code()).await.is_none());
        assert!(registry.room_for_identity(a).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_is_asymmetric_and_hides_identities() {
        let registry = SessionRegistry::new(600);
        let (a, b) = active_pair(&registry).await;

        let room_arc = registry.room(&code()).await.unwrap();
        let room = room_arc.lock().await;

        let view_a = registry.snapshot_for(&room, a).unwrap();
        assert_eq!(view_a.slot, Slot::One);
        assert_eq!(view_a.attribute, Attribute::Her);
        assert_eq!(view_a.partner_attribute, Some(Attribute::Him));

        let view_b = registry.snapshot_for(&room, b).unwrap();
        assert_eq!(view_b.slot, Slot::Two);
        assert_eq!(view_b.attribute, Attribute::Him);
        assert_eq!(view_b.partner_attribute, Some(Attribute::Her));

        // Neither serialized view carries either raw identity.
        for view in [&view_a, &view_b] {
            let json = serde_json::to_string(view).unwrap();
            assert!(!json.contains(&a.to_string()));
            assert!(!json.contains(&b.to_string()));
        }

        assert!(registry.snapshot_for(&room, Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn test_time_remaining_only_while_active() {
        let registry = SessionRegistry::new(600);
        let a = Uuid::new_v4();
        let outcome = registry
            .create_or_join(a, code(), Attribute::Neutral, Genre::TruthOrDare)
            .await
            .unwrap();
        {
            let room = outcome.room.lock().await;
            let view = registry.snapshot_for(&room, a).unwrap();
            assert!(view.time_remaining.is_none());
        }

        registry
            .create_or_join(Uuid::new_v4(), code(), Attribute::Neutral, Genre::TruthOrDare)
            .await
            .unwrap();
        {
            let room = outcome.room.lock().await;
            let view = registry.snapshot_for(&room, a).unwrap();
            let remaining = view.time_remaining.unwrap();
            assert!(remaining <= 600 && remaining >= 598);
        }
    }
}
