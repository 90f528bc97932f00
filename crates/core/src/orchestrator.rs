//! Narration orchestrator - sequences a turn from submission to broadcast
//!
//! The accepted flow is: append the participant's entry, tell both sides the
//! narrator is thinking, invoke the narration backend (the single suspension
//! point), append its reply (or a fallback - the session never stalls on a
//! backend failure), advance the turn, publish the new state. Per-room turn
//! gating guarantees at most one in-flight narration call per room: the slot
//! that just submitted is no longer current until the round trip completes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Attribute, EntryKind, Genre, RoomCode, RoomState, Slot, TurnEntry};
use crate::registry::{EndReason, SessionRegistry};
use crate::world::split_trailing_metrics;

/// Fallback narration appended when the backend fails.
pub const FALLBACK_NARRATION: &str = "*A tense silence fills the space between them.*";

/// How many recent transcript entries go into the context window.
const CONTEXT_WINDOW: usize = 4;

/// Whether the narrator runs on every turn or once per pair of turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationMode {
    /// Invoke the narrator after every accepted turn.
    #[default]
    PerTurn,
    /// Slot-one turns just pass the pen; the narrator runs after slot-two
    /// turns with both inputs as context.
    Fused,
}

/// Everything the narration backend needs for one call.
#[derive(Debug, Clone)]
pub struct NarrationRequest {
    pub genre: Genre,
    pub attribute1: Attribute,
    pub attribute2: Attribute,
    /// Role-tagged recent transcript lines, oldest first.
    pub context: Vec<String>,
    /// The participant input that triggered this call.
    pub latest: String,
}

/// Narration backend failure modes. Never surfaced to participants; the
/// orchestrator downgrades every one of them to a fallback entry.
#[derive(Debug, thiserror::Error)]
pub enum NarratorError {
    #[error("narrator transport error: {0}")]
    Transport(String),

    #[error("narrator returned a malformed response: {0}")]
    Malformed(String),

    #[error("narrator timed out")]
    Timeout,
}

/// The narration backend, treated as an opaque fallible text function.
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Produce the next narration beat.
    async fn narrate(&self, request: NarrationRequest)
        -> std::result::Result<String, NarratorError>;

    /// Produce the opening line for a freshly activated room.
    async fn opening_hook(
        &self,
        genre: Genre,
        attribute1: Attribute,
        attribute2: Attribute,
    ) -> std::result::Result<String, NarratorError>;
}

/// A room-level event worth publishing to both occupants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// Room state changed; send fresh snapshots.
    Updated,
    /// The narrator is working; interim signal, not a state change.
    Thinking,
    /// Terminal: the room has ended.
    Ended,
}

/// Transport-side fan-out of per-occupant snapshots. Implemented by the
/// network layer; delivery is at-most-once and absent occupants are skipped.
#[async_trait]
pub trait RoomNotifier: Send + Sync {
    async fn notify(&self, code: &RoomCode, event: RoomEvent);
}

pub struct Orchestrator {
    registry: Arc<SessionRegistry>,
    narrator: Arc<dyn Narrator>,
    mode: OrchestrationMode,
    /// Hard ceiling on narration length, enforced regardless of what the
    /// backend promises.
    narration_ceiling: usize,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        narrator: Arc<dyn Narrator>,
        mode: OrchestrationMode,
        narration_ceiling: usize,
    ) -> Self {
        Self {
            registry,
            narrator,
            mode,
            narration_ceiling,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Process one turn submission from `identity`.
    pub async fn submit_turn(
        &self,
        identity: Uuid,
        content: String,
        notifier: &dyn RoomNotifier,
    ) -> Result<()> {
        let Some((code, room_arc)) = self.registry.room_for_identity(identity).await else {
            return Err(Error::NotInRoom);
        };

        // Validate and append the participant entry under the room lock.
        let request = {
            let mut room = room_arc.lock().await;
            if room.state != RoomState::Active {
                return Err(Error::RoomNotActive);
            }
            let slot = room.slot_of(identity).ok_or(Error::NotInRoom)?;
            if slot != room.current_turn {
                return Err(Error::NotYourTurn);
            }

            room.transcript
                .push(TurnEntry::participant(slot, content.clone()));

            let wants_narration = match self.mode {
                OrchestrationMode::PerTurn => true,
                OrchestrationMode::Fused => slot == Slot::Two,
            };
            if wants_narration {
                let context = match self.mode {
                    OrchestrationMode::PerTurn => recent_context(&room.transcript),
                    OrchestrationMode::Fused => participant_context(&room.transcript),
                };
                Some(NarrationRequest {
                    genre: room.genre,
                    attribute1: room.slot1.map(|o| o.attribute).unwrap_or_default(),
                    attribute2: room.slot2.map(|o| o.attribute).unwrap_or_default(),
                    context,
                    latest: content,
                })
            } else {
                None
            }
        };

        let Some(request) = request else {
            // Fused mode, first half of the round: pass the pen.
            self.registry.advance_turn(&code).await;
            notifier.notify(&code, RoomEvent::Updated).await;
            return Ok(());
        };

        notifier.notify(&code, RoomEvent::Thinking).await;

        let narration = match self.narrator.narrate(request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(code = %code, error = %e, "Narrator failed, using fallback");
                FALLBACK_NARRATION.to_string()
            }
        };

        let (text, metrics) = split_trailing_metrics(&narration);
        let text = clamp_narration(&text, self.narration_ceiling);

        // Fold the reply back in. The room may have ended while we waited;
        // the narration is still appended but the turn no longer advances
        // and no active-session broadcast goes out.
        let concluded = {
            let mut room = room_arc.lock().await;
            room.transcript.push(TurnEntry::narration(text));
            if room.state != RoomState::Active {
                return Ok(());
            }
            room.current_turn = room.current_turn.other();
            if let Some(block) = &metrics {
                room.world.fold(block);
            }
            room.world.story_concluded()
        };

        if concluded && self.registry.end_room(&code, EndReason::Concluded).await {
            notifier.notify(&code, RoomEvent::Ended).await;
            return Ok(());
        }

        notifier.notify(&code, RoomEvent::Updated).await;
        Ok(())
    }

    /// Open a freshly activated room: seed the genre's ambience line and an
    /// opening hook, then publish.
    pub async fn open_story(&self, code: &RoomCode, notifier: &dyn RoomNotifier) -> Result<()> {
        let Some(room_arc) = self.registry.room(code).await else {
            return Ok(());
        };

        let (genre, attribute1, attribute2) = {
            let room = room_arc.lock().await;
            (
                room.genre,
                room.slot1.map(|o| o.attribute).unwrap_or_default(),
                room.slot2.map(|o| o.attribute).unwrap_or_default(),
            )
        };

        let hook = match self
            .narrator
            .opening_hook(genre, attribute1, attribute2)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(code = %code, error = %e, "Hook generation failed, using genre hook");
                genre.hook().to_string()
            }
        };

        {
            let mut room = room_arc.lock().await;
            room.transcript
                .push(TurnEntry::ambience(genre.ambience().to_string()));
            room.transcript.push(TurnEntry::narration(hook));
        }
        notifier.notify(code, RoomEvent::Updated).await;
        Ok(())
    }
}

/// Enforce the narration ceiling on a char boundary.
fn clamp_narration(text: &str, ceiling: usize) -> String {
    if text.chars().count() <= ceiling {
        return text.to_string();
    }
    let cut: String = text.chars().take(ceiling.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

/// The last few transcript entries as role-tagged lines, oldest first.
fn recent_context(transcript: &[TurnEntry]) -> Vec<String> {
    let skip = transcript.len().saturating_sub(CONTEXT_WINDOW);
    transcript[skip..].iter().map(role_line).collect()
}

/// The last two participant entries as role-tagged lines, oldest first.
fn participant_context(transcript: &[TurnEntry]) -> Vec<String> {
    let mut lines: Vec<String> = transcript
        .iter()
        .rev()
        .filter(|e| e.kind == EntryKind::Participant)
        .take(2)
        .map(role_line)
        .collect();
    lines.reverse();
    lines
}

fn role_line(entry: &TurnEntry) -> String {
    match (entry.kind, entry.sender) {
        (EntryKind::Participant, Some(slot)) => format!("{}: {}", slot.label(), entry.content),
        (EntryKind::Narration, _) => format!("narrator: {}", entry.content),
        _ => format!("scene: {}", entry.content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RoomView;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    /// Narrator returning a fixed response, counting invocations.
    struct ScriptedNarrator {
        response: std::result::Result<String, fn() -> NarratorError>,
        calls: AtomicUsize,
        last_request: AsyncMutex<Option<NarrationRequest>>,
    }

    impl ScriptedNarrator {
        fn ok(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
                last_request: AsyncMutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                response: Err(|| NarratorError::Timeout),
                calls: AtomicUsize::new(0),
                last_request: AsyncMutex::new(None),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Narrator for ScriptedNarrator {
        async fn narrate(
            &self,
            request: NarrationRequest,
        ) -> std::result::Result<String, NarratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().await = Some(request);
            self.response.as_ref().map(Clone::clone).map_err(|f| f())
        }

        async fn opening_hook(
            &self,
            _genre: Genre,
            _attribute1: Attribute,
            _attribute2: Attribute,
        ) -> std::result::Result<String, NarratorError> {
            self.response.as_ref().map(Clone::clone).map_err(|f| f())
        }
    }

    /// Records notified events.
    #[derive(Default)]
    struct RecordingNotifier {
        events: AsyncMutex<Vec<RoomEvent>>,
    }

    #[async_trait]
    impl RoomNotifier for RecordingNotifier {
        async fn notify(&self, _code: &RoomCode, event: RoomEvent) {
            self.events.lock().await.push(event);
        }
    }

    fn code() -> RoomCode {
        RoomCode::parse("123456").unwrap()
    }

    async fn setup(
        narrator: Arc<ScriptedNarrator>,
        mode: OrchestrationMode,
    ) -> (Orchestrator, Uuid, Uuid) {
        let registry = Arc::new(SessionRegistry::new(600));
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry
            .create_or_join(a, code(), Attribute::Her, Genre::AccidentalEncounter)
            .await
            .unwrap();
        registry
            .create_or_join(b, code(), Attribute::Him, Genre::AccidentalEncounter)
            .await
            .unwrap();
        (Orchestrator::new(registry, narrator, mode, 180), a, b)
    }

    async fn view_for(orchestrator: &Orchestrator, identity: Uuid) -> RoomView {
        let room = orchestrator.registry().room(&code()).await.unwrap();
        let room = room.lock().await;
        orchestrator.registry().snapshot_for(&room, identity).unwrap()
    }

    #[tokio::test]
    async fn test_successful_turn_appends_two_entries_and_flips_turn() {
        let narrator = Arc::new(ScriptedNarrator::ok("The barista raises an eyebrow."));
        let (orchestrator, a, _b) = setup(narrator.clone(), OrchestrationMode::PerTurn).await;
        let notifier = RecordingNotifier::default();

        orchestrator
            .submit_turn(a, "hello".to_string(), &notifier)
            .await
            .unwrap();

        let view = view_for(&orchestrator, a).await;
        assert_eq!(view.transcript.len(), 2);
        assert_eq!(view.transcript[0].kind, EntryKind::Participant);
        assert_eq!(view.transcript[0].sender, Some(Slot::One));
        assert_eq!(view.transcript[1].kind, EntryKind::Narration);
        assert_eq!(view.transcript[1].content, "The barista raises an eyebrow.");
        assert_eq!(view.current_turn, Slot::Two);
        assert_eq!(narrator.calls(), 1);

        let events = notifier.events.lock().await;
        assert_eq!(*events, vec![RoomEvent::Thinking, RoomEvent::Updated]);
    }

    #[tokio::test]
    async fn test_out_of_turn_submission_changes_nothing() {
        let narrator = Arc::new(ScriptedNarrator::ok("x"));
        let (orchestrator, _a, b) = setup(narrator.clone(), OrchestrationMode::PerTurn).await;
        let notifier = RecordingNotifier::default();

        let err = orchestrator
            .submit_turn(b, "me first".to_string(), &notifier)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotYourTurn));

        let view = view_for(&orchestrator, b).await;
        assert!(view.transcript.is_empty());
        assert_eq!(view.current_turn, Slot::One);
        assert_eq!(narrator.calls(), 0);
        assert!(notifier.events.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_submission_to_inactive_room_rejected() {
        let narrator = Arc::new(ScriptedNarrator::ok("x"));
        let (orchestrator, a, _b) = setup(narrator, OrchestrationMode::PerTurn).await;
        let notifier = RecordingNotifier::default();

        orchestrator
            .registry()
            .end_room(&code(), EndReason::Requested)
            .await;

        let err = orchestrator
            .submit_turn(a, "anyone there?".to_string(), &notifier)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RoomNotActive));
    }

    #[tokio::test]
    async fn test_narrator_failure_appends_fallback_and_still_advances() {
        let narrator = Arc::new(ScriptedNarrator::failing());
        let (orchestrator, a, _b) = setup(narrator, OrchestrationMode::PerTurn).await;
        let notifier = RecordingNotifier::default();

        orchestrator
            .submit_turn(a, "hello?".to_string(), &notifier)
            .await
            .unwrap();

        let view = view_for(&orchestrator, a).await;
        assert_eq!(view.transcript.len(), 2);
        assert_eq!(view.transcript[1].content, FALLBACK_NARRATION);
        assert_eq!(view.current_turn, Slot::Two);

        let events = notifier.events.lock().await;
        assert_eq!(*events, vec![RoomEvent::Thinking, RoomEvent::Updated]);
    }

    #[tokio::test]
    async fn test_fused_mode_defers_narrator_to_second_turn() {
        let narrator = Arc::new(ScriptedNarrator::ok("Both of you freeze."));
        let (orchestrator, a, b) = setup(narrator.clone(), OrchestrationMode::Fused).await;
        let notifier = RecordingNotifier::default();

        orchestrator
            .submit_turn(a, "I open the door".to_string(), &notifier)
            .await
            .unwrap();
        assert_eq!(narrator.calls(), 0);
        assert_eq!(view_for(&orchestrator, a).await.current_turn, Slot::Two);

        orchestrator
            .submit_turn(b, "I follow".to_string(), &notifier)
            .await
            .unwrap();
        assert_eq!(narrator.calls(), 1);

        let view = view_for(&orchestrator, a).await;
        assert_eq!(view.current_turn, Slot::One);
        assert_eq!(view.transcript.len(), 3);

        // The fused context carries exactly the two participant inputs.
        let request = narrator.last_request.lock().await.clone().unwrap();
        assert_eq!(
            request.context,
            vec![
                "user1: I open the door".to_string(),
                "user2: I follow".to_string()
            ]
        );

        let events = notifier.events.lock().await;
        assert_eq!(
            *events,
            vec![
                RoomEvent::Updated,
                RoomEvent::Thinking,
                RoomEvent::Updated
            ]
        );
    }

    #[tokio::test]
    async fn test_narration_ceiling_enforced() {
        let long = "a".repeat(400);
        let narrator = Arc::new(ScriptedNarrator::ok(&long));
        let (orchestrator, a, _b) = setup(narrator, OrchestrationMode::PerTurn).await;
        let notifier = RecordingNotifier::default();

        orchestrator
            .submit_turn(a, "go".to_string(), &notifier)
            .await
            .unwrap();

        let view = view_for(&orchestrator, a).await;
        assert_eq!(view.transcript[1].content.chars().count(), 180);
        assert!(view.transcript[1].content.ends_with('…'));
    }

    #[tokio::test]
    async fn test_metrics_block_folds_and_can_conclude() {
        let narrator = Arc::new(ScriptedNarrator::ok(
            "You move as one. {\"sync_score\": 4, \"tension_level\": 1}",
        ));
        let (orchestrator, a, _b) = setup(narrator, OrchestrationMode::PerTurn).await;
        let notifier = RecordingNotifier::default();

        orchestrator
            .submit_turn(a, "take my hand".to_string(), &notifier)
            .await
            .unwrap();

        let view = view_for(&orchestrator, a).await;
        assert_eq!(view.state, RoomState::Ended);
        assert_eq!(view.world.sync_score, 4.0);
        // The metrics block is stripped from the displayed narration.
        assert_eq!(view.transcript[1].content, "You move as one.");

        let events = notifier.events.lock().await;
        assert_eq!(*events, vec![RoomEvent::Thinking, RoomEvent::Ended]);
    }

    #[tokio::test]
    async fn test_malformed_metrics_ignored() {
        let narrator = Arc::new(ScriptedNarrator::ok("Still here. {sync_score: 99"));
        let (orchestrator, a, _b) = setup(narrator, OrchestrationMode::PerTurn).await;
        let notifier = RecordingNotifier::default();

        orchestrator
            .submit_turn(a, "hm".to_string(), &notifier)
            .await
            .unwrap();

        let view = view_for(&orchestrator, a).await;
        assert_eq!(view.state, RoomState::Active);
        assert_eq!(view.world.sync_score, 2.0);
    }

    #[tokio::test]
    async fn test_open_story_falls_back_to_genre_hook() {
        let narrator = Arc::new(ScriptedNarrator::failing());
        let (orchestrator, a, _b) = setup(narrator, OrchestrationMode::PerTurn).await;
        let notifier = RecordingNotifier::default();

        orchestrator.open_story(&code(), &notifier).await.unwrap();

        let view = view_for(&orchestrator, a).await;
        assert_eq!(view.transcript.len(), 2);
        assert_eq!(view.transcript[0].kind, EntryKind::Ambience);
        assert_eq!(
            view.transcript[0].content,
            Genre::AccidentalEncounter.ambience()
        );
        assert_eq!(view.transcript[1].kind, EntryKind::Narration);
        assert_eq!(
            view.transcript[1].content,
            Genre::AccidentalEncounter.hook()
        );
    }
}
