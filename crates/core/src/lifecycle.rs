//! Session countdown
//!
//! A fixed-length countdown starts when a room activates. Expiry ends the
//! room and fires the terminal broadcast; any earlier end cancels the task.
//! `end_room` is idempotent, so an expiry racing a manual end still yields
//! exactly one terminal broadcast.

use std::sync::Arc;
use std::time::Duration;

use crate::models::RoomCode;
use crate::orchestrator::{RoomEvent, RoomNotifier};
use crate::registry::{EndReason, SessionRegistry};

/// Spawn the countdown for a freshly activated room and store its handle in
/// the room record. Arming again replaces any prior countdown.
pub async fn arm_session_countdown(
    registry: &Arc<SessionRegistry>,
    code: &RoomCode,
    notifier: Arc<dyn RoomNotifier>,
) {
    let handle = tokio::spawn({
        let registry = registry.clone();
        let code = code.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(registry.session_secs())).await;
            // The Expired path takes the countdown handle out of the room
            // without aborting, so this task survives to broadcast.
            if registry.end_room(&code, EndReason::Expired).await {
                tracing::info!(code = %code, "Session countdown expired");
                notifier.notify(&code, RoomEvent::Ended).await;
            }
        }
    });
    registry.attach_countdown(code, handle).await;
    tracing::debug!(code = %code, secs = registry.session_secs(), "Session countdown armed");
}
