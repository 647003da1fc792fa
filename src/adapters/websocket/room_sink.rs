//! `ProgressSink` implementation backed by `RoomManager` broadcast channels.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::ProgressEvent;
use crate::ports::ProgressSink;

use super::messages::ServerMessage;
use super::rooms::RoomManager;

/// Delivers every emitted event to whichever WebSocket clients are joined
/// to the event's session room. Broadcasting to a room with no listeners
/// is a no-op (§4.7: best-effort delivery, never blocks the emitting stage).
pub struct RoomProgressSink {
    room_manager: Arc<RoomManager>,
}

impl RoomProgressSink {
    pub fn new(room_manager: Arc<RoomManager>) -> Self {
        Self { room_manager }
    }
}

#[async_trait]
impl ProgressSink for RoomProgressSink {
    async fn emit(&self, event: ProgressEvent) {
        let session_id = event.session_id();
        self.room_manager.broadcast_to_session(&session_id, ServerMessage::Progress(event)).await;
    }
}
