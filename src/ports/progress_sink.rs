//! Progress Sink port (§4.7, §9) - the typed event sink each pipeline stage
//! writes through at its transition points.
//!
//! §9 explicitly rejects an ambient-mutable-state progress callback in favor
//! of a sink passed explicitly into stages, and a single-writer discipline
//! per session (the WorkflowExecutor and Execution stage emit synchronously,
//! no background producer writes to the same session). A sink implementation
//! therefore never needs to fail the caller: delivery is best-effort
//! broadcast, matching `RoomManager::broadcast_to_session`'s "no receivers is
//! fine" semantics.

use async_trait::async_trait;

use crate::domain::ProgressEvent;

#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Emits one progress event. Never fails the caller; an unreachable
    /// client or closed channel is the sink's problem, not the stage's.
    async fn emit(&self, event: ProgressEvent);
}

/// Discards every event. Useful for tests and for callers that only want a
/// final result, not a progress stream.
pub struct NullSink;

#[async_trait]
impl ProgressSink for NullSink {
    async fn emit(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::SessionId;

    #[tokio::test]
    async fn null_sink_accepts_and_discards() {
        let sink = NullSink;
        sink.emit(ProgressEvent::Status { session_id: SessionId::new(), connected_tool_servers: vec![] }).await;
    }
}
