//! WebSocket message types for the real-time Client Channel (§6.3).
//!
//! Defines the protocol between server and connected clients:
//! - Server → Client: connection status, progress events, errors, pongs
//! - Client → Server: the six recognized commands plus ping/request-state

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ProgressEvent;

// ============================================
// Server → Client Messages
// ============================================

/// All message types that can be sent from server to client.
///
/// `ProgressEvent` already self-tags with `type` (§4.7). Serializing this
/// enum via `derive(Serialize)` with an adjacent/internal tag would double
/// up that tag, so `ServerMessage` implements `Serialize` by hand: it
/// converts to a JSON object and, for the non-`Progress` variants, inserts
/// the `type` discriminant itself.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// Connection established successfully and joined the session's room.
    Connected(ConnectedMessage),

    /// Every other outgoing event is a `ProgressEvent` (§4.7), passed
    /// through with its own `type` tag untouched.
    Progress(ProgressEvent),

    /// Error occurred.
    Error(ErrorMessage),

    /// Heartbeat response.
    Pong(PongMessage),

    /// Direct reply to a request/response command (`tool_execute`,
    /// `complexity_analysis`, `get_available_tools`, `system_status`) that
    /// isn't itself a `ProgressEvent`.
    CommandResult(CommandResultMessage),
}

impl Serialize for ServerMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::Error as _;

        let mut value = match self {
            ServerMessage::Connected(msg) => serde_json::to_value(msg).map_err(S::Error::custom)?,
            ServerMessage::Progress(event) => return event.serialize(serializer),
            ServerMessage::Error(msg) => serde_json::to_value(msg).map_err(S::Error::custom)?,
            ServerMessage::Pong(msg) => serde_json::to_value(msg).map_err(S::Error::custom)?,
            ServerMessage::CommandResult(msg) => serde_json::to_value(msg).map_err(S::Error::custom)?,
        };

        let tag = match self {
            ServerMessage::Connected(_) => "connected",
            ServerMessage::Progress(_) => unreachable!("returned above"),
            ServerMessage::Error(_) => "error",
            ServerMessage::Pong(_) => "pong",
            ServerMessage::CommandResult(_) => "command_result",
        };
        value.as_object_mut().expect("payload structs serialize to objects").insert("type".to_string(), Value::String(tag.to_string()));
        value.serialize(serializer)
    }
}

/// Sent when client successfully connects and joins a session room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedMessage {
    pub session_id: String,
    pub client_id: String,
    pub timestamp: String,
}

/// Error message sent to client.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
    pub timestamp: String,
}

/// Heartbeat response.
#[derive(Debug, Clone, Serialize)]
pub struct PongMessage {
    pub timestamp: String,
}

/// Reply to a non-`agent_query` command. `command` names the originating
/// command (`tool_execute`, `complexity_analysis`, `get_available_tools`,
/// `system_status`); `payload` carries its result as JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResultMessage {
    pub command: String,
    pub payload: Value,
}

// ============================================
// Client → Server Messages
// ============================================

/// The commands recognized by the core (§6.3), plus connection-management
/// messages (`ping`, `request_state`) specific to this transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Heartbeat request.
    Ping,

    /// Request the current session snapshot (e.g. after reconnection).
    RequestState,

    /// Decompose and execute a natural-language request.
    AgentQuery { query: String, #[serde(default)] context: std::collections::HashMap<String, Value> },

    /// Execute a single named tool directly, bypassing planning.
    ToolExecute { tool_name: String, #[serde(default)] parameters: std::collections::HashMap<String, Value> },

    /// Estimate the complexity of a query without running it.
    ComplexityAnalysis { query: String },

    /// List the tools currently available across connected servers.
    GetAvailableTools { #[serde(default)] refresh: bool },

    /// Request rolling Coordinator metrics and tool-server status.
    SystemStatus,

    /// Request cancellation of this session's in-flight workflow.
    CancelWorkflow,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::SessionId;

    #[test]
    fn server_message_serializes_connected_with_type_tag() {
        let msg = ServerMessage::Connected(ConnectedMessage {
            session_id: "session-123".to_string(),
            client_id: "client-456".to_string(),
            timestamp: "2025-01-10T00:00:00Z".to_string(),
        });

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"connected""#));
        assert!(json.contains(r#""sessionId":"session-123""#));
    }

    #[test]
    fn server_message_flattens_progress_event_own_tag() {
        let msg = ServerMessage::Progress(ProgressEvent::Status {
            session_id: SessionId::new(),
            connected_tool_servers: vec!["filesystem-server".to_string()],
        });

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"status""#));
        assert!(json.contains("filesystem-server"));
    }

    #[test]
    fn client_message_deserializes_ping() {
        let json = r#"{"type": "ping"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn client_message_deserializes_agent_query() {
        let json = r#"{"type": "agent_query", "query": "find the bug"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::AgentQuery { query, context } => {
                assert_eq!(query, "find the bug");
                assert!(context.is_empty());
            }
            other => panic!("expected AgentQuery, got {other:?}"),
        }
    }

    #[test]
    fn client_message_deserializes_cancel_workflow() {
        let json = r#"{"type": "cancel_workflow"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::CancelWorkflow));
    }

    #[test]
    fn command_result_serializes_with_command_result_tag() {
        let msg = ServerMessage::CommandResult(CommandResultMessage {
            command: "system_status".to_string(),
            payload: serde_json::json!({"queries_processed": 3}),
        });

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"command_result""#));
        assert!(json.contains(r#""command":"system_status""#));
    }

    #[test]
    fn error_message_serializes_correctly() {
        let msg = ServerMessage::Error(ErrorMessage {
            code: "PLANNING_FAILED".to_string(),
            message: "reasoner unavailable".to_string(),
            timestamp: "2025-01-10T00:00:00Z".to_string(),
        });

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""code":"PLANNING_FAILED""#));
    }
}
