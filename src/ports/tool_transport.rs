//! Tool Transport port - the abstract connection to external tool servers
//! (§6.2). Supports at least stdio subprocess, HTTP streaming, and SSE
//! transports; the concrete wire details are opaque to the core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Connectivity status of a configured tool server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    Connected,
    Disconnected,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Stdio,
    Http,
    Sse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub server_id: String,
    pub status: ServerStatus,
    pub transport: TransportKind,
}

/// A single tool's descriptor as surfaced by `listTools`, already unified
/// regardless of the source server's native schema dialect (§4.1, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
}

/// An open handle to a tool server, produced by `open_session` and
/// consumed by `invoke`/`close`.
#[derive(Debug, Clone)]
pub struct TransportSession {
    pub server_id: String,
    pub handle: String,
}

/// Port to the external tool servers (§6.2).
#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn list_servers(&self) -> Result<Vec<ServerDescriptor>, ToolTransportError>;

    async fn list_tools(&self, server_id: &str) -> Result<Vec<ToolDescriptor>, ToolTransportError>;

    async fn open_session(&self, server_id: &str) -> Result<TransportSession, ToolTransportError>;

    async fn invoke(&self, session: &TransportSession, tool_name: &str, params: Value) -> Result<Value, ToolTransportError>;

    async fn close(&self, session: TransportSession) -> Result<(), ToolTransportError>;
}

/// Tool transport failure taxonomy. Surfaced by the Tool Bridge as a failed
/// `ToolResult`, never propagated as a hard process error (§4.1, §7).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolTransportError {
    #[error("server not found: {0}")]
    ServerNotFound(String),

    #[error("server unavailable: {0}")]
    ServerUnavailable(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u32 },

    #[error("transport error: {0}")]
    Transport(String),
}

impl ToolTransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolTransportError::ServerUnavailable(_) | ToolTransportError::Timeout { .. })
    }
}
