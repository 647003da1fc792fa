//! Tool server configuration (§6.2, §6.5, §10.1).
//!
//! Each configured server has an id, a transport kind, and an optional
//! secret (e.g. a bearer token for an HTTP/SSE server). Absence of a
//! server's secret only disables that server; the core still serves
//! (§6.5).

use secrecy::Secret;
use serde::Deserialize;

use super::error::ValidationError;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Http,
    Sse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolServerConfig {
    pub id: String,
    pub transport: TransportKind,

    /// For `Stdio`: the command to launch. For `Http`/`Sse`: the base URL.
    pub endpoint: String,

    /// Bearer token or similar credential, present only for servers that
    /// need one.
    pub secret: Option<Secret<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ToolServersConfig {
    #[serde(default)]
    pub servers: Vec<ToolServerConfig>,
}

impl ToolServersConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = std::collections::HashSet::new();
        for server in &self.servers {
            if !seen.insert(server.id.clone()) {
                return Err(ValidationError::DuplicateToolServerId(server.id.clone()));
            }
        }
        Ok(())
    }
}
