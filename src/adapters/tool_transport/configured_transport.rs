//! `ToolTransport` implementation that dispatches per-server by its
//! configured transport kind (§6.2).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde_json::{json, Value};

use crate::ports::{ServerDescriptor, ServerStatus, ToolDescriptor, ToolTransport, ToolTransportError, TransportKind, TransportSession};

use super::stdio_process::StdioProcess;

/// One tool server's static configuration, already resolved from whatever
/// config format the caller loaded (plain struct so this adapter doesn't
/// need to know about the config crate's own types).
#[derive(Debug, Clone)]
pub struct ToolServerSpec {
    pub id: String,
    pub transport: TransportKind,
    /// For `Stdio`: the command line to spawn. For `Http`/`Sse`: the base URL.
    pub endpoint: String,
    pub secret: Option<Secret<String>>,
}

enum ServerHandle {
    Stdio(StdioProcess),
    Http { base_url: String, secret: Option<Secret<String>> },
}

pub struct ConfiguredToolTransport {
    servers: HashMap<String, (TransportKind, ServerHandle)>,
    http: Client,
}

impl ConfiguredToolTransport {
    /// Spawns every stdio server up front; HTTP/SSE servers are dialed lazily
    /// per request, so a server being down at startup doesn't prevent the
    /// others from being usable.
    pub fn new(specs: Vec<ToolServerSpec>) -> Result<Self, ToolTransportError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ToolTransportError::Transport(format!("failed to build http client: {e}")))?;

        let mut servers = HashMap::new();
        for spec in specs {
            let handle = match spec.transport {
                TransportKind::Stdio => ServerHandle::Stdio(StdioProcess::spawn(&spec.endpoint)?),
                TransportKind::Http | TransportKind::Sse => ServerHandle::Http { base_url: spec.endpoint.clone(), secret: spec.secret.clone() },
            };
            servers.insert(spec.id, (spec.transport, handle));
        }

        Ok(Self { servers, http })
    }

    fn handle(&self, server_id: &str) -> Result<&(TransportKind, ServerHandle), ToolTransportError> {
        self.servers.get(server_id).ok_or_else(|| ToolTransportError::ServerNotFound(server_id.to_string()))
    }

    fn authorized(&self, request: reqwest::RequestBuilder, secret: &Option<Secret<String>>) -> reqwest::RequestBuilder {
        match secret {
            Some(secret) => request.bearer_auth(secret.expose_secret()),
            None => request,
        }
    }
}

#[async_trait]
impl ToolTransport for ConfiguredToolTransport {
    async fn list_servers(&self) -> Result<Vec<ServerDescriptor>, ToolTransportError> {
        Ok(self
            .servers
            .iter()
            .map(|(id, (kind, _))| ServerDescriptor { server_id: id.clone(), status: ServerStatus::Connected, transport: *kind })
            .collect())
    }

    async fn list_tools(&self, server_id: &str) -> Result<Vec<ToolDescriptor>, ToolTransportError> {
        let (kind, handle) = self.handle(server_id)?;
        match (kind, handle) {
            (TransportKind::Stdio, ServerHandle::Stdio(process)) => {
                let response = process.call(&json!({ "op": "list_tools" })).await?;
                let tools = response.get("tools").cloned().unwrap_or(Value::Array(vec![]));
                serde_json::from_value(tools).map_err(|e| ToolTransportError::Transport(format!("malformed tool list from '{server_id}': {e}")))
            }
            (TransportKind::Http | TransportKind::Sse, ServerHandle::Http { base_url, secret }) => {
                let request = self.authorized(self.http.get(format!("{base_url}/tools")), secret);
                let response = request.send().await.map_err(|e| ToolTransportError::ServerUnavailable(format!("{server_id}: {e}")))?;
                let body: Vec<ToolDescriptor> = response.json().await.map_err(|e| ToolTransportError::Transport(format!("malformed tool list from '{server_id}': {e}")))?;
                Ok(body)
            }
            _ => unreachable!("server handle kind always matches its own transport"),
        }
    }

    async fn open_session(&self, server_id: &str) -> Result<TransportSession, ToolTransportError> {
        self.handle(server_id)?;
        Ok(TransportSession { server_id: server_id.to_string(), handle: server_id.to_string() })
    }

    async fn invoke(&self, session: &TransportSession, tool_name: &str, params: Value) -> Result<Value, ToolTransportError> {
        let (kind, handle) = self.handle(&session.server_id)?;
        match (kind, handle) {
            (TransportKind::Stdio, ServerHandle::Stdio(process)) => {
                let response = process.call(&json!({ "op": "invoke", "tool": tool_name, "params": params })).await?;
                if let Some(error) = response.get("error").and_then(Value::as_str) {
                    return Err(ToolTransportError::Transport(error.to_string()));
                }
                Ok(response.get("result").cloned().unwrap_or(Value::Null))
            }
            (TransportKind::Http | TransportKind::Sse, ServerHandle::Http { base_url, secret }) => {
                let request = self.authorized(self.http.post(format!("{base_url}/tools/{tool_name}/invoke")), secret).json(&params);
                let response = request.send().await.map_err(|e| ToolTransportError::ServerUnavailable(format!("{}: {e}", session.server_id)))?;
                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    return Err(ToolTransportError::ToolNotFound(tool_name.to_string()));
                }
                if response.status() == reqwest::StatusCode::REQUEST_TIMEOUT {
                    return Err(ToolTransportError::Timeout { timeout_secs: 30 });
                }
                response.json().await.map_err(|e| ToolTransportError::Transport(format!("malformed invoke response: {e}")))
            }
            _ => unreachable!("server handle kind always matches its own transport"),
        }
    }

    async fn close(&self, _session: TransportSession) -> Result<(), ToolTransportError> {
        // Stdio servers stay alive for the process lifetime (reused across
        // sessions); HTTP/SSE servers are stateless per request. Nothing to
        // tear down here either way.
        Ok(())
    }
}
