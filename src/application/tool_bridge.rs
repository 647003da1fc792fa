//! Tool Bridge (C1) - single point of contact for all tool interaction:
//! discovery, caching, recommendation, validation, and dispatch across
//! heterogeneous tool servers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::reasoning::AgentRole;
use crate::domain::tool_catalog::{recommend_tools, AvailableToolInfo};
use crate::domain::Task;
use crate::ports::{ServerStatus, ToolParameterValidator, ToolTransport, ToolTransportError, TransportSession};

/// TTL for the tool cache (§4.1).
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Outcome of a single tool invocation via the Bridge (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub ok: bool,
    pub value: Option<Value>,
    pub error: Option<String>,
    pub duration_seconds: f64,
    pub server_id: String,
}

impl ToolResult {
    fn success(server_id: impl Into<String>, value: Value, duration: Duration) -> Self {
        Self { ok: true, value: Some(value), error: None, duration_seconds: duration.as_secs_f64(), server_id: server_id.into() }
    }

    fn failure(server_id: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self { ok: false, value: None, error: Some(error.into()), duration_seconds: duration.as_secs_f64(), server_id: server_id.into() }
    }
}

/// A request to invoke a single tool, as consumed by `execute`/`execute_many`.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub params: Value,
    pub server_id: Option<String>,
}

impl ToolInvocation {
    pub fn new(tool_name: impl Into<String>, params: Value) -> Self {
        Self { tool_name: tool_name.into(), params, server_id: None }
    }

    pub fn with_server(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }
}

pub struct ToolBridge {
    transport: Arc<dyn ToolTransport>,
    validator: Arc<dyn ToolParameterValidator>,
    cache: RwLock<HashMap<String, AvailableToolInfo>>,
    last_refresh: RwLock<Option<Instant>>,
}

impl ToolBridge {
    pub fn new(transport: Arc<dyn ToolTransport>, validator: Arc<dyn ToolParameterValidator>) -> Self {
        Self { transport, validator, cache: RwLock::new(HashMap::new()), last_refresh: RwLock::new(None) }
    }

    /// Returns a cached snapshot, refreshing when the cache is empty, older
    /// than `CACHE_TTL`, or `refresh` is requested explicitly (§4.1).
    pub async fn list_tools(&self, refresh: bool) -> Vec<AvailableToolInfo> {
        let needs_refresh = refresh || {
            let last = *self.last_refresh.read().await;
            match last {
                None => true,
                Some(at) => at.elapsed() >= CACHE_TTL,
            }
        };

        if needs_refresh {
            self.refresh_cache().await;
        }

        self.cache.read().await.values().cloned().collect()
    }

    /// Discovery algorithm: for each connected server, fetch its tools and
    /// normalize them into `AvailableToolInfo`. A single server's discovery
    /// failure never poisons the others; the cache is rebuilt best-effort.
    async fn refresh_cache(&self) {
        info!("refreshing tool cache");

        let servers = match self.transport.list_servers().await {
            Ok(servers) => servers,
            Err(err) => {
                warn!(error = %err, "failed to list tool servers, keeping stale cache");
                return;
            }
        };

        let mut fresh = HashMap::new();
        for server in servers.iter().filter(|s| s.status == ServerStatus::Connected) {
            match self.transport.list_tools(&server.server_id).await {
                Ok(tools) => {
                    for tool in tools {
                        let info = AvailableToolInfo::new(tool.name, server.server_id.clone(), tool.description, tool.parameters_schema);
                        fresh.insert(format!("{}:{}", server.server_id, info.name), info);
                    }
                }
                Err(err) => {
                    warn!(server_id = %server.server_id, error = %err, "failed to list tools for server, skipping");
                }
            }
        }

        let count = fresh.len();
        let server_count = servers.len();
        *self.cache.write().await = fresh;
        *self.last_refresh.write().await = Some(Instant::now());
        info!(tool_count = count, server_count, "tool cache refreshed");
    }

    /// Filters the catalog by agent role. Per §4.1, all three roles see the
    /// identical unfiltered catalog today; the parameter exists so callers
    /// can express intent, not so the Bridge narrows results.
    pub async fn tools_for(&self, _role: AgentRole) -> Vec<AvailableToolInfo> {
        self.list_tools(false).await
    }

    /// Union of keyword hits against `task.description` and
    /// `task.tools_required` (§4.1). Delegates to the pure domain function.
    pub async fn recommend_tools(&self, task: &Task) -> Vec<String> {
        let catalog = self.list_tools(false).await;
        recommend_tools(task, &catalog).into_iter().map(str::to_owned).collect()
    }

    async fn find_tool(&self, tool_name: &str) -> Option<AvailableToolInfo> {
        self.list_tools(false).await.into_iter().find(|t| t.name == tool_name)
    }

    /// Validates `params` against the declared tool schema. On failure the
    /// message includes the full schema and a generated example call.
    pub async fn validate(&self, tool_name: &str, params: &Value) -> Result<(), String> {
        let Some(tool) = self.find_tool(tool_name).await else {
            let available: Vec<String> = self.list_tools(false).await.into_iter().map(|t| t.name).collect();
            return Err(format!("Tool '{tool_name}' not found. Available tools: {available:?}"));
        };

        self.validator.validate(&tool, params).map_err(|err| {
            format!("{}\n\nSchema: {}\nExample: {}", err.to_client_message(), tool.parameters, generate_example(&tool))
        })
    }

    /// Resolves the server if absent, opens a session, invokes the tool, and
    /// times the call. Transport/validation failures become `ToolResult{ok:
    /// false}`, never a hard process error (§4.1, §7).
    pub async fn execute(&self, invocation: ToolInvocation) -> ToolResult {
        let start = Instant::now();

        if let Err(message) = self.validate(&invocation.tool_name, &invocation.params).await {
            return ToolResult::failure(invocation.server_id.unwrap_or_else(|| "unknown".to_string()), message, start.elapsed());
        }

        let server_id = match invocation.server_id.clone() {
            Some(id) => id,
            None => match self.find_tool(&invocation.tool_name).await {
                Some(tool) => tool.server_id,
                None => return ToolResult::failure("unknown", format!("Tool '{}' not found on any connected server", invocation.tool_name), start.elapsed()),
            },
        };

        match self.execute_on_server(&server_id, &invocation.tool_name, invocation.params).await {
            Ok(value) => ToolResult::success(server_id, value, start.elapsed()),
            Err(err) => ToolResult::failure(server_id, err.to_string(), start.elapsed()),
        }
    }

    async fn execute_on_server(&self, server_id: &str, tool_name: &str, params: Value) -> Result<Value, ToolTransportError> {
        let session = self.transport.open_session(server_id).await?;
        let result = self.transport.invoke(&session, tool_name, params).await;
        self.close_session(session).await;
        result
    }

    async fn close_session(&self, session: TransportSession) {
        if let Err(err) = self.transport.close(session).await {
            warn!(error = %err, "failed to close tool transport session");
        }
    }

    /// Concurrent fan-out; a single invocation's failure never aborts the
    /// batch (§4.1).
    pub async fn execute_many(&self, invocations: Vec<ToolInvocation>) -> Vec<ToolResult> {
        let futures = invocations.into_iter().map(|inv| self.execute(inv));
        futures::future::join_all(futures).await
    }
}

fn generate_example(tool: &AvailableToolInfo) -> String {
    let required = tool.required_params();
    let properties = tool.properties();

    if required.is_empty() {
        return format!("{}()", tool.name);
    }

    let args: Vec<String> = required
        .iter()
        .take(3)
        .map(|param| {
            let ty = properties.get(param).and_then(|p| p.get("type")).and_then(Value::as_str).unwrap_or("string");
            match ty {
                "boolean" => format!("{param}=true"),
                "integer" | "number" => format!("{param}=10"),
                _ if param.contains("path") => format!("{param}=\"/path/to/file\""),
                _ => format!("{param}=\"value\""),
            }
        })
        .collect();

    format!("{}({})", tool.name, args.join(", "))
}
