//! AvailableToolInfo and the pure, static parts of tool recommendation/
//! server-type inference (§3, §4.1). The cache and the transport adapter
//! live in the Tool Bridge port/adapter; this module holds only the data
//! shape and the keyword table, which is pure and I/O-free.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Task;

/// Coarse classification of a tool server, inferred from its identifier.
/// For routing hints and prompt construction only, never for correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerType {
    Filesystem,
    Git,
    Codebase,
    Devtools,
    Exa,
    Context7,
    Unknown,
}

impl ServerType {
    /// First-hit-wins substring scan over the server identifier (§4.1).
    pub fn infer(server_id: &str) -> Self {
        let id = server_id.to_ascii_lowercase();
        const ORDER: &[(&str, ServerType)] = &[
            ("filesystem", ServerType::Filesystem),
            ("git", ServerType::Git),
            ("codebase", ServerType::Codebase),
            ("devtools", ServerType::Devtools),
            ("exa", ServerType::Exa),
            ("context7", ServerType::Context7),
        ];
        ORDER
            .iter()
            .find(|(needle, _)| id.contains(needle))
            .map(|(_, ty)| *ty)
            .unwrap_or(ServerType::Unknown)
    }

    /// Static keyword table supplementing `recommendTools` (§4.1). Empty for
    /// `Unknown`, which never contributes recommendation hits.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            ServerType::Filesystem => &["file", "read", "write", "directory", "path", "list"],
            ServerType::Git => &["commit", "branch", "diff", "repository", "log", "status"],
            ServerType::Codebase => &["search", "symbol", "definition", "reference", "function", "class"],
            ServerType::Devtools => &["build", "test", "lint", "compile", "run"],
            ServerType::Exa => &["web", "search", "url", "crawl"],
            ServerType::Context7 => &["documentation", "docs", "library", "package"],
            ServerType::Unknown => &[],
        }
    }
}

/// JSON-Schema-shaped parameter description for one tool (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameterSchema {
    #[serde(rename = "type")]
    pub schema: Value,
}

/// A tool normalized into the Bridge's uniform shape, regardless of the
/// source server's native schema dialect (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableToolInfo {
    pub name: String,
    pub server_id: String,
    pub server_type: ServerType,
    pub description: String,
    /// JSON Schema object: `properties`, `required`, per-property
    /// `type`/`description`/`default`.
    pub parameters: Value,
}

impl AvailableToolInfo {
    pub fn new(name: impl Into<String>, server_id: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        let server_id = server_id.into();
        let server_type = ServerType::infer(&server_id);
        Self {
            name: name.into(),
            server_id,
            server_type,
            description: description.into(),
            parameters,
        }
    }

    /// `required` property names, or empty if the schema declares none.
    pub fn required_params(&self) -> Vec<String> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect())
            .unwrap_or_default()
    }

    pub fn properties(&self) -> HashMap<String, Value> {
        self.parameters
            .get("properties")
            .and_then(Value::as_object)
            .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }
}

/// Recommends tool names for a task: union of keyword hits against
/// `task.description` and `task.tools_required`. Never returns an error;
/// an empty result is a valid outcome when neither source matches (§4.1).
pub fn recommend_tools<'a>(task: &Task, catalog: &'a [AvailableToolInfo]) -> Vec<&'a str> {
    let description = task.description.to_ascii_lowercase();

    let mut recommended: Vec<&str> = catalog
        .iter()
        .filter(|tool| tool.server_type.keywords().iter().any(|kw| description.contains(kw)))
        .map(|tool| tool.name.as_str())
        .collect();

    for required in &task.tools_required {
        if catalog.iter().any(|t| t.name == *required) && !recommended.contains(&required.as_str()) {
            recommended.push(required.as_str());
        }
    }

    recommended
}
