//! Reasoner port - the abstract LLM capability used by Planning,
//! Orchestration, and Execution (§6.1).
//!
//! Structured output is modeled as a tagged-variant request/response
//! contract, one variant per schema the stages actually bind against
//! (`TaskPlan`, `ToolExecutionPlan`, `ExecutionResult`), rather than a
//! single free-text completion the caller parses. A response that doesn't
//! match the requested schema's shape is a typed `ReasonerSchemaError`,
//! never a silent best-effort coercion (§9).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which structured schema a `reason` call is binding its response against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "schema", content = "prompt", rename_all = "snake_case")]
pub enum ReasonRequest {
    /// Planning stage: decompose a user query into a TaskPlan.
    TaskPlan { prompt: String },
    /// Orchestration stage: produce a ToolExecutionPlan for one task.
    ToolExecutionPlan { prompt: String },
    /// Execution stage: synthesize a result for one completed tool step.
    ExecutionResult { prompt: String },
}

impl ReasonRequest {
    pub fn prompt(&self) -> &str {
        match self {
            ReasonRequest::TaskPlan { prompt }
            | ReasonRequest::ToolExecutionPlan { prompt }
            | ReasonRequest::ExecutionResult { prompt } => prompt,
        }
    }

    pub fn schema_name(&self) -> &'static str {
        match self {
            ReasonRequest::TaskPlan { .. } => "TaskPlan",
            ReasonRequest::ToolExecutionPlan { .. } => "ToolExecutionPlan",
            ReasonRequest::ExecutionResult { .. } => "ExecutionResult",
        }
    }
}

/// The typed value a `reason` call produces, tagged by schema so the
/// caller can match on exactly the variant it asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "schema", rename_all = "snake_case")]
pub enum ReasonValue {
    TaskPlan { raw_json: serde_json::Value },
    ToolExecutionPlan { raw_json: serde_json::Value },
    ExecutionResult { raw_json: serde_json::Value },
}

impl ReasonValue {
    pub fn schema_name(&self) -> &'static str {
        match self {
            ReasonValue::TaskPlan { .. } => "TaskPlan",
            ReasonValue::ToolExecutionPlan { .. } => "ToolExecutionPlan",
            ReasonValue::ExecutionResult { .. } => "ExecutionResult",
        }
    }

    pub fn raw_json(&self) -> &serde_json::Value {
        match self {
            ReasonValue::TaskPlan { raw_json }
            | ReasonValue::ToolExecutionPlan { raw_json }
            | ReasonValue::ExecutionResult { raw_json } => raw_json,
        }
    }
}

/// Token usage for one `reason` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonTokenUsage {
    pub prompt_tokens: u32,
    pub response_tokens: u32,
    pub total_tokens: u32,
}

impl ReasonTokenUsage {
    pub fn new(prompt_tokens: u32, response_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            response_tokens,
            total_tokens: prompt_tokens + response_tokens,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReasonResponse {
    pub value: ReasonValue,
    pub tokens: ReasonTokenUsage,
}

/// Port for the abstract LLM capability (§6.1).
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Runs one structured-output completion. The returned `ReasonValue`'s
    /// variant always matches the request's variant; a response the
    /// provider could not coerce into that schema is a `ReasonerSchemaError`,
    /// not a different `ReasonValue` variant.
    async fn reason(&self, request: ReasonRequest) -> Result<ReasonResponse, ReasonerError>;

    fn provider_info(&self) -> ReasonerInfo;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonerInfo {
    pub name: String,
    pub model: String,
    pub max_context_tokens: u32,
}

impl ReasonerInfo {
    pub fn new(name: impl Into<String>, model: impl Into<String>, max_context_tokens: u32) -> Self {
        Self { name: name.into(), model: model.into(), max_context_tokens }
    }
}

/// Reasoner failure taxonomy. Maps onto §7's `PLANNING_FAILED` /
/// `ORCHESTRATION_FAILED` error codes once caught by the stage that invoked
/// the reasoner.
#[derive(Debug, thiserror::Error)]
pub enum ReasonerError {
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u32 },

    #[error("context too long: {tokens} tokens exceeds {max} limit")]
    ContextTooLong { tokens: u32, max: u32 },

    #[error("provider unavailable: {message}")]
    Unavailable { message: String },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u32 },

    /// The provider's response could not be coerced into the requested
    /// schema. Never silently patched up; surfaced as-is to the caller (§9).
    #[error("response did not match requested schema {schema}: {reason}")]
    SchemaMismatch { schema: &'static str, reason: String },
}

impl ReasonerError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReasonerError::RateLimited { .. } | ReasonerError::Unavailable { .. } | ReasonerError::Network(_) | ReasonerError::Timeout { .. }
        )
    }

    pub fn schema_mismatch(schema: &'static str, reason: impl Into<String>) -> Self {
        ReasonerError::SchemaMismatch { schema, reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_request_reports_its_schema_name() {
        let request = ReasonRequest::TaskPlan { prompt: "decompose this".into() };
        assert_eq!(request.schema_name(), "TaskPlan");
        assert_eq!(request.prompt(), "decompose this");
    }

    #[test]
    fn reason_value_exposes_raw_json_by_variant() {
        let value = ReasonValue::ToolExecutionPlan { raw_json: serde_json::json!({"steps": []}) };
        assert_eq!(value.schema_name(), "ToolExecutionPlan");
        assert_eq!(value.raw_json()["steps"], serde_json::json!([]));
    }

    #[test]
    fn token_usage_sums_prompt_and_response() {
        let usage = ReasonTokenUsage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn reasoner_error_retryable_classification() {
        assert!(ReasonerError::RateLimited { retry_after_secs: 5 }.is_retryable());
        assert!(ReasonerError::Network("down".into()).is_retryable());
        assert!(!ReasonerError::AuthenticationFailed.is_retryable());
        assert!(!ReasonerError::schema_mismatch("TaskPlan", "missing tasks field").is_retryable());
    }

    #[test]
    fn schema_mismatch_carries_schema_name_and_reason() {
        let err = ReasonerError::schema_mismatch("ExecutionResult", "not an object");
        match err {
            ReasonerError::SchemaMismatch { schema, reason } => {
                assert_eq!(schema, "ExecutionResult");
                assert_eq!(reason, "not an object");
            }
            _ => panic!("expected SchemaMismatch"),
        }
    }
}
