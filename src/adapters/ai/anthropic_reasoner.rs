//! Anthropic Reasoner - Implementation of the Reasoner port against
//! Anthropic's Claude Messages API.
//!
//! Structured output is forced via Anthropic's tool-use mechanism: a single
//! tool named after the requested schema is offered with `tool_choice`
//! forcing the model to call it, and the tool's `input` becomes the
//! `ReasonValue`'s `raw_json`. This keeps the binding typed end-to-end
//! instead of parsing free text (§6.1, §9).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::ports::{ReasonRequest, ReasonResponse, ReasonTokenUsage, ReasonValue, Reasoner, ReasonerError, ReasonerInfo};

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    api_key: Secret<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

const ANTHROPIC_API_VERSION: &str = "2023-06-01";

pub struct AnthropicReasoner {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicReasoner {
    pub fn new(config: AnthropicConfig) -> Self {
        let client = Client::builder().timeout(config.timeout).build().expect("failed to build Anthropic HTTP client");
        Self { config, client }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    /// A schema-agnostic tool definition: the model is forced to call it
    /// with whatever shape fits the prompt, and we keep the raw JSON rather
    /// than validating a fixed schema here (validation belongs to the stage
    /// that consumes the `ReasonValue`, which knows its own required shape).
    fn structured_output_tool(schema_name: &str) -> serde_json::Value {
        serde_json::json!({
            "name": format!("emit_{}", schema_name.to_ascii_lowercase()),
            "description": format!("Emit the {} result as structured JSON.", schema_name),
            "input_schema": {"type": "object", "additionalProperties": true},
        })
    }

    async fn send_request(&self, request: &ReasonRequest) -> Result<Response, ReasonerError> {
        let schema_name = request.schema_name();
        let tool = Self::structured_output_tool(schema_name);
        let tool_name = tool["name"].as_str().unwrap().to_string();

        let body = AnthropicRequest {
            model: self.config.model.clone(),
            messages: vec![AnthropicMessage { role: "user".to_string(), content: request.prompt().to_string() }],
            max_tokens: 4096,
            tools: vec![tool],
            tool_choice: serde_json::json!({"type": "tool", "name": tool_name}),
        };

        self.client
            .post(self.messages_url())
            .header("x-api-key", self.config.api_key())
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ReasonerError::Timeout { timeout_secs: self.config.timeout.as_secs() as u32 }
                } else {
                    ReasonerError::Network(e.to_string())
                }
            })
    }

    async fn handle_response_status(&self, response: Response) -> Result<Response, ReasonerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 => Err(ReasonerError::AuthenticationFailed),
            429 => Err(ReasonerError::RateLimited { retry_after_secs: Self::parse_retry_after(&body) }),
            400 if body.contains("prompt is too long") => Err(ReasonerError::ContextTooLong { tokens: 0, max: 0 }),
            500..=599 => Err(ReasonerError::Unavailable { message: format!("server error {status}: {body}") }),
            _ => Err(ReasonerError::Network(format!("unexpected status {status}: {body}"))),
        }
    }

    fn parse_retry_after(body: &str) -> u32 {
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(body) {
            if let Some(s) = parsed.get("error").and_then(|e| e.get("message")).and_then(|m| m.as_str()) {
                if let Some(idx) = s.find("try again in ") {
                    let rest = &s[idx + 13..];
                    if let Some(end) = rest.find(|c: char| !c.is_ascii_digit()) {
                        if let Ok(secs) = rest[..end].parse::<u32>() {
                            return secs;
                        }
                    }
                }
            }
        }
        60
    }

    fn parse_response(&self, raw: AnthropicResponse, schema_name: &'static str) -> Result<ReasonResponse, ReasonerError> {
        let tool_use = raw
            .content
            .into_iter()
            .find(|block| block.block_type == "tool_use")
            .ok_or_else(|| ReasonerError::schema_mismatch(schema_name, "model did not emit a tool_use block"))?;

        let raw_json = tool_use.input.ok_or_else(|| ReasonerError::schema_mismatch(schema_name, "tool_use block had no input"))?;

        let value = match schema_name {
            "TaskPlan" => ReasonValue::TaskPlan { raw_json },
            "ToolExecutionPlan" => ReasonValue::ToolExecutionPlan { raw_json },
            _ => ReasonValue::ExecutionResult { raw_json },
        };

        Ok(ReasonResponse { value, tokens: ReasonTokenUsage::new(raw.usage.input_tokens, raw.usage.output_tokens) })
    }
}

#[async_trait]
impl Reasoner for AnthropicReasoner {
    async fn reason(&self, request: ReasonRequest) -> Result<ReasonResponse, ReasonerError> {
        let schema_name = request.schema_name();
        let mut retry_count = 0;
        let mut last_error = ReasonerError::Network("no attempts made".to_string());

        while retry_count <= self.config.max_retries {
            let outcome = async {
                let response = self.send_request(&request).await?;
                let response = self.handle_response_status(response).await?;
                let raw: AnthropicResponse = response.json().await.map_err(|e| ReasonerError::schema_mismatch(schema_name, e.to_string()))?;
                self.parse_response(raw, schema_name)
            }
            .await;

            match outcome {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !err.is_retryable() || retry_count >= self.config.max_retries {
                        return Err(err);
                    }
                    last_error = err;
                }
            }

            sleep(Duration::from_secs(1 << retry_count)).await;
            retry_count += 1;
        }

        Err(last_error)
    }

    fn provider_info(&self) -> ReasonerInfo {
        ReasonerInfo::new("anthropic", &self.config.model, 200_000)
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    tools: Vec<serde_json::Value>,
    tool_choice: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    input: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder_works() {
        let config = AnthropicConfig::new("test-key")
            .with_model("claude-3-opus-20240229")
            .with_base_url("https://custom.api.com")
            .with_timeout(Duration::from_secs(30))
            .with_max_retries(5);

        assert_eq!(config.model, "claude-3-opus-20240229");
        assert_eq!(config.base_url, "https://custom.api.com");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.api_key(), "test-key");
    }

    #[test]
    fn provider_info_reports_claude_context_window() {
        let reasoner = AnthropicReasoner::new(AnthropicConfig::new("test"));
        let info = reasoner.provider_info();
        assert_eq!(info.name, "anthropic");
        assert_eq!(info.max_context_tokens, 200_000);
    }

    #[test]
    fn parse_retry_after_default() {
        let error = r#"{"error":{"message":"Rate limit exceeded"}}"#;
        assert_eq!(AnthropicReasoner::parse_retry_after(error), 60);
    }

    #[test]
    fn parse_retry_after_extracts_seconds() {
        let error = r#"{"error":{"message":"please try again in 12 seconds"}}"#;
        assert_eq!(AnthropicReasoner::parse_retry_after(error), 12);
    }

    #[test]
    fn parse_response_extracts_raw_json_from_tool_use_block() {
        let reasoner = AnthropicReasoner::new(AnthropicConfig::new("test"));
        let raw = AnthropicResponse {
            content: vec![ContentBlock { block_type: "tool_use".to_string(), input: Some(serde_json::json!({"tasks": []})) }],
            usage: AnthropicUsage { input_tokens: 10, output_tokens: 20 },
        };
        let response = reasoner.parse_response(raw, "TaskPlan").unwrap();
        assert_eq!(response.value.schema_name(), "TaskPlan");
        assert_eq!(response.tokens.total_tokens, 30);
    }

    #[test]
    fn parse_response_errors_when_no_tool_use_block_present() {
        let reasoner = AnthropicReasoner::new(AnthropicConfig::new("test"));
        let raw = AnthropicResponse {
            content: vec![ContentBlock { block_type: "text".to_string(), input: None }],
            usage: AnthropicUsage { input_tokens: 1, output_tokens: 1 },
        };
        let result = reasoner.parse_response(raw, "TaskPlan");
        assert!(matches!(result, Err(ReasonerError::SchemaMismatch { .. })));
    }
}
