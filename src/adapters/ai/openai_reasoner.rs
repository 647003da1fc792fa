//! OpenAI Reasoner - Implementation of the Reasoner port against OpenAI's
//! Chat Completions API.
//!
//! Structured output is forced via OpenAI function calling: a single
//! function named after the requested schema is offered with `tool_choice`
//! forcing the model to call it, and the function call's `arguments` (a
//! JSON string) becomes the `ReasonValue`'s `raw_json` (§6.1, §9).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::ports::{ReasonRequest, ReasonResponse, ReasonTokenUsage, ReasonValue, Reasoner, ReasonerError, ReasonerInfo};

#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    api_key: Secret<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: "gpt-4-turbo".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
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

pub struct OpenAIReasoner {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIReasoner {
    pub fn new(config: OpenAIConfig) -> Self {
        let client = Client::builder().timeout(config.timeout).build().expect("failed to build OpenAI HTTP client");
        Self { config, client }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn structured_output_function(schema_name: &str) -> (String, serde_json::Value) {
        let name = format!("emit_{}", schema_name.to_ascii_lowercase());
        let tool = serde_json::json!({
            "type": "function",
            "function": {
                "name": name,
                "description": format!("Emit the {} result as structured JSON.", schema_name),
                "parameters": {"type": "object", "additionalProperties": true},
            },
        });
        (name, tool)
    }

    async fn send_request(&self, request: &ReasonRequest) -> Result<Response, ReasonerError> {
        let schema_name = request.schema_name();
        let (function_name, tool) = Self::structured_output_function(schema_name);

        let body = OpenAIRequest {
            model: self.config.model.clone(),
            messages: vec![OpenAIMessage { role: "user".to_string(), content: request.prompt().to_string() }],
            tools: vec![tool],
            tool_choice: serde_json::json!({"type": "function", "function": {"name": function_name}}),
        };

        self.client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key()))
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
            400 if body.contains("context_length_exceeded") => Err(ReasonerError::ContextTooLong { tokens: 0, max: 0 }),
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
        30
    }

    fn parse_response(&self, raw: OpenAIResponse, schema_name: &'static str) -> Result<ReasonResponse, ReasonerError> {
        let choice = raw.choices.into_iter().next().ok_or_else(|| ReasonerError::schema_mismatch(schema_name, "no choices in response"))?;

        let call = choice
            .message
            .tool_calls
            .into_iter()
            .flatten()
            .next()
            .ok_or_else(|| ReasonerError::schema_mismatch(schema_name, "model did not emit a tool call"))?;

        let raw_json: serde_json::Value = serde_json::from_str(&call.function.arguments)
            .map_err(|e| ReasonerError::schema_mismatch(schema_name, format!("tool call arguments were not valid JSON: {e}")))?;

        let value = match schema_name {
            "TaskPlan" => ReasonValue::TaskPlan { raw_json },
            "ToolExecutionPlan" => ReasonValue::ToolExecutionPlan { raw_json },
            _ => ReasonValue::ExecutionResult { raw_json },
        };

        let usage = raw.usage.map(|u| ReasonTokenUsage::new(u.prompt_tokens, u.completion_tokens)).unwrap_or_default();
        Ok(ReasonResponse { value, tokens: usage })
    }
}

#[async_trait]
impl Reasoner for OpenAIReasoner {
    async fn reason(&self, request: ReasonRequest) -> Result<ReasonResponse, ReasonerError> {
        let schema_name = request.schema_name();
        let mut retry_count = 0;
        let mut last_error = ReasonerError::Network("no attempts made".to_string());

        while retry_count <= self.config.max_retries {
            let outcome = async {
                let response = self.send_request(&request).await?;
                let response = self.handle_response_status(response).await?;
                let raw: OpenAIResponse = response.json().await.map_err(|e| ReasonerError::schema_mismatch(schema_name, e.to_string()))?;
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
        let max_context = match self.config.model.as_str() {
            m if m.starts_with("gpt-4-turbo") || m.starts_with("gpt-4o") => 128_000,
            m if m.starts_with("gpt-4") => 8_192,
            m if m.starts_with("gpt-3.5") => 16_384,
            _ => 128_000,
        };
        ReasonerInfo::new("openai", &self.config.model, max_context)
    }
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    tools: Vec<serde_json::Value>,
    tool_choice: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    function: OpenAIFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunctionCall {
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
