//! Mock Reasoner for testing.
//!
//! Configurable implementation of the Reasoner port, letting stage tests run
//! without calling a real LLM API: pre-configured responses consumed in
//! order, simulated delay, error injection, and call tracking.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::ports::{ReasonRequest, ReasonResponse, ReasonTokenUsage, ReasonValue, Reasoner, ReasonerError, ReasonerInfo};

#[derive(Debug, Clone)]
pub struct MockReasoner {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    info: ReasonerInfo,
    delay: Duration,
    calls: Arc<Mutex<Vec<ReasonRequest>>>,
}

#[derive(Debug, Clone)]
pub enum MockResponse {
    Success { raw_json: serde_json::Value, usage: ReasonTokenUsage },
    Error(MockError),
}

#[derive(Debug, Clone)]
pub enum MockError {
    RateLimited { retry_after_secs: u32 },
    Unavailable { message: String },
    AuthenticationFailed,
    Network { message: String },
    Timeout { timeout_secs: u32 },
    SchemaMismatch { schema: &'static str, reason: String },
}

impl From<MockError> for ReasonerError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::RateLimited { retry_after_secs } => ReasonerError::RateLimited { retry_after_secs },
            MockError::Unavailable { message } => ReasonerError::Unavailable { message },
            MockError::AuthenticationFailed => ReasonerError::AuthenticationFailed,
            MockError::Network { message } => ReasonerError::Network(message),
            MockError::Timeout { timeout_secs } => ReasonerError::Timeout { timeout_secs },
            MockError::SchemaMismatch { schema, reason } => ReasonerError::SchemaMismatch { schema, reason },
        }
    }
}

impl Default for MockReasoner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockReasoner {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            info: ReasonerInfo::new("mock", "mock-model-1", 128_000),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_response(self, raw_json: serde_json::Value) -> Self {
        self.with_response_full(raw_json, ReasonTokenUsage::new(10, 20))
    }

    pub fn with_response_full(self, raw_json: serde_json::Value, usage: ReasonTokenUsage) -> Self {
        self.responses.lock().unwrap().push_back(MockResponse::Success { raw_json, usage });
        self
    }

    pub fn with_error(self, error: MockError) -> Self {
        self.responses.lock().unwrap().push_back(MockResponse::Error(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_response(&self) -> Option<MockResponse> {
        self.responses.lock().unwrap().pop_front()
    }

    fn wrap(schema_name: &'static str, raw_json: serde_json::Value) -> ReasonValue {
        match schema_name {
            "TaskPlan" => ReasonValue::TaskPlan { raw_json },
            "ToolExecutionPlan" => ReasonValue::ToolExecutionPlan { raw_json },
            _ => ReasonValue::ExecutionResult { raw_json },
        }
    }
}

#[async_trait]
impl Reasoner for MockReasoner {
    async fn reason(&self, request: ReasonRequest) -> Result<ReasonResponse, ReasonerError> {
        let schema_name = request.schema_name();
        self.calls.lock().unwrap().push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_response() {
            Some(MockResponse::Success { raw_json, usage }) => {
                Ok(ReasonResponse { value: Self::wrap(schema_name, raw_json), tokens: usage })
            }
            Some(MockResponse::Error(err)) => Err(err.into()),
            None => Ok(ReasonResponse {
                value: Self::wrap(schema_name, serde_json::json!({})),
                tokens: ReasonTokenUsage::new(5, 10),
            }),
        }
    }

    fn provider_info(&self) -> ReasonerInfo {
        self.info.clone()
    }
}
