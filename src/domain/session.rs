//! Session - per-connection state and the progress event schema (§3, §4.7).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::Timestamp;

use super::{Percentage, ReasoningChainId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Initializing,
    Ready,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled)
    }
}

/// Per-connection session state (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub user_query: String,
    pub reasoning_chain_id: Option<ReasoningChainId>,
    pub progress_percentage: Percentage,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub final_result: Option<String>,
    pub error_message: Option<String>,
    pub cancellation_requested: bool,
    pub metadata: std::collections::HashMap<String, Value>,
}

impl Session {
    pub fn new(user_query: impl Into<String>) -> Self {
        Self::with_id(SessionId::new(), user_query)
    }

    /// Builds a session under a caller-supplied id, e.g. one already bound
    /// to a live connection before the first query arrives.
    pub fn with_id(session_id: SessionId, user_query: impl Into<String>) -> Self {
        Self {
            session_id,
            status: SessionStatus::Initializing,
            user_query: user_query.into(),
            reasoning_chain_id: None,
            progress_percentage: Percentage::ZERO,
            created_at: Timestamp::now(),
            started_at: None,
            completed_at: None,
            final_result: None,
            error_message: None,
            cancellation_requested: false,
            metadata: std::collections::HashMap::new(),
        }
    }

    pub fn mark_ready(&mut self) {
        if self.status == SessionStatus::Initializing {
            self.status = SessionStatus::Ready;
        }
    }

    pub fn start_processing(&mut self, chain_id: ReasoningChainId) {
        self.status = SessionStatus::Processing;
        self.reasoning_chain_id = Some(chain_id);
        self.started_at = Some(Timestamp::now());
    }

    pub fn request_cancellation(&mut self) {
        self.cancellation_requested = true;
    }

    /// First terminal transition wins; §8 invariant: `progress_percentage`
    /// becomes 100 and `completed_at >= started_at` once terminal.
    pub fn complete(&mut self, final_result: impl Into<String>) {
        if self.status.is_terminal() {
            tracing::debug!(session_id = %self.session_id, "complete() called on terminal session, ignoring");
            return;
        }
        self.status = SessionStatus::Completed;
        self.final_result = Some(final_result.into());
        self.finish();
    }

    pub fn fail(&mut self, error_message: impl Into<String>) {
        if self.status.is_terminal() {
            tracing::debug!(session_id = %self.session_id, "fail() called on terminal session, ignoring");
            return;
        }
        self.status = SessionStatus::Failed;
        self.error_message = Some(error_message.into());
        self.finish();
    }

    pub fn cancel(&mut self, reason: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = SessionStatus::Cancelled;
        self.error_message = Some(reason.into());
        self.finish();
    }

    fn finish(&mut self) {
        self.progress_percentage = Percentage::HUNDRED;
        let now = Timestamp::now();
        self.completed_at = Some(now);
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    pub fn set_progress(&mut self, percentage: Percentage) {
        if !self.status.is_terminal() {
            self.progress_percentage = percentage;
        }
    }
}

/// Which agent role a `agent_progress` event is reporting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressAgentRole {
    Planning,
    Orchestrator,
    Execution,
}

/// The seven progress event shapes streamed over the Session & Progress
/// Plane (§4.7). Tagged so the wire payload carries its own `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Status {
        session_id: SessionId,
        connected_tool_servers: Vec<String>,
    },
    AgentQueryStarted {
        session_id: SessionId,
        query: String,
    },
    AgentProgress {
        session_id: SessionId,
        agent_role: ProgressAgentRole,
        progress_percentage: Percentage,
        current_task: Option<String>,
        elapsed_seconds: f64,
    },
    ToolExecutionStarted {
        session_id: SessionId,
        tool_name: String,
        resolved_parameters: Value,
    },
    ToolExecutionCompleted {
        session_id: SessionId,
        tool_name: String,
        success: bool,
        result: Option<Value>,
        error: Option<String>,
        duration_seconds: f64,
    },
    AgentQueryCompleted {
        session_id: SessionId,
        success: bool,
        final_result: Option<String>,
        tasks_completed: u32,
        tasks_failed: u32,
        tools_executed: u32,
    },
    AgentError {
        session_id: SessionId,
        error: String,
    },
}

impl ProgressEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            ProgressEvent::Status { session_id, .. }
            | ProgressEvent::AgentQueryStarted { session_id, .. }
            | ProgressEvent::AgentProgress { session_id, .. }
            | ProgressEvent::ToolExecutionStarted { session_id, .. }
            | ProgressEvent::ToolExecutionCompleted { session_id, .. }
            | ProgressEvent::AgentQueryCompleted { session_id, .. }
            | ProgressEvent::AgentError { session_id, .. } => *session_id,
        }
    }

    /// True for the two event shapes that mark a session's terminal moment
    /// (§4.7: "every terminal state produces exactly one ... event").
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::AgentQueryCompleted { .. } | ProgressEvent::AgentError { .. })
    }
}
