//! ReasoningChain - the end-to-end record of one query: the task list, the
//! three stages' ReasoningSteps, and the final result.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

use super::{ReasoningChainId, TaskList};

/// Which of the three stages produced a ReasoningStep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Planning,
    Orchestrator,
    Execution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    InProgress,
    Completed,
    Failed,
}

/// One stage's contribution to a ReasoningChain (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub step_number: u32,
    pub title: String,
    pub agent_role: AgentRole,
    pub description: String,
    pub status: StepStatus,
    pub execution_time_seconds: f64,
    pub error: Option<String>,
    pub tool_calls: u32,
}

impl ReasoningStep {
    pub fn new(step_number: u32, title: impl Into<String>, agent_role: AgentRole) -> Self {
        Self {
            step_number,
            title: title.into(),
            agent_role,
            description: String::new(),
            status: StepStatus::InProgress,
            execution_time_seconds: 0.0,
            error: None,
            tool_calls: 0,
        }
    }

    pub fn complete(&mut self, execution_time_seconds: f64) {
        self.status = StepStatus::Completed;
        self.execution_time_seconds = execution_time_seconds;
    }

    pub fn fail(&mut self, error: impl Into<String>, execution_time_seconds: f64) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.execution_time_seconds = execution_time_seconds;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// The full record of one orchestrated query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningChain {
    pub id: ReasoningChainId,
    pub original_query: String,
    pub task_list: Option<TaskList>,
    pub reasoning_steps: Vec<ReasoningStep>,
    pub final_result: Option<String>,
    pub status: ChainStatus,
    pub total_execution_time_seconds: f64,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub tokens_used: u64,
    pub tools_executed: u32,
}

impl ReasoningChain {
    pub fn new(original_query: impl Into<String>) -> Self {
        Self {
            id: ReasoningChainId::new(),
            original_query: original_query.into(),
            task_list: None,
            reasoning_steps: Vec::new(),
            final_result: None,
            status: ChainStatus::Pending,
            total_execution_time_seconds: 0.0,
            started_at: None,
            completed_at: None,
            tokens_used: 0,
            tools_executed: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, ChainStatus::Completed | ChainStatus::Failed)
    }

    pub fn start(&mut self) {
        if self.status != ChainStatus::Pending {
            tracing::debug!(chain_id = %self.id, "start() called on non-pending chain, ignoring");
            return;
        }
        self.status = ChainStatus::InProgress;
        self.started_at = Some(Timestamp::now());
    }

    /// Appends the next ReasoningStep, stamping it with the next sequential
    /// `step_number` so steps stay monotone regardless of caller ordering.
    pub fn push_step(&mut self, title: impl Into<String>, agent_role: AgentRole) -> &mut ReasoningStep {
        let step_number = self.reasoning_steps.len() as u32 + 1;
        self.reasoning_steps.push(ReasoningStep::new(step_number, title, agent_role));
        self.reasoning_steps.last_mut().unwrap()
    }

    /// First terminal transition wins; subsequent calls are logged no-ops
    /// (§4.2, §8 idempotence).
    pub fn complete(&mut self, final_result: impl Into<String>) {
        if self.is_terminal() {
            tracing::debug!(chain_id = %self.id, "complete() called on terminal chain, ignoring");
            return;
        }
        self.status = ChainStatus::Completed;
        self.final_result = Some(final_result.into());
        self.stamp_completion();
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        if self.is_terminal() {
            tracing::debug!(chain_id = %self.id, "fail() called on terminal chain, ignoring");
            return;
        }
        self.status = ChainStatus::Failed;
        self.final_result = Some(error.into());
        self.stamp_completion();
    }

    fn stamp_completion(&mut self) {
        let now = Timestamp::now();
        self.completed_at = Some(now);
        if let Some(started) = self.started_at {
            let secs = now.duration_since(&started).num_milliseconds() as f64 / 1000.0;
            self.total_execution_time_seconds = secs.max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chain_is_pending_with_no_steps() {
        let chain = ReasoningChain::new("do something");
        assert_eq!(chain.status, ChainStatus::Pending);
        assert!(chain.reasoning_steps.is_empty());
    }

    #[test]
    fn push_step_assigns_monotone_step_numbers() {
        let mut chain = ReasoningChain::new("q");
        chain.push_step("Planning", AgentRole::Planning);
        chain.push_step("Orchestration", AgentRole::Orchestrator);
        chain.push_step("Execution", AgentRole::Execution);

        let numbers: Vec<u32> = chain.reasoning_steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn complete_is_idempotent_first_wins() {
        let mut chain = ReasoningChain::new("q");
        chain.start();
        chain.complete("first result");
        chain.complete("second result");
        assert_eq!(chain.final_result.as_deref(), Some("first result"));
    }

    #[test]
    fn fail_after_complete_is_a_noop() {
        let mut chain = ReasoningChain::new("q");
        chain.start();
        chain.complete("ok");
        chain.fail("should not apply");
        assert_eq!(chain.status, ChainStatus::Completed);
        assert_eq!(chain.final_result.as_deref(), Some("ok"));
    }

    #[test]
    fn terminal_chain_has_nonnegative_total_execution_time() {
        let mut chain = ReasoningChain::new("q");
        chain.start();
        chain.complete("done");
        assert!(chain.total_execution_time_seconds >= 0.0);
    }

    #[test]
    fn reasoning_step_count_is_within_zero_to_three() {
        let mut chain = ReasoningChain::new("q");
        chain.push_step("Planning", AgentRole::Planning);
        chain.push_step("Orchestration", AgentRole::Orchestrator);
        chain.push_step("Execution", AgentRole::Execution);
        assert!((0..=3).contains(&chain.reasoning_steps.len()));
    }
}
