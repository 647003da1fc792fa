//! Execution Stage (C5) - runs a `ToolExecutionPlan` step by step, honoring
//! dependencies, late-bound parameters, and per-step recovery, then
//! synthesizes a user-facing answer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::application::tool_bridge::{ToolBridge, ToolInvocation, ToolResult};
use crate::domain::foundation::SessionId;
use crate::domain::{ProgressEvent, RecoveryPolicy, ToolExecutionPlan, ToolExecutionStep};
use crate::ports::{ProgressSink, ReasonRequest, Reasoner};

/// Outcome of one tool step, as kept in `step_results` (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_number: u32,
    pub tool_name: String,
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub duration_seconds: f64,
    pub parameters: HashMap<String, Value>,
}

/// The Execution stage's full result for one plan (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub task_id: String,
    pub success: bool,
    pub completed_steps: u32,
    pub total_steps: u32,
    pub execution_summary: String,
    pub final_output: String,
    pub step_results: Vec<StepResult>,
    pub errors_encountered: Vec<String>,
    pub duration_seconds: f64,
    pub tool_calls_made: u32,
    pub recovery_actions_taken: Vec<String>,
}

#[derive(Clone)]
pub struct ExecutionStage {
    tool_bridge: Arc<ToolBridge>,
    reasoner: Arc<dyn Reasoner>,
}

impl ExecutionStage {
    pub fn new(tool_bridge: Arc<ToolBridge>, reasoner: Arc<dyn Reasoner>) -> Self {
        Self { tool_bridge, reasoner }
    }

    /// Runs every step of `plan` in `step_number` order, one at a time,
    /// emitting a `ToolExecutionStarted`/`ToolExecutionCompleted` pair through
    /// `sink` around every `tool_bridge.execute` call (§4.7, §8). Never
    /// returns `Err`: a failed plan is a successful `ExecutionOutcome` with
    /// `success: false` (§7 - execution failures are data, not faults).
    pub async fn run(&self, session_id: SessionId, plan: &ToolExecutionPlan, sink: &dyn ProgressSink) -> ExecutionOutcome {
        let start = Instant::now();
        let mut execution_context: HashMap<String, Value> = HashMap::new();
        let mut step_results: Vec<StepResult> = Vec::new();
        let mut errors_encountered = Vec::new();
        let mut recovery_actions_taken = Vec::new();
        let mut tool_calls_made = 0u32;
        let mut blocked_steps: std::collections::HashSet<u32> = std::collections::HashSet::new();
        let mut aborted = false;

        let mut steps: Vec<&ToolExecutionStep> = plan.execution_steps.iter().collect();
        steps.sort_by_key(|s| s.step_number);

        for step in steps {
            if aborted {
                break;
            }

            if step.depends_on_steps.iter().any(|dep| blocked_steps.contains(dep)) {
                blocked_steps.insert(step.step_number);
                errors_encountered.push(format!("step {} blocked: an upstream dependency did not succeed", step.step_number));
                continue;
            }

            let resolved_params = resolve_parameters(&step.parameters, &execution_context, &step_results);
            tool_calls_made += 1;
            let resolved_value = Value::Object(resolved_params.clone().into_iter().collect());

            let invocation = ToolInvocation::new(step.tool_name.clone(), resolved_value.clone()).with_server(step.server_id.clone());
            let mut result = self.execute_with_events(session_id, sink, &step.tool_name, resolved_value.clone(), invocation).await;

            if !result.ok && step.error_handling == RecoveryPolicy::RetryOnce {
                recovery_actions_taken.push(format!("step {}: retry_once after failure", step.step_number));
                let retry_invocation = ToolInvocation::new(step.tool_name.clone(), resolved_value.clone()).with_server(step.server_id.clone());
                result = self.execute_with_events(session_id, sink, &step.tool_name, resolved_value.clone(), retry_invocation).await;
            }

            if !result.ok {
                errors_encountered.push(result.error.clone().unwrap_or_else(|| "unknown tool failure".to_string()));
                match step.error_handling {
                    RecoveryPolicy::Fallback => {
                        recovery_actions_taken.push(format!("step {}: fallback needed, no alternative tool chosen", step.step_number));
                        blocked_steps.insert(step.step_number);
                    }
                    RecoveryPolicy::Abort => {
                        recovery_actions_taken.push(format!("step {}: abort, remaining steps skipped", step.step_number));
                        blocked_steps.insert(step.step_number);
                        aborted = true;
                    }
                    RecoveryPolicy::Skip => {
                        recovery_actions_taken.push(format!("step {}: SKIPPED", step.step_number));
                        blocked_steps.insert(step.step_number);
                    }
                    RecoveryPolicy::RetryOnce => {
                        blocked_steps.insert(step.step_number);
                    }
                }
            }

            record_step(&mut execution_context, &mut step_results, step, &resolved_params, &result);
        }

        let completed_steps = step_results.iter().filter(|r| r.success).count() as u32;
        let total_steps = plan.execution_steps.len() as u32;
        let success = !aborted && completed_steps == total_steps;

        let (execution_summary, final_output) = self.synthesize(plan, &step_results, success).await;

        ExecutionOutcome {
            task_id: plan.task_id.to_string(),
            success,
            completed_steps,
            total_steps,
            execution_summary,
            final_output,
            step_results,
            errors_encountered,
            duration_seconds: start.elapsed().as_secs_f64(),
            tool_calls_made,
            recovery_actions_taken,
        }
    }

    /// Wraps one `tool_bridge.execute` call with its matching progress
    /// events (§4.7, §8: every tool invocation has a preceding
    /// `tool_execution_started` and a following `tool_execution_completed`).
    async fn execute_with_events(
        &self,
        session_id: SessionId,
        sink: &dyn ProgressSink,
        tool_name: &str,
        resolved_parameters: Value,
        invocation: ToolInvocation,
    ) -> ToolResult {
        sink.emit(ProgressEvent::ToolExecutionStarted { session_id, tool_name: tool_name.to_string(), resolved_parameters }).await;
        let result = self.tool_bridge.execute(invocation).await;
        sink.emit(ProgressEvent::ToolExecutionCompleted {
            session_id,
            tool_name: tool_name.to_string(),
            success: result.ok,
            result: result.value.clone(),
            error: result.error.clone(),
            duration_seconds: result.duration_seconds,
        })
        .await;
        result
    }

    /// Asks the Reasoner to synthesize a summary conditioned on the plan and
    /// its step results; falls back to a deterministic template if the
    /// Reasoner call fails (§4.5).
    async fn synthesize(&self, plan: &ToolExecutionPlan, step_results: &[StepResult], success: bool) -> (String, String) {
        let prompt = format!(
            "Synthesize a result for this task.\n\nTask: {}\nApproach: {}\nSuccess criteria: {}\n\nStep results: {}\n\nRespond with a structured ExecutionResult: {{summary, final_output}}.",
            plan.task_description,
            plan.approach,
            plan.success_criteria,
            serde_json::to_string(step_results).unwrap_or_default(),
        );

        match self.reasoner.reason(ReasonRequest::ExecutionResult { prompt }).await {
            Ok(response) => {
                #[derive(Deserialize)]
                struct Wire {
                    #[serde(default)]
                    summary: String,
                    #[serde(default)]
                    final_output: String,
                }
                match serde_json::from_value::<Wire>(response.value.raw_json().clone()) {
                    Ok(wire) if !wire.final_output.is_empty() => (wire.summary, wire.final_output),
                    _ => {
                        warn!(task_id = %plan.task_id, "malformed ExecutionResult response, using deterministic template");
                        deterministic_summary(plan, step_results, success)
                    }
                }
            }
            Err(err) => {
                info!(task_id = %plan.task_id, error = %err, "synthesis reasoner call failed, using deterministic template");
                deterministic_summary(plan, step_results, success)
            }
        }
    }
}

fn deterministic_summary(plan: &ToolExecutionPlan, step_results: &[StepResult], success: bool) -> (String, String) {
    let completed = step_results.iter().filter(|r| r.success).count();
    let total = step_results.len();
    let summary = if success {
        format!("completed {completed}/{total}")
    } else if completed > 0 {
        "partially completed".to_string()
    } else {
        "failed".to_string()
    };
    let final_output = format!("{summary}: {}", plan.task_description);
    (summary, final_output)
}

fn record_step(
    execution_context: &mut HashMap<String, Value>,
    step_results: &mut Vec<StepResult>,
    step: &ToolExecutionStep,
    resolved_params: &HashMap<String, Value>,
    result: &ToolResult,
) {
    execution_context.insert(format!("step_{}_result", step.step_number), result.value.clone().unwrap_or(Value::Null));
    step_results.push(StepResult {
        step_number: step.step_number,
        tool_name: step.tool_name.clone(),
        success: result.ok,
        result: result.value.clone(),
        error: result.error.clone(),
        duration_seconds: result.duration_seconds,
        parameters: resolved_params.clone(),
    });
}

/// Resolves every `${key}` parameter reference against `execution_context`
/// first, then `step_<N>_result` entries, then leaves it as a literal if
/// nothing matches (§4.5).
fn resolve_parameters(
    parameters: &HashMap<String, Value>,
    execution_context: &HashMap<String, Value>,
    step_results: &[StepResult],
) -> HashMap<String, Value> {
    parameters
        .iter()
        .map(|(key, value)| {
            let resolved = match value {
                Value::String(s) => match s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
                    Some(reference_key) => resolve_reference(reference_key, execution_context, step_results).unwrap_or_else(|| value.clone()),
                    None => value.clone(),
                },
                other => other.clone(),
            };
            (key.clone(), resolved)
        })
        .collect()
}

fn resolve_reference(key: &str, execution_context: &HashMap<String, Value>, step_results: &[StepResult]) -> Option<Value> {
    if let Some(value) = execution_context.get(key) {
        return Some(value.clone());
    }
    step_results.iter().find(|r| format!("step_{}_result", r.step_number) == key).and_then(|r| r.result.clone())
}
