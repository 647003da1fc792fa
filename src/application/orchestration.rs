//! Orchestration Stage (C4) - for each Task, produce a validated
//! `ToolExecutionPlan` (ordered tool steps with late-bound parameters,
//! dependencies, and recovery policy).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::application::tool_bridge::ToolBridge;
use crate::domain::foundation::DomainError;
use crate::domain::tool_catalog::{recommend_tools, AvailableToolInfo};
use crate::domain::{RecoveryPolicy, Task, ToolExecutionPlan, ToolExecutionStep};
use crate::ports::{ReasonRequest, Reasoner};

#[derive(Clone)]
pub struct OrchestrationStage {
    reasoner: Arc<dyn Reasoner>,
    tool_bridge: Arc<ToolBridge>,
}

#[derive(Debug, Deserialize)]
struct ToolExecutionPlanWire {
    #[serde(default)]
    approach: String,
    #[serde(default)]
    success_criteria: String,
    #[serde(default)]
    fallback_strategy: Option<String>,
    #[serde(default)]
    execution_steps: Vec<ExecutionStepWire>,
    #[serde(default)]
    estimated_duration_seconds: u32,
    #[serde(default)]
    risk_assessment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExecutionStepWire {
    step_number: u32,
    tool_name: String,
    #[serde(default)]
    server_id: String,
    #[serde(default)]
    parameters: HashMap<String, Value>,
    #[serde(default)]
    depends_on_steps: HashSet<u32>,
    #[serde(default)]
    error_handling: RecoveryPolicy,
    #[serde(default)]
    expected_output: Option<String>,
    #[serde(default)]
    description: String,
}

impl OrchestrationStage {
    pub fn new(reasoner: Arc<dyn Reasoner>, tool_bridge: Arc<ToolBridge>) -> Self {
        Self { reasoner, tool_bridge }
    }

    /// Produces a `ToolExecutionPlan` for a single task, or a `DomainError`
    /// if the stage's Reasoner call fails outright (§4.4).
    pub async fn run(&self, task: &Task, context: &HashMap<String, Value>) -> Result<ToolExecutionPlan, DomainError> {
        let catalog = self.tool_bridge.list_tools(false).await;
        let recommended = recommend_tools(task, &catalog);
        let prompt = build_prompt(task, &catalog, &recommended, context);

        let response = self
            .reasoner
            .reason(ReasonRequest::ToolExecutionPlan { prompt })
            .await
            .map_err(|err| DomainError::orchestration_failed(err.to_string()))?;

        let wire: ToolExecutionPlanWire = serde_json::from_value(response.value.raw_json().clone())
            .map_err(|err| DomainError::orchestration_failed(format!("malformed ToolExecutionPlan response: {err}")))?;

        let mut plan = ToolExecutionPlan::new(task.id, task.description.clone());
        plan.approach = wire.approach;
        plan.success_criteria = wire.success_criteria;
        plan.fallback_strategy = wire.fallback_strategy;
        plan.estimated_duration_seconds = wire.estimated_duration_seconds;
        plan.risk_assessment = wire.risk_assessment;

        plan.execution_steps = wire
            .execution_steps
            .into_iter()
            .map(|s| ToolExecutionStep {
                step_number: s.step_number,
                tool_name: s.tool_name,
                server_id: s.server_id,
                parameters: s.parameters,
                depends_on_steps: s.depends_on_steps,
                error_handling: s.error_handling,
                expected_output: s.expected_output,
                description: s.description,
            })
            .collect();

        self.repair_and_validate(&mut plan, &catalog);

        Ok(plan)
    }

    /// Verifies every step's `tool_name` exists, canonicalizes `server_id`
    /// from the cache, and drops cyclic step dependencies (§4.4).
    fn repair_and_validate(&self, plan: &mut ToolExecutionPlan, catalog: &[AvailableToolInfo]) {
        for step in &mut plan.execution_steps {
            match catalog.iter().find(|t| t.name == step.tool_name) {
                Some(tool) => step.server_id = tool.server_id.clone(),
                None => warn!(tool_name = %step.tool_name, task_id = %plan.task_id, "orchestration referenced an unknown tool; leaving step for execution to surface"),
            }
        }

        let dropped = plan.repair_step_cycles();
        if !dropped.is_empty() {
            warn!(task_id = %plan.task_id, steps = ?dropped, "repaired cyclic step dependencies in tool execution plan");
        }

        plan.metadata.insert("validation_passed".to_string(), Value::Bool(plan.is_valid()));
    }
}

fn build_prompt(task: &Task, catalog: &[AvailableToolInfo], recommended: &[&str], context: &HashMap<String, Value>) -> String {
    let catalog_lines: Vec<String> = catalog
        .iter()
        .map(|tool| {
            let params: Vec<&str> = tool.properties().keys().take(3).map(String::as_str).collect();
            format!("- {} ({}): {} [params: {}]", tool.name, tool.server_id, tool.description, params.join(", "))
        })
        .collect();

    format!(
        "Build a tool execution plan for this task.\n\nTask: {} (priority {:?})\nRequired tools: {:?}\n\nTool catalog:\n{}\n\nRecommended tools: {:?}\n\nContext: {}\n\nRespond with a structured ToolExecutionPlan: {{approach, success_criteria, fallback_strategy, execution_steps[], estimated_duration_seconds, risk_assessment}}.",
        task.description,
        task.priority,
        task.tools_required,
        catalog_lines.join("\n"),
        recommended,
        serde_json::to_string(context).unwrap_or_default(),
    )
}
