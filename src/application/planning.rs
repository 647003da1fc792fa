//! Planning Stage (C3) - turns a user query plus a tool catalog snapshot
//! into a typed `TaskList`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::domain::foundation::DomainError;
use crate::domain::tool_catalog::AvailableToolInfo;
use crate::domain::{Task, TaskId, TaskList, TaskPriority};
use crate::ports::{ReasonRequest, Reasoner};

/// Maximum tools per server included in the planning prompt, to bound
/// prompt size (§4.3).
const MAX_TOOLS_PER_SERVER: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Default for Complexity {
    fn default() -> Self {
        Complexity::Moderate
    }
}

/// Analysis metadata accompanying the produced `TaskList` (§4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanningOutcome {
    pub analysis: String,
    pub approach: String,
    pub execution_strategy: String,
    pub complexity: Complexity,
    pub requires_tools: Vec<String>,
}

#[derive(Clone)]
pub struct PlanningStage {
    reasoner: Arc<dyn Reasoner>,
}

#[derive(Debug, Deserialize)]
struct TaskPlanWire {
    #[serde(default)]
    analysis: String,
    #[serde(default)]
    approach: String,
    #[serde(default)]
    tasks: Vec<TaskSpecWire>,
    #[serde(default)]
    execution_strategy: String,
    #[serde(default)]
    estimated_complexity: Complexity,
    #[serde(default)]
    requires_tools: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TaskSpecWire {
    number: Value,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    priority: TaskPriority,
    #[serde(default)]
    dependencies: Vec<Value>,
    #[serde(default)]
    tools_required: Vec<String>,
}

impl PlanningStage {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self { reasoner }
    }

    /// Runs the stage: builds the prompt, invokes the Reasoner, materializes
    /// Tasks, resolves dependency references, and computes `execution_order`.
    pub async fn run(&self, user_query: &str, context: &HashMap<String, Value>, catalog: &[AvailableToolInfo]) -> Result<(TaskList, PlanningOutcome), DomainError> {
        let prompt = build_prompt(user_query, context, catalog);

        let response = self
            .reasoner
            .reason(ReasonRequest::TaskPlan { prompt })
            .await
            .map_err(|err| DomainError::planning_failed(err.to_string()))?;

        let wire: TaskPlanWire = serde_json::from_value(response.value.raw_json().clone())
            .map_err(|err| DomainError::planning_failed(format!("malformed TaskPlan response: {err}")))?;

        let (tasks, number_to_id, spec_by_task_id) = materialize_tasks(&wire.tasks);
        let tasks = resolve_dependencies(tasks, &spec_by_task_id, &number_to_id);

        let task_list = TaskList::new(tasks);
        let outcome = PlanningOutcome {
            analysis: wire.analysis,
            approach: wire.approach,
            execution_strategy: wire.execution_strategy,
            complexity: wire.estimated_complexity,
            requires_tools: wire.requires_tools,
        };

        Ok((task_list, outcome))
    }
}

fn build_prompt(user_query: &str, context: &HashMap<String, Value>, catalog: &[AvailableToolInfo]) -> String {
    let mut by_server: HashMap<&str, Vec<&AvailableToolInfo>> = HashMap::new();
    for tool in catalog {
        by_server.entry(tool.server_id.as_str()).or_default().push(tool);
    }

    let mut catalog_lines = Vec::new();
    for (server_id, tools) in &by_server {
        for tool in tools.iter().take(MAX_TOOLS_PER_SERVER) {
            catalog_lines.push(format!("- {} ({}): {}", tool.name, server_id, tool.description));
        }
    }

    format!(
        "Decompose the following user query into a task plan.\n\nQuery: {user_query}\n\nAvailable tools:\n{}\n\nContext: {}\n\nRespond with a structured TaskPlan: {{analysis, approach, tasks[], execution_strategy, estimated_complexity, requires_tools[]}}.",
        catalog_lines.join("\n"),
        serde_json::to_string(context).unwrap_or_default(),
    )
}

/// Builds a Task per spec plus the lookup tables callers need afterward.
/// `spec_by_task_id` is keyed at the point each task is actually created, so
/// it stays correctly aligned even when a malformed spec is dropped (specs
/// are not in 1:1 positional correspondence with `tasks`).
fn materialize_tasks(specs: &[TaskSpecWire]) -> (Vec<Task>, HashMap<String, TaskId>, HashMap<TaskId, &TaskSpecWire>) {
    let mut tasks = Vec::with_capacity(specs.len());
    let mut number_to_id = HashMap::new();
    let mut spec_by_task_id = HashMap::new();

    for spec in specs {
        let mut task = match Task::new(&spec.title, &spec.description) {
            Ok(task) => task,
            Err(err) => {
                warn!(error = %err, title = %spec.title, "skipping malformed task spec");
                continue;
            }
        };
        task.priority = spec.priority;
        task.tools_required = spec.tools_required.clone();

        number_to_id.insert(task_number_key(&spec.number), task.id);
        spec_by_task_id.insert(task.id, spec);
        tasks.push(task);
    }

    (tasks, number_to_id, spec_by_task_id)
}

/// Resolves each task's raw dependency references (integer task-number,
/// string task-number, or task-id string) to real `TaskId`s. Unresolvable
/// references are dropped with a warning rather than aborting (§4.3).
fn resolve_dependencies(mut tasks: Vec<Task>, spec_by_task_id: &HashMap<TaskId, &TaskSpecWire>, number_to_id: &HashMap<String, TaskId>) -> Vec<Task> {
    for task in &mut tasks {
        let Some(spec) = spec_by_task_id.get(&task.id) else { continue };
        for raw_dep in &spec.dependencies {
            if let Some(dep_id) = resolve_one_dependency(raw_dep, number_to_id) {
                task.add_dependency(dep_id);
            } else {
                warn!(raw_dep = %raw_dep, task = %task.title, "dropping unresolvable dependency reference");
            }
        }
    }

    tasks
}

fn resolve_one_dependency(raw: &Value, number_to_id: &HashMap<String, TaskId>) -> Option<TaskId> {
    match raw {
        Value::Number(n) => number_to_id.get(&n.to_string()).copied(),
        Value::String(s) => number_to_id.get(s).copied().or_else(|| s.parse::<TaskId>().ok()),
        _ => None,
    }
}

fn task_number_key(raw: &Value) -> String {
    match raw {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
