//! ToolExecutionPlan - the Orchestration stage's output: an ordered sequence
//! of tool invocations for one Task.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TaskId;

/// Per-step recovery instruction (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPolicy {
    RetryOnce,
    Skip,
    Fallback,
    Abort,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        RecoveryPolicy::Skip
    }
}

/// A single tool invocation within a ToolExecutionPlan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionStep {
    pub step_number: u32,
    pub tool_name: String,
    pub server_id: String,
    pub parameters: HashMap<String, Value>,
    pub depends_on_steps: HashSet<u32>,
    pub error_handling: RecoveryPolicy,
    pub expected_output: Option<String>,
    pub description: String,
}

impl ToolExecutionStep {
    pub fn new(step_number: u32, tool_name: impl Into<String>) -> Self {
        Self {
            step_number,
            tool_name: tool_name.into(),
            server_id: String::new(),
            parameters: HashMap::new(),
            depends_on_steps: HashSet::new(),
            error_handling: RecoveryPolicy::default(),
            expected_output: None,
            description: String::new(),
        }
    }
}

/// The Orchestration stage's output for one Task (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionPlan {
    pub task_id: TaskId,
    pub task_description: String,
    pub approach: String,
    pub success_criteria: String,
    pub fallback_strategy: Option<String>,
    pub execution_steps: Vec<ToolExecutionStep>,
    pub estimated_duration_seconds: u32,
    pub risk_assessment: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl ToolExecutionPlan {
    pub fn new(task_id: TaskId, task_description: impl Into<String>) -> Self {
        Self {
            task_id,
            task_description: task_description.into(),
            approach: String::new(),
            success_criteria: String::new(),
            fallback_strategy: None,
            execution_steps: Vec::new(),
            estimated_duration_seconds: 0,
            risk_assessment: None,
            metadata: HashMap::new(),
        }
    }

    /// Repairs the plan in place per §4.4:
    /// - drops `depends_on_steps` cycles (DFS with recursion stack, same
    ///   technique as the task graph's cycle detection)
    /// - every surviving `depends_on_steps` entry must be < its step_number
    ///
    /// Returns the step_numbers whose back-edges were dropped, for logging.
    pub fn repair_step_cycles(&mut self) -> Vec<u32> {
        let adjacency: HashMap<u32, HashSet<u32>> = self
            .execution_steps
            .iter()
            .map(|s| (s.step_number, s.depends_on_steps.clone()))
            .collect();

        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut back_edges = Vec::new();

        fn visit(
            node: u32,
            adjacency: &HashMap<u32, HashSet<u32>>,
            visited: &mut HashSet<u32>,
            on_stack: &mut HashSet<u32>,
            back_edges: &mut Vec<(u32, u32)>,
        ) {
            visited.insert(node);
            on_stack.insert(node);
            if let Some(deps) = adjacency.get(&node) {
                for &dep in deps {
                    if on_stack.contains(&dep) {
                        back_edges.push((node, dep));
                    } else if !visited.contains(&dep) {
                        visit(dep, adjacency, visited, on_stack, back_edges);
                    }
                }
            }
            on_stack.remove(&node);
        }

        for step in &self.execution_steps {
            if !visited.contains(&step.step_number) {
                visit(step.step_number, &adjacency, &mut visited, &mut on_stack, &mut back_edges);
            }
        }

        let mut touched = Vec::new();
        for (from, to) in &back_edges {
            if let Some(step) = self.execution_steps.iter_mut().find(|s| s.step_number == *from) {
                step.depends_on_steps.remove(to);
                touched.push(*from);
            }
        }

        // Any remaining forward reference to a later or equal step number is
        // not a legitimate dependency either; drop it rather than let
        // execution block forever on an un-orderable reference.
        for step in &mut self.execution_steps {
            let before = step.depends_on_steps.len();
            step.depends_on_steps.retain(|d| *d < step.step_number);
            if step.depends_on_steps.len() != before {
                touched.push(step.step_number);
            }
        }

        touched.sort_unstable();
        touched.dedup();
        touched
    }

    pub fn is_valid(&self) -> bool {
        self.execution_steps
            .iter()
            .all(|s| s.depends_on_steps.iter().all(|d| *d < s.step_number))
    }
}
