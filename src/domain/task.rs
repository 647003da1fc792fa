//! Task entity - a single unit of work within a TaskList.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, ValidationError};

use super::TaskId;

/// Lifecycle state of a Task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
    Blocked,
}

/// Priority tier used to break ties in the execution order (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    /// Numeric weight, higher is more urgent. Used for the `-priority_value`
    /// half of the `(-priority_value, created_at)` tie-break rule.
    pub fn value(self) -> i32 {
        match self {
            TaskPriority::Low => 1,
            TaskPriority::Medium => 2,
            TaskPriority::High => 3,
            TaskPriority::Critical => 4,
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

/// A single unit of work produced by the Planning stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub dependencies: BTreeSet<TaskId>,
    pub tools_required: Vec<String>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl Task {
    /// Creates a new pending task. Fails if `title` is empty.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Result<Self, ValidationError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ValidationError::empty_field("title"));
        }

        Ok(Self {
            id: TaskId::new(),
            title,
            description: description.into(),
            status: TaskStatus::Pending,
            priority: TaskPriority::default(),
            dependencies: BTreeSet::new(),
            tools_required: Vec::new(),
            result: None,
            error: None,
            retry_count: 0,
            max_retries: 1,
            created_at: Timestamp::now(),
            started_at: None,
            completed_at: None,
        })
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Adds a dependency. A task can never depend on itself.
    pub fn add_dependency(&mut self, dep: TaskId) {
        if dep != self.id {
            self.dependencies.insert(dep);
        }
    }

    /// A task is ready when it is still pending and every dependency id
    /// appears in `completed`.
    pub fn is_ready(&self, completed: &BTreeSet<TaskId>) -> bool {
        self.status == TaskStatus::Pending && self.dependencies.iter().all(|d| completed.contains(d))
    }

    pub fn start(&mut self) {
        self.status = TaskStatus::InProgress;
        self.started_at = Some(Timestamp::now());
    }

    pub fn complete(&mut self, result: impl Into<String>) {
        self.status = TaskStatus::Completed;
        self.result = Some(result.into());
        self.completed_at = Some(Timestamp::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Timestamp::now());
    }
}
