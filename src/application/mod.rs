//! Application layer - the pipeline stages (C1, C3-C8) that turn a user
//! query into a final result: Tool Bridge, Planning, Orchestration,
//! Execution, the Workflow Executor, and the Coordinator.

pub mod coordinator;
pub mod execution;
pub mod orchestration;
pub mod planning;
pub mod tool_bridge;
pub mod workflow;

pub use coordinator::{Coordinator, CoordinatorMetrics, SystemStatus};
pub use execution::{ExecutionOutcome, ExecutionStage, StepResult};
pub use orchestration::OrchestrationStage;
pub use planning::{Complexity, PlanningOutcome, PlanningStage};
pub use tool_bridge::{ToolBridge, ToolInvocation, ToolResult};
pub use workflow::{CancellationToken, WorkflowExecutor};
