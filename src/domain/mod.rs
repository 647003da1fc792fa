//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `task` / `task_list` - Task Graph entities and dependency-aware scheduling (C2)
//! - `tool_execution` - ToolExecutionPlan/Step entities produced by Orchestration (C4)
//! - `reasoning` - ReasoningStep/ReasoningChain, the end-to-end record of one query
//! - `session` - Per-connection Session state and the progress event schema (C7)
//! - `tool_catalog` - AvailableToolInfo and the static tool-recommendation table (C1)

pub mod foundation;
pub mod reasoning;
pub mod session;
pub mod task;
pub mod task_list;
pub mod tool_catalog;
pub mod tool_execution;

pub use foundation::{DomainError, ErrorCode, Percentage, ReasoningChainId, SessionId, TaskId, Timestamp, ToolCallId, ValidationError};
pub use reasoning::{AgentRole, ChainStatus, ReasoningChain, ReasoningStep, StepStatus};
pub use session::{ProgressAgentRole, ProgressEvent, Session, SessionStatus};
pub use task::{Task, TaskPriority, TaskStatus};
pub use task_list::TaskList;
pub use tool_catalog::{AvailableToolInfo, ServerType};
pub use tool_execution::{RecoveryPolicy, ToolExecutionPlan, ToolExecutionStep};
