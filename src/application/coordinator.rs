//! Coordinator (C8) - the thin facade every external interface calls
//! through: one entry point per client-visible operation, plus rolling
//! metrics.
//!
//! Owns one `WorkflowExecutor` per session so that "at most one active
//! chain" (§4.6) is enforced per session while independent sessions still
//! run concurrently (§5). Executors are created lazily and kept for the
//! session's lifetime; cancellation is likewise tracked per session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

use crate::application::planning::{Complexity, PlanningStage};
use crate::application::tool_bridge::{ToolInvocation, ToolResult};
use crate::application::workflow::CancellationToken;
use crate::application::{ExecutionStage, OrchestrationStage, ToolBridge, WorkflowExecutor};
use crate::domain::foundation::{DomainError, SessionId};
use crate::domain::reasoning::ChainStatus;
use crate::domain::{AvailableToolInfo, ReasoningChain, Session};
use crate::ports::{ProgressSink, SessionStore, SessionStoreError};

/// Rolling metrics updated on each completed query (§4.8).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorMetrics {
    pub queries_processed: u64,
    pub tools_executed: u64,
    pub average_query_time: f64,
    pub success_rate: f64,
}

impl CoordinatorMetrics {
    fn record_query(&mut self, duration_seconds: f64, success: bool) {
        let n = self.queries_processed as f64;
        self.average_query_time = (self.average_query_time * n + duration_seconds) / (n + 1.0);
        let successes_so_far = self.success_rate * n;
        let successes_now = successes_so_far + if success { 1.0 } else { 0.0 };
        self.queries_processed += 1;
        self.success_rate = successes_now / self.queries_processed as f64;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub connected_tool_count: usize,
    pub connected_servers: Vec<String>,
    pub metrics: CoordinatorMetrics,
}

struct SessionWorkflow {
    executor: Arc<WorkflowExecutor>,
    cancellation: CancellationToken,
}

/// Process-wide facade (§4.8). Holds the stage templates used to build a
/// per-session `WorkflowExecutor` on first use, plus the session store
/// backing the persisted Session & Progress Plane record (§4.7, §6.4).
pub struct Coordinator {
    tool_bridge: Arc<ToolBridge>,
    planning: PlanningStage,
    orchestration: OrchestrationStage,
    execution: ExecutionStage,
    session_store: Arc<dyn SessionStore>,
    metrics: Mutex<CoordinatorMetrics>,
    sessions: Mutex<HashMap<SessionId, SessionWorkflow>>,
}

impl Coordinator {
    pub fn new(
        tool_bridge: Arc<ToolBridge>,
        planning: PlanningStage,
        orchestration: OrchestrationStage,
        execution: ExecutionStage,
        session_store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            tool_bridge,
            planning,
            orchestration,
            execution,
            session_store,
            metrics: Mutex::new(CoordinatorMetrics::default()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    async fn session_workflow(&self, session_id: SessionId) -> (Arc<WorkflowExecutor>, CancellationToken) {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.entry(session_id).or_insert_with(|| SessionWorkflow {
            executor: Arc::new(WorkflowExecutor::new(self.planning.clone(), self.orchestration.clone(), self.execution.clone(), self.tool_bridge.clone())),
            cancellation: CancellationToken::new(),
        });
        // Fresh token per query: a finished chain's cancellation must not
        // poison the session's next one.
        entry.cancellation = CancellationToken::new();
        (entry.executor.clone(), entry.cancellation.clone())
    }

    /// Runs one reasoning chain to completion, streaming progress through
    /// `sink`, and folds the outcome into the rolling metrics. Rejects
    /// re-entry for the same session per `WorkflowExecutor::run` (§4.6).
    ///
    /// The session's persisted record (§6.4) is loaded (or created) before
    /// the chain runs and saved again once it reaches a terminal state, so
    /// a reload after a crash mid-chain still reflects the last saved
    /// progress.
    pub async fn process_query(
        &self,
        session_id: SessionId,
        query: &str,
        context: HashMap<String, Value>,
        sink: &dyn ProgressSink,
    ) -> Result<ReasoningChain, DomainError> {
        let mut session = match self.session_store.load(session_id).await {
            Ok(session) => session,
            Err(SessionStoreError::NotFound(_)) => Session::with_id(session_id, query),
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "failed to load session, starting fresh");
                Session::with_id(session_id, query)
            }
        };
        session.mark_ready();
        if let Err(err) = self.session_store.save(&session).await {
            warn!(session_id = %session_id, error = %err, "failed to persist session before running chain");
        }

        let (executor, token) = self.session_workflow(session_id).await;

        let start = Instant::now();
        let result = executor.run(session_id, query, context, sink, &token).await;

        let success = matches!(&result, Ok(chain) if chain.final_result.is_some() && chain.status == ChainStatus::Completed);
        self.metrics.lock().await.record_query(start.elapsed().as_secs_f64(), success);

        if let Ok(chain) = &result {
            session.start_processing(chain.id);
            if token.is_cancelled() {
                session.cancel(chain.final_result.clone().unwrap_or_else(|| "workflow cancelled by user".to_string()));
            } else {
                match chain.status {
                    ChainStatus::Completed => session.complete(chain.final_result.clone().unwrap_or_default()),
                    _ => session.fail(chain.final_result.clone().unwrap_or_else(|| "chain did not complete".to_string())),
                }
            }
            if let Err(err) = self.session_store.save(&session).await {
                warn!(session_id = %session_id, error = %err, "failed to persist session after running chain");
            }
        }

        result
    }

    /// Executes a single tool call directly, bypassing the pipeline.
    pub async fn execute_tool(&self, invocation: ToolInvocation) -> ToolResult {
        let result = self.tool_bridge.execute(invocation).await;
        self.metrics.lock().await.tools_executed += 1;
        result
    }

    /// Cheap heuristic used for a fast complexity estimate without running
    /// the full Planning stage. Mirrors `PlanningOutcome::complexity`'s
    /// three-tier scale (§4.3).
    pub fn analyze_complexity(&self, query: &str) -> Complexity {
        let clause_markers = [" and ", " then ", ","];
        let clause_count = clause_markers.iter().filter(|m| query.contains(**m)).count();

        if query.len() < 40 && clause_count == 0 {
            Complexity::Simple
        } else if clause_count >= 2 || query.len() > 200 {
            Complexity::Complex
        } else {
            Complexity::Moderate
        }
    }

    pub async fn list_tools(&self, refresh: bool) -> Vec<AvailableToolInfo> {
        self.tool_bridge.list_tools(refresh).await
    }

    pub async fn system_status(&self) -> SystemStatus {
        let tools = self.tool_bridge.list_tools(false).await;
        let mut servers: Vec<String> = tools.iter().map(|t| t.server_id.clone()).collect();
        servers.sort();
        servers.dedup();

        SystemStatus { connected_tool_count: tools.len(), connected_servers: servers, metrics: self.metrics.lock().await.clone() }
    }

    /// Flips the cancellation token for `session_id`'s currently in-flight
    /// chain, if any. A no-op if that session has never run a query or has
    /// none in flight (§4.7).
    pub async fn cancel_current_workflow(&self, session_id: SessionId) {
        if let Some(session) = self.sessions.lock().await.get(&session_id) {
            session.cancellation.cancel();
        }
        if let Ok(mut record) = self.session_store.load(session_id).await {
            record.request_cancellation();
            let _ = self.session_store.save(&record).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockReasoner;
    use crate::adapters::storage::InMemoryStateStorage;
    use crate::adapters::validation::JsonSchemaValidator;
    use crate::ports::{NullSink, ServerDescriptor, ServerStatus, ToolDescriptor, ToolTransport, ToolTransportError, TransportKind, TransportSession};
    use async_trait::async_trait;

    struct StubTransport;

    #[async_trait]
    impl ToolTransport for StubTransport {
        async fn list_servers(&self) -> Result<Vec<ServerDescriptor>, ToolTransportError> {
            Ok(vec![ServerDescriptor { server_id: "fs".to_string(), status: ServerStatus::Connected, transport: TransportKind::Stdio }])
        }

        async fn list_tools(&self, _server_id: &str) -> Result<Vec<ToolDescriptor>, ToolTransportError> {
            Ok(vec![ToolDescriptor { name: "read_file".to_string(), description: "reads".to_string(), parameters_schema: serde_json::json!({"properties": {"path": {"type": "string"}}, "required": ["path"]}) }])
        }

        async fn open_session(&self, server_id: &str) -> Result<TransportSession, ToolTransportError> {
            Ok(TransportSession { server_id: server_id.to_string(), handle: "h".to_string() })
        }

        async fn invoke(&self, _session: &TransportSession, _tool_name: &str, _params: Value) -> Result<Value, ToolTransportError> {
            Ok(serde_json::json!({"ok": true}))
        }

        async fn close(&self, _session: TransportSession) -> Result<(), ToolTransportError> {
            Ok(())
        }
    }

    fn coordinator_with_store() -> (Coordinator, Arc<InMemoryStateStorage>) {
        let bridge = Arc::new(ToolBridge::new(Arc::new(StubTransport), Arc::new(JsonSchemaValidator::new())));

        let plan_response = serde_json::json!({"tasks": [{"number": 1, "title": "Read", "description": "read it"}]});
        let planning = PlanningStage::new(Arc::new(MockReasoner::new().with_response(plan_response)));

        let orchestration_response = serde_json::json!({"execution_steps": [{"step_number": 1, "tool_name": "read_file", "server_id": "fs", "parameters": {"path": "/tmp/a"}}]});
        let orchestration = OrchestrationStage::new(Arc::new(MockReasoner::new().with_response(orchestration_response)), bridge.clone());

        let execution_response = serde_json::json!({"summary": "done", "final_output": "read it"});
        let execution = ExecutionStage::new(bridge.clone(), Arc::new(MockReasoner::new().with_response(execution_response)));

        let session_store = Arc::new(InMemoryStateStorage::new());

        (Coordinator::new(bridge, planning, orchestration, execution, session_store.clone()), session_store)
    }

    fn coordinator() -> Coordinator {
        coordinator_with_store().0
    }

    #[tokio::test]
    async fn process_query_records_metrics() {
        let coordinator = coordinator();
        let chain = coordinator.process_query(SessionId::new(), "read a file", HashMap::new(), &NullSink).await.unwrap();
        assert!(chain.final_result.is_some());

        let status = coordinator.system_status().await;
        assert_eq!(status.metrics.queries_processed, 1);
        assert_eq!(status.metrics.success_rate, 1.0);
    }

    #[tokio::test]
    async fn process_query_persists_a_completed_session() {
        let (coordinator, store) = coordinator_with_store();
        let session_id = SessionId::new();
        coordinator.process_query(session_id, "read a file", HashMap::new(), &NullSink).await.unwrap();

        let session = store.load(session_id).await.unwrap();
        assert_eq!(session.status, crate::domain::SessionStatus::Completed);
        assert_eq!(session.progress_percentage, crate::domain::Percentage::HUNDRED);
        assert!(session.final_result.is_some());
    }

    #[tokio::test]
    async fn independent_sessions_do_not_block_each_other() {
        let coordinator = Arc::new(coordinator());
        let a = coordinator.clone();
        let b = coordinator.clone();

        let (r1, r2) = tokio::join!(
            a.process_query(SessionId::new(), "read a file", HashMap::new(), &NullSink),
            b.process_query(SessionId::new(), "read another file", HashMap::new(), &NullSink),
        );

        assert!(r1.is_ok());
        assert!(r2.is_ok());
    }

    #[test]
    fn analyze_complexity_classifies_short_query_as_simple() {
        let coordinator = coordinator();
        assert_eq!(coordinator.analyze_complexity("list files"), Complexity::Simple);
        assert_eq!(coordinator.analyze_complexity("find the bug, fix it, and then write a test"), Complexity::Complex);
    }

    #[tokio::test]
    async fn cancel_current_workflow_is_noop_for_unknown_session() {
        let coordinator = coordinator();
        coordinator.cancel_current_workflow(SessionId::new()).await;
    }
}
