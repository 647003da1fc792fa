//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Reasoner Port
//!
//! - `Reasoner` - abstract LLM capability with typed structured-output
//!   binding (§6.1), implemented by the Anthropic/OpenAI/mock adapters.
//!
//! ## Tool Transport Port
//!
//! - `ToolTransport` - discovery, session, and invocation contract for
//!   external tool servers (§6.2), implemented by the Tool Bridge adapter.
//!
//! ## Schema Validator Port
//!
//! - `ToolParameterValidator` - validates tool call parameters against a
//!   tool's declared JSON Schema (§4.1).
//!
//! ## Progress Sink Port
//!
//! - `ProgressSink` - the typed event sink stages write progress through
//!   (§4.7, §9), implemented by the WebSocket adapter.
//!
//! ## Session Store Port
//!
//! - `SessionStore` - the process-wide session map, persisted one JSON
//!   document per session (§4.7, §6.4), implemented by the in-memory and
//!   file storage adapters.

mod progress_sink;
mod reasoner;
mod schema_validator;
mod session_store;
mod tool_transport;

pub use progress_sink::{NullSink, ProgressSink};
pub use reasoner::{ReasonRequest, ReasonResponse, ReasonTokenUsage, ReasonValue, Reasoner, ReasonerError, ReasonerInfo};
pub use schema_validator::{SchemaValidationError, ToolParameterValidator};
pub use session_store::{SessionStore, SessionStoreError};
pub use tool_transport::{ServerDescriptor, ServerStatus, ToolDescriptor, ToolTransport, ToolTransportError, TransportKind, TransportSession};
