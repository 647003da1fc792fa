//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `ai` - Reasoner implementations (mock, Anthropic, OpenAI)
//! - `storage` - Session Store implementations (in-memory, file)
//! - `tool_transport` - Tool Transport implementations (stdio, HTTP, SSE)
//! - `validation` - Tool parameter schema validation
//! - `websocket` - Client Channel transport and Progress Sink

pub mod ai;
pub mod storage;
pub mod tool_transport;
pub mod validation;
pub mod websocket;

pub use ai::{AnthropicConfig, AnthropicReasoner, MockError, MockReasoner, MockResponse, OpenAIConfig, OpenAIReasoner};
pub use storage::{FileStateStorage, InMemoryStateStorage};
pub use tool_transport::{ConfiguredToolTransport, ToolServerSpec};
pub use validation::JsonSchemaValidator;
pub use websocket::{websocket_router, ws_handler, ClientMessage, RoomProgressSink, ServerMessage, WebSocketState};
