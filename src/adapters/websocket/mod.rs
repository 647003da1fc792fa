//! WebSocket adapters for the Client Channel (§6.3).
//!
//! This module is the transport that implements `ProgressSink` (§4.7,
//! §9) over real connections, and upgrades/routes client connections by
//! session.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │   Coordinator / WorkflowExecutor / Execution stage                  │
//! │   - each emits ProgressEvent through a ProgressSink at transitions  │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ RoomProgressSink::emit
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      RoomManager                                     │
//! │   Room: session-123    Room: session-456    Room: session-789       │
//! │   ├── client-a         ├── client-d         ├── client-g            │
//! │   ├── client-b         └── client-e         └── client-h            │
//! │   └── client-c                                                       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`messages`] - WebSocket message protocol types
//! - [`rooms`] - Room management for session-based routing
//! - [`room_sink`] - `ProgressSink` implementation over `RoomManager`
//! - [`handler`] - Axum WebSocket upgrade handler

pub mod handler;
pub mod messages;
pub mod room_sink;
pub mod rooms;

pub use handler::{websocket_router, ws_handler, WebSocketState};
pub use messages::{ClientMessage, CommandResultMessage, ConnectedMessage, ErrorMessage, PongMessage, ServerMessage};
pub use room_sink::RoomProgressSink;
pub use rooms::{ClientId, RoomManager};
