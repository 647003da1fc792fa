//! Tool Transport Adapters - implementations of the `ToolTransport` port
//! (§6.2) against real tool servers.
//!
//! ## Available Adapters
//!
//! - `ConfiguredToolTransport` - dispatches per-server by its configured
//!   `TransportKind`: stdio subprocesses speak newline-delimited JSON over
//!   their pipes (§6.3's framing, reused here since it's the same shape
//!   MCP-style tool servers use); HTTP/SSE servers are called over `reqwest`.

mod configured_transport;
mod stdio_process;

pub use configured_transport::{ConfiguredToolTransport, ToolServerSpec};
