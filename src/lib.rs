//! A multi-agent query orchestrator: accepts a natural-language request,
//! decomposes it into a dependency-ordered task graph, selects external
//! tools for each task, executes those tools with recovery, and streams
//! progress and the final synthesized answer back to the caller.
//!
//! The core is the reasoning-chain execution engine: a three-stage
//! Planning -> Orchestration -> Execution pipeline, a Tool Bridge that
//! mediates every tool call, a session/progress plane that streams
//! structured events, and a workflow executor/coordinator that sequences
//! the whole thing and exposes it to callers.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
