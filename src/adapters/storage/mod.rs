//! Storage Adapters
//!
//! Implementations of the `SessionStore` port for persisting sessions
//! (§4.7, §6.4).
//!
//! ## Available Adapters
//!
//! - **FileStateStorage** - one JSON document per session on disk
//! - **InMemoryStateStorage** - sessions kept in memory with TTL eviction
//!
//! ## Usage
//!
//! ```ignore
//! use adapters::storage::{FileStateStorage, InMemoryStateStorage};
//!
//! // Production: file-based storage
//! let storage = FileStateStorage::new("./data");
//!
//! // Testing: in-memory storage
//! let storage = InMemoryStateStorage::new();
//! ```

mod file_state_storage;
mod in_memory_state_storage;

pub use file_state_storage::FileStateStorage;
pub use in_memory_state_storage::InMemoryStateStorage;
