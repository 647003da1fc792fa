//! Reasoner Adapters.
//!
//! Implementations of the Reasoner port for various LLM providers.
//!
//! ## Available Adapters
//!
//! - `MockReasoner` - configurable mock for testing
//! - `AnthropicReasoner` - Claude Messages API, structured output via tool-use
//! - `OpenAIReasoner` - Chat Completions API, structured output via function calling

mod anthropic_reasoner;
mod mock_reasoner;
mod openai_reasoner;

pub use anthropic_reasoner::{AnthropicConfig, AnthropicReasoner};
pub use mock_reasoner::{MockError, MockReasoner, MockResponse};
pub use openai_reasoner::{OpenAIConfig, OpenAIReasoner};
