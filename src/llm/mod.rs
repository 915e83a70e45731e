//! Model adapters: the provider contract, the shared SSE plumbing, and the
//! registry that builds providers from configuration.

pub mod provider;
pub mod providers;
pub mod registry;
pub mod sse;
pub mod tools;

pub use provider::{
    CallConfig, ModelProvider, ParseMode, RawModelOutput, ReasoningCallback, TokenUsage,
};
pub use registry::ProviderRegistry;
