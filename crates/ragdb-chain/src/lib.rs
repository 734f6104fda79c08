//! Retrieve-then-generate chain with citation bookkeeping.
//!
//! [`chain::RagChain`] composes the retrieval engine with a completion
//! backend; [`completion::ChatCompletionClient`] is the stock
//! OpenAI-compatible client; [`service::KnowledgeService`] is the facade the
//! excluded layers (HTTP, UI) call into.

pub mod chain;
pub mod completion;
pub mod service;

pub use chain::{extract_citations, RagChain, DEFAULT_SYSTEM_INSTRUCTION};
pub use completion::{ChatCompletionClient, GenerationConfig};
pub use service::{KnowledgeService, DEFAULT_K};
