//! Vector storage and retrieval.
//!
//! [`store::LanceVectorStore`] implements the narrow `VectorStore` contract
//! over LanceDB; [`engine::RetrievalEngine`] composes it with an `Embedder`
//! into the `index`/`search`/`delete`/`count`/`clear` surface the RAG chain
//! consumes.

pub mod engine;
pub mod schema;
pub mod store;

pub use engine::RetrievalEngine;
pub use store::LanceVectorStore;
