//! Retrieval-augmented generation over research records.
//!
//! - `VectorIndex`: embedding index rebuilt per session
//! - `RagContextBuilder`: token-bounded context from retrieved documents
//! - `RagOrchestrator`: build / load / query contract

mod context_builder;
mod engine;
mod index;

pub use context_builder::{BuiltContext, RagContextBuilder, RetrievedDocument};
pub use engine::{QueryResult, RagOrchestrator, ERROR_MARKER};
pub use index::{IndexedDocument, Metadata, VectorIndex};
