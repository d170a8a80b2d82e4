//! Domain-aware research: query planning, budget admission, retrieval with
//! retry, and deduplication into `SearchRecord`s.

pub mod dedup;
pub mod scoring;
pub mod spider;
pub mod types;

pub use dedup::{Admission, Deduplicator, NEAR_DUPLICATE_THRESHOLD};
pub use spider::{ResearchSpider, SpiderConfig};
pub use types::{RecordMetadata, ResearchOutcome, ResearchStatus, SearchRecord};
