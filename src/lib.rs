pub mod core;
pub mod credits;
pub mod llm;
pub mod pipeline;
pub mod rag;
pub mod research;
pub mod search;
pub mod state;

pub use core::errors::ResearchError;
pub use pipeline::{ResearchSession, SessionReport};
pub use state::AppState;
