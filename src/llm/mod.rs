pub mod extractive;
pub mod hashing;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod service;
pub mod tokens;
pub mod types;

pub use extractive::ExtractiveGenerator;
pub use hashing::HashingEmbedder;
pub use openai::OpenAiCompatibleClient;
pub use provider::{Embedder, Generator};
pub use service::LlmService;
pub use tokens::TokenCounter;
pub use types::{ChatMessage, ChatRequest};
