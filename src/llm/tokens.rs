//! Token accounting for context budgeting.
//!
//! Uses a `tokenizers` tokenizer file when one is configured and otherwise
//! estimates ~4 bytes per token.

use std::path::Path;

use tokenizers::Tokenizer;

use crate::core::config::settings::RagSettings;
use crate::core::errors::ResearchError;

const BYTES_PER_TOKEN: usize = 4;

/// Rough token estimate for English text.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(BYTES_PER_TOKEN)
}

#[derive(Clone, Default)]
pub struct TokenCounter {
    tokenizer: Option<Tokenizer>,
}

impl TokenCounter {
    pub fn estimating() -> Self {
        Self { tokenizer: None }
    }

    pub fn from_file(path: &Path) -> Result<Self, ResearchError> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            ResearchError::ModelLoad(format!(
                "failed to load tokenizer from {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self {
            tokenizer: Some(tokenizer),
        })
    }

    /// Tokenizer from `rag.tokenizer_path`, falling back to estimation when
    /// the file is missing or unreadable.
    pub fn from_settings(settings: &RagSettings) -> Self {
        match &settings.tokenizer_path {
            Some(path) => Self::from_file(path).unwrap_or_else(|err| {
                tracing::warn!("{}; estimating token counts instead", err);
                Self::estimating()
            }),
            None => Self::estimating(),
        }
    }

    pub fn is_exact(&self) -> bool {
        self.tokenizer.is_some()
    }

    pub fn count(&self, text: &str) -> usize {
        match &self.tokenizer {
            Some(tokenizer) => tokenizer
                .encode(text, false)
                .map(|encoding| encoding.len())
                .unwrap_or_else(|_| estimate_tokens(text)),
            None => estimate_tokens(text),
        }
    }

    /// Longest prefix of `text` that fits in `max_tokens`.
    pub fn truncate(&self, text: &str, max_tokens: usize) -> String {
        if self.count(text) <= max_tokens {
            return text.to_string();
        }
        if max_tokens == 0 {
            return String::new();
        }

        if let Some(tokenizer) = &self.tokenizer {
            if let Ok(encoding) = tokenizer.encode(text, false) {
                if let Some(&(_, end)) = encoding.get_offsets().get(max_tokens - 1) {
                    if text.is_char_boundary(end) {
                        return text[..end].trim_end().to_string();
                    }
                }
            }
        }

        let mut end = (max_tokens * BYTES_PER_TOKEN).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        // prefer a word boundary when one is close
        let cut = text[..end]
            .rfind(char::is_whitespace)
            .filter(|&ws| ws > end / 2)
            .unwrap_or(end);
        text[..cut].trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("abcdefghi"), 3);
    }

    #[test]
    fn truncation_respects_budget_and_char_boundaries() {
        let counter = TokenCounter::estimating();
        let text = "Dog rose grows in hedgerows across Europe";
        let cut = counter.truncate(text, 4);
        assert!(counter.count(&cut) <= 4);
        assert!(text.starts_with(&cut));
        assert_eq!(cut, "Dog rose grows");

        let accented = "ééééééééé";
        let cut = counter.truncate(accented, 1);
        assert!(accented.starts_with(&cut));
        assert_eq!(counter.truncate("short", 10), "short");
        assert_eq!(counter.truncate("anything", 0), "");
    }

    #[test]
    fn missing_tokenizer_file_falls_back_to_estimation() {
        let settings = RagSettings {
            tokenizer_path: Some("/nonexistent/tokenizer.json".into()),
            ..RagSettings::default()
        };
        let counter = TokenCounter::from_settings(&settings);
        assert!(!counter.is_exact());
        assert_eq!(counter.count("abcd"), 1);
        assert!(matches!(
            TokenCounter::from_file(Path::new("/nonexistent/tokenizer.json")),
            Err(ResearchError::ModelLoad(_))
        ));
    }
}
