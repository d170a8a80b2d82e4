//! RAG context builder.
//!
//! Concatenates retrieved documents, in similarity order, into a context
//! string that fits a token budget. When the budget runs out the entry that
//! overflows is cut and everything ranked below it is dropped, so the
//! lowest-similarity material goes first.

use serde::Serialize;

use super::index::Metadata;
use crate::llm::tokens::TokenCounter;

/// Below this many spare tokens a partial entry is not worth including.
const MIN_PARTIAL_TOKENS: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    pub id: usize,
    pub text: String,
    pub metadata: Metadata,
    /// Similarity to the question (higher = closer).
    pub score: f32,
}

impl RetrievedDocument {
    /// Best human-readable source label: url, then source, then title.
    pub fn source(&self) -> String {
        ["url", "source", "title"]
            .iter()
            .filter_map(|key| self.metadata.get(*key).and_then(|v| v.as_str()))
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("doc-{}", self.id))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltContext {
    pub text: String,
    /// Leading retrieved entries that made it into `text` (fully or cut).
    pub entries_used: usize,
    pub truncated: bool,
}

#[derive(Clone)]
pub struct RagContextBuilder {
    include_citations: bool,
    counter: TokenCounter,
}

impl RagContextBuilder {
    pub fn new(include_citations: bool, counter: TokenCounter) -> Self {
        Self {
            include_citations,
            counter,
        }
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    pub fn build_context(&self, retrieved: &[RetrievedDocument], max_tokens: usize) -> BuiltContext {
        let mut blocks = Vec::new();
        let mut used = 0;
        let mut truncated = false;

        for (i, doc) in retrieved.iter().enumerate() {
            let header = if self.include_citations {
                format!(
                    "[{}] (Source: {}, relevance: {:.2})\n",
                    i + 1,
                    doc.source(),
                    doc.score
                )
            } else {
                String::new()
            };
            let block = format!("{}{}", header, doc.text.trim());
            // blocks are joined by a blank line
            let cost = self.counter.count(&block) + 1;

            if used + cost <= max_tokens {
                used += cost;
                blocks.push(block);
                continue;
            }

            truncated = true;
            let spare = max_tokens.saturating_sub(used + self.counter.count(&header) + 1);
            if spare >= MIN_PARTIAL_TOKENS {
                let partial = self.counter.truncate(doc.text.trim(), spare);
                blocks.push(format!("{}{}", header, partial));
            }
            break;
        }

        BuiltContext {
            entries_used: blocks.len(),
            text: blocks.join("\n\n"),
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: usize, text: &str, url: &str, score: f32) -> RetrievedDocument {
        RetrievedDocument {
            id,
            text: text.to_string(),
            metadata: json!({ "url": url }).as_object().cloned().unwrap_or_default(),
            score,
        }
    }

    fn builder(citations: bool) -> RagContextBuilder {
        RagContextBuilder::new(citations, TokenCounter::estimating())
    }

    #[test]
    fn formats_citations_in_similarity_order() {
        let retrieved = vec![
            doc(3, "The sky is blue and vast.", "https://sky.example", 0.95),
            doc(0, "The ocean is deep.", "https://sea.example", 0.5),
        ];
        let built = builder(true).build_context(&retrieved, 1_000);
        assert_eq!(built.entries_used, 2);
        assert!(!built.truncated);
        assert_eq!(
            built.text,
            "[1] (Source: https://sky.example, relevance: 0.95)\nThe sky is blue and vast.\n\n\
             [2] (Source: https://sea.example, relevance: 0.50)\nThe ocean is deep."
        );
    }

    #[test]
    fn lowest_similarity_entries_are_dropped_first() {
        let long = "word ".repeat(100);
        let retrieved = vec![
            doc(0, "Most relevant snippet.", "https://a.example", 0.9),
            doc(1, &long, "https://b.example", 0.6),
            doc(2, "Least relevant snippet.", "https://c.example", 0.1),
        ];
        let built = builder(false).build_context(&retrieved, 40);
        assert!(built.truncated);
        assert_eq!(built.entries_used, 2);
        assert!(built.text.starts_with("Most relevant snippet.\n\nword word"));
        assert!(!built.text.contains("Least relevant"));
        assert!(TokenCounter::estimating().count(&built.text) <= 40);
    }

    #[test]
    fn tiny_budgets_skip_partial_entries() {
        let retrieved = vec![doc(0, &"x".repeat(400), "https://a.example", 0.9)];
        let built = builder(true).build_context(&retrieved, 10);
        assert_eq!(built.entries_used, 0);
        assert!(built.text.is_empty());
    }

    #[test]
    fn source_label_falls_back_to_id() {
        let mut d = doc(7, "t", "", 0.1);
        assert_eq!(d.source(), "doc-7");
        d.metadata.insert("source".into(), json!("test1"));
        assert_eq!(d.source(), "test1");
    }
}
