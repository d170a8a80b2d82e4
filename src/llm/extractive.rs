use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::prompt::split_rag_prompt;
use super::provider::Generator;
use super::tokens::TokenCounter;
use crate::core::errors::ResearchError;
use crate::research::dedup::normalize_text;

static CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\d+\] \(Source:").expect("valid citation pattern"));
static SENTENCE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?](\s+|$)").expect("valid sentence pattern"));

/// Offline generator: answers with the context sentences that share the most
/// words with the question, in context order, within `max_new_tokens`.
#[derive(Clone)]
pub struct ExtractiveGenerator {
    counter: TokenCounter,
    context_window: usize,
}

impl ExtractiveGenerator {
    pub const MODEL_ID: &'static str = "extractive";

    pub fn new(counter: TokenCounter, context_window: usize) -> Self {
        Self {
            counter,
            context_window,
        }
    }

    fn sentences(context: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        for line in context.lines() {
            let line = line.trim();
            if line.is_empty() || CITATION_RE.is_match(line) {
                continue;
            }
            let mut start = 0;
            for m in SENTENCE_END_RE.find_iter(line) {
                let sentence = line[start..m.end()].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = m.end();
            }
            let rest = line[start..].trim();
            if !rest.is_empty() {
                sentences.push(rest.to_string());
            }
        }
        sentences
    }
}

#[async_trait]
impl Generator for ExtractiveGenerator {
    fn model_id(&self) -> &str {
        Self::MODEL_ID
    }

    fn context_window(&self) -> usize {
        self.context_window
    }

    async fn load(&self) -> Result<(), ResearchError> {
        Ok(())
    }

    async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<String, ResearchError> {
        let (context, question) = split_rag_prompt(prompt);
        let sentences = Self::sentences(context);
        if sentences.is_empty() {
            return Ok("The collected sources do not cover this question.".to_string());
        }

        let question_words: HashSet<String> = normalize_text(question)
            .split_whitespace()
            .filter(|w| w.len() > 2)
            .map(str::to_string)
            .collect();
        let overlap = |sentence: &str| {
            normalize_text(sentence)
                .split_whitespace()
                .filter(|w| question_words.contains(*w))
                .count()
        };

        let mut ranked: Vec<(usize, usize)> = sentences
            .iter()
            .enumerate()
            .map(|(i, s)| (i, overlap(s)))
            .collect();
        // most overlap first, earlier sentence on ties
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let budget = max_new_tokens as usize;
        let mut chosen = Vec::new();
        let mut used = 0;
        for (index, _) in ranked {
            let cost = self.counter.count(&sentences[index]) + 1;
            if used + cost > budget {
                if chosen.is_empty() {
                    return Ok(self.counter.truncate(&sentences[index], budget));
                }
                continue;
            }
            used += cost;
            chosen.push(index);
        }
        chosen.sort_unstable();

        Ok(chosen
            .into_iter()
            .map(|i| sentences[i].as_str())
            .collect::<Vec<_>>()
            .join(" "))
    }
}
