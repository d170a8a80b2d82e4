use std::ops::RangeInclusive;

use serde_json::{Map, Value};

use super::settings::{GenerationSettings, RagSettings, MAX_CALLS_PER_RESEARCH};
use crate::core::errors::ResearchError;

type Checked = Result<(), ResearchError>;

/// Type and range checks for a merged configuration document. Absent keys
/// are fine; present keys must be well-formed.
pub fn validate_config(config: &Value) -> Checked {
    let root = Section::root(config)?;

    if let Some(search) = root.child("search")? {
        search.string("api_key")?;
        search.string("engine")?;
        search.string("base_url")?;
        search.integer("results_per_call", 1..=100)?;
        search.integer("requests_per_second", 1..=1_000)?;
        search.integer("timeout_secs", 1..=3_600)?;
    }

    if let Some(credits) = root.child("credits")? {
        credits.integer("credits_per_call", 1..=1_000)?;
    }

    if let Some(spider) = root.child("spider")? {
        spider.integer("max_follow_up_queries", 0..=(MAX_CALLS_PER_RESEARCH as u64 - 1))?;
        spider.integer("max_retries", 0..=5)?;
        spider.integer("backoff_base_ms", 0..=60_000)?;
        spider.fraction("near_duplicate_threshold")?;
    }

    if let Some(rag) = root.child("rag")? {
        rag.integer("top_k", 1..=1_000)?;
        rag.integer("max_new_tokens", 1..=1_000_000)?;
        rag.boolean("include_citations")?;
        rag.string("tokenizer_path")?;
    }

    if let Some(embedding) = root.child("embedding")? {
        embedding.backend()?;
        embedding.integer("dimension", 8..=65_536)?;
    }

    if let Some(generation) = root.child("generation")? {
        generation.backend()?;
        generation.integer("context_window", 64..=10_000_000)?;
    }

    if let Some(domains) = root.child("domains")? {
        for name in domains.map.keys() {
            let Some(entry) = domains.child(name)? else {
                continue;
            };
            entry.string("description")?;
            entry.strings("keywords")?;
            entry.strings("primary_sources")?;
            entry.strings("questions")?;
        }
    }

    root.string("default_domain")?;
    output_budget_fits_window(config)
}

/// `rag.max_new_tokens` must leave part of `generation.context_window` for
/// the prompt. Unset values take their defaults.
fn output_budget_fits_window(config: &Value) -> Checked {
    let max_new_tokens = config
        .pointer("/rag/max_new_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(u64::from(RagSettings::default().max_new_tokens));
    let context_window = config
        .pointer("/generation/context_window")
        .and_then(Value::as_u64)
        .unwrap_or(GenerationSettings::default().context_window as u64);

    if max_new_tokens < context_window {
        return Ok(());
    }
    Err(invalid(
        "rag.max_new_tokens",
        &format!(
            "must be less than generation.context_window ({})",
            context_window
        ),
    ))
}

/// A mapping inside the document plus its dotted path, for error messages.
struct Section<'a> {
    path: String,
    map: &'a Map<String, Value>,
}

impl<'a> Section<'a> {
    fn root(value: &'a Value) -> Result<Self, ResearchError> {
        let map = value.as_object().ok_or_else(|| wrong_type("root", "object"))?;
        Ok(Self {
            path: String::new(),
            map,
        })
    }

    fn key_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    fn child(&self, key: &str) -> Result<Option<Section<'a>>, ResearchError> {
        match self.map.get(key) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Section {
                path: self.key_path(key),
                map,
            })),
            Some(_) => Err(wrong_type(&self.key_path(key), "object")),
        }
    }

    fn backend(&self) -> Checked {
        self.string("backend")?;
        self.string("model")?;
        self.string("base_url")
    }

    fn string(&self, key: &str) -> Checked {
        match self.map.get(key) {
            Some(value) if !value.is_string() => Err(wrong_type(&self.key_path(key), "string")),
            _ => Ok(()),
        }
    }

    fn boolean(&self, key: &str) -> Checked {
        match self.map.get(key) {
            Some(value) if !value.is_boolean() => Err(wrong_type(&self.key_path(key), "boolean")),
            _ => Ok(()),
        }
    }

    fn integer(&self, key: &str, range: RangeInclusive<u64>) -> Checked {
        let Some(value) = self.map.get(key) else {
            return Ok(());
        };
        let number = value
            .as_u64()
            .ok_or_else(|| wrong_type(&self.key_path(key), "integer"))?;
        if range.contains(&number) {
            return Ok(());
        }
        Err(invalid(
            &self.key_path(key),
            &format!("must be between {} and {}", range.start(), range.end()),
        ))
    }

    /// A number in `(0, 1]`.
    fn fraction(&self, key: &str) -> Checked {
        let Some(value) = self.map.get(key) else {
            return Ok(());
        };
        let number = value
            .as_f64()
            .ok_or_else(|| wrong_type(&self.key_path(key), "number"))?;
        if number > 0.0 && number <= 1.0 {
            return Ok(());
        }
        Err(invalid(&self.key_path(key), "must be in (0, 1]"))
    }

    /// A list of non-blank strings.
    fn strings(&self, key: &str) -> Checked {
        let Some(value) = self.map.get(key) else {
            return Ok(());
        };
        let path = self.key_path(key);
        let items = value
            .as_array()
            .ok_or_else(|| wrong_type(&path, "array of strings"))?;
        for (index, item) in items.iter().enumerate() {
            let item_path = format!("{}[{}]", path, index);
            match item.as_str() {
                None => return Err(wrong_type(&item_path, "string")),
                Some(text) if text.trim().is_empty() => {
                    return Err(invalid(&item_path, "value cannot be empty"))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn invalid(path: &str, reason: &str) -> ResearchError {
    ResearchError::BadRequest(format!("Invalid config at '{}': {}", path, reason))
}

fn wrong_type(path: &str, expected: &str) -> ResearchError {
    invalid(path, &format!("expected {}", expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_and_well_formed_documents() {
        assert!(validate_config(&json!({})).is_ok());
        assert!(validate_config(&json!({
            "search": { "engine": "google", "results_per_call": 10 },
            "spider": { "max_follow_up_queries": 9, "near_duplicate_threshold": 0.9 },
            "domains": {
                "botany": { "keywords": ["flora"], "questions": ["What grows?"] }
            }
        }))
        .is_ok());
    }

    #[test]
    fn follow_ups_cannot_exceed_call_ceiling() {
        let err = validate_config(&json!({ "spider": { "max_follow_up_queries": 10 } }))
            .unwrap_err();
        assert!(err.to_string().contains("spider.max_follow_up_queries"));
    }

    #[test]
    fn threshold_must_be_in_unit_interval() {
        assert!(validate_config(&json!({ "spider": { "near_duplicate_threshold": 0.0 } })).is_err());
        assert!(validate_config(&json!({ "spider": { "near_duplicate_threshold": 1.5 } })).is_err());
        assert!(validate_config(&json!({ "spider": { "near_duplicate_threshold": 1 } })).is_ok());
    }

    #[test]
    fn domain_entries_need_string_arrays() {
        let err = validate_config(&json!({
            "domains": { "botany": { "keywords": "flora" } }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("domains.botany.keywords"));

        let err = validate_config(&json!({
            "domains": { "botany": { "questions": ["ok", "  "] } }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("domains.botany.questions[1]"));
    }

    #[test]
    fn output_budget_must_fit_inside_the_context_window() {
        let err = validate_config(&json!({
            "rag": { "max_new_tokens": 256 },
            "generation": { "context_window": 128 }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("rag.max_new_tokens"));

        assert!(validate_config(&json!({ "generation": { "context_window": 256 } })).is_err());
        assert!(validate_config(&json!({ "rag": { "max_new_tokens": 4096 } })).is_err());
        assert!(validate_config(&json!({
            "rag": { "max_new_tokens": 512 },
            "generation": { "context_window": 8192 }
        }))
        .is_ok());
    }

    #[test]
    fn non_object_root_is_rejected() {
        assert!(validate_config(&json!([1, 2])).is_err());
    }
}
