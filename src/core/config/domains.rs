//! Domain registry: keyword lists, primary sources and question templates
//! per research domain.
//!
//! The registry tracks a "current" domain for callers that want one, but the
//! research and RAG stages never read it implicitly; they take a
//! `&DomainProfile` argument.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::defaults::{generate_default_domains, DEFAULT_DOMAIN};
use super::settings::{DomainEntry, Settings};
use crate::core::errors::ResearchError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainProfile {
    pub name: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub primary_sources: Vec<String>,
    pub questions: Vec<String>,
}

impl DomainProfile {
    pub fn from_entry(name: &str, entry: DomainEntry) -> Self {
        Self {
            name: name.to_string(),
            description: entry.description,
            keywords: entry.keywords,
            primary_sources: entry.primary_sources,
            questions: entry.questions,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DomainRegistry {
    domains: BTreeMap<String, DomainProfile>,
    current: String,
}

impl DomainRegistry {
    /// Built-in domains overlaid with configured ones; configured entries win.
    pub fn from_settings(settings: &Settings) -> Result<Self, ResearchError> {
        let mut entries = generate_default_domains();
        for (name, entry) in &settings.domains {
            entries.insert(name.clone(), entry.clone());
        }

        let domains: BTreeMap<String, DomainProfile> = entries
            .into_iter()
            .map(|(name, entry)| {
                let profile = DomainProfile::from_entry(&name, entry);
                (name, profile)
            })
            .collect();

        let current = settings
            .default_domain
            .clone()
            .unwrap_or_else(|| DEFAULT_DOMAIN.to_string());
        if !domains.contains_key(&current) {
            return Err(ResearchError::UnknownDomain(current));
        }

        Ok(Self { domains, current })
    }

    pub fn available_domains(&self) -> BTreeSet<String> {
        self.domains.keys().cloned().collect()
    }

    pub fn domain_info(&self, name: &str) -> Result<&DomainProfile, ResearchError> {
        self.domains
            .get(name)
            .ok_or_else(|| ResearchError::UnknownDomain(name.to_string()))
    }

    pub fn current_domain(&self) -> &DomainProfile {
        // `current` is only ever set to a key present in `domains`.
        &self.domains[&self.current]
    }

    pub fn switch_domain(&mut self, name: &str) -> Result<(), ResearchError> {
        if !self.domains.contains_key(name) {
            return Err(ResearchError::UnknownDomain(name.to_string()));
        }
        tracing::info!("Switched research domain: {} -> {}", self.current, name);
        self.current = name.to_string();
        Ok(())
    }

    pub fn domain_questions(&self) -> &[String] {
        &self.current_domain().questions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_three_domains() {
        let registry = DomainRegistry::from_settings(&Settings::default()).unwrap();
        let names: Vec<String> = registry.available_domains().into_iter().collect();
        assert_eq!(names, vec!["botany", "carpentry", "literature"]);
        assert_eq!(registry.current_domain().name, "botany");
        assert!(!registry.domain_questions().is_empty());
    }

    #[test]
    fn configured_domain_overrides_and_extends() {
        let mut settings = Settings::default();
        settings.domains.insert(
            "history".to_string(),
            DomainEntry {
                description: "Historical figures".to_string(),
                keywords: vec!["biography".to_string()],
                primary_sources: vec![],
                questions: vec!["Who was it?".to_string()],
            },
        );
        settings.default_domain = Some("history".to_string());

        let registry = DomainRegistry::from_settings(&settings).unwrap();
        assert_eq!(registry.available_domains().len(), 4);
        assert_eq!(registry.domain_questions(), ["Who was it?".to_string()]);
    }

    #[test]
    fn switching_to_unknown_domain_fails_and_keeps_current() {
        let mut registry = DomainRegistry::from_settings(&Settings::default()).unwrap();
        let err = registry.switch_domain("astrology").unwrap_err();
        assert!(matches!(err, ResearchError::UnknownDomain(ref d) if d == "astrology"));
        assert_eq!(registry.current_domain().name, "botany");

        registry.switch_domain("carpentry").unwrap();
        assert_eq!(registry.current_domain().name, "carpentry");
        assert!(registry.domain_info("literature").is_ok());
    }

    #[test]
    fn unknown_default_domain_is_rejected() {
        let settings = Settings {
            default_domain: Some("nope".to_string()),
            ..Settings::default()
        };
        assert!(DomainRegistry::from_settings(&settings).is_err());
    }
}
