//! URL and near-duplicate text deduplication for one research invocation.
//!
//! URL identity is checked first. Texts are then compared as sets of
//! normalized words (Jaccard); a pair at or above `NEAR_DUPLICATE_THRESHOLD`
//! is a duplicate and only the first admitted occurrence survives.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

pub const NEAR_DUPLICATE_THRESHOLD: f32 = 0.9;

static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid non-word pattern"));

/// Lowercase, replace every run of non-alphanumerics with one space, trim.
pub fn normalize_text(text: &str) -> String {
    NON_WORD_RE
        .replace_all(&text.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Canonical URL key: trimmed, fragment dropped, scheme/host lowercased,
/// trailing slash of the path removed. The query string is kept verbatim.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let url = url.split('#').next().unwrap_or(url);
    let (base, query) = match url.split_once('?') {
        Some((base, query)) if !query.is_empty() => (base, Some(query)),
        Some((base, _)) => (base, None),
        None => (url, None),
    };
    let base = base.trim_end_matches('/');

    let base = match base.find("://") {
        Some(scheme_end) => {
            let authority_start = scheme_end + 3;
            let path_start = base[authority_start..]
                .find('/')
                .map(|p| authority_start + p)
                .unwrap_or(base.len());
            format!("{}{}", base[..path_start].to_lowercase(), &base[path_start..])
        }
        None => base.to_string(),
    };

    match query {
        Some(query) => format!("{}?{}", base, query),
        None => base,
    }
}

/// Lowercased host without a leading `www.`, if the URL has one.
pub fn url_host(url: &str) -> Option<String> {
    let normalized = normalize_url(url);
    let rest = normalized.split("://").nth(1)?;
    let host = rest.split(['/', '?', ':']).next()?;
    if host.is_empty() {
        return None;
    }
    Some(host.trim_start_matches("www.").to_string())
}

fn word_set(normalized: &str) -> HashSet<String> {
    normalized.split_whitespace().map(str::to_string).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f32 / union as f32
}

/// Jaccard similarity of the normalized word sets of two snippets.
pub fn text_similarity(a: &str, b: &str) -> f32 {
    jaccard(&word_set(&normalize_text(a)), &word_set(&normalize_text(b)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    DuplicateUrl,
    NearDuplicateText,
}

pub struct Deduplicator {
    threshold: f32,
    seen_urls: HashSet<String>,
    seen_fingerprints: HashSet<String>,
    kept_words: Vec<HashSet<String>>,
}

impl Deduplicator {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            seen_urls: HashSet::new(),
            seen_fingerprints: HashSet::new(),
            kept_words: Vec::new(),
        }
    }

    /// Record the candidate if it is new. Callers must offer candidates in
    /// priority order (best rank first): the first occurrence wins.
    pub fn admit(&mut self, url: &str, text: &str) -> Admission {
        let url_key = normalize_url(url);
        if !url_key.is_empty() && self.seen_urls.contains(&url_key) {
            return Admission::DuplicateUrl;
        }

        let normalized = normalize_text(text);
        let fingerprint = hex::encode(Sha256::digest(normalized.as_bytes()));
        if self.seen_fingerprints.contains(&fingerprint) {
            return Admission::NearDuplicateText;
        }

        let words = word_set(&normalized);
        if self
            .kept_words
            .iter()
            .any(|kept| jaccard(kept, &words) >= self.threshold)
        {
            return Admission::NearDuplicateText;
        }

        if !url_key.is_empty() {
            self.seen_urls.insert(url_key);
        }
        self.seen_fingerprints.insert(fingerprint);
        self.kept_words.push(words);
        Admission::Accepted
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(NEAR_DUPLICATE_THRESHOLD)
    }
}
