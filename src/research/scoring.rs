use super::dedup::{normalize_text, url_host};
use crate::core::config::DomainProfile;

const PRIMARY_SOURCE_BONUS: f32 = 0.25;

/// Relevance of a result to a domain in `[0, 1]`.
///
/// Fraction of the domain's keywords found in title + snippet, plus a bonus
/// when the result is hosted on one of the domain's primary sources.
pub fn domain_score(domain: &DomainProfile, title: &str, snippet: &str, url: &str) -> f32 {
    let haystack = format!(" {} ", normalize_text(&format!("{} {}", title, snippet)));

    let keyword_score = if domain.keywords.is_empty() {
        0.0
    } else {
        let hits = domain
            .keywords
            .iter()
            .map(|k| normalize_text(k))
            .filter(|k| !k.is_empty() && haystack.contains(&format!(" {} ", k)))
            .count();
        hits as f32 / domain.keywords.len() as f32
    };

    let source_bonus = match url_host(url) {
        Some(host) if domain.primary_sources.iter().any(|s| host_matches(&host, s)) => {
            PRIMARY_SOURCE_BONUS
        }
        _ => 0.0,
    };

    (keyword_score + source_bonus).min(1.0)
}

fn host_matches(host: &str, source: &str) -> bool {
    let source = source.trim().trim_start_matches("www.").to_lowercase();
    !source.is_empty() && (host == source || host.ends_with(&format!(".{}", source)))
}
