use std::collections::BTreeMap;

use super::settings::DomainEntry;

pub const DEFAULT_DOMAIN: &str = "botany";

fn entry(description: &str, keywords: &[&str], sources: &[&str], questions: &[&str]) -> DomainEntry {
    let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    DomainEntry {
        description: description.to_string(),
        keywords: owned(keywords),
        primary_sources: owned(sources),
        questions: owned(questions),
    }
}

pub fn generate_default_domains() -> BTreeMap<String, DomainEntry> {
    let mut default_domains = BTreeMap::new();

    default_domains.insert(
        "botany".to_string(),
        entry(
            "Plant species, habitats, cultivation and ecology.",
            &["species", "habitat", "cultivation", "native range"],
            &["wikipedia.org", "kew.org", "gbif.org", "britannica.com"],
            &[
                "What are the distinguishing botanical features?",
                "Where is it native and what habitat does it prefer?",
                "How is it cultivated or propagated?",
            ],
        ),
    );

    default_domains.insert(
        "literature".to_string(),
        entry(
            "Authors, literary works, movements and their historical context.",
            &["author", "novel", "literary analysis", "historical context"],
            &["wikipedia.org", "britannica.com", "poetryfoundation.org", "gutenberg.org"],
            &[
                "Who wrote it and when was it published?",
                "What are the central themes?",
                "How was it received and what influence did it have?",
            ],
        ),
    );

    default_domains.insert(
        "carpentry".to_string(),
        entry(
            "Woodworking techniques, joinery, tools and materials.",
            &["joinery", "woodworking", "hand tools", "timber"],
            &["wikipedia.org", "finewoodworking.com", "woodmagazine.com"],
            &[
                "What tools and materials are required?",
                "What are the main steps of the technique?",
                "What common mistakes should be avoided?",
            ],
        ),
    );

    default_domains
}
