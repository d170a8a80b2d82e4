use std::env;

use anyhow::Context;

use research_rag::core;
use research_rag::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = env::args().skip(1);
    let query = args
        .next()
        .filter(|q| !q.trim().is_empty())
        .context("usage: research-rag <query> [domain]")?;
    let domain_arg = args.next();

    let state = AppState::initialize()?;
    core::logging::init(&state.paths);

    let domain = match domain_arg.as_deref() {
        Some(name) => state
            .domains
            .domain_info(name)
            .with_context(|| {
                let available: Vec<String> = state.domains.available_domains().into_iter().collect();
                format!("available domains: {}", available.join(", "))
            })?
            .clone(),
        None => state.domains.current_domain().clone(),
    };

    let report = state.session().run(&query, &domain).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize report")?
    );
    if !report.rag_completed() {
        eprintln!("{}", report.fallback_summary());
    }

    Ok(())
}
