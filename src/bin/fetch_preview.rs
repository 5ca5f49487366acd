//! Fetch every configured source once and list what survived the recency cutoff.

use research_digest::telemetry::init_tracing;
use research_digest::{load_sources_default, Retriever};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let sources = load_sources_default()?;
    let retriever = Retriever::from_config(sources)?;
    let items = retriever.fetch_all().await;

    for it in &items {
        let kind = serde_json::to_value(it.kind)?;
        println!(
            "[{}] {} ({})",
            kind.as_str().unwrap_or("?"),
            it.title,
            it.source
        );
    }
    println!("fetch-preview done: {} items", items.len());
    Ok(())
}
