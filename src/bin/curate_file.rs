//! Curate a JSON file of annotated items against the on-disk backlog and print
//! the selection.
//!
//! Usage: `curate_file <items.json> [--recap]`. Without `--recap` the mode follows
//! today's UTC weekday. The backlog path comes from `DIGEST_BACKLOG_PATH`.

use anyhow::{bail, Context};
use chrono::Utc;
use research_digest::telemetry::init_tracing;
use research_digest::{Curator, DigestMode, JsonFileBacklog};
use serde_json::Value;

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut path = None;
    let mut recap = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--recap" => recap = Some(true),
            "--regular" => recap = Some(false),
            _ if path.is_none() => path = Some(arg),
            other => bail!("unexpected argument: {other}"),
        }
    }
    let Some(path) = path else {
        bail!("usage: curate_file <items.json> [--recap|--regular]");
    };
    let recap = recap.unwrap_or_else(|| DigestMode::at(Utc::now()).is_recap());

    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let values: Vec<Value> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {path} as a JSON array"))?;

    let store = JsonFileBacklog::from_env();
    let curator = Curator::new(store);
    let selection = curator.curate_values(values, recap)?;

    println!("{}", serde_json::to_string_pretty(&selection)?);
    Ok(())
}
