// src/config/sources.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_SOURCES_PATH: &str = "DIGEST_SOURCES_PATH";

pub const DEFAULT_SEARCH_ENDPOINT: &str = "http://export.arxiv.org/api/query";
pub const DEFAULT_SEARCH_QUERY: &str = "abs:RAG OR abs:Agent OR abs:Retrieval";

const SEED_FEEDS: [&str; 11] = [
    "https://engineering.fb.com/feed/",
    "https://ai.google/feed/",
    "https://openai.com/news/rss.xml",
    "http://bair.berkeley.edu/blog/feed.xml",
    "https://netflixtechblog.com/feed",
    "https://engineering.atspotify.com/feed/",
    "https://engineering.linkedin.com/blog.rss.html",
    "https://doordash.engineering/feed/",
    "https://eugeneyan.com/rss/",
    "https://lilianweng.github.io/lil-log/feed.xml",
    "https://karpathy.ai/feed.xml",
];

/// Everything the retriever needs to know about where to look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub feeds: Vec<String>,
    /// Preprint search; `None` disables it.
    #[serde(default)]
    pub search: Option<SearchSource>,
    #[serde(default)]
    pub fetch: FetchSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSource {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_endpoint() -> String {
    DEFAULT_SEARCH_ENDPOINT.to_string()
}
fn default_max_results() -> u32 {
    20
}

/// Retry/timeout knobs shared by every source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSettings {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Backoff unit; attempt `n` (0-based) waits `base * 2^n` after failing.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_attempts() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_backoff_base_ms() -> u64 {
    1_000
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            timeout_secs: default_timeout_secs(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms.saturating_mul(1u64 << attempt.min(16)))
    }
}

impl SourcesConfig {
    /// Built-in source list used when no config file is present.
    pub fn default_seed() -> Self {
        Self {
            feeds: SEED_FEEDS.iter().map(|s| s.to_string()).collect(),
            search: Some(SearchSource {
                endpoint: default_endpoint(),
                query: DEFAULT_SEARCH_QUERY.to_string(),
                max_results: default_max_results(),
            }),
            fetch: FetchSettings::default(),
        }
    }

    fn cleaned(mut self) -> Self {
        self.feeds = clean_list(self.feeds);
        if self.fetch.attempts == 0 {
            self.fetch.attempts = 1;
        }
        self
    }
}

/// Load sources from an explicit path. Supports TOML or JSON formats.
pub fn load_sources_from(path: &Path) -> Result<SourcesConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
}

/// Load sources using env var + fallbacks:
/// 1) $DIGEST_SOURCES_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
/// 4) built-in seed
pub fn load_sources_default() -> Result<SourcesConfig> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("{ENV_SOURCES_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(SourcesConfig::default_seed())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<SourcesConfig> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("feeds =");
    if try_toml {
        if let Ok(v) = toml::from_str::<SourcesConfig>(s) {
            return Ok(v.cleaned());
        }
    }
    if let Ok(v) = serde_json::from_str::<SourcesConfig>(s) {
        return Ok(v.cleaned());
    }
    // Fallback: also try TOML if not attempted
    if !try_toml {
        if let Ok(v) = toml::from_str::<SourcesConfig>(s) {
            return Ok(v.cleaned());
        }
    }
    Err(anyhow!("unsupported sources format"))
}

/// Trim, drop empties and duplicates; first occurrence keeps its position.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && seen.insert(t.to_string()) {
            out.push(t.to_string());
        }
    }
    out
}
