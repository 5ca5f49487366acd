// src/fetch/mod.rs
//! Retriever: pulls every configured feed plus the preprint search concurrently,
//! retries each source on its own, and keeps only entries newer than the
//! day-dependent cutoff.
//!
//! A source that keeps failing contributes nothing; its errors are logged and
//! counted but never reach the caller.

pub mod feed;
pub mod search;
pub mod transport;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use futures::future::join_all;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::SourcesConfig;
use crate::model::{ItemKind, RawItem, UNTITLED};

use self::feed::{parse_feed, FeedError, ParseMode, ParsedFeed};
use self::transport::{BrowserTransport, RawTransport, Transport, TransportError};

/// Day whose lookback stretches over the quiet days before it.
pub const START_OF_WEEK: Weekday = Weekday::Mon;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_items_total", "Items kept after recency filtering.");
        describe_counter!(
            "fetch_attempt_failures_total",
            "Failed fetch attempts (any cause)."
        );
        describe_counter!(
            "fetch_source_failures_total",
            "Sources that yielded nothing after exhausting retries."
        );
        describe_counter!(
            "fetch_fallback_total",
            "Fallback transport uses after a 403 from the primary."
        );
        describe_counter!(
            "fetch_salvaged_total",
            "Truncated bodies parsed for partial content."
        );
        describe_counter!("fetch_undated_total", "Entries skipped for lack of a date.");
        describe_histogram!("fetch_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// How far back a run looks, by weekday of the run.
pub fn lookback(weekday: Weekday) -> Duration {
    if weekday == START_OF_WEEK {
        Duration::hours(72)
    } else {
        Duration::hours(36)
    }
}

/// Entries published at or before this instant are dropped.
pub fn cutoff_for(now: DateTime<Utc>) -> DateTime<Utc> {
    now - lookback(now.weekday())
}

/// Normalize text: decode entities, strip tags, collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("unexpected http status {0}")]
    Status(u16),
    #[error(transparent)]
    Feed(#[from] FeedError),
}

/// A URL to poll and how to label what it returns.
#[derive(Debug, Clone)]
struct Source {
    url: String,
    kind: ItemKind,
    /// Fixed source label; feeds use their own title instead.
    name: Option<&'static str>,
}

impl Source {
    fn feed(url: &str) -> Self {
        Self {
            url: url.to_string(),
            kind: ItemKind::Blog,
            name: None,
        }
    }

    fn search(url: String) -> Self {
        Self {
            url,
            kind: ItemKind::Paper,
            name: Some(search::SEARCH_SOURCE_NAME),
        }
    }
}

fn parse_timed(body: &str, mode: ParseMode) -> Result<ParsedFeed, FeedError> {
    let t0 = Instant::now();
    let parsed = parse_feed(body, mode);
    histogram!("fetch_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    parsed
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Turn parsed entries into items, dropping undated and stale ones.
fn normalize_feed(feed: ParsedFeed, source: &Source, cutoff: DateTime<Utc>) -> Vec<RawItem> {
    let source_name = source
        .name
        .map(str::to_string)
        .or_else(|| feed.title.as_deref().map(normalize_text).and_then(non_empty))
        .unwrap_or_else(|| source.url.clone());

    let total = feed.entries.len();
    let mut undated = 0usize;
    let mut out = Vec::new();
    for entry in feed.entries {
        let Some(published) = entry.published_at() else {
            undated += 1;
            continue;
        };
        if published <= cutoff {
            continue;
        }

        let looks_like_url = |s: &String| s.starts_with("http://") || s.starts_with("https://");
        let link = match source.kind {
            // search results are identified by their canonical id URL
            ItemKind::Paper => entry.id.clone().or(entry.link.clone()),
            ItemKind::Blog => entry.link.clone().or(entry.id.clone().filter(looks_like_url)),
        }
        .unwrap_or_else(|| source.url.clone());

        out.push(RawItem {
            title: entry
                .title
                .as_deref()
                .map(normalize_text)
                .and_then(non_empty)
                .unwrap_or_else(|| UNTITLED.to_string()),
            link,
            summary: entry
                .summary
                .as_deref()
                .or(entry.content.as_deref())
                .map(normalize_text)
                .unwrap_or_default(),
            source: source_name.clone(),
            published,
            kind: source.kind,
        });
    }

    counter!("fetch_undated_total").increment(undated as u64);
    debug!(
        target: "fetch",
        source = %source_name,
        entries = total,
        kept = out.len(),
        undated,
        "feed normalized"
    );
    out
}

/// Concurrent, retrying fetcher over the configured sources.
pub struct Retriever {
    sources: SourcesConfig,
    primary: Arc<dyn Transport>,
    fallback: Arc<dyn Transport>,
}

impl Retriever {
    /// Retriever with the real HTTP transports.
    pub fn from_config(sources: SourcesConfig) -> Result<Self, TransportError> {
        let timeout = sources.fetch.timeout();
        let primary = Arc::new(BrowserTransport::new(timeout)?);
        let fallback = Arc::new(RawTransport::new(timeout)?);
        Ok(Self::with_transports(sources, primary, fallback))
    }

    pub fn with_transports(
        sources: SourcesConfig,
        primary: Arc<dyn Transport>,
        fallback: Arc<dyn Transport>,
    ) -> Self {
        Self {
            sources,
            primary,
            fallback,
        }
    }

    pub fn sources(&self) -> &SourcesConfig {
        &self.sources
    }

    /// Everything published since the cutoff for the current time.
    pub async fn fetch_all(&self) -> Vec<RawItem> {
        self.fetch_all_at(Utc::now()).await
    }

    /// Same as [`Retriever::fetch_all`] with an explicit clock.
    pub async fn fetch_all_at(&self, now: DateTime<Utc>) -> Vec<RawItem> {
        ensure_metrics_described();
        let cutoff = cutoff_for(now);
        info!(
            target: "fetch",
            %cutoff,
            feeds = self.sources.feeds.len(),
            search = self.sources.search.is_some(),
            "fetch started"
        );

        let (mut items, papers) = tokio::join!(
            self.fetch_web_sources(cutoff),
            self.fetch_search_api(cutoff)
        );
        info!(target: "fetch", blogs = items.len(), papers = papers.len(), "fetch finished");
        items.extend(papers);

        counter!("fetch_items_total").increment(items.len() as u64);
        items
    }

    /// All configured feeds, fetched side by side over the shared pool.
    pub async fn fetch_web_sources(&self, cutoff: DateTime<Utc>) -> Vec<RawItem> {
        let tasks = self
            .sources
            .feeds
            .iter()
            .map(|url| self.fetch_source(Source::feed(url), cutoff));
        join_all(tasks).await.into_iter().flatten().collect()
    }

    /// Recent preprints from the search API; empty when search is not configured.
    pub async fn fetch_search_api(&self, cutoff: DateTime<Utc>) -> Vec<RawItem> {
        let Some(search) = &self.sources.search else {
            return Vec::new();
        };
        match search::query_url(search) {
            Ok(url) => self.fetch_source(Source::search(url), cutoff).await,
            Err(e) => {
                warn!(target: "fetch", endpoint = %search.endpoint, error = %e, "bad search endpoint");
                Vec::new()
            }
        }
    }

    async fn fetch_source(&self, source: Source, cutoff: DateTime<Utc>) -> Vec<RawItem> {
        let settings = self.sources.fetch;
        let attempts = settings.attempts.max(1);

        for attempt in 0..attempts {
            match self.fetch_once(&source.url).await {
                Ok(feed) => return normalize_feed(feed, &source, cutoff),
                Err(e) => {
                    counter!("fetch_attempt_failures_total").increment(1);
                    warn!(
                        target: "fetch",
                        url = %source.url,
                        attempt = attempt + 1,
                        error = %e,
                        "fetch attempt failed"
                    );
                    if attempt + 1 < attempts {
                        tokio::time::sleep(settings.backoff(attempt)).await;
                    }
                }
            }
        }

        counter!("fetch_source_failures_total").increment(1);
        warn!(target: "fetch", url = %source.url, attempts, "giving up on source");
        Vec::new()
    }

    async fn fetch_once(&self, url: &str) -> Result<ParsedFeed, FetchError> {
        let resp = self.primary.get(url).await?;
        if resp.is_success() {
            return Ok(parse_timed(&resp.body, ParseMode::Strict)?);
        }
        if resp.status == 403 {
            return self.fetch_fallback(url).await;
        }
        Err(FetchError::Status(resp.status))
    }

    async fn fetch_fallback(&self, url: &str) -> Result<ParsedFeed, FetchError> {
        counter!("fetch_fallback_total").increment(1);
        debug!(target: "fetch", url, transport = self.fallback.name(), "primary blocked; using fallback");

        match self.fallback.get(url).await {
            Ok(resp) if resp.is_success() => Ok(parse_timed(&resp.body, ParseMode::Strict)?),
            Ok(resp) => Err(FetchError::Status(resp.status)),
            Err(TransportError::Truncated { partial }) => {
                let body = String::from_utf8_lossy(&partial);
                let feed = parse_timed(&body, ParseMode::Salvage)?;
                counter!("fetch_salvaged_total").increment(1);
                info!(
                    target: "fetch",
                    url,
                    bytes = partial.len(),
                    entries = feed.entries.len(),
                    "salvaged truncated body"
                );
                Ok(feed)
            }
            Err(e) => Err(e.into()),
        }
    }
}
