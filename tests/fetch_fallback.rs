// tests/fetch_fallback.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use research_digest::config::{FetchSettings, SourcesConfig};
use research_digest::fetch::transport::{HttpResponse, Transport, TransportError};
use research_digest::Retriever;
use wiremock::matchers::{header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BLOG_XML: &str = include_str!("fixtures/blog_rss.xml");

fn settings() -> FetchSettings {
    FetchSettings {
        attempts: 3,
        timeout_secs: 5,
        backoff_base_ms: 1,
    }
}

fn tuesday_noon() -> DateTime<Utc> {
    "2025-01-07T12:00:00Z".parse().unwrap()
}

#[tokio::test]
async fn blocked_browser_request_is_retried_with_fallback_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(header_regex("user-agent", "^Mozilla/5\\.0 "))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(header_regex("user-agent", "^research-digest/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(BLOG_XML),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cfg = SourcesConfig {
        feeds: vec![format!("{}/feed", server.uri())],
        search: None,
        fetch: settings(),
    };
    let retriever = Retriever::from_config(cfg).unwrap();
    let items = retriever.fetch_all_at(tuesday_noon()).await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].link, "https://blog.test/posts/edge-retrieval");
    assert_eq!(items[0].source, "Example Engineering Blog");
}

#[tokio::test]
async fn both_transports_blocked_counts_as_a_failed_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(403))
        // primary + fallback on each of the three attempts
        .expect(6)
        .mount(&server)
        .await;

    let cfg = SourcesConfig {
        feeds: vec![format!("{}/feed", server.uri())],
        search: None,
        fetch: settings(),
    };
    let items = Retriever::from_config(cfg)
        .unwrap()
        .fetch_all_at(tuesday_noon())
        .await;
    assert!(items.is_empty());
}

// --- salvage path, driven through fake transports ---

struct Blocked;

#[async_trait]
impl Transport for Blocked {
    async fn get(&self, _url: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: 403,
            body: "Forbidden".into(),
        })
    }
    fn name(&self) -> &'static str {
        "blocked"
    }
}

/// Delivers only the first `cut` bytes of `body`, then reports the connection lost.
struct CutShort {
    body: String,
    cut: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl Transport for CutShort {
    async fn get(&self, _url: &str) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::Truncated {
            partial: self.body.as_bytes()[..self.cut].to_vec(),
        })
    }
    fn name(&self) -> &'static str {
        "cut-short"
    }
}

fn long_feed() -> String {
    let filler = "lorem ipsum ".repeat(80);
    format!(
        r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Partial Blog</title>
<item><title>Complete post</title><link>https://partial.test/1</link><pubDate>Mon, 06 Jan 2025 10:00:00 +0000</pubDate></item>
<item><title>Cut post</title><link>https://partial.test/2</link><pubDate>Mon, 06 Jan 2025 11:00:00 +0000</pubDate><description>{filler}</description></item>
</channel></rss>"#
    )
}

#[tokio::test]
async fn truncated_fallback_body_yields_the_complete_entries() {
    let body = long_feed();
    let first_close = body.find("</item>").unwrap() + "</item>".len();
    assert!(first_close < 500 && body.len() > 500);

    let fallback = Arc::new(CutShort {
        body,
        cut: 500,
        calls: AtomicUsize::new(0),
    });
    let cfg = SourcesConfig {
        feeds: vec!["https://partial.test/feed".into()],
        search: None,
        fetch: settings(),
    };
    let retriever = Retriever::with_transports(cfg, Arc::new(Blocked), fallback.clone());
    let items = retriever.fetch_all_at(tuesday_noon()).await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Complete post");
    assert_eq!(items[0].source, "Partial Blog");
    // salvage counts as success: no further attempts
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
}
