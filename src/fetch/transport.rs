// src/fetch/transport.rs
//! HTTP transports used by the retriever.
//!
//! The primary transport looks like a browser and reads whole bodies. The
//! fallback speaks plain HTTP/1.1, reads the body chunk by chunk and hands back
//! whatever arrived when the connection dies mid-body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client};

/// Identity sent by the primary transport; several blogs refuse library UAs.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Identity sent by the fallback transport.
pub const FALLBACK_USER_AGENT: &str =
    concat!("research-digest/", env!("CARGO_PKG_VERSION"), " (feed reader)");

const ACCEPT_FEEDS: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, */*;q=0.8";

const MAX_REDIRECTS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to build http client: {0}")]
    Build(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("connection closed after {} bytes of body", .partial.len())]
    Truncated { partial: Vec<u8> },
}

/// Status plus decoded body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
    fn name(&self) -> &'static str;
}

/// Primary transport: browser identity, redirects followed, relaxed TLS.
pub struct BrowserTransport {
    client: Client,
}

impl BrowserTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for BrowserTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, ACCEPT_FEEDS)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(HttpResponse { status, body })
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}

/// Fallback transport: HTTP/1.1 only, certificate checks off, partial bodies kept.
pub struct RawTransport {
    client: Client,
}

impl RawTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(FALLBACK_USER_AGENT)
            .http1_only()
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for RawTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let mut resp = self.client.get(url).send().await?;
        let status = resp.status().as_u16();

        let mut buf: Vec<u8> = Vec::new();
        loop {
            match resp.chunk().await {
                Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) if !buf.is_empty() => {
                    tracing::debug!(
                        target: "fetch",
                        url,
                        error = %e,
                        received = buf.len(),
                        "body cut short"
                    );
                    return Err(TransportError::Truncated { partial: buf });
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(HttpResponse {
            status,
            body: String::from_utf8_lossy(&buf).into_owned(),
        })
    }

    fn name(&self) -> &'static str {
        "raw"
    }
}
