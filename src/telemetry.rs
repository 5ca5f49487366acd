// src/telemetry.rs
//! Tracing setup shared by the binaries.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_FORMAT: &str = "DIGEST_LOG_FORMAT";
const DEFAULT_FILTER: &str = "research_digest=info,fetch=info,curate=info,warn";

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default filter; `DIGEST_LOG_FORMAT=json` switches
/// from compact lines to JSON. Safe to call twice (the second call is a no-op).
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()
    };
}
