// src/config/mod.rs
//! File/env backed configuration.

pub mod sources;

pub use sources::{
    load_sources_default, load_sources_from, FetchSettings, SearchSource, SourcesConfig,
};
