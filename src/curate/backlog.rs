// src/curate/backlog.rs
//! Storage for valid-but-unselected items carried from one run to the next.
//!
//! The store is read once at the start of a curation run and overwritten
//! wholesale at the end. There is no locking: one run at a time.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::model::{pool_from_values, AnnotatedItem};

pub const ENV_BACKLOG_PATH: &str = "DIGEST_BACKLOG_PATH";
pub const DEFAULT_BACKLOG_PATH: &str = "backlog.json";

pub trait BacklogStore: Send + Sync {
    /// Current backlog; an absent store reads as empty.
    fn load(&self) -> Result<Vec<AnnotatedItem>>;
    /// Replace the backlog with `items`.
    fn save(&self, items: &[AnnotatedItem]) -> Result<()>;
}

/// Backlog kept as one pretty-printed JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileBacklog {
    path: PathBuf,
}

impl JsonFileBacklog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$DIGEST_BACKLOG_PATH`, else `backlog.json` in the working directory.
    pub fn from_env() -> Self {
        let path = std::env::var(ENV_BACKLOG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_BACKLOG_PATH));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BacklogStore for JsonFileBacklog {
    fn load(&self) -> Result<Vec<AnnotatedItem>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("reading backlog from {}", self.path.display()))
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<Value> = serde_json::from_str(&content)
            .with_context(|| format!("parsing backlog {}", self.path.display()))?;
        Ok(pool_from_values(values))
    }

    fn save(&self, items: &[AnnotatedItem]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating backlog dir {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(items).context("serializing backlog")?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing backlog to {}", self.path.display()))
    }
}

// --- In-memory store (tests, dry runs) ---
#[derive(Debug, Default)]
pub struct MemoryBacklog {
    items: Mutex<Vec<AnnotatedItem>>,
    saves: Mutex<usize>,
}

impl MemoryBacklog {
    pub fn new(initial: Vec<AnnotatedItem>) -> Self {
        Self {
            items: Mutex::new(initial),
            saves: Mutex::new(0),
        }
    }

    pub fn snapshot(&self) -> Vec<AnnotatedItem> {
        self.items.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl BacklogStore for MemoryBacklog {
    fn load(&self) -> Result<Vec<AnnotatedItem>> {
        Ok(self.snapshot())
    }

    fn save(&self, items: &[AnnotatedItem]) -> Result<()> {
        let mut g = self.items.lock().unwrap_or_else(|p| p.into_inner());
        *g = items.to_vec();
        *self.saves.lock().unwrap_or_else(|p| p.into_inner()) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Annotation, ItemKind, RawItem};

    fn item(link: &str, score: i64) -> AnnotatedItem {
        AnnotatedItem::new(
            RawItem {
                title: "t".into(),
                link: link.into(),
                summary: String::new(),
                source: "s".into(),
                published: "2025-01-06T10:00:00Z".parse().unwrap(),
                kind: ItemKind::Blog,
            },
            Annotation {
                relevance_score: score,
                ..Annotation::default()
            },
        )
    }

    #[test]
    fn missing_file_reads_empty_and_save_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileBacklog::new(dir.path().join("state/backlog.json"));
        assert!(store.load().unwrap().is_empty());

        let items = vec![item("https://a.test/1", 6), item("https://a.test/2", 5)];
        store.save(&items).unwrap();
        assert_eq!(store.load().unwrap(), items);

        store.save(&[]).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error_not_an_empty_backlog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backlog.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(JsonFileBacklog::new(&path).load().is_err());

        fs::write(&path, r#"{"link": "https://a.test/1"}"#).unwrap();
        assert!(JsonFileBacklog::new(&path).load().is_err());
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backlog.json");
        fs::write(
            &path,
            r#"[
                42,
                {"link": "https://a.test/ok", "published": "2025-01-06T10:00:00+00:00",
                 "type": "blog", "processed": [{"relevance_score": 6}]}
            ]"#,
        )
        .unwrap();
        let loaded = JsonFileBacklog::new(&path).load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].score(), 6);
    }

    #[test]
    fn memory_store_counts_saves() {
        let store = MemoryBacklog::new(vec![item("https://a.test/1", 5)]);
        assert_eq!(store.load().unwrap().len(), 1);
        store.save(&[]).unwrap();
        assert!(store.snapshot().is_empty());
        assert_eq!(store.save_count(), 1);
    }
}
