// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod curate;
pub mod fetch;
pub mod model;
pub mod score;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::config::{load_sources_default, SourcesConfig};
pub use crate::curate::backlog::{BacklogStore, JsonFileBacklog, MemoryBacklog};
pub use crate::curate::{is_recap_day, Curator, DigestMode, Selection};
pub use crate::fetch::Retriever;
pub use crate::model::{AnnotatedItem, Annotation, Category, ItemKind, RawItem, SignalType};
pub use crate::score::{score_batch, Scorer};
