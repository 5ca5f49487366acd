// src/model.rs
//! Canonical item shapes shared by the retriever, the scorer boundary and the curator.
//!
//! - [`RawItem`]: one normalized feed entry or search result.
//! - [`Annotation`]: the scorer's verdict for an item (score, category, narrative text).
//! - [`AnnotatedItem`]: a raw item plus its annotation; this is what the curator
//!   ranks and what the backlog file stores.
//!
//! Annotation payloads come from an LLM and from old backlog files, so they are
//! parsed leniently: see [`normalize_annotation`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Placeholder title for entries that carry none.
pub const UNTITLED: &str = "Untitled";

fn untitled() -> String {
    UNTITLED.to_string()
}

/// Where an item came from: a web feed post or a preprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Paper,
    /// Unknown labels read back from storage fold into `blog`.
    #[default]
    #[serde(other)]
    Blog,
}

/// A normalized entry produced by the retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    #[serde(default = "untitled")]
    pub title: String,
    /// Identity key used for deduplication everywhere downstream.
    pub link: String,
    #[serde(default)]
    pub summary: String,
    /// Feed title, or the source name/URL when the feed has none.
    #[serde(default)]
    pub source: String,
    pub published: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub kind: ItemKind,
}

/// Display bucket used for category-diverse selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Top News")]
    TopNews,
    #[serde(rename = "Top Paper")]
    TopPaper,
    #[serde(rename = "Top Repo")]
    TopRepo,
    #[serde(rename = "Top Video")]
    TopVideo,
    #[serde(other)]
    Other,
}

const VIDEO_HOSTS: [&str; 3] = ["youtube.com", "youtu.be", "vimeo.com"];

impl Category {
    /// Link/kind based bucket for items whose annotation carries no category.
    ///
    /// Only the link is inspected for repositories: papers routinely mention a
    /// GitHub URL in their abstract and must stay papers.
    pub fn classify(item: &RawItem) -> Self {
        let link = item.link.to_ascii_lowercase();
        if link.contains("github.com") {
            Category::TopRepo
        } else if item.kind == ItemKind::Paper {
            Category::TopPaper
        } else if VIDEO_HOSTS.iter().any(|h| link.contains(h)) {
            Category::TopVideo
        } else {
            Category::TopNews
        }
    }
}

/// Signal label assigned by the scorer on regular days. Papers never get one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalType {
    Release,
    #[serde(rename = "Engineering Blog")]
    EngineeringBlog,
    #[serde(rename = "Framework Update")]
    FrameworkUpdate,
    #[serde(rename = "General News")]
    GeneralNews,
    #[serde(other)]
    Other,
}

/// Scorer output attached to an item.
///
/// Every field has a default so a partial payload still yields a usable record;
/// fields the curator does not read are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Nominal range 1..=10; 0 marks a scoring failure.
    #[serde(default, deserialize_with = "lenient_score")]
    pub relevance_score: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_type: Option<SignalType>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub one_sentence_takeaway: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Annotation {
    /// Zero-score annotation recorded when the scorer gives up on an item.
    pub fn failed() -> Self {
        Self {
            summary: "Error processing summary.".to_string(),
            one_sentence_takeaway: "Error.".to_string(),
            ..Self::default()
        }
    }
}

fn score_from_value(v: &Value) -> i64 {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(|f| f.round() as i64).unwrap_or(0),
        _ => 0,
    }
}

fn lenient_score<'de, D>(d: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(score_from_value(&v))
}

/// Coerce whatever the scorer (or an old backlog file) left in the annotation slot
/// into a single [`Annotation`].
///
/// - object: parsed field by field with defaults; if the object is shaped badly
///   beyond repair, only its score is kept
/// - list: its first element is used when that element is an object
/// - anything else (missing, null, scalar, empty list): zero-score default
pub fn normalize_annotation(raw: Option<&Value>) -> Annotation {
    match raw {
        Some(Value::Object(obj)) => match serde_json::from_value(Value::Object(obj.clone())) {
            Ok(a) => a,
            Err(e) => {
                tracing::debug!(error = %e, "annotation object malformed; keeping score only");
                Annotation {
                    relevance_score: obj.get("relevance_score").map(score_from_value).unwrap_or(0),
                    ..Annotation::default()
                }
            }
        },
        Some(Value::Array(list)) => match list.first() {
            Some(first @ Value::Object(_)) => normalize_annotation(Some(first)),
            _ => Annotation::default(),
        },
        _ => Annotation::default(),
    }
}

fn deserialize_annotation<'de, D>(d: D) -> Result<Annotation, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(d)?;
    Ok(normalize_annotation(v.as_ref()))
}

/// A raw item with the scorer's annotation attached.
///
/// On the wire the item fields sit at the top level next to `annotation`
/// (older files call it `processed`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedItem {
    #[serde(flatten)]
    pub item: RawItem,
    #[serde(
        default,
        alias = "processed",
        deserialize_with = "deserialize_annotation"
    )]
    pub annotation: Annotation,
}

impl AnnotatedItem {
    pub fn new(item: RawItem, annotation: Annotation) -> Self {
        Self { item, annotation }
    }

    pub fn link(&self) -> &str {
        &self.item.link
    }

    pub fn score(&self) -> i64 {
        self.annotation.relevance_score
    }

    /// Annotated category, else the link/kind based fallback.
    pub fn category(&self) -> Category {
        self.annotation
            .category
            .unwrap_or_else(|| Category::classify(&self.item))
    }

    /// Papers are eligible for detailed slots only, never for signals.
    pub fn is_paper(&self) -> bool {
        self.item.kind == ItemKind::Paper || self.category() == Category::TopPaper
    }
}

/// Build annotated items from loosely-shaped JSON values.
///
/// Entries that are not objects, that lack a string `link`, or whose item fields
/// cannot be parsed are skipped; annotation problems never cause a skip.
pub fn pool_from_values(values: Vec<Value>) -> Vec<AnnotatedItem> {
    let total = values.len();
    let mut out = Vec::with_capacity(total);
    for v in values {
        let has_link = v.get("link").is_some_and(Value::is_string);
        if !v.is_object() || !has_link {
            continue;
        }
        match serde_json::from_value::<AnnotatedItem>(v) {
            Ok(item) => out.push(item),
            Err(e) => tracing::warn!(error = %e, "skipping malformed pool entry"),
        }
    }
    if out.len() < total {
        tracing::debug!(kept = out.len(), skipped = total - out.len(), "pool entries skipped");
    }
    out
}
