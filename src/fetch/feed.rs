// src/fetch/feed.rs
//! Event-driven RSS 2.0 / RSS 1.0 (RDF) / Atom parser.
//!
//! Built on the `quick_xml` pull reader instead of serde so that a body cut off
//! mid-stream can still yield the entries that were complete before the cut
//! ([`ParseMode::Salvage`]).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("malformed xml: {0}")]
    Xml(String),
    #[error("document is not an RSS or Atom feed")]
    NotAFeed,
    #[error("document ended inside <{0}>")]
    Truncated(String),
}

/// How to treat a document that breaks off or turns malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Any XML error or unclosed element fails the parse.
    Strict,
    /// Keep every entry that was closed before the error.
    Salvage,
}

/// One `<item>` / `<entry>` as found in the document, before normalization.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub id: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
}

impl FeedEntry {
    /// Publication instant: the published stamp if it parses, else the updated one.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.updated.as_deref().and_then(parse_timestamp))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<FeedEntry>,
}

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"];
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Parse a feed timestamp into UTC. Offset-less stamps are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // ISO stamps with a colon-less offset (`+0000`)
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(n.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

/// HTML entities that are not valid XML and show up in real feeds.
pub(crate) fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attr(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.try_get_attribute(key)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn is_feed_root(name: &str) -> bool {
    matches!(name, "rss" | "feed" | "RDF")
}

fn is_entry(name: &str) -> bool {
    matches!(name, "item" | "entry")
}

/// Atom `<link href=".." rel=".."/>`; only the alternate (or unlabelled) link counts.
fn apply_link_attrs(entry: &mut FeedEntry, e: &BytesStart<'_>) {
    if entry.link.is_some() {
        return;
    }
    let rel_ok = attr(e, "rel").map_or(true, |r| r == "alternate");
    if rel_ok {
        if let Some(href) = attr(e, "href").filter(|h| !h.trim().is_empty()) {
            entry.link = Some(href.trim().to_string());
        }
    }
}

fn assign_field(entry: &mut FeedEntry, name: &str, text: &str) {
    let value = text.trim();
    if value.is_empty() {
        return;
    }
    let slot = match name {
        "title" => &mut entry.title,
        "link" => &mut entry.link,
        "id" | "guid" => &mut entry.id,
        "description" | "summary" => &mut entry.summary,
        "content" | "encoded" => &mut entry.content,
        "pubDate" | "published" | "issued" | "date" => &mut entry.published,
        "updated" | "modified" => &mut entry.updated,
        _ => return,
    };
    if slot.is_none() {
        *slot = Some(value.to_string());
    }
}

/// Parse a feed document.
pub fn parse_feed(xml: &str, mode: ParseMode) -> Result<ParsedFeed, FeedError> {
    let cleaned = scrub_html_entities_for_xml(xml);
    let mut reader = Reader::from_str(&cleaned);

    let mut feed = ParsedFeed::default();
    let mut stack: Vec<String> = Vec::new();
    let mut saw_root = false;
    // (depth of the open <item>/<entry>, entry being filled)
    let mut open: Option<(usize, FeedEntry)> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                let depth = stack.len();
                if depth == 0 {
                    saw_root = is_feed_root(&name);
                }
                match open.as_mut() {
                    None if is_entry(&name) && saw_root => {
                        open = Some((depth, FeedEntry::default()));
                        text.clear();
                    }
                    None => text.clear(),
                    Some((entry_depth, entry)) if depth == *entry_depth + 1 => {
                        if name == "link" {
                            apply_link_attrs(entry, &e);
                        }
                        text.clear();
                    }
                    // markup nested inside a field: keep accumulating its text
                    Some(_) => {}
                }
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                if let Some((entry_depth, entry)) = open.as_mut() {
                    if stack.len() == *entry_depth + 1 && local_name(&e) == "link" {
                        apply_link_attrs(entry, &e);
                    }
                }
            }
            Ok(Event::Text(t)) => match t.unescape() {
                Ok(s) => text.push_str(&s),
                Err(_) => text.push_str(&String::from_utf8_lossy(&t)),
            },
            Ok(Event::CData(c)) => text.push_str(&String::from_utf8_lossy(&c)),
            Ok(Event::End(_)) => {
                let Some(name) = stack.pop() else {
                    continue;
                };
                let depth = stack.len();
                match open.take() {
                    Some((entry_depth, entry)) if depth == entry_depth => {
                        feed.entries.push(entry);
                        text.clear();
                    }
                    Some((entry_depth, mut entry)) => {
                        if depth == entry_depth + 1 {
                            assign_field(&mut entry, &name, &text);
                            text.clear();
                        }
                        open = Some((entry_depth, entry));
                    }
                    None => {
                        let under_channel = stack
                            .last()
                            .is_some_and(|p| p == "channel" || p == "feed");
                        if name == "title" && under_channel && feed.title.is_none() {
                            let t = text.trim();
                            if !t.is_empty() {
                                feed.title = Some(t.to_string());
                            }
                        }
                        text.clear();
                    }
                }
            }
            Ok(Event::Eof) => {
                if let (ParseMode::Strict, Some(unclosed)) = (mode, stack.last()) {
                    return Err(FeedError::Truncated(unclosed.clone()));
                }
                break;
            }
            Ok(_) => {}
            Err(e) => match mode {
                ParseMode::Strict => return Err(FeedError::Xml(e.to_string())),
                ParseMode::Salvage => {
                    tracing::debug!(
                        target: "fetch",
                        error = %e,
                        kept = feed.entries.len(),
                        "stopping at broken markup"
                    );
                    break;
                }
            },
        }
    }

    if !saw_root {
        return Err(FeedError::NotAFeed);
    }
    Ok(feed)
}
