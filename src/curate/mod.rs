// src/curate/mod.rs
//! Curator: turns today's annotated items plus the stored backlog into a bounded
//! digest selection and a revised backlog.
//!
//! Two strategies:
//! - regular day: today's items only, top 15, category-diverse detailed picks,
//!   no papers among signals; leftovers (and the older backlog) carried forward
//! - recap day: today's items merged with the backlog, top 30, backlog drained
//!
//! Pool order (today's items first, then backlog) decides both dedupe winners
//! and tie order in the ranking, which is a stable sort by score.

pub mod backlog;

use std::cmp::Reverse;
use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Datelike, Utc, Weekday};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::model::{pool_from_values, AnnotatedItem, Category, SignalType};

use self::backlog::BacklogStore;

/// Items scoring below this are dropped for good.
pub const MIN_RELEVANCE: i64 = 4;
/// Upper bound on carried-forward items.
pub const BACKLOG_CAP: usize = 100;
pub const MAX_DETAILED: usize = 5;
/// Floor for filling detailed slots by score alone.
pub const DETAIL_MIN_SCORE: i64 = 8;
/// Floor for a category's representative in the diversity pass.
pub const DIVERSITY_MIN_SCORE: i64 = 7;

pub const REGULAR_WORKING_SET: usize = 15;
pub const REGULAR_MAX_TOTAL: usize = 15;
pub const RECAP_WORKING_SET: usize = 30;
pub const RECAP_MAX_TOTAL: usize = 20;

pub const RECAP_DAY: Weekday = Weekday::Sat;

/// Categories that get one detailed slot each, in this order, when available.
const DIVERSITY_ORDER: [Category; 3] = [Category::TopNews, Category::TopPaper, Category::TopRepo];

/// Signal labels preferred over unlabelled items.
const PRIORITY_SIGNALS: [SignalType; 4] = [
    SignalType::Release,
    SignalType::EngineeringBlog,
    SignalType::FrameworkUpdate,
    SignalType::GeneralNews,
];

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("curate_runs_total", "Curation runs completed.");
        describe_counter!(
            "curate_invalid_total",
            "Pool items dropped for scoring below the relevance floor."
        );
        describe_counter!(
            "curate_selected_total",
            "Items placed in detailed or signal slots."
        );
        describe_gauge!("curate_backlog_size", "Items in the backlog after the last run.");
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestMode {
    Regular,
    Recap,
}

impl DigestMode {
    pub fn for_weekday(weekday: Weekday) -> Self {
        if is_recap_day(weekday) {
            DigestMode::Recap
        } else {
            DigestMode::Regular
        }
    }

    /// Mode for a run at `now`; uses the UTC weekday, like the fetch cutoff.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self::for_weekday(now.weekday())
    }

    pub fn is_recap(self) -> bool {
        self == DigestMode::Recap
    }
}

pub fn is_recap_day(weekday: Weekday) -> bool {
    weekday == RECAP_DAY
}

/// What the renderer gets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(rename = "type")]
    pub mode: DigestMode,
    pub detailed_items: Vec<AnnotatedItem>,
    pub signals: Vec<AnnotatedItem>,
    /// The whole working set, ranked.
    pub items: Vec<AnnotatedItem>,
    /// Recap only; filled in downstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trending: Option<Vec<Value>>,
}

/// Result of a pure curation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CurationPlan {
    pub selection: Selection,
    pub backlog: Vec<AnnotatedItem>,
    /// Pool items rejected by the relevance floor.
    pub invalid: usize,
}

fn extend_unique(
    pool: &mut Vec<AnnotatedItem>,
    seen: &mut HashSet<String>,
    items: impl IntoIterator<Item = AnnotatedItem>,
) {
    for item in items {
        if seen.insert(item.link().to_string()) {
            pool.push(item);
        }
    }
}

fn is_valid(item: &AnnotatedItem) -> bool {
    item.score() >= MIN_RELEVANCE
}

/// Valid items by score, highest first; ties keep pool order.
fn rank(pool: &[AnnotatedItem]) -> Vec<AnnotatedItem> {
    let mut ranked: Vec<AnnotatedItem> = pool.iter().filter(|i| is_valid(i)).cloned().collect();
    ranked.sort_by_key(|i| Reverse(i.score()));
    ranked
}

fn links(items: &[AnnotatedItem]) -> HashSet<&str> {
    items.iter().map(AnnotatedItem::link).collect()
}

/// Up to [`MAX_DETAILED`] items: one per diversity category first, then by score.
fn pick_detailed(working: &[AnnotatedItem]) -> Vec<AnnotatedItem> {
    let mut chosen: HashSet<&str> = HashSet::new();
    let mut detailed: Vec<AnnotatedItem> = Vec::new();

    for cat in DIVERSITY_ORDER {
        let best = working.iter().find(|i| {
            i.category() == cat && i.score() >= DIVERSITY_MIN_SCORE && !chosen.contains(i.link())
        });
        if let Some(item) = best {
            chosen.insert(item.link());
            detailed.push(item.clone());
        }
    }

    for item in working.iter().filter(|i| i.score() >= DETAIL_MIN_SCORE) {
        if detailed.len() >= MAX_DETAILED {
            break;
        }
        if chosen.insert(item.link()) {
            detailed.push(item.clone());
        }
    }

    detailed.sort_by_key(|i| Reverse(i.score()));
    detailed
}

/// Non-paper leftovers of the working set, labelled signals first, then by score.
fn pick_signals(
    working: &[AnnotatedItem],
    detailed: &[AnnotatedItem],
    max_total: usize,
) -> Vec<AnnotatedItem> {
    let taken = links(detailed);
    let (mut signals, rest): (Vec<&AnnotatedItem>, Vec<&AnnotatedItem>) = working
        .iter()
        .filter(|i| !taken.contains(i.link()) && !i.is_paper())
        .partition(|i| {
            i.annotation
                .signal_type
                .is_some_and(|t| PRIORITY_SIGNALS.contains(&t))
        });
    signals.extend(rest);
    signals.sort_by_key(|i| Reverse(i.score()));
    signals
        .into_iter()
        .take(max_total.saturating_sub(detailed.len()))
        .cloned()
        .collect()
}

fn plan_recap(new_items: Vec<AnnotatedItem>, backlog: Vec<AnnotatedItem>) -> CurationPlan {
    let mut seen = HashSet::new();
    let mut pool = Vec::with_capacity(new_items.len() + backlog.len());
    extend_unique(&mut pool, &mut seen, new_items);
    extend_unique(&mut pool, &mut seen, backlog);

    let ranked = rank(&pool);
    let invalid = pool.len() - ranked.len();
    let working: Vec<AnnotatedItem> = ranked.into_iter().take(RECAP_WORKING_SET).collect();

    let detailed: Vec<AnnotatedItem> = working
        .iter()
        .filter(|i| i.score() >= DETAIL_MIN_SCORE)
        .take(MAX_DETAILED)
        .cloned()
        .collect();
    let taken = links(&detailed);
    let signals: Vec<AnnotatedItem> = working
        .iter()
        .filter(|i| !taken.contains(i.link()))
        .take(RECAP_MAX_TOTAL.saturating_sub(detailed.len()))
        .cloned()
        .collect();

    CurationPlan {
        selection: Selection {
            mode: DigestMode::Recap,
            detailed_items: detailed,
            signals,
            items: working,
            trending: Some(Vec::new()),
        },
        backlog: Vec::new(),
        invalid,
    }
}

fn plan_regular(new_items: Vec<AnnotatedItem>, backlog: Vec<AnnotatedItem>) -> CurationPlan {
    let mut seen = HashSet::new();
    let mut pool = Vec::with_capacity(new_items.len());
    extend_unique(&mut pool, &mut seen, new_items);

    let ranked = rank(&pool);
    let invalid = pool.len() - ranked.len();
    let working: Vec<AnnotatedItem> = ranked.into_iter().take(REGULAR_WORKING_SET).collect();

    // today's valid leftovers first, then older entries not seen today
    let selected = links(&working);
    let mut revised: Vec<AnnotatedItem> = pool
        .iter()
        .filter(|i| is_valid(i) && !selected.contains(i.link()))
        .cloned()
        .collect();
    revised.extend(
        backlog
            .into_iter()
            .filter(|i| is_valid(i) && seen.insert(i.link().to_string())),
    );
    revised.truncate(BACKLOG_CAP);

    let detailed = pick_detailed(&working);
    let signals = pick_signals(&working, &detailed, REGULAR_MAX_TOTAL);

    CurationPlan {
        selection: Selection {
            mode: DigestMode::Regular,
            detailed_items: detailed,
            signals,
            items: working,
            trending: None,
        },
        backlog: revised,
        invalid,
    }
}

/// Pure curation pass: no I/O.
pub fn plan_curation(
    new_items: Vec<AnnotatedItem>,
    backlog: Vec<AnnotatedItem>,
    mode: DigestMode,
) -> CurationPlan {
    match mode {
        DigestMode::Recap => plan_recap(new_items, backlog),
        DigestMode::Regular => plan_regular(new_items, backlog),
    }
}

/// Curation bound to a backlog store.
pub struct Curator<S: BacklogStore> {
    store: S,
}

impl<S: BacklogStore> Curator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Select today's digest and persist the revised backlog.
    ///
    /// Fails only when the backlog cannot be read or written.
    pub fn curate(&self, new_items: Vec<AnnotatedItem>, is_recap_day: bool) -> Result<Selection> {
        ensure_metrics_described();
        let mode = if is_recap_day {
            DigestMode::Recap
        } else {
            DigestMode::Regular
        };

        let backlog = self.store.load()?;
        let (fresh, stored) = (new_items.len(), backlog.len());

        let plan = plan_curation(new_items, backlog, mode);
        self.store.save(&plan.backlog)?;

        let selection = plan.selection;
        let selected = selection.detailed_items.len() + selection.signals.len();
        counter!("curate_runs_total").increment(1);
        counter!("curate_invalid_total").increment(plan.invalid as u64);
        counter!("curate_selected_total").increment(selected as u64);
        gauge!("curate_backlog_size").set(plan.backlog.len() as f64);
        info!(
            target: "curate",
            mode = ?mode,
            fresh,
            stored,
            invalid = plan.invalid,
            working = selection.items.len(),
            detailed = selection.detailed_items.len(),
            signals = selection.signals.len(),
            backlog = plan.backlog.len(),
            "curation finished"
        );
        Ok(selection)
    }

    /// Like [`Curator::curate`] for loosely-shaped scorer output; entries that are
    /// not items are skipped.
    pub fn curate_values(&self, new_items: Vec<Value>, is_recap_day: bool) -> Result<Selection> {
        self.curate(pool_from_values(new_items), is_recap_day)
    }
}
