// src/score.rs
//! Boundary to the external text-generation scorer.
//!
//! The scorer itself (prompting, model choice, parsing its reply) lives outside
//! this crate; here we only define the seam and the fan-out around it.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::model::{AnnotatedItem, Annotation, Category, RawItem};

/// Default cap on simultaneous scorer calls.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 5;

#[async_trait]
pub trait Scorer: Send + Sync {
    /// Score one item. Errors are absorbed by [`score_batch`].
    async fn score(&self, item: &RawItem) -> Result<Annotation>;
    fn name(&self) -> &'static str;
}

/// Score `items` with at most `max_in_flight` calls outstanding.
///
/// Output order matches input order (the curator's dedupe depends on it). A
/// failed call leaves the item with [`Annotation::failed`]; a missing category
/// is filled from [`Category::classify`].
pub async fn score_batch<S>(
    scorer: &S,
    items: Vec<RawItem>,
    max_in_flight: usize,
) -> Vec<AnnotatedItem>
where
    S: Scorer + ?Sized,
{
    let total = items.len();
    let out: Vec<AnnotatedItem> = stream::iter(items)
        .map(|item| async move {
            let mut annotation = match scorer.score(&item).await {
                Ok(a) => a,
                Err(e) => {
                    warn!(
                        scorer = scorer.name(),
                        link = %item.link,
                        error = %e,
                        "scoring failed; recording zero score"
                    );
                    Annotation::failed()
                }
            };
            if annotation.category.is_none() {
                annotation.category = Some(Category::classify(&item));
            }
            AnnotatedItem::new(item, annotation)
        })
        .buffered(max_in_flight.max(1))
        .collect()
        .await;

    let failed = out.iter().filter(|i| i.score() == 0).count();
    info!(scorer = scorer.name(), total, failed, "scoring finished");
    out
}
