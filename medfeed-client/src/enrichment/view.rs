//! Feed view model
//!
//! Merges the feed's items with the enrichment cache into renderable
//! articles. The merge is pure and cheap; [`FeedView::watch`] re-runs it after
//! every cache write or pending-set change of the view's session.

use super::{EnrichmentPipeline, Enrichment, FeedItem};
use medfeed_common::api::ArticleId;
use medfeed_common::events::FeedEvent;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Per-article enrichment state as shown in the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    /// Not cached and nothing in flight
    NotStarted,
    /// Not cached, fetch in flight: show a loading indicator
    Loading,
    /// Cached with at least one field
    Loaded,
    /// Cached with every field absent: checked, nothing found
    Empty,
}

/// A feed item with its enrichment applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedArticle {
    pub id: ArticleId,
    pub title: String,
    pub journal: String,
    pub pub_date: String,
    pub article_types: Vec<String>,
    pub mesh_terms: Vec<String>,
    pub score: f64,
    pub summary_html: Option<String>,
    pub takeaway_html: Option<String>,
    pub status: EnrichmentStatus,
}

impl RenderedArticle {
    pub fn is_loading(&self) -> bool {
        self.status == EnrichmentStatus::Loading
    }
}

/// Title shown when neither the feed nor the summary endpoint had one
pub fn placeholder_title(id: &ArticleId) -> String {
    format!("Article {}", id)
}

/// Feed title, then resolved title, then placeholder
pub fn resolve_title(item: &FeedItem, enrichment: Option<&Enrichment>) -> String {
    item.title
        .clone()
        .or_else(|| enrichment.and_then(|e| e.resolved_title.clone()))
        .unwrap_or_else(|| placeholder_title(&item.id))
}

pub fn status_of(
    id: &ArticleId,
    cache: &HashMap<ArticleId, Enrichment>,
    pending: &HashSet<ArticleId>,
) -> EnrichmentStatus {
    match cache.get(id) {
        Some(entry) if entry.is_empty() => EnrichmentStatus::Empty,
        Some(_) => EnrichmentStatus::Loaded,
        None if pending.contains(id) => EnrichmentStatus::Loading,
        None => EnrichmentStatus::NotStarted,
    }
}

/// Merge feed items with a cache snapshot, preserving feed order
pub fn render_articles(
    items: &[FeedItem],
    cache: &HashMap<ArticleId, Enrichment>,
    pending: &HashSet<ArticleId>,
) -> Vec<RenderedArticle> {
    items
        .iter()
        .map(|item| {
            let enrichment = cache.get(&item.id);
            RenderedArticle {
                id: item.id.clone(),
                title: resolve_title(item, enrichment),
                journal: item.journal.clone(),
                pub_date: item.pub_date.clone(),
                article_types: item.article_types.clone(),
                mesh_terms: item.mesh_terms.clone(),
                score: item.score,
                summary_html: enrichment.and_then(|e| e.summary_html.clone()),
                takeaway_html: enrichment.and_then(|e| e.takeaway_html.clone()),
                status: status_of(&item.id, cache, pending),
            }
        })
        .collect()
}

/// One session's feed items bound to the pipeline that enriches them
pub struct FeedView {
    items: Vec<FeedItem>,
    pipeline: EnrichmentPipeline,
    epoch: u64,
}

impl FeedView {
    /// Bind `items` to the pipeline's current session
    pub fn new(items: Vec<FeedItem>, pipeline: EnrichmentPipeline) -> Self {
        let epoch = pipeline.epoch();
        Self {
            items,
            pipeline,
            epoch,
        }
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn render(&self) -> Vec<RenderedArticle> {
        let snapshot = self.pipeline.snapshot();
        render_articles(&self.items, &snapshot.cache, &snapshot.pending)
    }

    /// Call `on_render` with the current articles, then again after every
    /// cache write or pending-set change of this session
    ///
    /// Stops when the callback breaks, when a newer session starts, or when
    /// the event bus closes.
    pub async fn watch<F>(&self, mut on_render: F)
    where
        F: FnMut(&[RenderedArticle]) -> ControlFlow<()>,
    {
        let mut rx = self.pipeline.events().subscribe();

        if on_render(&self.render()).is_break() {
            return;
        }

        loop {
            let rerender = match rx.recv().await {
                Ok(FeedEvent::EnrichmentUpdated { epoch, .. })
                | Ok(FeedEvent::PendingChanged { epoch, .. })
                | Ok(FeedEvent::FetchFailed { epoch, .. }) => epoch == self.epoch,
                Ok(FeedEvent::SessionStarted { epoch, .. }) if epoch != self.epoch => {
                    debug!(epoch = self.epoch, "Feed view superseded");
                    return;
                }
                Ok(_) => false,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Feed view lagged behind events, re-rendering");
                    true
                }
                Err(RecvError::Closed) => return,
            };

            if rerender && on_render(&self.render()).is_break() {
                return;
            }
        }
    }
}
