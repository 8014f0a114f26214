//! Feed enrichment pipeline
//!
//! The feed endpoint returns ranked article ids with sparse metadata. Titles,
//! summaries and takeaways come from a slower per-article summary endpoint.
//! This module fetches that enrichment for every article of a feed without
//! blocking the initial render:
//!
//! - [`EnrichmentCache`]: per-id merge store, append-only within a session
//! - [`Coalescer`]: pending set that suppresses duplicate in-flight fetches
//! - [`EnrichmentPipeline`]: staggered batch fetcher and on-demand trigger,
//!   both epoch-tagged so results from a superseded session are dropped
//! - [`view`]: pure merge of feed items with the cache into renderable articles

pub mod cache;
pub mod coalescer;
pub mod markdown;
pub mod pipeline;
pub mod view;

pub use cache::EnrichmentCache;
pub use coalescer::Coalescer;
pub use pipeline::{BatchHandle, BatchReport, EnrichmentPipeline, OnDemandOutcome, PipelineSnapshot};
pub use view::{render_articles, EnrichmentStatus, FeedView, RenderedArticle};

use crate::error::ClientResult;
use async_trait::async_trait;
use medfeed_common::api::{ArticleId, SearchResult, SummaryResponse};
use serde::{Deserialize, Serialize};

/// Per-article enrichment fetch, implemented by the HTTP client and by test stubs
#[async_trait]
pub trait SummarySource: Send + Sync {
    async fn fetch_summary(&self, id: &ArticleId) -> ClientResult<SummaryResponse>;
}

/// One article of a feed response; immutable for the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: ArticleId,
    /// Absent when the feed endpoint had no title for the record
    pub title: Option<String>,
    pub journal: String,
    pub pub_date: String,
    pub article_types: Vec<String>,
    pub mesh_terms: Vec<String>,
    pub score: f64,
}

impl FeedItem {
    /// Item carrying only an id, used where no feed metadata is known
    pub fn bare(id: impl Into<ArticleId>) -> Self {
        Self {
            id: id.into(),
            title: None,
            journal: String::new(),
            pub_date: String::new(),
            article_types: Vec::new(),
            mesh_terms: Vec::new(),
            score: 0.0,
        }
    }
}

impl From<SearchResult> for FeedItem {
    fn from(result: SearchResult) -> Self {
        Self {
            id: result.pmid,
            title: non_empty(result.title),
            journal: result.journal,
            pub_date: result.pub_date,
            article_types: result.article_types,
            mesh_terms: result.mesh_terms,
            score: result.score,
        }
    }
}

/// Asynchronously fetched content layered onto a feed item
///
/// Every field is optional; a missing field is never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub id: ArticleId,
    pub resolved_title: Option<String>,
    pub summary_html: Option<String>,
    pub takeaway_html: Option<String>,
}

impl Enrichment {
    /// Entry with every field absent
    pub fn empty(id: ArticleId) -> Self {
        Self {
            id,
            resolved_title: None,
            summary_html: None,
            takeaway_html: None,
        }
    }

    /// Map a summary endpoint response
    ///
    /// The pre-rendered `html` wins over `summary_md`; markdown fields are
    /// rendered to HTML. Blank strings count as absent.
    pub fn from_summary(id: ArticleId, response: &SummaryResponse) -> Self {
        let summary_html = non_empty(response.html.clone())
            .or_else(|| non_empty(response.summary_md.clone()).map(|md| markdown::render(&md)));
        let takeaway_html =
            non_empty(response.takeaway_md.clone()).map(|md| markdown::render(&md));

        Self {
            id,
            resolved_title: non_empty(response.title.clone()),
            summary_html,
            takeaway_html,
        }
    }

    /// Overlay present fields of `update`; absent fields keep their value
    pub fn merge(&mut self, update: Enrichment) {
        if update.resolved_title.is_some() {
            self.resolved_title = update.resolved_title;
        }
        if update.summary_html.is_some() {
            self.summary_html = update.summary_html;
        }
        if update.takeaway_html.is_some() {
            self.takeaway_html = update.takeaway_html;
        }
    }

    /// Summary or takeaway present (a resolved title alone does not count)
    pub fn has_content(&self) -> bool {
        self.summary_html.is_some() || self.takeaway_html.is_some()
    }

    /// Every field absent: the article was checked and nothing was found
    pub fn is_empty(&self) -> bool {
        self.resolved_title.is_none() && !self.has_content()
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
