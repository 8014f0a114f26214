//! Feed session orchestration
//!
//! A `FeedSession` loads a feed (or search results), starts a new pipeline
//! session for it, kicks off the staggered enrichment batch, and handles the
//! per-article actions that sit next to the pipeline: on-demand summary,
//! save, like/dislike.

use crate::enrichment::view::resolve_title;
use crate::enrichment::{
    BatchHandle, Enrichment, EnrichmentPipeline, FeedItem, FeedView, OnDemandOutcome,
    SummarySource,
};
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use medfeed_common::api::{
    ArticleId, FeedProfile, FeedQuery, FeedResponse, FeedbackAction, OkResponse,
    SaveArticleRequest, SearchResponse,
};
use medfeed_common::config::FeedSettings;
use medfeed_common::events::{EventBus, FeedEvent, NoticeSeverity};
use std::sync::Arc;
use tracing::{info, warn};

/// Backend calls a feed session needs besides the summary fetch
#[async_trait]
pub trait FeedBackend: SummarySource {
    async fn fetch_feed(&self, query: &FeedQuery) -> ClientResult<FeedResponse>;

    async fn fetch_search(&self, query: &str, k: u32) -> ClientResult<SearchResponse>;

    async fn send_feedback(
        &self,
        id: &ArticleId,
        action: FeedbackAction,
        query: Option<&str>,
    ) -> ClientResult<OkResponse>;

    async fn send_save(&self, request: &SaveArticleRequest) -> ClientResult<OkResponse>;
}

/// The feed currently on screen
#[derive(Debug, Clone)]
pub struct LoadedFeed {
    pub epoch: u64,
    pub items: Vec<FeedItem>,
    pub profile: FeedProfile,
    pub seeds: Vec<String>,
    /// Search text when the items came from `/search`
    pub query: Option<String>,
}

/// Payload for `POST /saved` built from the best-known data at save time
///
/// Never waits for an in-flight enrichment; missing fields are sent empty.
pub fn build_save_request(item: &FeedItem, enrichment: Option<&Enrichment>) -> SaveArticleRequest {
    SaveArticleRequest {
        pmid: item.id.clone(),
        title: resolve_title(item, enrichment),
        takeaway_md: enrichment
            .and_then(|e| e.takeaway_html.clone())
            .unwrap_or_default(),
        summary_md: enrichment
            .and_then(|e| e.summary_html.clone())
            .unwrap_or_default(),
    }
}

pub struct FeedSession {
    backend: Arc<dyn FeedBackend>,
    pipeline: EnrichmentPipeline,
    feed: Option<LoadedFeed>,
}

impl FeedSession {
    pub fn new<B>(backend: Arc<B>, events: EventBus, settings: &FeedSettings) -> Self
    where
        B: FeedBackend + 'static,
    {
        let source: Arc<dyn SummarySource> = backend.clone();
        let pipeline = EnrichmentPipeline::from_settings(source, events, settings);
        Self {
            backend,
            pipeline,
            feed: None,
        }
    }

    pub fn pipeline(&self) -> &EnrichmentPipeline {
        &self.pipeline
    }

    pub fn events(&self) -> &EventBus {
        self.pipeline.events()
    }

    pub fn feed(&self) -> Option<&LoadedFeed> {
        self.feed.as_ref()
    }

    /// View over the current feed, if one is loaded
    pub fn view(&self) -> Option<FeedView> {
        self.feed
            .as_ref()
            .map(|feed| FeedView::new(feed.items.clone(), self.pipeline.clone()))
    }

    /// Fetch the personalized feed and start enriching it
    ///
    /// Every successful load is a new feed identity: the pipeline starts a new
    /// session and results still in flight for the old one are discarded.
    pub async fn load_feed(&mut self, query: &FeedQuery) -> ClientResult<(FeedView, BatchHandle)> {
        let response = self.backend.fetch_feed(query).await.map_err(|e| {
            warn!(error = %e, "Feed load failed");
            e
        })?;

        info!(
            articles = response.results.len(),
            specialty = %response.profile.specialty,
            "Feed loaded"
        );
        let items = response.results.into_iter().map(FeedItem::from).collect();
        Ok(self.begin(items, response.profile, response.seeds, None))
    }

    /// Run a search and enrich its results like a feed
    pub async fn load_search(&mut self, query: &str, k: u32) -> ClientResult<(FeedView, BatchHandle)> {
        let response = self.backend.fetch_search(query, k).await.map_err(|e| {
            warn!(error = %e, query = %query, "Search failed");
            e
        })?;

        info!(articles = response.results.len(), query = %query, "Search results loaded");
        let items = response.results.into_iter().map(FeedItem::from).collect();
        Ok(self.begin(
            items,
            FeedProfile::default(),
            Vec::new(),
            Some(query.to_string()),
        ))
    }

    fn begin(
        &mut self,
        items: Vec<FeedItem>,
        profile: FeedProfile,
        seeds: Vec<String>,
        query: Option<String>,
    ) -> (FeedView, BatchHandle) {
        let epoch = self.pipeline.start_session(items.len());
        let batch = self.pipeline.dispatch_batch(&items);
        let view = FeedView::new(items.clone(), self.pipeline.clone());

        self.feed = Some(LoadedFeed {
            epoch,
            items,
            profile,
            seeds,
            query,
        });
        (view, batch)
    }

    /// User asked for this article's summary
    pub async fn request_summary(&self, id: &ArticleId) -> OnDemandOutcome {
        self.pipeline.fetch_now(id).await
    }

    fn find_item(&self, id: &ArticleId) -> ClientResult<&FeedItem> {
        self.feed
            .as_ref()
            .and_then(|feed| feed.items.iter().find(|item| &item.id == id))
            .ok_or_else(|| ClientError::NotInFeed(id.to_string()))
    }

    /// Save an article of the current feed with whatever enrichment is cached
    pub async fn save(&self, id: &ArticleId) -> ClientResult<SaveArticleRequest> {
        let item = self.find_item(id)?;
        let enrichment = self.pipeline.get(id);
        let request = build_save_request(item, enrichment.as_ref());

        match self.backend.send_save(&request).await {
            Ok(_) => {
                info!(article_id = %id, "Article saved");
                self.notify(NoticeSeverity::Info, "Article saved to your collection", id);
                Ok(request)
            }
            Err(e) => {
                warn!(article_id = %id, error = %e, "Save failed");
                self.notify(NoticeSeverity::Error, "Failed to save article", id);
                Err(e)
            }
        }
    }

    /// Record like/dislike; the current search text is attached when present
    pub async fn feedback(&self, id: &ArticleId, action: FeedbackAction) -> ClientResult<()> {
        let query = self.feed.as_ref().and_then(|f| f.query.as_deref());

        match self.backend.send_feedback(id, action, query).await {
            Ok(_) => {
                info!(article_id = %id, action = %action, "Feedback recorded");
                self.notify(NoticeSeverity::Info, "Feedback recorded", id);
                Ok(())
            }
            Err(e) => {
                warn!(article_id = %id, action = %action, error = %e, "Feedback failed");
                self.notify(NoticeSeverity::Error, "Failed to record feedback", id);
                Err(e)
            }
        }
    }

    fn notify(&self, severity: NoticeSeverity, message: &str, id: &ArticleId) {
        self.events()
            .emit_lossy(FeedEvent::notice(severity, message, Some(id.clone())));
    }
}
