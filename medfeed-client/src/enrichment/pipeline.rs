//! Enrichment pipeline: staggered batch fetcher and on-demand trigger
//!
//! One `EnrichmentPipeline` owns the cache, the pending set and the session
//! epoch for a feed view. Both fetch paths go through the same coalescing
//! rule and write to the same cache.
//!
//! # Sessions
//!
//! Every fetch is tagged with the epoch current at dispatch. Starting a new
//! session bumps the epoch and clears cache and pending set; in-flight fetches
//! are not cancelled, their results are dropped when they land.
//!
//! # Completion
//!
//! Each dispatched id is held by a `PendingGuard`. The guard releases the id
//! when the fetch resolves, and its `Drop` releases it on every other exit
//! (panic, task abort), so an id cannot stay pending forever.

use super::{Coalescer, Enrichment, EnrichmentCache, FeedItem, SummarySource};
use crate::error::{ClientError, ClientResult};
use chrono::Utc;
use medfeed_common::api::ArticleId;
use medfeed_common::config::FeedSettings;
use medfeed_common::events::{EventBus, FeedEvent, NoticeSeverity};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Delay between consecutive dispatches of a batch
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(100);
/// Bound for a single enrichment fetch
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const MSG_LOADED: &str = "Summary loaded";
const MSG_NOTHING: &str = "No summary available for this article";
const MSG_FAILED: &str = "Failed to load summary";

#[derive(Debug, Default)]
struct PipelineState {
    epoch: u64,
    cache: EnrichmentCache,
    pending: Coalescer,
}

struct Inner {
    source: Arc<dyn SummarySource>,
    state: Mutex<PipelineState>,
    events: EventBus,
    stagger: Duration,
    request_timeout: Duration,
}

impl Inner {
    // The lock is never held across an await, so a poisoned lock only means a
    // panic elsewhere; the state itself is still consistent.
    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn pending_changed(&self, id: &ArticleId, epoch: u64, pending: bool) {
        self.events.emit_lossy(FeedEvent::PendingChanged {
            epoch,
            article_id: id.clone(),
            pending,
            timestamp: Utc::now(),
        });
    }
}

/// Point-in-time copy of pipeline state for view recomputation
#[derive(Debug, Clone, Default)]
pub struct PipelineSnapshot {
    pub epoch: u64,
    pub cache: HashMap<ArticleId, Enrichment>,
    pub pending: HashSet<ArticleId>,
}

/// Result of a user-initiated fetch
#[derive(Debug)]
pub enum OnDemandOutcome {
    /// Summary or takeaway fetched; carries the merged cache entry
    Loaded(Enrichment),
    /// Backend answered but had neither summary nor takeaway; cache untouched
    NothingAvailable,
    /// A fetch for this id is already in flight; nothing dispatched
    AlreadyPending,
    /// Transport or protocol failure; cache untouched
    Failed(ClientError),
    /// A new session started while the fetch was in flight; result dropped
    Superseded,
}

/// How a resolved fetch was applied
enum Completion {
    Stored(Enrichment),
    Released,
    Stale,
}

/// Holds one id in the pending set until the fetch resolves
struct PendingGuard {
    inner: Arc<Inner>,
    id: ArticleId,
    epoch: u64,
    armed: bool,
}

impl PendingGuard {
    /// Merge the result (if any) and release the id in one critical section
    fn finish(mut self, enrichment: Option<Enrichment>) -> Completion {
        self.armed = false;

        let completion = {
            let mut state = self.inner.lock();
            if state.epoch != self.epoch {
                return Completion::Stale;
            }
            let completion = match enrichment {
                Some(enrichment) => Completion::Stored(state.cache.put(enrichment).clone()),
                None => Completion::Released,
            };
            state.pending.complete(&self.id);
            completion
        };

        match completion {
            Completion::Stored(_) => self.inner.events.emit_lossy(FeedEvent::EnrichmentUpdated {
                epoch: self.epoch,
                article_id: self.id.clone(),
                timestamp: Utc::now(),
            }),
            Completion::Released => self.inner.pending_changed(&self.id, self.epoch, false),
            Completion::Stale => {}
        }
        completion
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let released = {
            let mut state = self.inner.lock();
            state.epoch == self.epoch && state.pending.complete(&self.id)
        };
        if released {
            warn!(article_id = %self.id, epoch = self.epoch, "Enrichment fetch abandoned");
            self.inner.pending_changed(&self.id, self.epoch, false);
        }
    }
}

/// Per-item result inside a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Stored,
    Failed,
    Stale,
}

/// Totals of a finished batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub epoch: u64,
    /// Ids whose fetch was scheduled
    pub dispatched: usize,
    /// Ids skipped because they were pending or cached already
    pub skipped: usize,
    pub stored: usize,
    pub failed: usize,
    /// Results dropped because the session moved on
    pub stale: usize,
}

/// Running batch of staggered fetches
///
/// Await [`BatchHandle::join`] to wait for every fetch; dropping the handle
/// leaves the fetches running in the background.
pub struct BatchHandle {
    epoch: u64,
    dispatched: usize,
    skipped: usize,
    tasks: JoinSet<ItemOutcome>,
}

impl BatchHandle {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Wait for every scheduled fetch to resolve
    pub async fn join(mut self) -> BatchReport {
        let mut report = BatchReport {
            epoch: self.epoch,
            dispatched: self.dispatched,
            skipped: self.skipped,
            ..BatchReport::default()
        };

        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(ItemOutcome::Stored) => report.stored += 1,
                Ok(ItemOutcome::Failed) => report.failed += 1,
                Ok(ItemOutcome::Stale) => report.stale += 1,
                Err(e) => {
                    warn!(error = %e, "Enrichment task did not finish");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Let the fetches finish in the background
    pub fn detach(self) {}
}

impl Drop for BatchHandle {
    fn drop(&mut self) {
        self.tasks.detach_all();
    }
}

/// Cloneable handle to one feed view's enrichment state
#[derive(Clone)]
pub struct EnrichmentPipeline {
    inner: Arc<Inner>,
}

impl EnrichmentPipeline {
    /// Pipeline with the default stagger and timeout
    pub fn new(source: Arc<dyn SummarySource>, events: EventBus) -> Self {
        Self::with_timing(source, events, DEFAULT_STAGGER, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timing(
        source: Arc<dyn SummarySource>,
        events: EventBus,
        stagger: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                state: Mutex::new(PipelineState::default()),
                events,
                stagger,
                request_timeout,
            }),
        }
    }

    /// Pipeline tuned from the `[feed]` config section
    pub fn from_settings(
        source: Arc<dyn SummarySource>,
        events: EventBus,
        settings: &FeedSettings,
    ) -> Self {
        Self::with_timing(source, events, settings.stagger(), settings.request_timeout())
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn epoch(&self) -> u64 {
        self.inner.lock().epoch
    }

    /// Start a new feed session: bump the epoch, clear cache and pending set
    ///
    /// Returns the new epoch.
    pub fn start_session(&self, article_count: usize) -> u64 {
        let epoch = {
            let mut state = self.inner.lock();
            state.epoch += 1;
            state.cache.clear();
            state.pending.clear();
            state.epoch
        };

        info!(epoch, article_count, "Feed session started");
        self.inner.events.emit_lossy(FeedEvent::SessionStarted {
            epoch,
            article_count,
            timestamp: Utc::now(),
        });
        epoch
    }

    /// Best-known enrichment for `id`
    pub fn get(&self, id: &ArticleId) -> Option<Enrichment> {
        self.inner.lock().cache.get(id).cloned()
    }

    pub fn is_pending(&self, id: &ArticleId) -> bool {
        self.inner.lock().pending.is_pending(id)
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        let state = self.inner.lock();
        PipelineSnapshot {
            epoch: state.epoch,
            cache: state.cache.snapshot(),
            pending: state.pending.snapshot(),
        }
    }

    fn guard(&self, id: &ArticleId, epoch: u64) -> PendingGuard {
        PendingGuard {
            inner: Arc::clone(&self.inner),
            id: id.clone(),
            epoch,
            armed: true,
        }
    }

    /// Schedule one enrichment fetch per new id, item `i` starting `i × stagger`
    /// after batch start
    ///
    /// Ids already pending or cached are skipped, so calling this again with
    /// the same items issues no duplicate requests. Must be called from within
    /// a tokio runtime.
    pub fn dispatch_batch(&self, items: &[FeedItem]) -> BatchHandle {
        let batch_start = Instant::now();

        let (epoch, guards) = {
            let mut state = self.inner.lock();
            let state = &mut *state;
            let mut guards = Vec::new();
            for (index, item) in items.iter().enumerate() {
                if state.pending.try_dispatch(&item.id, &state.cache) {
                    guards.push((index, self.guard(&item.id, state.epoch)));
                }
            }
            (state.epoch, guards)
        };

        let dispatched = guards.len();
        let skipped = items.len() - dispatched;
        debug!(epoch, dispatched, skipped, "Dispatching enrichment batch");

        let mut tasks = JoinSet::new();
        for (index, guard) in guards {
            self.inner.pending_changed(&guard.id, epoch, true);
            let delay = self.inner.stagger * index as u32;
            debug!(article_id = %guard.id, delay_ms = delay.as_millis() as u64, "Scheduling enrichment fetch");
            let start_at = batch_start + delay;
            let pipeline = self.clone();
            tasks.spawn(async move { pipeline.run_batch_item(guard, start_at).await });
        }

        BatchHandle {
            epoch,
            dispatched,
            skipped,
            tasks,
        }
    }

    async fn run_batch_item(self, guard: PendingGuard, start_at: Instant) -> ItemOutcome {
        tokio::time::sleep_until(start_at).await;

        if self.epoch() != guard.epoch {
            debug!(article_id = %guard.id, epoch = guard.epoch, "Skipping fetch for superseded session");
            return ItemOutcome::Stale;
        }

        let id = guard.id.clone();
        let epoch = guard.epoch;
        match self.fetch(&id).await {
            Ok(enrichment) => match guard.finish(Some(enrichment)) {
                Completion::Stale => {
                    debug!(article_id = %id, epoch, "Dropping enrichment from superseded session");
                    ItemOutcome::Stale
                }
                _ => {
                    debug!(article_id = %id, epoch, "Enrichment stored");
                    ItemOutcome::Stored
                }
            },
            Err(err) => match guard.finish(None) {
                Completion::Stale => ItemOutcome::Stale,
                _ => {
                    warn!(article_id = %id, epoch, error = %err, "Enrichment fetch failed");
                    self.report_failure(&id, epoch, &err);
                    ItemOutcome::Failed
                }
            },
        }
    }

    /// Fetch enrichment for one article now, without stagger
    ///
    /// Honored even when the article is already cached; refused only while a
    /// fetch for the same id is in flight.
    pub async fn fetch_now(&self, id: &ArticleId) -> OnDemandOutcome {
        let guard = {
            let mut state = self.inner.lock();
            if !state.pending.try_dispatch_forced(id) {
                debug!(article_id = %id, "On-demand fetch skipped, already pending");
                return OnDemandOutcome::AlreadyPending;
            }
            self.guard(id, state.epoch)
        };
        let epoch = guard.epoch;
        info!(article_id = %id, epoch, "On-demand enrichment fetch");
        self.inner.pending_changed(id, epoch, true);

        match self.fetch(id).await {
            Ok(enrichment) if enrichment.has_content() => match guard.finish(Some(enrichment)) {
                Completion::Stored(merged) => {
                    self.notify(NoticeSeverity::Info, MSG_LOADED, id);
                    OnDemandOutcome::Loaded(merged)
                }
                _ => OnDemandOutcome::Superseded,
            },
            Ok(_) => match guard.finish(None) {
                Completion::Stale => OnDemandOutcome::Superseded,
                _ => {
                    info!(article_id = %id, "No summary available");
                    self.notify(NoticeSeverity::Warning, MSG_NOTHING, id);
                    OnDemandOutcome::NothingAvailable
                }
            },
            Err(err) => match guard.finish(None) {
                Completion::Stale => OnDemandOutcome::Superseded,
                _ => {
                    warn!(article_id = %id, epoch, error = %err, "On-demand fetch failed");
                    self.report_failure(id, epoch, &err);
                    OnDemandOutcome::Failed(err)
                }
            },
        }
    }

    /// Wait until `id` has no fetch in flight, then return its cache entry
    ///
    /// Returns immediately when nothing is pending for `id`. A new session
    /// clears the pending set, which also ends the wait.
    pub async fn settled(&self, id: &ArticleId) -> Option<Enrichment> {
        let mut rx = self.inner.events.subscribe();
        loop {
            if !self.is_pending(id) {
                return self.get(id);
            }
            match rx.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return self.get(id),
            }
        }
    }

    async fn fetch(&self, id: &ArticleId) -> ClientResult<Enrichment> {
        let limit = self.inner.request_timeout;
        let response = tokio::time::timeout(limit, self.inner.source.fetch_summary(id))
            .await
            .map_err(|_| ClientError::Timeout(limit))??;
        Ok(Enrichment::from_summary(id.clone(), &response))
    }

    fn report_failure(&self, id: &ArticleId, epoch: u64, err: &ClientError) {
        self.inner.events.emit_lossy(FeedEvent::FetchFailed {
            epoch,
            article_id: id.clone(),
            reason: err.to_string(),
            timestamp: Utc::now(),
        });
        let severity = if err.is_transport() {
            NoticeSeverity::Error
        } else {
            NoticeSeverity::Warning
        };
        self.notify(severity, MSG_FAILED, id);
    }

    fn notify(&self, severity: NoticeSeverity, message: &str, id: &ArticleId) {
        self.inner
            .events
            .emit_lossy(FeedEvent::notice(severity, message, Some(id.clone())));
    }
}
