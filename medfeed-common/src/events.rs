//! Event types for the MedFeed event system
//!
//! Provides the feed event definitions and the EventBus used for
//! dependent-view invalidation and user notifications.

use crate::api::ArticleId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// How a notice should be presented to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeSeverity {
    /// Confirmation of a completed action
    Info,
    /// Informational but unwelcome, e.g. "no summary available"
    Warning,
    /// A request failed
    Error,
}

/// Feed event types
///
/// Events are broadcast via EventBus and are serializable so a front end can
/// forward them as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeedEvent {
    /// A new feed session started; everything from earlier epochs is stale
    SessionStarted {
        /// Epoch of the new session
        epoch: u64,
        /// Number of articles in the feed that started the session
        article_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The enrichment cache entry for an article changed
    ///
    /// Triggers:
    /// - Feed view: recompute rendered articles
    EnrichmentUpdated {
        epoch: u64,
        article_id: ArticleId,
        timestamp: DateTime<Utc>,
    },

    /// An article entered or left the pending set without a cache write
    ///
    /// Triggers:
    /// - Feed view: recompute loading indicators
    PendingChanged {
        epoch: u64,
        article_id: ArticleId,
        /// True when a fetch was dispatched, false when it resolved
        pending: bool,
        timestamp: DateTime<Utc>,
    },

    /// An enrichment fetch failed; the article is no longer pending
    FetchFailed {
        epoch: u64,
        article_id: ArticleId,
        /// Human readable failure description
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Something the user should be told about (toast-equivalent)
    Notice {
        severity: NoticeSeverity,
        message: String,
        /// Article the notice refers to, if any
        article_id: Option<ArticleId>,
        timestamp: DateTime<Utc>,
    },
}

impl FeedEvent {
    /// Build a notice stamped with the current time
    pub fn notice(
        severity: NoticeSeverity,
        message: impl Into<String>,
        article_id: Option<ArticleId>,
    ) -> Self {
        FeedEvent::Notice {
            severity,
            message: message.into(),
            article_id,
            timestamp: Utc::now(),
        }
    }

    /// Session epoch the event belongs to (notices are epoch-less)
    pub fn epoch(&self) -> Option<u64> {
        match self {
            FeedEvent::SessionStarted { epoch, .. }
            | FeedEvent::EnrichmentUpdated { epoch, .. }
            | FeedEvent::PendingChanged { epoch, .. }
            | FeedEvent::FetchFailed { epoch, .. } => Some(*epoch),
            FeedEvent::Notice { .. } => None,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use medfeed_common::events::{EventBus, FeedEvent, NoticeSeverity};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(FeedEvent::notice(NoticeSeverity::Info, "Feedback recorded", None));
/// assert!(matches!(rx.try_recv(), Ok(FeedEvent::Notice { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FeedEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: FeedEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_dropped() {
        let bus = EventBus::new(10);
        bus.emit_lossy(FeedEvent::notice(NoticeSeverity::Info, "hello", None));

        // Late subscribers do not see earlier events
        let mut rx = bus.subscribe();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit_lossy(FeedEvent::SessionStarted {
            epoch: 1,
            article_count: 3,
            timestamp: Utc::now(),
        });
        bus.emit_lossy(FeedEvent::EnrichmentUpdated {
            epoch: 1,
            article_id: ArticleId::from("123"),
            timestamp: Utc::now(),
        });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first, FeedEvent::SessionStarted { epoch: 1, .. }));
        match second {
            FeedEvent::EnrichmentUpdated { article_id, .. } => {
                assert_eq!(article_id.as_str(), "123")
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_event_epoch() {
        let notice = FeedEvent::notice(NoticeSeverity::Error, "boom", None);
        assert_eq!(notice.epoch(), None);

        let failed = FeedEvent::FetchFailed {
            epoch: 7,
            article_id: ArticleId::from("9"),
            reason: "timeout".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(failed.epoch(), Some(7));

        let released = FeedEvent::PendingChanged {
            epoch: 3,
            article_id: ArticleId::from("9"),
            pending: false,
            timestamp: Utc::now(),
        };
        assert_eq!(released.epoch(), Some(3));
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = FeedEvent::notice(NoticeSeverity::Warning, "No summary available", None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Notice");
        assert_eq!(json["severity"], "warning");
    }
}
