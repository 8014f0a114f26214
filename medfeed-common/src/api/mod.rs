//! Backend API types
//!
//! Request/response shapes of the feed, summary, feedback and saved-article
//! endpoints, shared by every MedFeed crate.

pub mod types;

pub use types::{
    ArticleId, FeedProfile, FeedQuery, FeedResponse, FeedbackAction, FeedbackRequest,
    HealthResponse, OkResponse, PracticeProfile, SaveArticleRequest, SavedArticle,
    SavedArticlesResponse, SearchResponse, SearchResult, SummaryResponse, UserProfile,
};
