//! Shared API request/response types
//!
//! Field names follow the backend's JSON (snake_case, `pmid` for article ids).
//! Optional-looking fields default to empty values so a sparse response still
//! deserializes; an explicit `null` counts as missing.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Treat a JSON `null` like an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ========================================
// Identifiers
// ========================================

/// Stable identifier of one literature record (a PubMed PMID on the wire)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArticleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ArticleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ========================================
// Feed & Search
// ========================================

/// One ranked article as returned by `/feed` and `/search`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub pmid: ArticleId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub journal: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pub_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub article_types: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mesh_terms: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub score: f64,
}

/// Profile summary attached to a feed response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedProfile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_profile: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub specialty: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub interests: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recency_half_life_days: f64,
}

/// `GET /feed` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedResponse {
    pub results: Vec<SearchResult>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub seeds: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub profile: FeedProfile,
}

/// `GET /search` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// Ranking knobs for `GET /feed`; unset values are left to the backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedQuery {
    pub k: Option<u32>,
    pub lambda: Option<f64>,
    pub w_sem: Option<f64>,
    pub w_bm25: Option<f64>,
    pub explain: bool,
}

impl FeedQuery {
    pub fn with_k(k: u32) -> Self {
        Self {
            k: Some(k),
            ..Self::default()
        }
    }

    /// Query string pairs, omitting unset values
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(k) = self.k {
            pairs.push(("k", k.to_string()));
        }
        if let Some(lambda) = self.lambda {
            pairs.push(("lambda", lambda.to_string()));
        }
        if let Some(w_sem) = self.w_sem {
            pairs.push(("w_sem", w_sem.to_string()));
        }
        if let Some(w_bm25) = self.w_bm25 {
            pairs.push(("w_bm25", w_bm25.to_string()));
        }
        if self.explain {
            pairs.push(("explain", "true".to_string()));
        }
        pairs
    }
}

// ========================================
// Summaries
// ========================================

/// `GET /summarise?pmid=` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub pmid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub journal: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pub_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub article_types: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub takeaway_md: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary_md: String,
    /// Pre-rendered summary; preferred over `summary_md` when present
    #[serde(default, deserialize_with = "null_as_default")]
    pub html: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
}

// ========================================
// Feedback & Saved Articles
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackAction {
    Like,
    Dislike,
}

impl fmt::Display for FeedbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackAction::Like => f.write_str("like"),
            FeedbackAction::Dislike => f.write_str("dislike"),
        }
    }
}

/// `POST /feedback` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub pmid: ArticleId,
    pub action: FeedbackAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

/// `POST /saved` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveArticleRequest {
    pub pmid: ArticleId,
    pub title: String,
    pub takeaway_md: String,
    pub summary_md: String,
}

/// Generic `{ ok }` acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// One entry of the saved-articles list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedArticle {
    pub pmid: ArticleId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub takeaway_md: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary_md: String,
    /// Save timestamp as sent by the backend
    #[serde(default, deserialize_with = "null_as_default")]
    pub ts: String,
}

/// `GET /saved` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedArticlesResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: String,
    pub items: Vec<SavedArticle>,
}

// ========================================
// Account & Health
// ========================================

/// Practice profile captured during onboarding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeProfile {
    pub specialty: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub practice: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subinterests: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub evidence_weights: HashMap<String, f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recency_half_life_days: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: String,
}

/// `GET /me` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_login: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub profile: Option<PracticeProfile>,
}

/// `GET /health` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub index: String,
}
