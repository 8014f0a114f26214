//! Feed backend HTTP client
//!
//! Thin JSON-over-HTTP wrapper around the feed, summary, feedback and
//! saved-article endpoints. Every non-success status becomes
//! `ClientError::Status`; nothing here retries.

use crate::enrichment::SummarySource;
use crate::error::{ClientError, ClientResult};
use crate::session::FeedBackend;
use async_trait::async_trait;
use medfeed_common::api::{
    ArticleId, FeedQuery, FeedResponse, FeedbackAction, FeedbackRequest, HealthResponse,
    OkResponse, SaveArticleRequest, SavedArticlesResponse, SearchResponse, SummaryResponse,
    UserProfile,
};
use medfeed_common::config::{get_user_agent, TomlConfig};
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Backend API client
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl ApiClient {
    /// Create a client for `base_url`
    ///
    /// # Arguments
    /// * `base_url` - Backend root, e.g. `http://127.0.0.1:5000` or `https://host/api`
    /// * `auth_token` - Bearer token sent with every request, if any
    /// * `timeout` - Total per-request timeout enforced by the HTTP client
    pub fn new(base_url: &str, auth_token: Option<String>, timeout: Duration) -> ClientResult<Self> {
        // Trailing slash so relative joins keep any path prefix ("/api")
        let normalized = format!("{}/", base_url.trim().trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| ClientError::Config(format!("invalid base URL '{}': {}", base_url, e)))?;

        let http_client = reqwest::Client::builder()
            .user_agent(get_user_agent())
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            auth_token: auth_token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Create client from the loaded TOML configuration
    pub fn from_config(config: &TomlConfig) -> ClientResult<Self> {
        Self::new(
            &config.api_base_url,
            config.auth_token.clone(),
            config.feed.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ClientError::Config(format!("base URL cannot be a base: {}", self.base_url)))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http_client.request(method, url);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown status").to_string()
            } else {
                body
            };
            return Err(ClientError::Status(status.as_u16(), message));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Parse(e.to_string()))
    }

    // ========================================
    // Feed & Search
    // ========================================

    /// `GET /feed`: personalized ranked articles
    pub async fn get_feed(&self, query: &FeedQuery) -> ClientResult<FeedResponse> {
        let url = self.endpoint(&["feed"])?;
        tracing::debug!(url = %url, "Requesting feed");
        self.send_json(self.request(Method::GET, url).query(&query.to_query_pairs()))
            .await
    }

    /// `GET /search`: free-text search
    pub async fn search(&self, query: &str, k: u32, explain: bool) -> ClientResult<SearchResponse> {
        let url = self.endpoint(&["search"])?;
        let mut params = vec![("q", query.to_string()), ("k", k.to_string())];
        if explain {
            params.push(("explain", "true".to_string()));
        }
        tracing::debug!(query = %query, k, "Searching");
        self.send_json(self.request(Method::GET, url).query(&params)).await
    }

    // ========================================
    // Summaries
    // ========================================

    /// `GET /summarise?pmid=`: AI summary, takeaway and resolved title
    pub async fn get_summary(&self, id: &ArticleId) -> ClientResult<SummaryResponse> {
        let url = self.endpoint(&["summarise"])?;
        tracing::debug!(article_id = %id, "Requesting summary");
        self.send_json(
            self.request(Method::GET, url)
                .query(&[("pmid", id.as_str())]),
        )
        .await
    }

    // ========================================
    // Feedback & Saved Articles
    // ========================================

    /// `POST /feedback`
    pub async fn submit_feedback(
        &self,
        id: &ArticleId,
        action: FeedbackAction,
        query: Option<&str>,
    ) -> ClientResult<OkResponse> {
        let url = self.endpoint(&["feedback"])?;
        let body = FeedbackRequest {
            pmid: id.clone(),
            action,
            query: query.map(str::to_string),
        };
        self.send_json(self.request(Method::POST, url).json(&body)).await
    }

    /// `POST /saved`
    pub async fn save_article(&self, request: &SaveArticleRequest) -> ClientResult<OkResponse> {
        let url = self.endpoint(&["saved"])?;
        self.send_json(self.request(Method::POST, url).json(request)).await
    }

    /// `GET /saved`
    pub async fn get_saved_articles(&self) -> ClientResult<SavedArticlesResponse> {
        let url = self.endpoint(&["saved"])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    /// `DELETE /saved/{pmid}`
    pub async fn delete_saved_article(&self, id: &ArticleId) -> ClientResult<OkResponse> {
        let url = self.endpoint(&["saved", id.as_str()])?;
        self.send_json(self.request(Method::DELETE, url)).await
    }

    // ========================================
    // Account & Health
    // ========================================

    /// `GET /me`
    pub async fn get_me(&self) -> ClientResult<UserProfile> {
        let url = self.endpoint(&["me"])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    /// `GET /health`
    pub async fn health(&self) -> ClientResult<HealthResponse> {
        let url = self.endpoint(&["health"])?;
        self.send_json(self.request(Method::GET, url)).await
    }
}

#[async_trait]
impl SummarySource for ApiClient {
    async fn fetch_summary(&self, id: &ArticleId) -> ClientResult<SummaryResponse> {
        self.get_summary(id).await
    }
}

#[async_trait]
impl FeedBackend for ApiClient {
    async fn fetch_feed(&self, query: &FeedQuery) -> ClientResult<FeedResponse> {
        self.get_feed(query).await
    }

    async fn fetch_search(&self, query: &str, k: u32) -> ClientResult<SearchResponse> {
        self.search(query, k, false).await
    }

    async fn send_feedback(
        &self,
        id: &ArticleId,
        action: FeedbackAction,
        query: Option<&str>,
    ) -> ClientResult<OkResponse> {
        self.submit_feedback(id, action, query).await
    }

    async fn send_save(&self, request: &SaveArticleRequest) -> ClientResult<OkResponse> {
        self.save_article(request).await
    }
}
