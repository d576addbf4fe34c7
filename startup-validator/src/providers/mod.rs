//! External collaborators: LLM, web search, page fetching and MVP similarity.
//!
//! Every collaborator sits behind a trait so stages can run against HTTP
//! backends, deterministic offline stand-ins, or test doubles. Errors are
//! [`ProviderError`]s and are treated as stage-local failures.

mod llm;
mod models;
mod scrape;
mod search;
mod vector;

use crate::config::ProviderSettings;
use crate::errors::ProviderError;
use async_trait::async_trait;
use std::sync::Arc;

pub use llm::OfflineLlm;
#[cfg(feature = "providers")]
pub use llm::OpenAiChatClient;
pub use models::{
    CompletionRequest, KnowledgeGraph, OrganicResult, PageFeature, PricingInfo, PricingTier,
    PromptKind, ScrapedPage, SearchResponse, SimilarMvp,
};
pub use scrape::OfflineFetcher;
#[cfg(feature = "providers")]
pub use scrape::{parse_page, HttpPageFetcher};
pub use search::OfflineSearch;
#[cfg(feature = "providers")]
pub use search::{SerpApiSearch, SerperSearch};
pub use vector::InMemoryVectorStore;

/// Text completion backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Completes a single-turn prompt.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

/// Web search backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Runs one query.
    async fn search(&self, query: &str) -> Result<SearchResponse, ProviderError>;
}

/// Fetches and parses a web page.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Fetches `url` and extracts title, features and pricing.
    async fn fetch(&self, url: &str) -> Result<ScrapedPage, ProviderError>;
}

/// Similarity search over previously planned MVPs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// The `limit` most similar MVPs, best first.
    async fn similar(&self, query: &str, limit: usize) -> Result<Vec<SimilarMvp>, ProviderError>;
}

/// The collaborators a run uses.
#[derive(Clone)]
pub struct ProviderSet {
    /// Completion backend.
    pub llm: Arc<dyn LlmClient>,
    /// Search backend.
    pub search: Arc<dyn SearchProvider>,
    /// Page fetcher.
    pub fetcher: Arc<dyn PageFetcher>,
    /// MVP similarity store.
    pub vectors: Arc<dyn VectorStore>,
}

impl ProviderSet {
    /// Deterministic collaborators that never touch the network.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            llm: Arc::new(OfflineLlm),
            search: Arc::new(OfflineSearch),
            fetcher: Arc::new(OfflineFetcher),
            vectors: Arc::new(InMemoryVectorStore::seeded()),
        }
    }

    /// Picks backends from configured credentials.
    ///
    /// Serper wins over SerpAPI; without any search key the offline search is
    /// used. An OpenAI key selects the chat client.
    #[cfg(feature = "providers")]
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let mut set = Self::offline();

        if let Some(key) = non_blank(settings.openai_api_key.as_deref()) {
            set.llm = Arc::new(OpenAiChatClient::new(
                key,
                &settings.openai_base_url,
                &settings.model,
                settings.http_timeout_secs,
            )?);
        }

        if let Some(key) = non_blank(settings.serper_api_key.as_deref()) {
            set.search = Arc::new(SerperSearch::new(key, settings)?);
        } else if let Some(key) = non_blank(settings.serpapi_api_key.as_deref()) {
            set.search = Arc::new(SerpApiSearch::new(key, settings)?);
        }

        set.fetcher = Arc::new(HttpPageFetcher::new(
            &settings.user_agent,
            settings.http_timeout_secs,
        )?);

        tracing::info!(
            llm = set.llm.name(),
            search = set.search.name(),
            fetcher = set.fetcher.name(),
            "Providers selected"
        );
        Ok(set)
    }

    /// Without the `providers` feature only offline backends exist.
    #[cfg(not(feature = "providers"))]
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        if non_blank(settings.serper_api_key.as_deref()).is_some()
            || non_blank(settings.openai_api_key.as_deref()).is_some()
        {
            tracing::warn!("API keys are set but HTTP providers are not compiled in");
        }
        Ok(Self::offline())
    }

    /// Replaces the completion backend.
    #[must_use]
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = llm;
        self
    }

    /// Replaces the search backend.
    #[must_use]
    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = search;
        self
    }

    /// Replaces the page fetcher.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replaces the similarity store.
    #[must_use]
    pub fn with_vectors(mut self, vectors: Arc<dyn VectorStore>) -> Self {
        self.vectors = vectors;
        self
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("llm", &self.llm.name())
            .field("search", &self.search.name())
            .field("fetcher", &self.fetcher.name())
            .field("vectors", &self.vectors.name())
            .finish()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_set_names() {
        let set = ProviderSet::offline();
        assert_eq!(set.llm.name(), "offline-llm");
        assert_eq!(set.search.name(), "offline-search");
        assert_eq!(set.vectors.name(), "in-memory");
    }

    #[test]
    fn test_blank_keys_fall_back_to_offline() {
        let settings = ProviderSettings {
            serper_api_key: Some("  ".to_string()),
            ..ProviderSettings::default()
        };
        let set = ProviderSet::from_settings(&settings).unwrap();
        assert_eq!(set.search.name(), "offline-search");
        assert_eq!(set.llm.name(), "offline-llm");
    }

    #[cfg(feature = "providers")]
    #[test]
    fn test_serper_preferred_over_serpapi() {
        let settings = ProviderSettings {
            serper_api_key: Some("serper-key".to_string()),
            serpapi_api_key: Some("serpapi-key".to_string()),
            ..ProviderSettings::default()
        };
        let set = ProviderSet::from_settings(&settings).unwrap();
        assert_eq!(set.search.name(), "serper");

        let settings = ProviderSettings {
            serpapi_api_key: Some("serpapi-key".to_string()),
            ..ProviderSettings::default()
        };
        let set = ProviderSet::from_settings(&settings).unwrap();
        assert_eq!(set.search.name(), "serpapi");
    }

    #[tokio::test]
    async fn test_mocked_search_provider() {
        let mut search = MockSearchProvider::new();
        search.expect_name().return_const("mock");
        search
            .expect_search()
            .returning(|q| Ok(SearchResponse::empty(q)));

        let set = ProviderSet::offline().with_search(Arc::new(search));
        let response = set.search.search("meal kits").await.unwrap();
        assert_eq!(response.query, "meal kits");
        assert_eq!(set.search.name(), "mock");
    }
}
