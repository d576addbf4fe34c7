//! Stub collaborators with canned answers.

use crate::errors::ProviderError;
use crate::providers::{
    CompletionRequest, LlmClient, OfflineLlm, OrganicResult, PageFetcher, PromptKind,
    ScrapedPage, SearchProvider, SearchResponse,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Completion backend answering by prompt kind.
///
/// Kinds without a canned answer fall through to [`OfflineLlm`].
#[derive(Debug, Default)]
pub struct StubLlm {
    answers: HashMap<PromptKind, Result<String, ProviderError>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl StubLlm {
    /// Creates a stub with no canned answers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `kind` prompts with `answer`.
    #[must_use]
    pub fn with_answer(mut self, kind: PromptKind, answer: impl Into<String>) -> Self {
        self.answers.insert(kind, Ok(answer.into()));
        self
    }

    /// Fails `kind` prompts with `error`.
    #[must_use]
    pub fn with_failure(mut self, kind: PromptKind, error: ProviderError) -> Self {
        self.answers.insert(kind, Err(error));
        self
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LlmClient for StubLlm {
    fn name(&self) -> &'static str {
        "stub-llm"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        self.requests.lock().push(request.clone());
        match self.answers.get(&request.kind) {
            Some(answer) => answer.clone(),
            None => OfflineLlm.complete(request).await,
        }
    }
}

/// Search backend returning the same organic hits for every query, unless a
/// query has its own response.
#[derive(Debug, Default)]
pub struct StubSearch {
    organic: Vec<OrganicResult>,
    responses: HashMap<String, SearchResponse>,
    failure: Option<ProviderError>,
    queries: Mutex<Vec<String>>,
}

impl StubSearch {
    /// Creates a stub that returns empty responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an organic hit returned for every query.
    #[must_use]
    pub fn with_organic(
        mut self,
        title: impl Into<String>,
        link: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        let position = u32::try_from(self.organic.len() + 1).unwrap_or(u32::MAX);
        self.organic.push(OrganicResult {
            title: title.into(),
            link: link.into(),
            snippet: snippet.into(),
            position,
            source: "stub-search".to_string(),
        });
        self
    }

    /// Returns `response` for `query` exactly.
    #[must_use]
    pub fn with_response(mut self, query: impl Into<String>, response: SearchResponse) -> Self {
        self.responses.insert(query.into(), response);
        self
    }

    /// Fails every query with `error`.
    #[must_use]
    pub fn failing(mut self, error: ProviderError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Queries received so far.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl SearchProvider for StubSearch {
    fn name(&self) -> &'static str {
        "stub-search"
    }

    async fn search(&self, query: &str) -> Result<SearchResponse, ProviderError> {
        self.queries.lock().push(query.to_string());
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if let Some(response) = self.responses.get(query) {
            return Ok(response.clone());
        }
        Ok(SearchResponse {
            query: query.to_string(),
            organic: self.organic.clone(),
            ..SearchResponse::default()
        })
    }
}

/// Page fetcher serving pages from memory. Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct StubFetcher {
    pages: HashMap<String, ScrapedPage>,
}

impl StubFetcher {
    /// Creates a fetcher with no pages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `page` at its URL.
    #[must_use]
    pub fn with_page(mut self, page: ScrapedPage) -> Self {
        self.pages.insert(page.url.clone(), page);
        self
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    fn name(&self) -> &'static str {
        "stub-fetcher"
    }

    async fn fetch(&self, url: &str) -> Result<ScrapedPage, ProviderError> {
        self.pages.get(url).cloned().ok_or_else(|| ProviderError::Http {
            provider: self.name().to_string(),
            status: 404,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_llm_falls_back_to_offline() {
        let llm = StubLlm::new().with_answer(PromptKind::SearchTerms, "meal kits");
        let canned = llm
            .complete(&CompletionRequest::new(PromptKind::SearchTerms, "terms?", "x"))
            .await
            .unwrap();
        let offline = llm
            .complete(&CompletionRequest::new(PromptKind::Competitors, "rivals?", "x"))
            .await
            .unwrap();

        assert_eq!(canned, "meal kits");
        assert_eq!(offline, "");
        assert_eq!(llm.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_stub_search_records_queries() {
        let search = StubSearch::new().with_organic("A", "https://a.example", "snippet");
        let response = search.search("meal kits").await.unwrap();

        assert_eq!(response.query, "meal kits");
        assert_eq!(response.organic[0].position, 1);
        assert_eq!(search.queries(), vec!["meal kits".to_string()]);
    }

    #[tokio::test]
    async fn test_stub_fetcher_unknown_url() {
        let err = StubFetcher::new().fetch("https://missing.example").await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
