//! Web search backends.

use super::{SearchProvider, SearchResponse};
use crate::errors::ProviderError;
use async_trait::async_trait;

/// Returns no results for every query.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineSearch;

#[async_trait]
impl SearchProvider for OfflineSearch {
    fn name(&self) -> &'static str {
        "offline-search"
    }

    async fn search(&self, query: &str) -> Result<SearchResponse, ProviderError> {
        Ok(SearchResponse::empty(query))
    }
}

#[cfg(feature = "providers")]
pub use http::{SerpApiSearch, SerperSearch};

#[cfg(feature = "providers")]
mod http {
    use super::{SearchProvider, SearchResponse};
    use crate::config::ProviderSettings;
    use crate::errors::ProviderError;
    use crate::providers::{KnowledgeGraph, OrganicResult};
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::Value;
    use std::time::Duration;

    const SERPER_URL: &str = "https://google.serper.dev/search";
    const SERPAPI_URL: &str = "https://serpapi.com/search";

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct SerperBody {
        #[serde(default)]
        organic: Vec<OrganicResult>,
        #[serde(default)]
        knowledge_graph: Option<KnowledgeGraph>,
        #[serde(default)]
        related_searches: Vec<Value>,
    }

    #[derive(Debug, Default, Deserialize)]
    struct SerpApiBody {
        #[serde(default)]
        organic_results: Vec<OrganicResult>,
        #[serde(default)]
        knowledge_graph: Option<KnowledgeGraph>,
        #[serde(default)]
        related_searches: Vec<Value>,
    }

    fn related_query(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map.get("query").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    }

    fn client(settings: &ProviderSettings, provider: &str) -> Result<reqwest::Client, ProviderError> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .build()
            .map_err(|e| ProviderError::transport(provider, e.to_string()))
    }

    fn send_error(err: &reqwest::Error, provider: &str, timeout_secs: u64) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout {
                provider: provider.to_string(),
                after_secs: timeout_secs,
            }
        } else {
            ProviderError::transport(provider, err.to_string())
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        provider: &str,
    ) -> Result<T, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http {
                provider: provider.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| ProviderError::decode(provider, e.to_string()))
    }

    fn tag(mut organic: Vec<OrganicResult>, source: &str) -> Vec<OrganicResult> {
        for result in &mut organic {
            result.source = source.to_string();
        }
        organic
    }

    /// Google results through serper.dev.
    #[derive(Debug, Clone)]
    pub struct SerperSearch {
        client: reqwest::Client,
        api_key: String,
        country: String,
        results: u32,
        timeout_secs: u64,
    }

    impl SerperSearch {
        /// Creates a client with the given API key.
        pub fn new(api_key: &str, settings: &ProviderSettings) -> Result<Self, ProviderError> {
            Ok(Self {
                client: client(settings, "serper")?,
                api_key: api_key.to_string(),
                country: settings.search_country.clone(),
                results: settings.search_results.min(100),
                timeout_secs: settings.http_timeout_secs,
            })
        }
    }

    #[async_trait]
    impl SearchProvider for SerperSearch {
        fn name(&self) -> &'static str {
            "serper"
        }

        async fn search(&self, query: &str) -> Result<SearchResponse, ProviderError> {
            tracing::debug!(query = %query, "Searching with serper");
            let response = self
                .client
                .post(SERPER_URL)
                .header("X-API-KEY", &self.api_key)
                .json(&serde_json::json!({"q": query, "gl": self.country, "num": self.results}))
                .send()
                .await
                .map_err(|e| send_error(&e, "serper", self.timeout_secs))?;

            let body: SerperBody = read_json(response, "serper").await?;
            Ok(SearchResponse {
                query: query.to_string(),
                organic: tag(body.organic, "serper"),
                knowledge_graph: body.knowledge_graph,
                related_searches: body.related_searches.iter().filter_map(related_query).collect(),
            })
        }
    }

    /// Google results through serpapi.com.
    #[derive(Debug, Clone)]
    pub struct SerpApiSearch {
        client: reqwest::Client,
        api_key: String,
        country: String,
        results: u32,
        timeout_secs: u64,
    }

    impl SerpApiSearch {
        /// Creates a client with the given API key.
        pub fn new(api_key: &str, settings: &ProviderSettings) -> Result<Self, ProviderError> {
            Ok(Self {
                client: client(settings, "serpapi")?,
                api_key: api_key.to_string(),
                country: settings.search_country.clone(),
                results: settings.search_results.min(100),
                timeout_secs: settings.http_timeout_secs,
            })
        }
    }

    #[async_trait]
    impl SearchProvider for SerpApiSearch {
        fn name(&self) -> &'static str {
            "serpapi"
        }

        async fn search(&self, query: &str) -> Result<SearchResponse, ProviderError> {
            tracing::debug!(query = %query, "Searching with serpapi");
            let num = self.results.to_string();
            let response = self
                .client
                .get(SERPAPI_URL)
                .query(&[
                    ("engine", "google"),
                    ("q", query),
                    ("api_key", self.api_key.as_str()),
                    ("gl", self.country.as_str()),
                    ("num", num.as_str()),
                    ("output", "json"),
                ])
                .send()
                .await
                .map_err(|e| send_error(&e, "serpapi", self.timeout_secs))?;

            let body: SerpApiBody = read_json(response, "serpapi").await?;
            Ok(SearchResponse {
                query: query.to_string(),
                organic: tag(body.organic_results, "serpapi"),
                knowledge_graph: body.knowledge_graph,
                related_searches: body.related_searches.iter().filter_map(related_query).collect(),
            })
        }
    }

}
