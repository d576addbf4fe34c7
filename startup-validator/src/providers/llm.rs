//! Completion backends.

use super::{CompletionRequest, LlmClient, PromptKind};
use crate::errors::ProviderError;
use crate::utils::keywords;
use async_trait::async_trait;

/// Deterministic answers built from the request subject alone.
///
/// Competitor prompts get an empty answer so the competitor stage falls back
/// to organic search results.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineLlm;

impl OfflineLlm {
    fn field<'a>(subject: &'a str, label: &str) -> Option<&'a str> {
        subject.lines().find_map(|line| {
            line.strip_prefix(label)
                .and_then(|rest| rest.strip_prefix(':'))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
    }

    fn audience_profile(subject: &str) -> String {
        let audience = Self::field(subject, "Target audience").unwrap_or("Adults aged 25-45");
        let category = Self::field(subject, "Category").unwrap_or("their daily routine");
        let problem = Self::field(subject, "Problem")
            .or_else(|| Self::field(subject, "Description"))
            .unwrap_or("an unsolved everyday problem");
        format!(
            "Demographics: {audience}\n\
             Psychographics: Value convenience and quality in {category}\n\
             Behaviors: Research options online, compare prices, use mobile apps daily\n\
             Needs: A reliable answer to {problem}"
        )
    }
}

#[async_trait]
impl LlmClient for OfflineLlm {
    fn name(&self) -> &'static str {
        "offline-llm"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let answer = match request.kind {
            PromptKind::SearchTerms => keywords(&request.subject, 6).join("\n"),
            PromptKind::Competitors => String::new(),
            PromptKind::AudienceProfile => Self::audience_profile(&request.subject),
        };
        Ok(answer)
    }
}

#[cfg(feature = "providers")]
pub use http::OpenAiChatClient;

#[cfg(feature = "providers")]
mod http {
    use super::{CompletionRequest, LlmClient, ProviderError};
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::time::Duration;

    const PROVIDER: &str = "openai";

    #[derive(Debug, Deserialize)]
    struct ChatResponse {
        #[serde(default)]
        choices: Vec<Choice>,
    }

    #[derive(Debug, Deserialize)]
    struct Choice {
        message: Message,
    }

    #[derive(Debug, Deserialize)]
    struct Message {
        #[serde(default)]
        content: Option<String>,
    }

    /// OpenAI-compatible `/chat/completions` client.
    #[derive(Debug, Clone)]
    pub struct OpenAiChatClient {
        client: reqwest::Client,
        api_key: String,
        endpoint: String,
        model: String,
        timeout_secs: u64,
    }

    impl OpenAiChatClient {
        /// Creates a client for `base_url` (e.g. `https://api.openai.com/v1`).
        pub fn new(
            api_key: &str,
            base_url: &str,
            model: &str,
            timeout_secs: u64,
        ) -> Result<Self, ProviderError> {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .map_err(|e| ProviderError::transport(PROVIDER, e.to_string()))?;
            Ok(Self {
                client,
                api_key: api_key.to_string(),
                endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
                model: model.to_string(),
                timeout_secs,
            })
        }

        fn map_send_error(&self, err: &reqwest::Error) -> ProviderError {
            if err.is_timeout() {
                ProviderError::Timeout {
                    provider: PROVIDER.to_string(),
                    after_secs: self.timeout_secs,
                }
            } else {
                ProviderError::transport(PROVIDER, err.to_string())
            }
        }
    }

    #[async_trait]
    impl LlmClient for OpenAiChatClient {
        fn name(&self) -> &'static str {
            PROVIDER
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
            let body = serde_json::json!({
                "model": self.model,
                "temperature": 0.2,
                "messages": [
                    {"role": "system", "content": request.system},
                    {"role": "user", "content": request.prompt},
                ],
            });

            tracing::debug!(kind = %request.kind, model = %self.model, "Requesting completion");
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| self.map_send_error(&e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ProviderError::Http {
                    provider: PROVIDER.to_string(),
                    status: status.as_u16(),
                });
            }

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::decode(PROVIDER, e.to_string()))?;

            parsed
                .choices
                .into_iter()
                .find_map(|c| c.message.content)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .ok_or_else(|| ProviderError::Empty {
                    provider: PROVIDER.to_string(),
                })
        }
    }
}
