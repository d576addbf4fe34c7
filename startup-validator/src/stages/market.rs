//! Market research stage.

use super::{answer_lines, Stage};
use crate::context::StageContext;
use crate::core::{StageId, StageOutput};
use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, LlmClient, PromptKind, SearchProvider, SearchResponse};
use crate::utils::{keywords, parse_growth_rates, parse_money_amounts};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MIN_TERMS: usize = 5;
const MAX_TERMS: usize = 7;
const MAX_SOURCES: usize = 10;
const MIN_MARKET_SIZE_USD: f64 = 1_000_000.0;
const BASELINE_INTEREST: f64 = 50.0;
const BASELINE_GROWTH: f64 = 0.1;

/// Search interest for one term.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketTrend {
    /// The search term.
    pub keyword: String,
    /// Interest, 0-100, from result volume.
    pub interest_level: f64,
    /// Growth as a fraction (0.12 is 12 %), when snippets mention one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_rate: Option<f64>,
    /// Related queries.
    #[serde(default)]
    pub related_topics: Vec<String>,
    /// Search backend the data came from.
    #[serde(default)]
    pub source: String,
}

/// Output of the market stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketAnalysis {
    /// Terms that were researched.
    pub search_terms: Vec<String>,
    /// Per-term trends.
    pub trends: Vec<MarketTrend>,
    /// Average interest, 0-100.
    pub market_interest_score: f64,
    /// Average growth, in percent.
    pub growth_rate: f64,
    /// "Rapidly growing", "Growing", "Stable" or "Declining".
    pub market_direction: String,
    /// Largest market size mentioned in results, in USD.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_size_usd: Option<f64>,
    /// Short findings.
    pub key_insights: Vec<String>,
    /// Result URLs used.
    pub sources: Vec<String>,
}

/// Direction label for an average growth fraction.
#[must_use]
pub fn market_direction(avg_growth: f64) -> &'static str {
    if avg_growth > 0.2 {
        "Rapidly growing"
    } else if avg_growth > 0.0 {
        "Growing"
    } else if avg_growth > -0.1 {
        "Stable"
    } else {
        "Declining"
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn format_usd(amount: f64) -> String {
    if amount >= 1e9 {
        format!("${:.1} billion", amount / 1e9)
    } else {
        format!("${:.1} million", amount / 1e6)
    }
}

/// Researches search interest, growth and market size for the idea.
#[derive(Clone)]
pub struct MarketStage {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn SearchProvider>,
}

impl MarketStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>, search: Arc<dyn SearchProvider>) -> Self {
        Self { llm, search }
    }

    /// Founder-supplied terms first, then the LLM, then description keywords.
    async fn search_terms(&self, ctx: &StageContext) -> Vec<String> {
        let idea = ctx.idea();
        let supplied: Vec<String> = idea
            .search_terms
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .take(MAX_TERMS)
            .collect();
        if !supplied.is_empty() {
            return supplied;
        }

        let request = CompletionRequest::new(
            PromptKind::SearchTerms,
            format!(
                "Extract {MIN_TERMS}-{MAX_TERMS} key search terms that would be most relevant for \
                 researching market trends related to this startup idea:\n\n{}\n\n\
                 Return only the search terms, one per line.",
                idea.summary_text()
            ),
            idea.summary_text(),
        );
        match self.llm.complete(&request).await {
            Ok(answer) => {
                let terms: Vec<String> = answer_lines(&answer).into_iter().take(MAX_TERMS).collect();
                if !terms.is_empty() {
                    return terms;
                }
            }
            Err(e) => {
                tracing::warn!(llm = self.llm.name(), error = %e, "Search term extraction failed, using keywords");
            }
        }
        keywords(&idea.description, MIN_TERMS)
    }

    fn trend(&self, term: &str, response: &SearchResponse) -> Option<MarketTrend> {
        if response.organic.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let volume = response.organic.len() as f64 * 10.0;
        let panel_bonus = if response.knowledge_graph.is_some() { 10.0 } else { 0.0 };
        let rates = parse_growth_rates(&response.text_corpus());
        #[allow(clippy::cast_precision_loss)]
        let growth_rate = if rates.is_empty() {
            None
        } else {
            Some(rates.iter().sum::<f64>() / rates.len() as f64 / 100.0)
        };

        Some(MarketTrend {
            keyword: term.to_string(),
            interest_level: (volume + panel_bonus).min(100.0),
            growth_rate,
            related_topics: response.related_searches.iter().take(3).cloned().collect(),
            source: self.search.name().to_string(),
        })
    }

    fn synthesize(
        search_terms: Vec<String>,
        responses: &[SearchResponse],
        trends: Vec<MarketTrend>,
    ) -> MarketAnalysis {
        #[allow(clippy::cast_precision_loss)]
        let avg_interest = if trends.is_empty() {
            BASELINE_INTEREST
        } else {
            trends.iter().map(|t| t.interest_level).sum::<f64>() / trends.len() as f64
        };
        let growths: Vec<f64> = trends.iter().filter_map(|t| t.growth_rate).collect();
        #[allow(clippy::cast_precision_loss)]
        let avg_growth = if growths.is_empty() {
            BASELINE_GROWTH
        } else {
            growths.iter().sum::<f64>() / growths.len() as f64
        };

        let market_size_usd = responses
            .iter()
            .flat_map(|r| parse_money_amounts(&r.text_corpus()))
            .filter(|amount| *amount >= MIN_MARKET_SIZE_USD)
            .max_by(f64::total_cmp);

        let mut sources: Vec<String> = Vec::new();
        for link in responses.iter().flat_map(|r| r.organic.iter().map(|o| &o.link)) {
            if !link.is_empty() && !sources.contains(link) && sources.len() < MAX_SOURCES {
                sources.push(link.clone());
            }
        }

        let direction = market_direction(avg_growth);
        let growth_percent = round1(avg_growth * 100.0);
        let mut key_insights = vec![format!(
            "Market is {} with an estimated growth rate of {growth_percent}%",
            direction.to_lowercase()
        )];
        if trends.is_empty() {
            key_insights.push(
                "No live search data was available; interest and growth are baseline estimates"
                    .to_string(),
            );
        } else {
            key_insights.push(format!(
                "Search interest averages {:.0}/100 across {} researched terms",
                avg_interest,
                trends.len()
            ));
            if let Some(top) = trends
                .iter()
                .max_by(|a, b| a.interest_level.total_cmp(&b.interest_level))
            {
                key_insights.push(format!("'{}' draws the most search attention", top.keyword));
            }
        }
        if let Some(size) = market_size_usd {
            key_insights.push(format!("Reported market size reaches {}", format_usd(size)));
        }

        MarketAnalysis {
            search_terms,
            trends,
            market_interest_score: round1(avg_interest),
            growth_rate: growth_percent,
            market_direction: direction.to_string(),
            market_size_usd,
            key_insights,
            sources,
        }
    }
}

impl std::fmt::Debug for MarketStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketStage")
            .field("llm", &self.llm.name())
            .field("search", &self.search.name())
            .finish()
    }
}

#[async_trait]
impl Stage for MarketStage {
    fn id(&self) -> StageId {
        StageId::Market
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let search_terms = self.search_terms(ctx).await;
        tracing::debug!(terms = ?search_terms, "Researching market");

        let mut responses = Vec::new();
        let mut errors: Vec<ProviderError> = Vec::new();
        for term in &search_terms {
            if ctx.is_cancelled() {
                return StageOutput::cancel("cancelled during market search");
            }
            match self.search.search(term).await {
                Ok(response) => responses.push(response),
                Err(e) => {
                    tracing::warn!(term = %term, error = %e, "Market search failed");
                    errors.push(e);
                }
            }
        }

        if responses.is_empty() {
            if let Some(first) = errors.first() {
                return StageOutput::from_provider_error(first);
            }
        }

        let trends = responses
            .iter()
            .filter_map(|response| self.trend(&response.query, response))
            .collect();
        let analysis = Self::synthesize(search_terms, &responses, trends);
        StageOutput::ok_typed(&analysis).add_metadata("search", serde_json::json!(self.search.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StartupIdea;
    use crate::providers::{MockLlmClient, MockSearchProvider, OfflineLlm, OfflineSearch, OrganicResult};
    use crate::stages::test_support::context;
    use pretty_assertions::assert_eq;

    fn organic(title: &str, snippet: &str, link: &str) -> OrganicResult {
        OrganicResult {
            title: title.to_string(),
            snippet: snippet.to_string(),
            link: link.to_string(),
            ..OrganicResult::default()
        }
    }

    fn idea() -> StartupIdea {
        StartupIdea::new("FreshMeal", "Healthy meal kits for busy parents")
    }

    #[test]
    fn test_market_direction_thresholds() {
        assert_eq!(market_direction(0.25), "Rapidly growing");
        assert_eq!(market_direction(0.2), "Growing");
        assert_eq!(market_direction(0.0), "Stable");
        assert_eq!(market_direction(-0.1), "Declining");
    }

    #[tokio::test]
    async fn test_offline_run_uses_baselines() {
        let stage = MarketStage::new(Arc::new(OfflineLlm), Arc::new(OfflineSearch));
        let output = stage.execute(&context(StageId::Market, idea(), Vec::new())).await;

        assert!(output.is_success());
        let analysis: MarketAnalysis = serde_json::from_value(output.payload.unwrap()).unwrap();
        assert!(analysis.trends.is_empty());
        assert_eq!(analysis.market_interest_score, 50.0);
        assert_eq!(analysis.growth_rate, 10.0);
        assert_eq!(analysis.market_direction, "Growing");
        assert_eq!(analysis.market_size_usd, None);
        assert!(!analysis.search_terms.is_empty());
    }

    #[tokio::test]
    async fn test_supplied_terms_skip_llm() {
        let mut llm = MockLlmClient::new();
        llm.expect_name().return_const("mock-llm");
        llm.expect_complete().never();

        let stage = MarketStage::new(Arc::new(llm), Arc::new(OfflineSearch));
        let idea = idea().with_search_terms(vec!["meal kit market".to_string()]);
        let output = stage.execute(&context(StageId::Market, idea, Vec::new())).await;

        let analysis: MarketAnalysis = serde_json::from_value(output.payload.unwrap()).unwrap();
        assert_eq!(analysis.search_terms, vec!["meal kit market"]);
    }

    #[tokio::test]
    async fn test_search_results_drive_analysis() {
        let mut search = MockSearchProvider::new();
        search.expect_name().return_const("mock-search");
        search.expect_search().returning(|q| {
            Ok(SearchResponse {
                query: q.to_string(),
                organic: vec![
                    organic("Meal kit market report", "The market is worth $20 billion", "https://a.test"),
                    organic("Trends", "Demand growing at 30% per year", "https://b.test"),
                ],
                knowledge_graph: None,
                related_searches: vec!["meal prep".to_string()],
            })
        });

        let idea = idea().with_search_terms(vec!["meal kits".to_string(), "meal prep".to_string()]);
        let stage = MarketStage::new(Arc::new(OfflineLlm), Arc::new(search));
        let output = stage.execute(&context(StageId::Market, idea, Vec::new())).await;

        let analysis: MarketAnalysis = serde_json::from_value(output.payload.unwrap()).unwrap();
        assert_eq!(analysis.trends.len(), 2);
        assert_eq!(analysis.trends[0].interest_level, 20.0);
        assert_eq!(analysis.trends[0].source, "mock-search");
        assert_eq!(analysis.growth_rate, 30.0);
        assert_eq!(analysis.market_direction, "Rapidly growing");
        assert_eq!(analysis.market_size_usd, Some(2e10));
        assert_eq!(analysis.sources, vec!["https://a.test", "https://b.test"]);
        assert!(analysis.key_insights.iter().any(|i| i.contains("$20.0 billion")));
    }

    #[tokio::test]
    async fn test_all_searches_failing_is_retryable_failure() {
        let mut search = MockSearchProvider::new();
        search.expect_name().return_const("mock-search");
        search.expect_search().returning(|_| {
            Err(ProviderError::Http {
                provider: "mock-search".to_string(),
                status: 503,
            })
        });

        let idea = idea().with_search_terms(vec!["meal kits".to_string()]);
        let stage = MarketStage::new(Arc::new(OfflineLlm), Arc::new(search));
        let output = stage.execute(&context(StageId::Market, idea, Vec::new())).await;

        assert!(!output.is_success());
        assert!(output.is_retryable());
    }
}
