//! Competitor analysis stage.

use super::{MarketAnalysis, Stage};
use crate::context::StageContext;
use crate::core::{StageId, StageOutput};
use crate::providers::{
    CompletionRequest, LlmClient, PageFetcher, PricingInfo, PromptKind, ScrapedPage, SearchProvider,
};
use crate::utils::keywords;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const DEFAULT_MAX_COMPETITORS: usize = 5;
const MAX_DESCRIPTION_CHARS: usize = 300;

/// How closely a competitor overlaps with the idea.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitorKind {
    /// Same category or core keywords.
    Direct,
    /// Adjacent offering.
    #[default]
    Indirect,
}

impl fmt::Display for CompetitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Indirect => write!(f, "indirect"),
        }
    }
}

/// One analysed competitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitorProfile {
    /// Company or product name.
    pub name: String,
    /// Website.
    pub url: String,
    /// Page description or search snippet.
    pub description: String,
    /// Feature names found on the site.
    pub features: Vec<String>,
    /// Pricing found on the site.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingInfo>,
    /// Direct or indirect.
    pub kind: CompetitorKind,
    /// Why the site could not be analysed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompetitorProfile {
    fn analysed(&self) -> bool {
        self.error.is_none()
    }
}

/// Output of the competitor stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitorAnalysis {
    /// Competitors in discovery order.
    pub competitors: Vec<CompetitorProfile>,
    /// Features offered by fewer than half of the analysed competitors.
    pub market_gaps: Vec<String>,
    /// Features offered by at least half of the analysed competitors.
    pub common_features: Vec<String>,
    /// One-line pricing summary.
    pub pricing_insights: String,
    /// Number of competitors found.
    pub total_competitors_found: usize,
    /// Number tagged [`CompetitorKind::Direct`].
    pub direct_competitors: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct Lead {
    name: String,
    url: String,
    snippet: String,
}

/// Parses `Company N: name, url` lines.
fn parse_leads(answer: &str) -> Vec<Lead> {
    answer
        .lines()
        .filter_map(|line| {
            let (_, rest) = line.split_once(':')?;
            let (name, url) = rest.split_once(',')?;
            let name = name.trim().trim_matches(|c| c == '[' || c == ']').trim();
            let url = url.trim().trim_matches(|c| c == '[' || c == ']').trim();
            if name.is_empty() || url.is_empty() {
                return None;
            }
            Some(Lead {
                name: name.to_string(),
                url: url.to_string(),
                snippet: String::new(),
            })
        })
        .collect()
}

/// Site name from a result title such as `Acme - Meal kits delivered`.
fn title_name(title: &str) -> String {
    let cut = [" - ", " | ", " – ", ": "]
        .iter()
        .filter_map(|separator| title.find(separator))
        .min()
        .unwrap_or(title.len());
    title[..cut].trim().to_string()
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Finds, fetches and compares competitors.
#[derive(Clone)]
pub struct CompetitorStage {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn PageFetcher>,
    max_competitors: usize,
}

impl CompetitorStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            llm,
            search,
            fetcher,
            max_competitors: DEFAULT_MAX_COMPETITORS,
        }
    }

    /// Caps how many competitor sites are fetched.
    #[must_use]
    pub fn with_max_competitors(mut self, max: usize) -> Self {
        self.max_competitors = max.max(1);
        self
    }

    async fn leads(&self, ctx: &StageContext) -> Vec<Lead> {
        let idea = ctx.idea();
        let terms = ctx
            .precursor_as::<MarketAnalysis>(StageId::Market)
            .map(|m| m.search_terms)
            .unwrap_or_default();
        let related = if terms.is_empty() { "N/A".to_string() } else { terms.join(", ") };

        let request = CompletionRequest::new(
            PromptKind::Competitors,
            format!(
                "Identify 3 potential competitors for the following startup idea.\n\
                 For each competitor, provide their name and website URL.\n\n\
                 Startup idea: {}\nRelated terms: {related}\n\n\
                 Return the information in the following format:\n\
                 Company 1: [name], [url]\nCompany 2: [name], [url]\nCompany 3: [name], [url]",
                idea.summary_text()
            ),
            idea.summary_text(),
        );
        match self.llm.complete(&request).await {
            Ok(answer) => {
                let leads = parse_leads(&answer);
                if !leads.is_empty() {
                    return leads;
                }
            }
            Err(e) => {
                tracing::warn!(llm = self.llm.name(), error = %e, "Competitor listing failed, using search");
            }
        }

        let query = match terms.first() {
            Some(term) => format!("{term} competitors"),
            None => format!("{} alternatives", keywords(&idea.searchable_text(), 3).join(" ")),
        };
        match self.search.search(&query).await {
            Ok(response) => {
                let mut leads: Vec<Lead> = Vec::new();
                for result in response.organic {
                    if result.link.is_empty() || leads.iter().any(|l| l.url == result.link) {
                        continue;
                    }
                    leads.push(Lead {
                        name: title_name(&result.title),
                        url: result.link,
                        snippet: result.snippet,
                    });
                }
                leads
            }
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Competitor search failed");
                Vec::new()
            }
        }
    }

    fn profile(lead: Lead, fetched: Result<ScrapedPage, String>, markers: &[String]) -> CompetitorProfile {
        let mut profile = CompetitorProfile {
            name: lead.name,
            url: lead.url,
            description: lead.snippet,
            ..CompetitorProfile::default()
        };
        let mut haystack = format!("{} {}", profile.name, profile.description);
        match fetched {
            Ok(page) => {
                if !page.meta_description.is_empty() {
                    profile.description = truncate(&page.meta_description, MAX_DESCRIPTION_CHARS);
                } else if profile.description.is_empty() {
                    profile.description = truncate(&page.main_text, MAX_DESCRIPTION_CHARS);
                }
                profile.features = page.features.iter().map(|f| f.name.clone()).collect();
                if !page.pricing.tiers.is_empty() || page.pricing.has_free_tier {
                    profile.pricing = Some(page.pricing.clone());
                }
                haystack.push(' ');
                haystack.push_str(&page.title);
                haystack.push(' ');
                haystack.push_str(&page.main_text);
                haystack.push(' ');
                haystack.push_str(&profile.features.join(" "));
            }
            Err(error) => profile.error = Some(error),
        }

        let haystack = haystack.to_lowercase();
        if markers.iter().any(|m| haystack.contains(m.as_str())) {
            profile.kind = CompetitorKind::Direct;
        }
        profile
    }

    fn compare(competitors: Vec<CompetitorProfile>) -> CompetitorAnalysis {
        let analysed: Vec<&CompetitorProfile> = competitors.iter().filter(|c| c.analysed()).collect();
        let n = analysed.len();

        let mut counts: Vec<(String, usize)> = Vec::new();
        for competitor in &analysed {
            let mut seen: Vec<String> = Vec::new();
            for feature in &competitor.features {
                let key = feature.trim().to_string();
                if key.is_empty() || seen.contains(&key) {
                    continue;
                }
                seen.push(key.clone());
                match counts.iter_mut().find(|(name, _)| *name == key) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((key, 1)),
                }
            }
        }

        let (mut market_gaps, mut common_features) = (Vec::new(), Vec::new());
        for (feature, count) in counts {
            if count * 2 < n {
                market_gaps.push(feature);
            } else {
                common_features.push(feature);
            }
        }

        let priced: Vec<&PricingInfo> = analysed.iter().filter_map(|c| c.pricing.as_ref()).collect();
        let pricing_insights = if priced.iter().any(|p| p.has_free_tier) {
            "Most competitors use a freemium model".to_string()
        } else if let Some(model) = priced
            .iter()
            .map(|p| p.model.as_str())
            .find(|m| !m.is_empty() && *m != "Unknown")
        {
            format!("Competitors charge through a {} model", model.to_lowercase())
        } else {
            "No clear pricing pattern detected".to_string()
        };

        CompetitorAnalysis {
            total_competitors_found: competitors.len(),
            direct_competitors: competitors
                .iter()
                .filter(|c| c.kind == CompetitorKind::Direct)
                .count(),
            competitors,
            market_gaps,
            common_features,
            pricing_insights,
        }
    }
}

impl fmt::Debug for CompetitorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompetitorStage")
            .field("llm", &self.llm.name())
            .field("search", &self.search.name())
            .field("fetcher", &self.fetcher.name())
            .field("max_competitors", &self.max_competitors)
            .finish()
    }
}

#[async_trait]
impl Stage for CompetitorStage {
    fn id(&self) -> StageId {
        StageId::Competitor
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let idea = ctx.idea();
        let mut markers = keywords(&format!("{} {}", idea.name, idea.description), 5);
        if let Some(category) = idea.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            markers.push(category.to_lowercase());
        }

        let leads = self.leads(ctx).await;
        tracing::debug!(found = leads.len(), "Competitor leads identified");

        let mut competitors = Vec::new();
        for lead in leads.into_iter().take(self.max_competitors) {
            if ctx.is_cancelled() {
                return StageOutput::cancel("cancelled during competitor fetch");
            }
            let fetched = self.fetcher.fetch(&lead.url).await.map_err(|e| {
                tracing::warn!(url = %lead.url, error = %e, "Competitor fetch failed");
                e.to_string()
            });
            competitors.push(Self::profile(lead, fetched, &markers));
        }

        let analysis = Self::compare(competitors);
        StageOutput::ok_typed(&analysis)
            .add_metadata("fetcher", serde_json::json!(self.fetcher.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StageResult, StartupIdea};
    use crate::errors::ProviderError;
    use crate::providers::{
        MockLlmClient, MockPageFetcher, MockSearchProvider, OfflineFetcher, OfflineLlm,
        OfflineSearch, OrganicResult, PageFeature, SearchResponse,
    };
    use crate::stages::test_support::context;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn idea() -> StartupIdea {
        StartupIdea::new("FreshMeal", "Healthy meal kits for busy parents").with_category("Food Tech")
    }

    fn page(url: &str, features: &[&str], free: bool) -> ScrapedPage {
        ScrapedPage {
            url: url.to_string(),
            title: "Meal kits delivered".to_string(),
            meta_description: "Fresh meal kits every week".to_string(),
            features: features
                .iter()
                .map(|f| PageFeature {
                    name: (*f).to_string(),
                    description: String::new(),
                })
                .collect(),
            pricing: PricingInfo {
                model: "Subscription".to_string(),
                has_free_tier: free,
                tiers: Vec::new(),
            },
            ..ScrapedPage::default()
        }
    }

    fn listing_llm() -> MockLlmClient {
        let mut llm = MockLlmClient::new();
        llm.expect_name().return_const("mock-llm");
        llm.expect_complete().returning(|_| {
            Ok("Company 1: Acme, https://acme.test\nCompany 2: Beta, https://beta.test\n\
                Company 3: Gamma, https://gamma.test"
                .to_string())
        });
        llm
    }

    #[test]
    fn test_parse_leads() {
        let leads = parse_leads("Company 1: [Acme], [https://acme.test]\nnoise\nCompany 2: , x\n");
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].name, "Acme");
        assert_eq!(leads[0].url, "https://acme.test");
    }

    #[test]
    fn test_title_name() {
        assert_eq!(title_name("Acme - Meal kits delivered"), "Acme");
        assert_eq!(title_name("Beta | Home"), "Beta");
        assert_eq!(title_name("Gamma"), "Gamma");
    }

    #[tokio::test]
    async fn test_gaps_and_common_features() {
        let mut fetcher = MockPageFetcher::new();
        fetcher.expect_name().return_const("mock-fetcher");
        fetcher.expect_fetch().returning(|url| {
            Ok(match url {
                "https://acme.test" => page(url, &["Recipes", "Delivery"], true),
                "https://beta.test" => page(url, &["Recipes", "Delivery"], false),
                _ => page(url, &["Recipes", "Nutrition tracking"], false),
            })
        });

        let stage = CompetitorStage::new(
            Arc::new(listing_llm()),
            Arc::new(OfflineSearch),
            Arc::new(fetcher),
        );
        let output = stage.execute(&context(StageId::Competitor, idea(), Vec::new())).await;

        let analysis: CompetitorAnalysis = serde_json::from_value(output.payload.unwrap()).unwrap();
        assert_eq!(analysis.total_competitors_found, 3);
        assert_eq!(analysis.common_features, vec!["Recipes", "Delivery"]);
        assert_eq!(analysis.market_gaps, vec!["Nutrition tracking"]);
        assert_eq!(analysis.pricing_insights, "Most competitors use a freemium model");
        assert_eq!(analysis.direct_competitors, 3);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_competitor() {
        let stage = CompetitorStage::new(
            Arc::new(listing_llm()),
            Arc::new(OfflineSearch),
            Arc::new(OfflineFetcher),
        )
        .with_max_competitors(2);
        let output = stage.execute(&context(StageId::Competitor, idea(), Vec::new())).await;

        assert!(output.is_success());
        let analysis: CompetitorAnalysis = serde_json::from_value(output.payload.unwrap()).unwrap();
        assert_eq!(analysis.competitors.len(), 2);
        assert!(analysis.competitors.iter().all(|c| c.error.is_some()));
        assert!(analysis.market_gaps.is_empty());
        assert_eq!(analysis.pricing_insights, "No clear pricing pattern detected");
    }

    #[tokio::test]
    async fn test_falls_back_to_search_with_market_terms() {
        let mut search = MockSearchProvider::new();
        search.expect_name().return_const("mock-search");
        search
            .expect_search()
            .withf(|q| q == "meal kits competitors")
            .times(1)
            .returning(|q| {
                Ok(SearchResponse {
                    query: q.to_string(),
                    organic: vec![OrganicResult {
                        title: "HelloFresh - Meal kits delivered".to_string(),
                        link: "https://hellofresh.test".to_string(),
                        snippet: "Meal kits for families".to_string(),
                        ..OrganicResult::default()
                    }],
                    ..SearchResponse::default()
                })
            });

        let market = StageResult::completed(
            StageId::Market,
            json!({"search_terms": ["meal kits"]}),
            Utc::now(),
            1,
        );
        let stage = CompetitorStage::new(Arc::new(OfflineLlm), Arc::new(search), Arc::new(OfflineFetcher));
        let output = stage.execute(&context(StageId::Competitor, idea(), vec![market])).await;

        let analysis: CompetitorAnalysis = serde_json::from_value(output.payload.unwrap()).unwrap();
        assert_eq!(analysis.competitors[0].name, "HelloFresh");
        assert_eq!(analysis.competitors[0].description, "Meal kits for families");
        assert_eq!(analysis.competitors[0].kind, CompetitorKind::Direct);
    }

    #[tokio::test]
    async fn test_no_leads_yields_empty_analysis() {
        let mut llm = MockLlmClient::new();
        llm.expect_name().return_const("mock-llm");
        llm.expect_complete().returning(|_| {
            Err(ProviderError::Empty {
                provider: "mock-llm".to_string(),
            })
        });

        let stage = CompetitorStage::new(Arc::new(llm), Arc::new(OfflineSearch), Arc::new(OfflineFetcher));
        let output = stage.execute(&context(StageId::Competitor, idea(), Vec::new())).await;

        let analysis: CompetitorAnalysis = serde_json::from_value(output.payload.unwrap()).unwrap();
        assert_eq!(analysis.total_competitors_found, 0);
        assert_eq!(analysis.direct_competitors, 0);
    }
}
