//! Request and response types exchanged with collaborators.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a completion is for. Offline clients answer by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// One search term per line.
    SearchTerms,
    /// `Company N: name, url` lines.
    Competitors,
    /// `Demographics:`/`Psychographics:`/`Behaviors:`/`Needs:` lines.
    AudienceProfile,
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SearchTerms => write!(f, "search_terms"),
            Self::Competitors => write!(f, "competitors"),
            Self::AudienceProfile => write!(f, "audience_profile"),
        }
    }
}

/// A single-turn completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// What the answer will be used for.
    pub kind: PromptKind,
    /// System instructions.
    pub system: String,
    /// The user prompt.
    pub prompt: String,
    /// Raw subject text the prompt was built from.
    pub subject: String,
}

impl CompletionRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(kind: PromptKind, prompt: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            kind,
            system: "You are a startup market analyst. Answer concisely in the requested format."
                .to_string(),
            prompt: prompt.into(),
            subject: subject.into(),
        }
    }
}

/// One organic search hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganicResult {
    /// Page title.
    #[serde(default)]
    pub title: String,
    /// Result URL.
    #[serde(default)]
    pub link: String,
    /// Text snippet.
    #[serde(default)]
    pub snippet: String,
    /// Rank on the results page.
    #[serde(default)]
    pub position: u32,
    /// Which backend produced the hit.
    #[serde(default)]
    pub source: String,
}

/// Knowledge panel attached to a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    /// Entity title.
    #[serde(default)]
    pub title: String,
    /// Entity type.
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Entity description.
    #[serde(default)]
    pub description: String,
}

/// A normalized search response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The query that was run.
    pub query: String,
    /// Organic hits in rank order.
    #[serde(default)]
    pub organic: Vec<OrganicResult>,
    /// Knowledge panel, when the backend returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_graph: Option<KnowledgeGraph>,
    /// Related queries.
    #[serde(default)]
    pub related_searches: Vec<String>,
}

impl SearchResponse {
    /// An empty response for `query`.
    #[must_use]
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Snippets plus the knowledge panel description, joined for text mining.
    #[must_use]
    pub fn text_corpus(&self) -> String {
        let mut parts: Vec<&str> = self
            .organic
            .iter()
            .flat_map(|r| [r.title.as_str(), r.snippet.as_str()])
            .collect();
        if let Some(kg) = &self.knowledge_graph {
            parts.push(&kg.description);
        }
        parts.join(" ")
    }
}

/// A feature block found on a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFeature {
    /// Feature heading.
    pub name: String,
    /// Feature body text.
    #[serde(default)]
    pub description: String,
}

/// One pricing plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTier {
    /// Plan name.
    pub name: String,
    /// Price text as shown.
    #[serde(default)]
    pub price: String,
    /// Listed plan features.
    #[serde(default)]
    pub features: Vec<String>,
}

/// Pricing information found on a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingInfo {
    /// "Subscription", "One-time purchase", "Freemium" or "Unknown". Empty when
    /// the page had no pricing section.
    #[serde(default)]
    pub model: String,
    /// Whether a free plan was spotted.
    #[serde(default)]
    pub has_free_tier: bool,
    /// Up to four plans.
    #[serde(default)]
    pub tiers: Vec<PricingTier>,
}

/// The parts of a competitor page the analysis uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedPage {
    /// Fetched URL.
    pub url: String,
    /// `<title>` text.
    #[serde(default)]
    pub title: String,
    /// `<meta name="description">` content.
    #[serde(default)]
    pub meta_description: String,
    /// Visible text of the main content area.
    #[serde(default)]
    pub main_text: String,
    /// Feature blocks.
    #[serde(default)]
    pub features: Vec<PageFeature>,
    /// Pricing section.
    #[serde(default)]
    pub pricing: PricingInfo,
}

/// A previously planned MVP returned by similarity search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarMvp {
    /// Stable identifier.
    pub id: String,
    /// Short title.
    pub title: String,
    /// What the MVP did.
    #[serde(default)]
    pub description: String,
    /// Features it shipped with.
    #[serde(default)]
    pub features: Vec<String>,
    /// Technologies used.
    #[serde(default)]
    pub tech_stack: Vec<String>,
    /// Build time as written, e.g. "8 weeks".
    #[serde(default)]
    pub development_time: String,
    /// Cost as written, e.g. "$25,000".
    #[serde(default)]
    pub cost_estimate: String,
    /// Audience it targeted.
    #[serde(default)]
    pub target_audience: String,
    /// Cosine similarity to the query, `0.0..=1.0`.
    #[serde(default)]
    pub similarity: f64,
}
