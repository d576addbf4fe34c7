//! Deterministic inputs for end-to-end runs.

use super::{StubFetcher, StubLlm, StubSearch};
use crate::core::StartupIdea;
use crate::providers::{
    InMemoryVectorStore, PageFeature, PricingInfo, PricingTier, PromptKind, ProviderSet,
    ScrapedPage,
};
use std::sync::Arc;

/// The FreshMeal example idea.
#[must_use]
pub fn sample_idea() -> StartupIdea {
    StartupIdea {
        name: "FreshMeal".to_string(),
        description: "A meal planning and grocery delivery service that focuses on fresh, local \
                      ingredients and reduces food waste by providing exact portions needed for \
                      each recipe."
            .to_string(),
        target_audience: Some(
            "Busy professionals and families who want to eat healthy and reduce food waste"
                .to_string(),
        ),
        category: Some("Food Tech / Sustainability".to_string()),
        problem_statement: Some(
            "People want to cook healthy meals but struggle with meal planning, food waste, and \
             grocery shopping time"
                .to_string(),
        ),
        solution: Some(
            "AI-powered meal planning with precise ingredients delivered from local sources"
                .to_string(),
        ),
        revenue_model: Some("Subscription + markup on grocery items".to_string()),
        initial_thoughts: None,
        search_terms: Vec::new(),
    }
}

/// Market data as a caller would supply it for `mvp_only`.
#[must_use]
pub fn sample_market_data() -> serde_json::Value {
    serde_json::json!({
        "search_terms": ["meal kits", "grocery delivery"],
        "market_interest_score": 70.0,
        "growth_rate": 12.5,
        "market_direction": "Growing",
        "market_size_usd": 19_900_000_000.0_f64,
        "key_insights": ["Meal kit demand keeps rising"]
    })
}

fn page(url: &str, title: &str, features: &[&str], pricing: PricingInfo) -> ScrapedPage {
    ScrapedPage {
        url: url.to_string(),
        title: title.to_string(),
        meta_description: format!("{title}: fresh meal kits delivered weekly"),
        main_text: "Fresh ingredients and recipes delivered to your door.".to_string(),
        features: features
            .iter()
            .map(|name| PageFeature {
                name: (*name).to_string(),
                description: String::new(),
            })
            .collect(),
        pricing,
    }
}

/// Stub collaborators that make a full run deterministic.
#[must_use]
pub fn stub_providers() -> ProviderSet {
    let llm = StubLlm::new()
        .with_answer(PromptKind::SearchTerms, "meal kits\ngrocery delivery\nfood waste")
        .with_answer(
            PromptKind::Competitors,
            "Company 1: HelloFresh, https://www.hellofresh.com\n\
             Company 2: Blue Apron, https://www.blueapron.com\n\
             Company 3: Instacart, https://www.instacart.com",
        );

    let search = StubSearch::new()
        .with_organic(
            "Meal Kit Market Size Report",
            "https://research.example/meal-kits",
            "The meal kit delivery market was valued at $19.9 billion, growing at 12.5% CAGR.",
        )
        .with_organic(
            "Grocery delivery trends",
            "https://news.example/grocery",
            "Online grocery sales show 8% growth as households cut food waste.",
        );

    let subscription = PricingInfo {
        model: "Subscription".to_string(),
        has_free_tier: false,
        tiers: vec![PricingTier {
            name: "Weekly box".to_string(),
            price: "$59.99".to_string(),
            features: Vec::new(),
        }],
    };
    let fetcher = StubFetcher::new()
        .with_page(page(
            "https://www.hellofresh.com",
            "HelloFresh - Meal Kits Delivered",
            &["Weekly menu", "Recipe cards", "Flexible delivery"],
            subscription.clone(),
        ))
        .with_page(page(
            "https://www.blueapron.com",
            "Blue Apron | Meal Kit Delivery",
            &["Weekly menu", "Wine pairing"],
            subscription,
        ));

    ProviderSet {
        llm: Arc::new(llm),
        search: Arc::new(search),
        fetcher: Arc::new(fetcher),
        vectors: Arc::new(InMemoryVectorStore::seeded()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_idea_is_valid() {
        let idea = sample_idea();
        assert!(idea.validate().is_ok());
        assert_eq!(idea.slug(), "freshmeal");
    }

    #[test]
    fn test_sample_market_data_is_object() {
        assert!(sample_market_data().is_object());
    }
}
