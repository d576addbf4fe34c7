//! Competitor page fetching.

use super::{PageFetcher, ScrapedPage};
use crate::errors::ProviderError;
use async_trait::async_trait;

/// Refuses every fetch. Competitors then carry an error note instead of
/// page details.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

#[async_trait]
impl PageFetcher for OfflineFetcher {
    fn name(&self) -> &'static str {
        "offline-fetcher"
    }

    async fn fetch(&self, url: &str) -> Result<ScrapedPage, ProviderError> {
        Err(ProviderError::not_configured(
            self.name(),
            format!("no network fetcher available for {url}"),
        ))
    }
}

#[cfg(feature = "providers")]
pub use html::{parse_page, HttpPageFetcher};

#[cfg(feature = "providers")]
mod html {
    use super::{PageFetcher, ProviderError, ScrapedPage};
    use crate::providers::{PageFeature, PricingInfo, PricingTier};
    use async_trait::async_trait;
    use scraper::{ElementRef, Html, Selector};
    use std::time::Duration;

    const PROVIDER: &str = "scraper";
    const MAX_MAIN_TEXT: usize = 2000;
    const MAX_FEATURES: usize = 20;
    const MAX_TIERS: usize = 4;

    const MAIN_SELECTORS: &[&str] = &["main", "article", "#content", ".content", "#main", ".main"];
    const FEATURE_SECTIONS: &str =
        r#"#features, .features, section[id*="feature"], div[id*="feature"]"#;
    const FEATURE_ITEMS: &str = ".feature-card, .feature-item, .feature, .card, .item";
    const PRICING_SECTIONS: &str = r#"#pricing, .pricing, section[id*="pricing"], div[id*="pricing"], section[id*="plan"], div[id*="plan"]"#;
    const PRICING_TIERS: &str =
        ".pricing-card, .pricing-tier, .pricing-plan, .price-card, .price-box, .plan, .tier, .card";

    fn selector(css: &str) -> Option<Selector> {
        Selector::parse(css).ok()
    }

    fn squash<I, S>(parts: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = String::new();
        for part in parts {
            for word in part.as_ref().split_whitespace() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(word);
            }
        }
        out
    }

    fn element_text(element: ElementRef<'_>) -> String {
        squash(element.text())
    }

    fn first_text(scope: ElementRef<'_>, css: &str) -> Option<String> {
        let sel = selector(css)?;
        scope
            .select(&sel)
            .map(element_text)
            .find(|t| !t.is_empty())
    }

    fn truncate(text: String, max: usize) -> String {
        if text.chars().count() <= max {
            text
        } else {
            text.chars().take(max).collect()
        }
    }

    fn extract_main_text(doc: &Html) -> String {
        let blocks = selector("p, h1, h2, h3, h4, li");
        let root = MAIN_SELECTORS
            .iter()
            .filter_map(|css| selector(css))
            .find_map(|sel| doc.select(&sel).next())
            .or_else(|| selector("body").and_then(|sel| doc.select(&sel).next()));

        let text = match (root, blocks) {
            (Some(root), Some(blocks)) => {
                let text = squash(root.select(&blocks).map(element_text));
                if text.is_empty() {
                    element_text(root)
                } else {
                    text
                }
            }
            (Some(root), None) => element_text(root),
            _ => String::new(),
        };
        truncate(text, MAX_MAIN_TEXT)
    }

    fn extract_features(doc: &Html) -> Vec<PageFeature> {
        let (Some(sections), Some(items), Some(headings)) = (
            selector(FEATURE_SECTIONS),
            selector(FEATURE_ITEMS),
            selector("h2, h3, h4"),
        ) else {
            return Vec::new();
        };

        let mut features: Vec<PageFeature> = Vec::new();
        for section in doc.select(&sections) {
            let mut found: Vec<PageFeature> = section
                .select(&items)
                .filter_map(|item| {
                    let name = first_text(item, "h2, h3, h4, h5, .title, .name, strong")?;
                    let description = first_text(item, "p, .description").unwrap_or_default();
                    Some(PageFeature { name, description })
                })
                .collect();

            if found.is_empty() {
                found = section
                    .select(&headings)
                    .map(element_text)
                    .filter(|name| !name.is_empty())
                    .map(|name| PageFeature {
                        name,
                        description: String::new(),
                    })
                    .collect();
            }

            for feature in found {
                if !features.iter().any(|f| f.name.eq_ignore_ascii_case(&feature.name)) {
                    features.push(feature);
                }
            }
        }
        features.truncate(MAX_FEATURES);
        features
    }

    fn pricing_model(text: &str, has_free_tier: bool) -> &'static str {
        if ["subscription", "monthly", "yearly", "/mo", "per month"]
            .iter()
            .any(|w| text.contains(w))
        {
            "Subscription"
        } else if text.contains("one-time") || text.contains("lifetime") {
            "One-time purchase"
        } else if text.contains("freemium") || has_free_tier {
            "Freemium"
        } else {
            "Unknown"
        }
    }

    fn extract_pricing(doc: &Html) -> PricingInfo {
        let Some(sections) = selector(PRICING_SECTIONS) else {
            return PricingInfo::default();
        };
        let found: Vec<ElementRef<'_>> = doc.select(&sections).collect();
        let Some(first) = found.first().copied() else {
            return PricingInfo::default();
        };

        let text = found
            .iter()
            .map(|el| element_text(*el).to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let mut has_free_tier = text.contains("free");

        let mut tiers = Vec::new();
        if let Some(tier_sel) = selector(PRICING_TIERS) {
            for (i, tier) in first.select(&tier_sel).take(MAX_TIERS).enumerate() {
                let name = first_text(tier, "h2, h3, h4, .title, .name")
                    .unwrap_or_else(|| format!("Tier {}", i + 1));
                let price = first_text(tier, r#".price, .cost, [class*="price"], [class*="cost"]"#)
                    .unwrap_or_default();
                if price.to_lowercase().contains("free") || price.contains("$0") {
                    has_free_tier = true;
                }
                let features = selector("ul li, .feature, .benefit")
                    .map(|sel| {
                        tier.select(&sel)
                            .map(element_text)
                            .filter(|t| !t.is_empty())
                            .collect()
                    })
                    .unwrap_or_default();
                tiers.push(PricingTier {
                    name,
                    price,
                    features,
                });
            }
        }

        PricingInfo {
            model: pricing_model(&text, has_free_tier).to_string(),
            has_free_tier,
            tiers,
        }
    }

    /// Extracts title, description, main text, features and pricing from HTML.
    #[must_use]
    pub fn parse_page(url: &str, body: &str) -> ScrapedPage {
        let doc = Html::parse_document(body);
        let root = doc.root_element();
        let meta_description = selector(r#"meta[name="description"]"#)
            .and_then(|sel| {
                doc.select(&sel)
                    .find_map(|m| m.value().attr("content").map(|c| c.trim().to_string()))
            })
            .unwrap_or_default();

        ScrapedPage {
            url: url.to_string(),
            title: first_text(root, "title").unwrap_or_default(),
            meta_description,
            main_text: extract_main_text(&doc),
            features: extract_features(&doc),
            pricing: extract_pricing(&doc),
        }
    }

    /// Fetches pages over HTTP and parses them with [`parse_page`].
    #[derive(Debug, Clone)]
    pub struct HttpPageFetcher {
        client: reqwest::Client,
        timeout_secs: u64,
    }

    impl HttpPageFetcher {
        /// Creates a fetcher with the given user agent and request timeout.
        pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self, ProviderError> {
            let client = reqwest::Client::builder()
                .user_agent(user_agent)
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .map_err(|e| ProviderError::transport(PROVIDER, e.to_string()))?;
            Ok(Self {
                client,
                timeout_secs,
            })
        }
    }

    #[async_trait]
    impl PageFetcher for HttpPageFetcher {
        fn name(&self) -> &'static str {
            PROVIDER
        }

        async fn fetch(&self, url: &str) -> Result<ScrapedPage, ProviderError> {
            let url = if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

            tracing::debug!(url = %url, "Fetching page");
            let response = self.client.get(&url).send().await.map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        provider: PROVIDER.to_string(),
                        after_secs: self.timeout_secs,
                    }
                } else {
                    ProviderError::transport(PROVIDER, e.to_string())
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(ProviderError::Http {
                    provider: PROVIDER.to_string(),
                    status: status.as_u16(),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| ProviderError::decode(PROVIDER, e.to_string()))?;
            Ok(parse_page(&url, &body))
        }
    }

}
