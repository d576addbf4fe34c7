//! In-memory MVP similarity store.

use super::{SimilarMvp, VectorStore};
use crate::errors::ProviderError;
use crate::utils::keywords;
use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

const DIMENSIONS: usize = 256;
const MAX_TERMS: usize = 64;

/// Hashed bag-of-words embedding, L2-normalized.
fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0_f32; DIMENSIONS];
    for term in keywords(text, MAX_TERMS) {
        let digest = Sha256::digest(term.as_bytes());
        let bucket = usize::from(u16::from_be_bytes([digest[0], digest[1]])) % DIMENSIONS;
        vector[bucket] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    f64::from(a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>()).clamp(0.0, 1.0)
}

fn document(mvp: &SimilarMvp) -> String {
    format!(
        "{} {} {} {}",
        mvp.title,
        mvp.description,
        mvp.features.join(" "),
        mvp.target_audience
    )
}

/// Similarity store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    entries: DashMap<String, (SimilarMvp, Vec<f32>)>,
}

impl InMemoryVectorStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the three reference MVPs.
    #[must_use]
    pub fn seeded() -> Self {
        let store = Self::new();
        for mvp in reference_mvps() {
            store.insert(mvp);
        }
        store
    }

    /// Adds or replaces an MVP by id.
    pub fn insert(&self, mvp: SimilarMvp) {
        let vector = embed(&document(&mvp));
        self.entries.insert(mvp.id.clone(), (mvp, vector));
    }

    /// Number of stored MVPs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn similar(&self, query: &str, limit: usize) -> Result<Vec<SimilarMvp>, ProviderError> {
        let query_vector = embed(query);
        let mut scored: Vec<SimilarMvp> = self
            .entries
            .iter()
            .map(|entry| {
                let (mvp, vector) = entry.value();
                let mut hit = mvp.clone();
                hit.similarity = cosine(&query_vector, vector);
                hit
            })
            .collect();
        scored.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn reference_mvps() -> Vec<SimilarMvp> {
    vec![
        SimilarMvp {
            id: "example_1".to_string(),
            title: "Meal Planning App MVP".to_string(),
            description: "A mobile app that helps users plan their weekly meals, create shopping lists, and find recipes based on ingredients they have.".to_string(),
            features: strings(&[
                "Recipe search by ingredient",
                "Weekly meal calendar",
                "Automatic shopping list generation",
                "Dietary preference filters",
            ]),
            tech_stack: strings(&["React Native", "Node.js", "MongoDB", "Express"]),
            development_time: "3-4 months".to_string(),
            cost_estimate: "$15,000 - $25,000".to_string(),
            target_audience: "Busy professionals who want to eat healthier".to_string(),
            similarity: 0.0,
        },
        SimilarMvp {
            id: "example_2".to_string(),
            title: "Freelancer Marketplace MVP".to_string(),
            description: "A platform connecting freelancers with clients, featuring project posting, bidding, secure payments, and review system.".to_string(),
            features: strings(&[
                "User profiles for freelancers and clients",
                "Project posting and bidding system",
                "Secure payment escrow",
                "Rating and review system",
            ]),
            tech_stack: strings(&["React", "Django", "PostgreSQL", "Stripe API"]),
            development_time: "4-6 months".to_string(),
            cost_estimate: "$30,000 - $45,000".to_string(),
            target_audience: "Freelancers and small businesses".to_string(),
            similarity: 0.0,
        },
        SimilarMvp {
            id: "example_3".to_string(),
            title: "Local Event Discovery App MVP".to_string(),
            description: "A location-based app that helps users discover events happening near them with filtering, recommendations, and social features.".to_string(),
            features: strings(&[
                "Location-based event discovery",
                "Event filtering by category, date, and price",
                "Save and share favorite events",
                "Event organizer profiles",
            ]),
            tech_stack: strings(&["Flutter", "Firebase", "Google Maps API"]),
            development_time: "2-3 months".to_string(),
            cost_estimate: "$12,000 - $18,000".to_string(),
            target_audience: "Young adults looking for local entertainment".to_string(),
            similarity: 0.0,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_store_ranks_meal_planning_first() {
        let store = InMemoryVectorStore::seeded();
        assert_eq!(store.len(), 3);

        let hits = store
            .similar("weekly meal planning with recipes and shopping lists", 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "example_1");
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[tokio::test]
    async fn test_empty_query_keeps_stable_order() {
        let store = InMemoryVectorStore::seeded();
        let hits = store.similar("", 3).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["example_1", "example_2", "example_3"]);
        assert!(hits.iter().all(|h| h.similarity == 0.0));
    }

    #[test]
    fn test_insert_replaces_by_id() {
        let store = InMemoryVectorStore::new();
        assert!(store.is_empty());
        store.insert(SimilarMvp {
            id: "a".to_string(),
            title: "First".to_string(),
            ..SimilarMvp::default()
        });
        store.insert(SimilarMvp {
            id: "a".to_string(),
            title: "Second".to_string(),
            ..SimilarMvp::default()
        });
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_embedding_is_normalized() {
        let vector = embed("meal kits for busy parents");
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
