//! MVP planning stage.

use super::estimator::{Complexity, FeatureSpec, MvpEstimate, MvpEstimator};
use super::{CompetitorAnalysis, PersonaSet, Stage};
use crate::context::StageContext;
use crate::core::{StageId, StageOutput, StartupIdea};
use crate::providers::{SimilarMvp, VectorStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const SIMILAR_MVP_LIMIT: usize = 3;
const MIN_PLAN_WEEKS: u32 = 4;

/// A planned MVP feature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MvpFeature {
    /// Feature name.
    pub name: String,
    /// What it delivers.
    pub description: String,
    /// 1-10, higher ships first.
    pub priority: u8,
    /// 1-10.
    pub complexity: u8,
    /// Rough build effort.
    pub estimated_hours: u32,
    /// 1-10.
    pub user_value: u8,
}

impl MvpFeature {
    fn new(name: &str, description: impl Into<String>, scores: (u8, u8, u32, u8)) -> Self {
        let (priority, complexity, estimated_hours, user_value) = scores;
        Self {
            name: name.to_string(),
            description: description.into(),
            priority,
            complexity,
            estimated_hours,
            user_value,
        }
    }

    fn spec(&self) -> FeatureSpec {
        let complexity = match self.complexity {
            0..=4 => Complexity::Low,
            5..=6 => Complexity::Medium,
            7..=8 => Complexity::High,
            _ => Complexity::VeryHigh,
        };
        FeatureSpec::new(&self.name, &self.description).with_complexity(complexity)
    }
}

/// One piece of the suggested stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechComponent {
    /// Layer, e.g. "Frontend".
    pub category: String,
    /// Technology name.
    pub name: String,
    /// What it is used for.
    pub description: String,
    /// Comparable options.
    pub alternatives: Vec<String>,
}

impl TechComponent {
    fn new(category: &str, name: &str, description: &str, alternatives: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            alternatives: alternatives.iter().map(|a| (*a).to_string()).collect(),
        }
    }
}

/// A development phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Phase {
    /// Phase name.
    pub name: String,
    /// Length in weeks.
    pub duration_weeks: u32,
    /// What happens.
    pub description: String,
}

/// A dated checkpoint in the plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Milestone {
    /// Milestone name.
    pub name: String,
    /// Week number, starting at 1.
    pub week: u32,
    /// What is delivered.
    pub description: String,
}

/// Phases and milestones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanTimeline {
    /// Whole weeks from kickoff to launch.
    pub total_weeks: u32,
    /// Phases in order.
    pub phases: Vec<Phase>,
    /// Milestones in order.
    pub milestones: Vec<Milestone>,
}

/// Calendar estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevelopmentTime {
    /// Weeks.
    pub weeks: f64,
    /// Months.
    pub months: f64,
}

/// Cost range summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostSummary {
    /// Labor only.
    pub min: f64,
    /// With contingency and infrastructure.
    pub max: f64,
    /// Planning figure between the two.
    pub total: f64,
    /// ISO currency code.
    pub currency: String,
}

/// A delivery risk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MvpRisk {
    /// What could go wrong.
    pub description: String,
    /// "Low", "Medium" or "High".
    pub probability: String,
    /// "Low", "Medium" or "High".
    pub impact: String,
    /// How to reduce it.
    pub mitigation: String,
}

/// Output of the MVP stage. Reviewed at the checkpoint when interactive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MvpPlan {
    /// Comparable MVPs from the vector store.
    pub similar_mvps: Vec<SimilarMvp>,
    /// Planned features, highest priority first.
    pub features: Vec<MvpFeature>,
    /// Suggested stack.
    pub tech_stack: Vec<TechComponent>,
    /// Phases and milestones.
    pub timeline: PlanTimeline,
    /// Full estimator output.
    pub estimate: MvpEstimate,
    /// Calendar estimate.
    pub development_time: DevelopmentTime,
    /// Cost range.
    pub cost_estimate: CostSummary,
    /// Plan assumptions.
    pub assumptions: Vec<String>,
    /// Delivery risks.
    pub risks: Vec<MvpRisk>,
    /// Always true: the plan is meant for human review.
    pub requires_user_approval: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProductShape {
    Mobile,
    Web,
    Generic,
}

impl ProductShape {
    fn of(idea: &StartupIdea) -> Self {
        let text = idea.searchable_text();
        let has_word = |w: &str| text.split(|c: char| !c.is_alphanumeric()).any(|t| t == w);
        if has_word("app") || text.contains("mobile") {
            Self::Mobile
        } else if text.contains("website") || has_word("web") || text.contains("platform") {
            Self::Web
        } else {
            Self::Generic
        }
    }
}

fn ratio_weeks(weeks: u32, ratio: f64, floor: u32) -> u32 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scaled = (f64::from(weeks) * ratio).round() as u32;
    scaled.max(floor)
}

/// Plans features, stack, cost and timeline for the idea.
#[derive(Clone)]
pub struct MvpStage {
    vectors: Arc<dyn VectorStore>,
    estimator: MvpEstimator,
}

impl MvpStage {
    /// Creates the stage with a default estimator.
    #[must_use]
    pub fn new(vectors: Arc<dyn VectorStore>) -> Self {
        Self {
            vectors,
            estimator: MvpEstimator::new(),
        }
    }

    /// Replaces the estimator.
    #[must_use]
    pub fn with_estimator(mut self, estimator: MvpEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    fn features(
        idea: &StartupIdea,
        shape: ProductShape,
        competitors: Option<&CompetitorAnalysis>,
        personas: Option<&PersonaSet>,
    ) -> Vec<MvpFeature> {
        let name = &idea.name;
        let core_value = personas
            .and_then(PersonaSet::primary)
            .and_then(|p| p.pain_points.first())
            .map_or_else(String::new, |pain| format!(", addressing: {pain}"));

        let mut features = match shape {
            ProductShape::Mobile => vec![
                MvpFeature::new("User Authentication", "Allow users to create accounts and log in", (10, 6, 40, 8)),
                MvpFeature::new(
                    "Core Functionality",
                    format!("Primary feature to deliver the main value proposition of {name}{core_value}"),
                    (10, 8, 80, 10),
                ),
                MvpFeature::new("User Profile", "Allow users to customize their profile and preferences", (7, 5, 30, 6)),
                MvpFeature::new("Basic Analytics", "Track key user actions and app performance metrics", (8, 7, 40, 5)),
                MvpFeature::new("Notifications", "Send relevant notifications to users", (6, 6, 30, 7)),
            ],
            ProductShape::Web => vec![
                MvpFeature::new("User Registration", "Allow users to register and manage their accounts", (9, 6, 40, 8)),
                MvpFeature::new(
                    "Core Platform Functionality",
                    format!("Main feature set that delivers the core value of {name}{core_value}"),
                    (10, 9, 100, 10),
                ),
                MvpFeature::new("Search and Discovery", "Allow users to find relevant content or services", (8, 7, 50, 9)),
                MvpFeature::new("Basic Dashboard", "Provide users with an overview of their activity and data", (7, 6, 40, 7)),
                MvpFeature::new(
                    "Integration with Payment Provider",
                    "Allow users to make payments (if applicable)",
                    (8, 8, 60, 9),
                ),
            ],
            ProductShape::Generic => vec![
                MvpFeature::new("User Account Management", "Allow users to create and manage their accounts", (9, 6, 40, 8)),
                MvpFeature::new(
                    "Core Value Proposition",
                    format!("Main functionality that delivers the core value of {name}{core_value}"),
                    (10, 8, 80, 10),
                ),
                MvpFeature::new("Basic User Interface", "Clean and intuitive interface for core functionality", (9, 7, 60, 9)),
                MvpFeature::new("Data Storage and Retrieval", "Store and retrieve user data securely", (8, 6, 40, 7)),
                MvpFeature::new("Feedback Mechanism", "Allow users to provide feedback on their experience", (6, 4, 20, 6)),
            ],
        };

        if let Some(gap) = competitors.and_then(|c| c.market_gaps.first()) {
            features.push(MvpFeature::new(
                "Differentiator",
                format!("{gap}, which few competitors offer"),
                (8, 6, 40, 9),
            ));
        }
        features.sort_by(|a, b| b.priority.cmp(&a.priority));
        features
    }

    fn tech_stack(shape: ProductShape) -> Vec<TechComponent> {
        let mut stack = vec![
            TechComponent::new(
                "Frontend",
                "React",
                "JavaScript library for building user interfaces",
                &["Vue.js", "Angular", "Svelte"],
            ),
            TechComponent::new(
                "Backend",
                "Node.js",
                "JavaScript runtime for server-side applications",
                &["Python/Django", "Ruby on Rails", "Java Spring"],
            ),
            TechComponent::new(
                "Database",
                "MongoDB",
                "NoSQL database for flexible data storage",
                &["PostgreSQL", "MySQL", "Firebase Firestore"],
            ),
            TechComponent::new(
                "Authentication",
                "Auth0",
                "Identity platform for authentication and authorization",
                &["Firebase Auth", "AWS Cognito", "Custom JWT"],
            ),
            TechComponent::new(
                "Deployment",
                "AWS",
                "Cloud platform for hosting and infrastructure",
                &["Google Cloud", "Microsoft Azure", "Heroku"],
            ),
        ];
        if shape == ProductShape::Mobile {
            stack.push(TechComponent::new(
                "Mobile Framework",
                "React Native",
                "Framework for building native mobile apps with React",
                &["Flutter", "Swift (iOS)", "Kotlin (Android)"],
            ));
        }
        stack
    }

    fn timeline(development_weeks: f64) -> PlanTimeline {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let weeks = (development_weeks.ceil().max(0.0) as u32).max(MIN_PLAN_WEEKS);
        let phase = |name: &str, ratio: f64, floor: u32, description: &str| Phase {
            name: name.to_string(),
            duration_weeks: ratio_weeks(weeks, ratio, floor),
            description: description.to_string(),
        };
        let milestone = |name: &str, week: u32, description: &str| Milestone {
            name: name.to_string(),
            week,
            description: description.to_string(),
        };
        PlanTimeline {
            total_weeks: weeks,
            phases: vec![
                phase("Planning and Setup", 0.1, 1, "Project planning, environment setup, and initial design"),
                phase("Core Development", 0.6, 2, "Implementing core features and functionality"),
                phase("Testing and Refinement", 0.2, 1, "Testing, bug fixing, and refining the user experience"),
                phase("Deployment and Launch", 0.1, 1, "Final preparations, deployment, and product launch"),
            ],
            milestones: vec![
                milestone("Project Kickoff", 1, "Team onboarding and project initialization"),
                milestone(
                    "Design Approval",
                    ratio_weeks(weeks, 0.15, 2),
                    "Finalization and approval of UX/UI design",
                ),
                milestone(
                    "Alpha Release",
                    ratio_weeks(weeks, 0.5, 3),
                    "Internal testing version with core features implemented",
                ),
                milestone(
                    "Beta Release",
                    ratio_weeks(weeks, 0.8, 4),
                    "External testing version with most features implemented",
                ),
                milestone("MVP Launch", weeks, "Public release of the minimum viable product"),
            ],
        }
    }

    fn assumptions(idea: &StartupIdea) -> Vec<String> {
        vec![
            format!("Target users will find {} valuable enough to sign up and use regularly", idea.name),
            "The proposed tech stack will be sufficient to handle expected initial user load".to_string(),
            "Development team has or can quickly acquire the necessary skills for the tech stack".to_string(),
            "The MVP feature set will demonstrate enough value to validate the core idea".to_string(),
            "External services and APIs integrated in the MVP will remain stable and available".to_string(),
        ]
    }

    fn risks(competitors: Option<&CompetitorAnalysis>) -> Vec<MvpRisk> {
        let risk = |description: &str, probability: &str, impact: &str, mitigation: &str| MvpRisk {
            description: description.to_string(),
            probability: probability.to_string(),
            impact: impact.to_string(),
            mitigation: mitigation.to_string(),
        };
        let crowded = competitors.is_some_and(|c| c.direct_competitors >= 3);
        vec![
            risk(
                "Development timeline may extend beyond estimates",
                "Medium",
                "Medium",
                "Include buffer time in estimates and prioritize features strictly",
            ),
            risk(
                "User adoption may be slower than expected",
                "Medium",
                "High",
                "Plan for marketing and user acquisition strategies before launch",
            ),
            risk(
                "Critical technical issues may arise during development",
                "Medium",
                "High",
                "Build in time for technical spikes and prototyping of complex features",
            ),
            risk(
                "Competitors may release similar solutions before MVP launch",
                if crowded { "High" } else { "Low" },
                "Medium",
                "Monitor market closely and be prepared to adjust positioning",
            ),
            risk(
                "Cost overruns due to unforeseen complications",
                "Medium",
                "Medium",
                "Include contingency budget and identify non-essential features that could be cut",
            ),
        ]
    }
}

impl fmt::Debug for MvpStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MvpStage")
            .field("vectors", &self.vectors.name())
            .field("estimator", &self.estimator)
            .finish()
    }
}

#[async_trait]
impl Stage for MvpStage {
    fn id(&self) -> StageId {
        StageId::Mvp
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let idea = ctx.idea();
        let competitors = ctx.precursor_as::<CompetitorAnalysis>(StageId::Competitor);
        let personas = ctx.precursor_as::<PersonaSet>(StageId::Persona);

        let similar_mvps = match self.vectors.similar(&idea.summary_text(), SIMILAR_MVP_LIMIT).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(store = self.vectors.name(), error = %e, "Similar MVP lookup failed");
                Vec::new()
            }
        };
        if ctx.is_cancelled() {
            return StageOutput::cancel("cancelled during MVP planning");
        }

        let shape = ProductShape::of(idea);
        let features = Self::features(idea, shape, competitors.as_ref(), personas.as_ref());
        let tech_stack = Self::tech_stack(shape);
        let specs: Vec<FeatureSpec> = features.iter().map(MvpFeature::spec).collect();
        let names: Vec<String> = tech_stack.iter().map(|t| t.name.clone()).collect();
        let estimate = self.estimator.estimate(&specs, &names, None);

        let cost = &estimate.total_cost;
        let plan = MvpPlan {
            similar_mvps,
            timeline: Self::timeline(estimate.timeline.weeks),
            development_time: DevelopmentTime {
                weeks: estimate.timeline.weeks,
                months: estimate.timeline.months,
            },
            cost_estimate: CostSummary {
                min: cost.min,
                max: cost.max,
                total: ((cost.min + cost.max) / 200.0).round() * 100.0,
                currency: cost.currency.clone(),
            },
            assumptions: Self::assumptions(idea),
            risks: Self::risks(competitors.as_ref()),
            features,
            tech_stack,
            estimate,
            requires_user_approval: true,
        };
        ctx.try_emit(
            "stage.mvp.planned",
            serde_json::json!({"features": plan.features.len(), "weeks": plan.development_time.weeks}),
        );
        StageOutput::ok_typed(&plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageResult;
    use crate::errors::ProviderError;
    use crate::providers::{InMemoryVectorStore, MockVectorStore};
    use crate::stages::test_support::context;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn plan_for(idea: StartupIdea, prior: Vec<StageResult>) -> MvpPlan {
        let stage = MvpStage::new(Arc::new(InMemoryVectorStore::seeded()));
        let output = stage.execute(&context(StageId::Mvp, idea, prior)).await;
        assert!(output.is_success());
        serde_json::from_value(output.payload.unwrap()).unwrap()
    }

    #[test]
    fn test_product_shape() {
        assert_eq!(ProductShape::of(&StartupIdea::new("A", "A mobile app for runners")), ProductShape::Mobile);
        assert_eq!(ProductShape::of(&StartupIdea::new("A", "A web platform for tutors")), ProductShape::Web);
        assert_eq!(ProductShape::of(&StartupIdea::new("A", "A better approach to filing")), ProductShape::Generic);
    }

    #[test]
    fn test_timeline_milestones() {
        let timeline = MvpStage::timeline(9.4);
        assert_eq!(timeline.total_weeks, 10);
        let weeks: Vec<u32> = timeline.milestones.iter().map(|m| m.week).collect();
        assert_eq!(weeks, vec![1, 2, 5, 8, 10]);
        let phases: Vec<u32> = timeline.phases.iter().map(|p| p.duration_weeks).collect();
        assert_eq!(phases, vec![1, 6, 2, 1]);
    }

    #[test]
    fn test_short_timeline_uses_floor() {
        let timeline = MvpStage::timeline(1.3);
        assert_eq!(timeline.total_weeks, 4);
        assert_eq!(timeline.milestones[3].week, 4);
    }

    #[tokio::test]
    async fn test_mobile_plan() {
        let plan = plan_for(StartupIdea::new("FreshMeal", "A mobile app for healthy meal kits"), Vec::new()).await;

        assert!(plan.requires_user_approval);
        assert_eq!(plan.features.len(), 5);
        assert_eq!(plan.features[0].name, "User Authentication");
        assert!(plan.tech_stack.iter().any(|t| t.name == "React Native"));
        assert!(!plan.similar_mvps.is_empty());
        assert!(plan.development_time.weeks > 0.0);
        assert!(plan.cost_estimate.min <= plan.cost_estimate.total);
        assert!(plan.cost_estimate.total <= plan.cost_estimate.max);
        assert_eq!(plan.cost_estimate.currency, "USD");
        assert_eq!(plan.risks.len(), 5);
    }

    #[tokio::test]
    async fn test_prior_results_shape_plan() {
        let competitor = StageResult::completed(
            StageId::Competitor,
            json!({"market_gaps": ["Nutrition tracking"], "direct_competitors": 4}),
            Utc::now(),
            1,
        );
        let persona = StageResult::completed(
            StageId::Persona,
            json!({"personas": [{"name": "Alex", "pain_points": ["Weeknight dinners take too long"]}]}),
            Utc::now(),
            1,
        );
        let plan = plan_for(
            StartupIdea::new("FreshMeal", "A web platform for meal kits"),
            vec![competitor, persona],
        )
        .await;

        assert!(plan.features.iter().any(|f| f.name == "Differentiator"
            && f.description.starts_with("Nutrition tracking")));
        let core = plan
            .features
            .iter()
            .find(|f| f.name == "Core Platform Functionality")
            .unwrap();
        assert!(core.description.ends_with("Weeknight dinners take too long"));
        assert_eq!(plan.risks[3].probability, "High");
        assert!(!plan.tech_stack.iter().any(|t| t.name == "React Native"));
    }

    #[tokio::test]
    async fn test_vector_failure_is_not_fatal() {
        let mut vectors = MockVectorStore::new();
        vectors.expect_name().return_const("mock-vectors");
        vectors.expect_similar().returning(|_, _| {
            Err(ProviderError::Transport {
                provider: "mock-vectors".to_string(),
                message: "connection refused".to_string(),
            })
        });

        let stage = MvpStage::new(Arc::new(vectors));
        let output = stage
            .execute(&context(StageId::Mvp, StartupIdea::new("A", "B"), Vec::new()))
            .await;

        let plan: MvpPlan = serde_json::from_value(output.payload.unwrap()).unwrap();
        assert!(plan.similar_mvps.is_empty());
        assert_eq!(plan.features[0].priority, 10);
    }
}
