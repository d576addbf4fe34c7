//! Rule-based MVP cost and timeline estimation.
//!
//! Hours come from feature complexity scaled by the technology stack, roles
//! are allocated from the total, and cost and calendar time follow from the
//! roles. All figures are deterministic for a given input.

use crate::utils::contains_any;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const CURRENCY: &str = "USD";
const SMALL_PROJECT_HOURS: f64 = 120.0;
const HOURS_PER_WEEK: f64 = 40.0;
const WEEKS_PER_MONTH: f64 = 4.33;

const RATE_FRONTEND: f64 = 50.0;
const RATE_BACKEND: f64 = 60.0;
const RATE_FULLSTACK: f64 = 65.0;
const RATE_DESIGNER: f64 = 55.0;
const RATE_DEVOPS: f64 = 70.0;
const RATE_PM: f64 = 65.0;
const RATE_QA: f64 = 45.0;

const TECH_MULTIPLIERS: [(&str, f64); 31] = [
    ("html_css", 0.8),
    ("react", 1.0),
    ("angular", 1.1),
    ("vue", 1.0),
    ("flutter", 1.2),
    ("react_native", 1.2),
    ("node_js", 1.0),
    ("express", 0.9),
    ("django", 1.0),
    ("flask", 0.9),
    ("rails", 1.0),
    ("laravel", 1.0),
    ("spring_boot", 1.2),
    ("sqlite", 0.7),
    ("mysql", 0.9),
    ("postgresql", 1.0),
    ("mongodb", 1.0),
    ("firebase", 0.9),
    ("dynamodb", 1.1),
    ("aws", 1.1),
    ("azure", 1.1),
    ("gcp", 1.1),
    ("heroku", 0.8),
    ("netlify", 0.8),
    ("vercel", 0.8),
    ("ai_integration", 1.4),
    ("payment_processing", 1.2),
    ("authentication", 1.0),
    ("third_party_apis", 1.1),
    ("realtime_features", 1.3),
    ("offline_support", 1.2),
];

const DEVELOPER_ROLES: [&str; 4] = [
    "Frontend Developer",
    "Backend Developer",
    "Fullstack Developer",
    "Mobile Developer",
];

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round_hundreds(value: f64) -> f64 {
    (value / 100.0).round() * 100.0
}

/// Complexity of a feature or of a whole MVP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    /// About a week of work.
    Low,
    /// About two weeks.
    #[default]
    Medium,
    /// About four weeks.
    High,
    /// About eight weeks.
    VeryHigh,
}

impl Complexity {
    /// Baseline hours for a whole MVP at this complexity.
    #[must_use]
    pub fn base_hours(&self) -> f64 {
        match self {
            Self::Low => 40.0,
            Self::Medium => 80.0,
            Self::High => 160.0,
            Self::VeryHigh => 320.0,
        }
    }

    /// Blended hourly rate for feature costing.
    #[must_use]
    pub fn feature_rate(&self) -> f64 {
        match self {
            Self::Low => 50.0,
            Self::Medium => 60.0,
            Self::High => 70.0,
            Self::VeryHigh => 80.0,
        }
    }

    fn score(self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 2.0,
            Self::High => 3.0,
            Self::VeryHigh => 4.0,
        }
    }

    fn from_score(score: f64) -> Self {
        if score < 1.5 {
            Self::Low
        } else if score < 2.5 {
            Self::Medium
        } else if score < 3.5 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::VeryHigh => write!(f, "very_high"),
        }
    }
}

impl FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "very_high" => Ok(Self::VeryHigh),
            other => Err(format!("unknown complexity '{other}'")),
        }
    }
}

/// A feature to estimate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// Feature name.
    pub name: String,
    /// What it does.
    #[serde(default)]
    pub description: String,
    /// Explicit complexity; the overall complexity applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
}

impl FeatureSpec {
    /// Creates a feature without an explicit complexity.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            complexity: None,
        }
    }

    /// Sets the complexity.
    #[must_use]
    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = Some(complexity);
        self
    }
}

/// A min/max cost range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
    /// ISO currency code.
    pub currency: String,
}

/// Hours and cost for one feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureEstimate {
    /// Feature name.
    pub name: String,
    /// What it does.
    pub description: String,
    /// Effective complexity.
    pub complexity: Complexity,
    /// Development hours.
    pub hours: f64,
    /// Cost range.
    pub cost: CostRange,
}

/// One role on the team.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    /// Role title.
    pub role: String,
    /// Hours allocated.
    pub hours: f64,
    /// Cost, rounded to hundreds.
    pub cost: f64,
}

/// Where the money goes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Sum of role costs.
    pub labor: f64,
    /// 15 % of labor.
    pub contingency: f64,
    /// Tooling and hosting, at least 500.
    pub infrastructure: f64,
}

/// Total project cost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Labor only.
    pub min: f64,
    /// Labor plus contingency and infrastructure.
    pub max: f64,
    /// ISO currency code.
    pub currency: String,
    /// Components of the maximum.
    pub breakdown: CostBreakdown,
}

/// Calendar duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Calendar weeks including buffer.
    pub weeks: f64,
    /// Weeks expressed in months.
    pub months: f64,
}

/// Result of [`MvpEstimator::estimate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MvpEstimate {
    /// Overall complexity.
    pub overall_complexity: Complexity,
    /// Baseline hours for the overall complexity, scaled by the stack.
    pub total_hours: f64,
    /// Stack multiplier applied to hours.
    pub tech_multiplier: f64,
    /// Project cost.
    pub total_cost: CostEstimate,
    /// Calendar time.
    pub timeline: Timeline,
    /// Per-feature breakdown.
    pub feature_estimates: Vec<FeatureEstimate>,
    /// Team composition.
    pub resource_requirements: Vec<ResourceAllocation>,
    /// What the estimate takes for granted.
    pub assumptions: Vec<String>,
    /// What could move the estimate.
    pub risks: Vec<String>,
}

/// Estimates MVP cost, team and timeline from features and a tech stack.
#[derive(Debug, Clone, Copy)]
pub struct MvpEstimator {
    cost_multiplier: f64,
}

impl Default for MvpEstimator {
    fn default() -> Self {
        Self { cost_multiplier: 1.0 }
    }
}

impl MvpEstimator {
    /// An estimator at US-average rates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scales every hourly rate, e.g. `0.6` for a lower-cost region.
    #[must_use]
    pub fn with_cost_multiplier(mut self, multiplier: f64) -> Self {
        self.cost_multiplier = if multiplier > 0.0 { multiplier } else { 1.0 };
        self
    }

    /// Normalises a technology name to its multiplier key.
    #[must_use]
    pub fn normalize_tech(name: &str) -> String {
        let key = name.trim().to_lowercase().replace([' ', '-', '.'], "_");
        match key.as_str() {
            "react_js" | "reactjs" => "react".to_string(),
            "nodejs" | "node" => "node_js".to_string(),
            "postgres" => "postgresql".to_string(),
            "mongo" => "mongodb".to_string(),
            "firebase_firestore" => "firebase".to_string(),
            "aws_dynamodb" => "dynamodb".to_string(),
            "google_cloud" | "google_cloud_platform" => "gcp".to_string(),
            _ => key,
        }
    }

    fn known_multiplier(name: &str) -> Option<f64> {
        let key = Self::normalize_tech(name);
        TECH_MULTIPLIERS
            .iter()
            .find(|(tech, _)| *tech == key)
            .map(|(_, multiplier)| *multiplier)
    }

    /// Average multiplier of the recognised technologies, scaled up slightly
    /// for larger stacks. `1.0` when nothing is recognised.
    #[must_use]
    pub fn tech_multiplier(tech_stack: &[String]) -> f64 {
        let known: Vec<f64> = tech_stack.iter().filter_map(|t| Self::known_multiplier(t)).collect();
        if known.is_empty() {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let average = known.iter().sum::<f64>() / known.len() as f64;
        #[allow(clippy::cast_precision_loss)]
        let stack_factor = 1.0 + (tech_stack.len().saturating_sub(1).min(5)) as f64 * 0.03;
        average * stack_factor
    }

    /// Overall complexity from feature complexities and the stack.
    #[must_use]
    pub fn overall_complexity(features: &[FeatureSpec], tech_stack: &[String]) -> Complexity {
        #[allow(clippy::cast_precision_loss)]
        let feature_score = if features.is_empty() {
            2.0
        } else {
            features
                .iter()
                .map(|f| f.complexity.unwrap_or_default().score())
                .sum::<f64>()
                / features.len() as f64
        };
        let known: Vec<f64> = tech_stack.iter().filter_map(|t| Self::known_multiplier(t)).collect();
        #[allow(clippy::cast_precision_loss)]
        let tech_score = if known.is_empty() {
            1.0
        } else {
            known.iter().sum::<f64>() / known.len() as f64
        };
        Complexity::from_score(feature_score * 0.7 + tech_score * 0.3 * 4.0)
    }

    /// Runs the full estimate. `complexity` overrides the computed overall
    /// complexity.
    #[must_use]
    pub fn estimate(
        &self,
        features: &[FeatureSpec],
        tech_stack: &[String],
        complexity: Option<Complexity>,
    ) -> MvpEstimate {
        let overall = complexity.unwrap_or_else(|| Self::overall_complexity(features, tech_stack));
        let tech_multiplier = Self::tech_multiplier(tech_stack);

        let feature_estimates = self.feature_estimates(features, overall, tech_multiplier);
        let resource_requirements = self.resources(&feature_estimates, tech_stack);
        let total_cost = Self::total_cost(&resource_requirements);
        let timeline = Self::timeline(&resource_requirements);
        let (assumptions, risks) = Self::assumptions_and_risks(overall, tech_stack);

        tracing::debug!(
            complexity = %overall,
            features = features.len(),
            weeks = timeline.weeks,
            "MVP estimated"
        );

        MvpEstimate {
            overall_complexity: overall,
            total_hours: round1(overall.base_hours() * tech_multiplier),
            tech_multiplier,
            total_cost,
            timeline,
            feature_estimates,
            resource_requirements,
            assumptions,
            risks,
        }
    }

    fn feature_estimates(
        &self,
        features: &[FeatureSpec],
        overall: Complexity,
        tech_multiplier: f64,
    ) -> Vec<FeatureEstimate> {
        let rate = overall.feature_rate() * self.cost_multiplier;
        features
            .iter()
            .map(|feature| {
                let complexity = feature.complexity.unwrap_or(overall);
                let hours = complexity.base_hours() / 4.0 * tech_multiplier;
                let cost = hours * rate;
                FeatureEstimate {
                    name: feature.name.clone(),
                    description: feature.description.clone(),
                    complexity,
                    hours: round1(hours),
                    cost: CostRange {
                        min: round_hundreds(cost * 0.8),
                        max: round_hundreds(cost * 1.2),
                        currency: CURRENCY.to_string(),
                    },
                }
            })
            .collect()
    }

    fn allocation(&self, role: &str, hours: f64, rate: f64) -> ResourceAllocation {
        ResourceAllocation {
            role: role.to_string(),
            hours: round1(hours),
            cost: round_hundreds(rate * hours * self.cost_multiplier),
        }
    }

    fn resources(&self, features: &[FeatureEstimate], tech_stack: &[String]) -> Vec<ResourceAllocation> {
        let stack = tech_stack.join(" ");
        let has_frontend = contains_any(&stack, &["react", "angular", "vue", "html", "css", "frontend"]);
        let has_backend = contains_any(&stack, &["node", "express", "django", "flask", "rails", "backend", "api"]);
        let has_mobile = contains_any(&stack, &["flutter", "react native", "ios", "android", "mobile"]);
        let has_cloud = contains_any(&stack, &["aws", "azure", "gcp", "docker", "kubernetes"]);

        let total: f64 = features.iter().map(|f| f.hours).sum();
        if total < SMALL_PROJECT_HOURS {
            return vec![self.allocation("Fullstack Developer", total * 1.1, RATE_FULLSTACK)];
        }

        let mut resources = vec![self.allocation("UI/UX Designer", total * 0.15, RATE_DESIGNER)];
        if has_frontend || has_mobile {
            let role = if has_frontend { "Frontend Developer" } else { "Mobile Developer" };
            resources.push(self.allocation(role, total * 0.35, RATE_FRONTEND));
        }
        if has_backend {
            resources.push(self.allocation("Backend Developer", total * 0.4, RATE_BACKEND));
        }
        if !(has_frontend || has_mobile || has_backend) {
            resources.push(self.allocation("Fullstack Developer", total * 0.75, RATE_FULLSTACK));
        }
        if has_cloud {
            resources.push(self.allocation("DevOps Engineer", total * 0.05, RATE_DEVOPS));
        }
        resources.push(self.allocation("Project Manager", total * 0.15, RATE_PM));
        resources.push(self.allocation("QA Tester", total * 0.1, RATE_QA));
        resources
    }

    fn total_cost(resources: &[ResourceAllocation]) -> CostEstimate {
        let labor: f64 = resources.iter().map(|r| r.cost).sum();
        let contingency = labor * 0.15;
        let infrastructure = (labor * 0.05).max(500.0);
        CostEstimate {
            min: round_hundreds(labor),
            max: round_hundreds(labor + contingency + infrastructure),
            currency: CURRENCY.to_string(),
            breakdown: CostBreakdown {
                labor: round_hundreds(labor),
                contingency: round_hundreds(contingency),
                infrastructure: round_hundreds(infrastructure),
            },
        }
    }

    fn timeline(resources: &[ResourceAllocation]) -> Timeline {
        let hours: f64 = resources.iter().map(|r| r.hours).sum();
        let developers = resources
            .iter()
            .filter(|r| DEVELOPER_ROLES.contains(&r.role.as_str()))
            .count();
        #[allow(clippy::cast_precision_loss)]
        let parallel = if developers <= 1 {
            1.0
        } else {
            1.0 + (developers - 1) as f64 * 0.6
        };
        let calendar = hours / HOURS_PER_WEEK / parallel;
        let buffer = if calendar < 4.0 {
            1.0
        } else if calendar < 8.0 {
            2.0
        } else {
            3.0
        };
        let weeks = calendar + buffer;
        Timeline {
            weeks: round1(weeks),
            months: round1(weeks / WEEKS_PER_MONTH),
        }
    }

    fn assumptions_and_risks(complexity: Complexity, tech_stack: &[String]) -> (Vec<String>, Vec<String>) {
        let stack = tech_stack.join(" ");

        let mut assumptions = vec![
            "The client will provide timely feedback during development.".to_string(),
            "The scope of the MVP will remain fixed during development.".to_string(),
            "The estimates assume normal business hours and no unexpected delays.".to_string(),
        ];
        if contains_any(&stack, &["react", "angular", "vue"]) {
            assumptions.push(
                "Front-end developers have experience with the specified JavaScript framework.".to_string(),
            );
        }
        if contains_any(&stack, &["flutter", "react native"]) {
            assumptions.push(
                "Mobile app development will target both iOS and Android through a cross-platform framework."
                    .to_string(),
            );
        }
        if contains_any(&stack, &["aws", "azure", "gcp", "cloud"]) {
            assumptions.push("Cloud infrastructure costs are not included in the development estimate.".to_string());
        }

        let mut risks = vec![
            "Scope creep could extend the timeline and increase costs.".to_string(),
            "Integration with third-party services may introduce unexpected challenges.".to_string(),
        ];
        if complexity >= Complexity::High {
            risks.push(
                "The high complexity of the project increases the risk of unforeseen technical challenges."
                    .to_string(),
            );
            risks.push("The timeline may need to be extended if technical difficulties arise.".to_string());
        }
        if contains_any(&stack, &["payment", "stripe"]) {
            risks.push(
                "Payment processing integration requires additional security considerations and testing."
                    .to_string(),
            );
        }
        let lowered = stack.to_lowercase();
        let mentions_ai = lowered
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word == "ai")
            || lowered.contains("machine learning");
        if mentions_ai {
            risks.push(
                "AI/ML features may require additional refinement and data to achieve desired performance."
                    .to_string(),
            );
        }
        (assumptions, risks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stack(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn test_complexity_parse() {
        assert_eq!("very high".parse::<Complexity>(), Ok(Complexity::VeryHigh));
        assert_eq!("LOW".parse::<Complexity>(), Ok(Complexity::Low));
        assert!("extreme".parse::<Complexity>().is_err());
        assert_eq!(Complexity::VeryHigh.to_string(), "very_high");
    }

    #[test]
    fn test_normalize_tech() {
        assert_eq!(MvpEstimator::normalize_tech("Node.js"), "node_js");
        assert_eq!(MvpEstimator::normalize_tech("React Native"), "react_native");
        assert_eq!(MvpEstimator::normalize_tech("Postgres"), "postgresql");
    }

    #[test]
    fn test_tech_multiplier() {
        assert_eq!(MvpEstimator::tech_multiplier(&[]), 1.0);
        assert_eq!(MvpEstimator::tech_multiplier(&stack(&["Cobol"])), 1.0);
        let default_stack = stack(&["React", "Node.js", "MongoDB", "Auth0", "AWS"]);
        let multiplier = MvpEstimator::tech_multiplier(&default_stack);
        assert!((multiplier - 1.025 * 1.12).abs() < 1e-9);
    }

    #[test]
    fn test_small_project_uses_one_fullstack_developer() {
        let features = vec![FeatureSpec::new("Login", "Sign in").with_complexity(Complexity::Low)];
        let estimate = MvpEstimator::new().estimate(&features, &stack(&["React"]), None);

        assert_eq!(estimate.overall_complexity, Complexity::Medium);
        assert_eq!(estimate.feature_estimates[0].hours, 10.0);
        assert_eq!(estimate.feature_estimates[0].cost.min, 500.0);
        assert_eq!(estimate.feature_estimates[0].cost.max, 700.0);
        assert_eq!(estimate.resource_requirements.len(), 1);
        assert_eq!(estimate.resource_requirements[0].role, "Fullstack Developer");
        assert_eq!(estimate.resource_requirements[0].hours, 11.0);
        assert_eq!(estimate.total_cost.min, 700.0);
        assert_eq!(estimate.total_cost.max, 1300.0);
        assert_eq!(estimate.timeline.weeks, 1.3);
        assert_eq!(estimate.timeline.months, 0.3);
    }

    #[test]
    fn test_larger_project_allocates_roles() {
        let features = vec![
            FeatureSpec::new("Accounts", ""),
            FeatureSpec::new("Catalog", ""),
            FeatureSpec::new("Checkout", ""),
        ];
        let estimate = MvpEstimator::new().estimate(&features, &stack(&["React", "Node.js"]), None);

        assert_eq!(estimate.overall_complexity, Complexity::High);
        let roles: Vec<&str> = estimate
            .resource_requirements
            .iter()
            .map(|r| r.role.as_str())
            .collect();
        assert_eq!(
            roles,
            vec!["UI/UX Designer", "Frontend Developer", "Backend Developer", "Project Manager", "QA Tester"]
        );
        assert_eq!(estimate.total_cost.min, 8000.0);
        assert_eq!(estimate.total_cost.max, 9700.0);
        assert_eq!(estimate.total_cost.breakdown.contingency, 1200.0);
        assert_eq!(estimate.timeline.weeks, 3.2);
        assert!(estimate.risks.iter().any(|r| r.contains("high complexity")));
    }

    #[test]
    fn test_explicit_complexity_and_cost_multiplier() {
        let features = vec![FeatureSpec::new("Login", "")];
        let base = MvpEstimator::new().estimate(&features, &[], Some(Complexity::Low));
        let cheap = MvpEstimator::new()
            .with_cost_multiplier(0.5)
            .estimate(&features, &[], Some(Complexity::Low));

        assert_eq!(base.overall_complexity, Complexity::Low);
        assert_eq!(base.total_hours, 40.0);
        assert!(cheap.total_cost.breakdown.labor < base.total_cost.breakdown.labor);
    }

    #[test]
    fn test_stack_keywords_drive_notes() {
        let estimate = MvpEstimator::new().estimate(
            &[FeatureSpec::new("Pay", "")],
            &stack(&["Flutter", "Stripe payment", "AWS"]),
            None,
        );
        assert!(estimate.assumptions.iter().any(|a| a.contains("iOS and Android")));
        assert!(estimate.assumptions.iter().any(|a| a.contains("Cloud infrastructure")));
        assert!(estimate.risks.iter().any(|r| r.contains("Payment processing")));
    }
}
