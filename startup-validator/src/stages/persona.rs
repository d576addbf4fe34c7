//! Customer persona stage.

use super::{CompetitorAnalysis, MarketAnalysis, Stage};
use crate::context::StageContext;
use crate::core::{StageId, StageOutput, StartupIdea};
use crate::providers::{CompletionRequest, LlmClient, PromptKind};
use crate::utils::{contains_any, split_list};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Low / medium / high rating derived from a 1-10 score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Below 5.
    #[default]
    Low,
    /// 5 to 7.
    Medium,
    /// 8 and above.
    High,
}

impl Level {
    /// Level for a 1-10 rating.
    #[must_use]
    pub fn from_rating(rating: u8) -> Self {
        match rating {
            8..=u8::MAX => Self::High,
            5..=7 => Self::Medium,
            _ => Self::Low,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Target audience traits, one list per profile heading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudienceCharacteristics {
    /// Demographic traits.
    pub demographics: Vec<String>,
    /// Attitudes and values.
    pub psychographics: Vec<String>,
    /// Observable behaviors.
    pub behaviors: Vec<String>,
    /// Needs and pain points.
    pub needs: Vec<String>,
}

enum Heading<'a> {
    Known(&'static str, &'a str),
    Other,
    Plain,
}

/// Classifies a `Label: value` line. A label is a few words of letters;
/// anything else before the colon (times, ratios, sentences) is content.
fn heading(line: &str) -> Heading<'_> {
    let Some((raw, value)) = line.split_once(':') else {
        return Heading::Plain;
    };
    let label = raw.trim().trim_start_matches(['-', '*']).trim();
    let is_label = !label.is_empty()
        && label.split_whitespace().count() <= 3
        && label.chars().all(|c| c.is_alphabetic() || c == ' ' || c == '&' || c == '/');
    if !is_label {
        return Heading::Plain;
    }
    match label.to_lowercase().as_str() {
        "demographics" => Heading::Known("demographics", value),
        "psychographics" => Heading::Known("psychographics", value),
        "behaviors" | "behaviours" => Heading::Known("behaviors", value),
        "needs" => Heading::Known("needs", value),
        _ => Heading::Other,
    }
}

impl AudienceCharacteristics {
    /// Parses `Demographics:`, `Psychographics:`, `Behaviors:` and `Needs:`
    /// lines. Unlabelled lines continue the previous heading. Lines under any
    /// other label are skipped until the next known heading.
    #[must_use]
    pub fn parse(answer: &str) -> Self {
        let mut parsed = Self::default();
        let mut current: Option<&'static str> = None;
        for line in answer.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let value = match heading(line) {
                Heading::Known(key, value) => {
                    current = Some(key);
                    value
                }
                Heading::Other => {
                    current = None;
                    continue;
                }
                Heading::Plain => line,
            };
            if let Some(key) = current {
                parsed.list_mut(key).extend(split_list(value));
            }
        }
        parsed
    }

    fn list_mut(&mut self, key: &str) -> &mut Vec<String> {
        match key {
            "demographics" => &mut self.demographics,
            "psychographics" => &mut self.psychographics,
            "behaviors" => &mut self.behaviors,
            _ => &mut self.needs,
        }
    }

    /// Whether every list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.demographics.is_empty()
            && self.psychographics.is_empty()
            && self.behaviors.is_empty()
            && self.needs.is_empty()
    }

    fn from_idea(idea: &StartupIdea) -> Self {
        Self {
            demographics: idea
                .target_audience
                .as_deref()
                .map(split_list)
                .unwrap_or_else(|| vec!["General consumers".to_string()]),
            psychographics: Vec::new(),
            behaviors: Vec::new(),
            needs: vec![idea
                .problem_statement
                .clone()
                .unwrap_or_else(|| idea.description.clone())],
        }
    }
}

/// A need or pain point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserNeed {
    /// What the persona needs.
    pub description: String,
    /// 1-10.
    pub severity: u8,
    /// How the persona copes today.
    pub current_solutions: Vec<String>,
}

/// A recurring behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserBehavior {
    /// When or where it happens.
    pub context: String,
    /// How often.
    pub frequency: String,
    /// Why.
    pub motivation: String,
    /// What gets in the way.
    pub friction_points: Vec<String>,
}

/// One customer persona.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    /// Display name.
    pub name: String,
    /// Age in years.
    pub age: u8,
    /// Job or role.
    pub occupation: String,
    /// Free-form demographic facts.
    pub demographic_info: BTreeMap<String, String>,
    /// What the persona wants to achieve.
    pub goals: Vec<String>,
    /// Needs, primary first.
    pub needs: Vec<UserNeed>,
    /// Recurring behaviors.
    pub behaviors: Vec<UserBehavior>,
    /// 1-10.
    pub tech_proficiency: u8,
    /// 1-10.
    pub buying_power: u8,
    /// A representative quote.
    pub quote: String,
    /// Need descriptions, most severe first.
    pub pain_points: Vec<String>,
    /// From the most severe need.
    pub pain_level: Level,
    /// From buying power.
    pub willingness_to_pay: Level,
}

impl Persona {
    fn finish(mut self) -> Self {
        let mut ranked: Vec<&UserNeed> = self.needs.iter().collect();
        ranked.sort_by(|a, b| b.severity.cmp(&a.severity));
        self.pain_points = ranked.iter().map(|n| n.description.clone()).collect();
        self.pain_level = Level::from_rating(self.needs.iter().map(|n| n.severity).max().unwrap_or(0));
        self.willingness_to_pay = Level::from_rating(self.buying_power);
        self
    }
}

/// Output of the persona stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaSet {
    /// The audience profile the personas were drawn from.
    pub audience_characteristics: AudienceCharacteristics,
    /// Primary persona first.
    pub personas: Vec<Persona>,
}

impl PersonaSet {
    /// The primary persona.
    #[must_use]
    pub fn primary(&self) -> Option<&Persona> {
        self.personas.first()
    }
}

fn occupation_for(audience: &str) -> &'static str {
    let rules: [(&[&str], &'static str); 6] = [
        (&["parent", "mother", "father", "famil"], "Working Parent"),
        (&["student", "university", "college"], "University Student"),
        (&["developer", "engineer", "programmer"], "Software Developer"),
        (&["freelanc"], "Independent Freelancer"),
        (&["business", "owner", "entrepreneur", "founder"], "Small Business Owner"),
        (&["professional", "manager", "executive"], "Busy Professional"),
    ];
    rules
        .iter()
        .find(|(needles, _)| contains_any(audience, needles))
        .map_or("Early Adopter", |(_, occupation)| *occupation)
}

fn buying_power_for(audience: &str) -> u8 {
    if contains_any(audience, &["executive", "enterprise", "high income", "affluent"]) {
        9
    } else if contains_any(audience, &["professional", "business", "owner", "manager"]) {
        7
    } else if contains_any(audience, &["student", "budget", "low income", "unemployed"]) {
        4
    } else {
        6
    }
}

/// Builds two personas for the idea from an LLM audience profile.
#[derive(Clone)]
pub struct PersonaStage {
    llm: Arc<dyn LlmClient>,
}

impl PersonaStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn request(idea: &StartupIdea, market: Option<&MarketAnalysis>) -> CompletionRequest {
        let market_summary = market.map_or_else(
            || "N/A".to_string(),
            |m| {
                format!(
                    "direction {}, growth {}%, insights: {}",
                    m.market_direction,
                    m.growth_rate,
                    m.key_insights.join("; ")
                )
            },
        );
        CompletionRequest::new(
            PromptKind::AudienceProfile,
            format!(
                "Based on the following startup idea and market analysis, identify key characteristics \
                 of the target audience. Consider demographics, psychographics, behaviors, and needs.\n\n\
                 Startup idea: {}\nMarket analysis: {market_summary}\n\n\
                 Return the audience characteristics in the following format:\n\
                 Demographics: [key demographic traits]\n\
                 Psychographics: [key psychographic traits]\n\
                 Behaviors: [key behaviors]\n\
                 Needs: [key needs and pain points]",
                idea.summary_text()
            ),
            idea.summary_text(),
        )
    }

    fn build(
        idea: &StartupIdea,
        traits: &AudienceCharacteristics,
        competitors: Option<&CompetitorAnalysis>,
    ) -> Vec<Persona> {
        let audience = idea
            .target_audience
            .clone()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| traits.demographics.join(", "));
        let category = idea.category.as_deref().unwrap_or("this space");
        let problem = idea
            .problem_statement
            .clone()
            .unwrap_or_else(|| idea.description.clone());
        let online = contains_any(&traits.behaviors.join(" "), &["online", "app", "mobile", "digital"]);

        let mut current_solutions: Vec<String> = competitors
            .map(|c| c.competitors.iter().take(3).map(|p| p.name.clone()).collect())
            .unwrap_or_default();
        if current_solutions.is_empty() {
            current_solutions = vec!["Manual workarounds".to_string(), "Generic tools".to_string()];
        }

        let mut need_texts: Vec<String> = traits.needs.iter().take(3).cloned().collect();
        if need_texts.is_empty() {
            need_texts.push(problem.clone());
        }
        let lead_severity: u8 = if idea.problem_statement.is_some() { 8 } else { 7 };

        let primary_needs: Vec<UserNeed> = need_texts
            .iter()
            .zip(0u8..)
            .map(|(text, rank)| UserNeed {
                description: text.clone(),
                severity: lead_severity.saturating_sub(rank).max(1),
                current_solutions: current_solutions.clone(),
            })
            .collect();
        let primary_power = buying_power_for(&audience);
        let primary = Persona {
            name: "Alex Rivera".to_string(),
            age: 32,
            occupation: occupation_for(&audience).to_string(),
            demographic_info: BTreeMap::from([
                ("audience".to_string(), audience.clone()),
                ("location".to_string(), "Urban center".to_string()),
            ]),
            goals: vec![
                format!("Solve {} with less effort", problem.trim_end_matches('.').to_lowercase()),
                "Save time on routine decisions".to_string(),
                format!("Get good value in {}", category.to_lowercase()),
            ],
            needs: primary_needs,
            behaviors: vec![UserBehavior {
                context: traits
                    .behaviors
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "When looking for a better option".to_string()),
                frequency: "Weekly".to_string(),
                motivation: "To get a reliable result without extra work".to_string(),
                friction_points: vec!["Time required".to_string(), "Unclear value".to_string()],
            }],
            tech_proficiency: if online { 8 } else { 6 },
            buying_power: primary_power,
            quote: format!(
                "I need {} without it taking over my week.",
                need_texts[0].trim_end_matches('.').to_lowercase()
            ),
            ..Persona::default()
        }
        .finish();

        let secondary_need = traits.psychographics.first().map_or_else(
            || format!("Confidence that {} is worth paying for", idea.name),
            |p| format!("A product that matches what they care about: {}", p.to_lowercase()),
        );
        let secondary = Persona {
            name: "Maya Johnson".to_string(),
            age: 41,
            occupation: if contains_any(&audience, &["business", "team", "company", "enterprise"]) {
                "Operations Manager".to_string()
            } else {
                "Household Decision Maker".to_string()
            },
            demographic_info: BTreeMap::from([
                ("audience".to_string(), traits.demographics.join(", ")),
                ("location".to_string(), "Suburban area".to_string()),
            ]),
            goals: vec![
                "Make well-researched purchasing decisions".to_string(),
                "Recommend tools that others will keep using".to_string(),
            ],
            needs: vec![
                UserNeed {
                    description: secondary_need,
                    severity: 6,
                    current_solutions: vec!["Reviews and recommendations".to_string()],
                },
                UserNeed {
                    description: "Clear pricing with no surprises".to_string(),
                    severity: 5,
                    current_solutions: vec!["Comparison sites".to_string()],
                },
            ],
            behaviors: vec![UserBehavior {
                context: "When comparing alternatives".to_string(),
                frequency: "Monthly".to_string(),
                motivation: "To avoid wasting money on the wrong option".to_string(),
                friction_points: vec!["Fragmented information sources".to_string()],
            }],
            tech_proficiency: if online { 7 } else { 5 },
            buying_power: (primary_power + 1).min(10),
            quote: "I'll pay for something that clearly works, but I need to see it first.".to_string(),
            ..Persona::default()
        }
        .finish();

        vec![primary, secondary]
    }
}

impl fmt::Debug for PersonaStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersonaStage").field("llm", &self.llm.name()).finish()
    }
}

#[async_trait]
impl Stage for PersonaStage {
    fn id(&self) -> StageId {
        StageId::Persona
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let idea = ctx.idea();
        let market = ctx.precursor_as::<MarketAnalysis>(StageId::Market);
        let competitors = ctx.precursor_as::<CompetitorAnalysis>(StageId::Competitor);

        let answer = match self.llm.complete(&Self::request(idea, market.as_ref())).await {
            Ok(answer) => answer,
            Err(e) => return StageOutput::from_provider_error(&e),
        };
        let mut traits = AudienceCharacteristics::parse(&answer);
        if traits.is_empty() {
            tracing::debug!("Audience profile had no recognised headings, using idea fields");
            traits = AudienceCharacteristics::from_idea(idea);
        }

        let personas = Self::build(idea, &traits, competitors.as_ref());
        StageOutput::ok_typed(&PersonaSet {
            audience_characteristics: traits,
            personas,
        })
    }
}
