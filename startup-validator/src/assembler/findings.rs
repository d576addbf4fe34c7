//! The facts scoring and recommendations read from stage payloads.

use crate::core::{StageId, StageResult};
use crate::stages::persona::Level;
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Reads one field, falling back to its default when the value has the
/// wrong shape. A bad field never hides its well-formed siblings.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MarketView {
    #[serde(deserialize_with = "lenient")]
    market_size_usd: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    growth_rate: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompetitorView {
    #[serde(deserialize_with = "lenient")]
    direct_competitors: Option<usize>,
    #[serde(deserialize_with = "lenient")]
    market_gaps: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PersonaEntry {
    #[serde(deserialize_with = "lenient")]
    pain_points: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pain_level: Option<Level>,
    #[serde(deserialize_with = "lenient")]
    willingness_to_pay: Option<Level>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PersonaView {
    #[serde(deserialize_with = "lenient")]
    personas: Vec<PersonaEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WeeksView {
    #[serde(deserialize_with = "lenient")]
    weeks: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CostView {
    #[serde(deserialize_with = "lenient")]
    min: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RiskView {
    #[serde(deserialize_with = "lenient")]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MvpView {
    #[serde(deserialize_with = "lenient")]
    features: Vec<Value>,
    #[serde(deserialize_with = "lenient")]
    development_time: Option<WeeksView>,
    #[serde(deserialize_with = "lenient")]
    cost_estimate: Option<CostView>,
    #[serde(deserialize_with = "lenient")]
    risks: Vec<RiskView>,
}

/// Collects the paths of fields present in `payload` that do not have the
/// shape findings read them as.
struct ShapeCheck<'a> {
    payload: &'a Value,
    malformed: Vec<String>,
}

impl<'a> ShapeCheck<'a> {
    fn new(payload: &'a Value) -> Self {
        Self {
            payload,
            malformed: Vec::new(),
        }
    }

    fn field<T: DeserializeOwned>(&mut self, pointer: &str) -> &mut Self {
        if let Some(value) = self.payload.pointer(pointer).filter(|v| !v.is_null()) {
            if T::deserialize(value).is_err() {
                self.malformed.push(display_path(pointer));
            }
        }
        self
    }

    fn each<T: DeserializeOwned>(&mut self, list: &str, field: &str) -> &mut Self {
        let payload = self.payload;
        if let Some(Value::Array(items)) = payload.pointer(list) {
            for i in 0..items.len() {
                self.field::<T>(&format!("{list}/{i}/{field}"));
            }
        }
        self
    }
}

fn display_path(pointer: &str) -> String {
    pointer
        .trim_start_matches('/')
        .split('/')
        .map(|part| match part.parse::<usize>() {
            Ok(index) => format!("[{index}]"),
            Err(_) => format!(".{part}"),
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

/// What the report is scored on. Absent values were not reported by any
/// successful stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Findings {
    /// Estimated market size in USD.
    pub market_size_usd: Option<f64>,
    /// Market growth in percent.
    pub growth_rate: Option<f64>,
    /// Number of direct competitors.
    pub direct_competitors: Option<usize>,
    /// Features few competitors offer.
    pub market_gaps: Option<Vec<String>>,
    /// Pain level of the primary persona.
    pub primary_pain: Option<Level>,
    /// Willingness to pay of the primary persona.
    pub primary_willingness: Option<Level>,
    /// Pain points of the primary persona.
    pub pain_points: Vec<String>,
    /// Whether the MVP plan lists features.
    pub has_features: bool,
    /// MVP development time in weeks.
    pub mvp_weeks: Option<f64>,
    /// Lower bound of the MVP cost.
    pub mvp_min_cost: Option<f64>,
    /// The first MVP risk.
    pub first_risk: Option<String>,
    /// Live stages that failed.
    pub failed_stages: Vec<StageId>,
}

impl Findings {
    /// Reads findings from live results, falling back to injected data for
    /// stages the run did not compute. Failed results contribute nothing.
    #[must_use]
    pub fn collect(stage_results: &[StageResult], precursors: &[StageResult]) -> Self {
        let usable = |stage: StageId| usable_result(stage, stage_results, precursors);

        let mut findings = Self {
            failed_stages: stage_results
                .iter()
                .filter(|r| !r.is_success())
                .map(StageResult::stage)
                .collect(),
            ..Self::default()
        };

        if let Some(result) = usable(StageId::Market) {
            let market: MarketView = result.payload_as();
            findings.market_size_usd = market.market_size_usd;
            findings.growth_rate = market.growth_rate;
        }

        if let Some(result) = usable(StageId::Competitor) {
            let competitors: CompetitorView = result.payload_as();
            findings.direct_competitors = competitors.direct_competitors;
            findings.market_gaps = competitors.market_gaps;
        }

        if let Some(result) = usable(StageId::Persona) {
            let personas: PersonaView = result.payload_as();
            if let Some(primary) = personas.personas.into_iter().next() {
                findings.primary_pain = primary.pain_level;
                findings.primary_willingness = primary.willingness_to_pay;
                findings.pain_points = primary.pain_points;
            }
        }

        if let Some(result) = usable(StageId::Mvp) {
            let mvp: MvpView = result.payload_as();
            findings.has_features = !mvp.features.is_empty();
            findings.mvp_weeks = mvp.development_time.and_then(|t| t.weeks);
            findings.mvp_min_cost = mvp.cost_estimate.and_then(|c| c.min);
            findings.first_risk = mvp
                .risks
                .into_iter()
                .map(|r| r.description)
                .find(|d| !d.trim().is_empty());
        }

        findings
    }
}

impl Findings {
    /// Fields of a `stage` payload that are present but have the wrong type,
    /// as dotted paths such as `growth_rate` or `personas[0].pain_level`.
    ///
    /// Missing and null fields are fine. Only object payloads have fields to
    /// check.
    #[must_use]
    pub fn malformed_fields(stage: StageId, payload: &Value) -> Vec<String> {
        let mut check = ShapeCheck::new(payload);
        match stage {
            StageId::Market => {
                check
                    .field::<f64>("/market_size_usd")
                    .field::<f64>("/growth_rate");
            }
            StageId::Competitor => {
                check
                    .field::<usize>("/direct_competitors")
                    .field::<Vec<String>>("/market_gaps");
            }
            StageId::Persona => {
                check
                    .field::<Vec<Value>>("/personas")
                    .each::<Vec<String>>("/personas", "pain_points")
                    .each::<Level>("/personas", "pain_level")
                    .each::<Level>("/personas", "willingness_to_pay");
            }
            StageId::Mvp => {
                check
                    .field::<Vec<Value>>("/features")
                    .field::<f64>("/development_time/weeks")
                    .field::<f64>("/cost_estimate/min")
                    .field::<Vec<Value>>("/risks")
                    .each::<String>("/risks", "description");
            }
        }
        check.malformed
    }
}

fn usable_result<'a>(
    stage: StageId,
    stage_results: &'a [StageResult],
    precursors: &'a [StageResult],
) -> Option<&'a StageResult> {
    stage_results
        .iter()
        .find(|r| r.stage() == stage)
        .or_else(|| precursors.iter().find(|r| r.stage() == stage))
        .filter(|r| r.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_collect_reads_every_stage() {
        let results = vec![
            StageResult::completed(
                StageId::Market,
                json!({"market_size_usd": 2e9, "growth_rate": 15.0}),
                Utc::now(),
                1,
            ),
            StageResult::completed(
                StageId::Competitor,
                json!({"direct_competitors": 2, "market_gaps": ["Wine pairing"]}),
                Utc::now(),
                1,
            ),
            StageResult::completed(
                StageId::Persona,
                json!({"personas": [
                    {"pain_points": ["Time"], "pain_level": "high", "willingness_to_pay": "medium"},
                    {"pain_points": ["Cost"], "pain_level": "low"}
                ]}),
                Utc::now(),
                1,
            ),
            StageResult::completed(
                StageId::Mvp,
                json!({
                    "features": [{"name": "Planner"}],
                    "development_time": {"weeks": 5.0, "months": 1.2},
                    "cost_estimate": {"min": 9000.0},
                    "risks": [{"description": "Adoption is slow"}]
                }),
                Utc::now(),
                1,
            ),
        ];

        let findings = Findings::collect(&results, &[]);

        assert_eq!(findings.market_size_usd, Some(2e9));
        assert_eq!(findings.growth_rate, Some(15.0));
        assert_eq!(findings.direct_competitors, Some(2));
        assert_eq!(findings.market_gaps, Some(vec!["Wine pairing".to_string()]));
        assert_eq!(findings.primary_pain, Some(Level::High));
        assert_eq!(findings.primary_willingness, Some(Level::Medium));
        assert_eq!(findings.pain_points, vec!["Time".to_string()]);
        assert!(findings.has_features);
        assert_eq!(findings.mvp_weeks, Some(5.0));
        assert_eq!(findings.mvp_min_cost, Some(9000.0));
        assert_eq!(findings.first_risk.as_deref(), Some("Adoption is slow"));
    }

    #[test]
    fn test_failed_results_contribute_nothing() {
        let results = vec![StageResult::failed(StageId::Market, "down", Utc::now(), 3)];
        let findings = Findings::collect(&results, &[]);

        assert_eq!(findings.growth_rate, None);
        assert_eq!(findings.failed_stages, vec![StageId::Market]);
    }

    #[test]
    fn test_precursors_fill_missing_stages() {
        let precursors = vec![StageResult::injected(StageId::Market, json!({"growth_rate": 3.0}))];
        let findings = Findings::collect(&[], &precursors);
        assert_eq!(findings.growth_rate, Some(3.0));
        assert_eq!(findings.market_size_usd, None);
    }

    #[test]
    fn test_mistyped_field_keeps_its_siblings() {
        let precursors = vec![StageResult::injected(
            StageId::Market,
            json!({"growth_rate": "25%", "market_size_usd": 5e9}),
        )];
        let findings = Findings::collect(&[], &precursors);
        assert_eq!(findings.growth_rate, None);
        assert_eq!(findings.market_size_usd, Some(5e9));

        let personas = vec![StageResult::injected(
            StageId::Persona,
            json!({"personas": [{"pain_level": "extreme", "willingness_to_pay": "high"}]}),
        )];
        let findings = Findings::collect(&[], &personas);
        assert_eq!(findings.primary_pain, None);
        assert_eq!(findings.primary_willingness, Some(Level::High));
    }

    #[test]
    fn test_malformed_fields_names_each_bad_path() {
        assert!(Findings::malformed_fields(
            StageId::Market,
            &json!({"growth_rate": 25.0, "market_size_usd": null, "notes": "anything"})
        )
        .is_empty());
        assert_eq!(
            Findings::malformed_fields(StageId::Market, &json!({"growth_rate": "25%"})),
            vec!["growth_rate".to_string()]
        );
        assert_eq!(
            Findings::malformed_fields(
                StageId::Persona,
                &json!({"personas": [{"pain_level": "high"}, {"pain_level": 9}]})
            ),
            vec!["personas[1].pain_level".to_string()]
        );
        assert_eq!(
            Findings::malformed_fields(
                StageId::Mvp,
                &json!({"development_time": {"weeks": "six"}, "cost_estimate": {"min": 9000}})
            ),
            vec!["development_time.weeks".to_string()]
        );
        assert!(Findings::malformed_fields(StageId::Competitor, &json!("lots")).is_empty());
    }
}
