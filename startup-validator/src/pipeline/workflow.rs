//! Named workflows and externally supplied stage data.

use crate::assembler::Findings;
use crate::core::{StageId, StageResult};
use crate::errors::{ErrorInfo, InputValidationError, ValidatorError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A fixed, ordered selection of stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    /// Market, competitor, persona and MVP stages.
    #[default]
    FullValidation,
    /// Only market research.
    MarketOnly,
    /// Only MVP planning, on top of supplied market data.
    MvpOnly,
}

impl Workflow {
    /// Every workflow.
    pub const ALL: [Self; 3] = [Self::FullValidation, Self::MarketOnly, Self::MvpOnly];

    /// Stable name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullValidation => "full_validation",
            Self::MarketOnly => "market_only",
            Self::MvpOnly => "mvp_only",
        }
    }

    /// The stages this workflow runs, in order.
    #[must_use]
    pub fn stages(&self) -> &'static [StageId] {
        match self {
            Self::FullValidation => &StageId::ALL,
            Self::MarketOnly => &[StageId::Market],
            Self::MvpOnly => &[StageId::Mvp],
        }
    }

    /// Stage data that must be supplied by the caller.
    #[must_use]
    pub fn required_precursors(&self) -> &'static [StageId] {
        match self {
            Self::MvpOnly => &[StageId::Market],
            Self::FullValidation | Self::MarketOnly => &[],
        }
    }

    /// Stage data the caller may supply.
    #[must_use]
    pub fn optional_precursors(&self) -> &'static [StageId] {
        match self {
            Self::MvpOnly => &[StageId::Competitor, StageId::Persona],
            Self::FullValidation | Self::MarketOnly => &[],
        }
    }

    /// Whether this workflow runs `stage` itself.
    #[must_use]
    pub fn includes(&self, stage: StageId) -> bool {
        self.stages().contains(&stage)
    }

    /// Whether this workflow reads supplied data for `stage`.
    #[must_use]
    pub fn reads(&self, stage: StageId) -> bool {
        self.required_precursors().contains(&stage) || self.optional_precursors().contains(&stage)
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Workflow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "full_validation" | "full" => Ok(Self::FullValidation),
            "market_only" | "market" => Ok(Self::MarketOnly),
            "mvp_only" | "mvp" => Ok(Self::MvpOnly),
            other => Err(format!(
                "unknown workflow '{other}'. Supported values: full_validation, market_only, mvp_only"
            )),
        }
    }
}

/// Input-file keys that carry stage data.
const PRECURSOR_KEYS: [(&str, StageId); 5] = [
    ("market_data", StageId::Market),
    ("competitor_data", StageId::Competitor),
    ("customer_personas", StageId::Persona),
    ("persona_data", StageId::Persona),
    ("mvp_data", StageId::Mvp),
];

/// Stage payloads supplied by the caller instead of computed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Precursors {
    entries: BTreeMap<StageId, serde_json::Value>,
}

impl Precursors {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a payload for `stage`, replacing any earlier one.
    #[must_use]
    pub fn with(mut self, stage: StageId, payload: serde_json::Value) -> Self {
        self.insert(stage, payload);
        self
    }

    /// Adds a payload for `stage`, replacing any earlier one.
    pub fn insert(&mut self, stage: StageId, payload: serde_json::Value) {
        self.entries.insert(stage, payload);
    }

    /// Reads precursor blocks from an input document.
    #[must_use]
    pub fn from_input(document: &serde_json::Value) -> Self {
        let mut precursors = Self::new();
        for (key, stage) in PRECURSOR_KEYS {
            if let Some(payload) = document.get(key).filter(|v| !v.is_null()) {
                precursors.insert(stage, payload.clone());
            }
        }
        precursors
    }

    /// The payload supplied for `stage`.
    #[must_use]
    pub fn get(&self, stage: StageId) -> Option<&serde_json::Value> {
        self.entries.get(&stage)
    }

    /// Whether nothing was supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stages with supplied data, in pipeline order.
    #[must_use]
    pub fn stages(&self) -> Vec<StageId> {
        self.entries.keys().copied().collect()
    }

    /// Checks the supplied data against what `workflow` needs.
    ///
    /// Every required precursor must be present. Each block the workflow
    /// reads must be a JSON object whose scored fields have the right types.
    /// Other blocks are ignored and not checked.
    pub fn validate_for(&self, workflow: Workflow) -> Result<(), ValidatorError> {
        if let Some(missing) = workflow
            .required_precursors()
            .iter()
            .find(|stage| !self.entries.contains_key(stage))
        {
            return Err(ValidatorError::MissingPrecursor {
                workflow: workflow.to_string(),
                stage: missing.to_string(),
            });
        }

        let mut malformed = Vec::new();
        for (stage, payload) in self.injected(workflow) {
            let key = input_key(stage);
            if payload.is_object() {
                malformed.extend(
                    Findings::malformed_fields(stage, payload)
                        .into_iter()
                        .map(|field| format!("{key}.{field}")),
                );
            } else {
                malformed.push(key.to_string());
            }
        }
        if malformed.is_empty() {
            return Ok(());
        }

        let info = ErrorInfo::new("INPUT-002-PRECURSOR", "Supplied stage data is malformed")
            .with_fix_hint("Each supplied stage block must be a JSON object with correctly typed fields.")
            .with_context_entry("fields", malformed.join(","));
        Err(InputValidationError::new(format!(
            "Supplied stage data is malformed: {}",
            malformed.join(", ")
        ))
        .with_fields(malformed)
        .with_error_info(info)
        .into())
    }

    /// Injected results for the stages `workflow` reads but does not run.
    ///
    /// Data for any other stage is dropped.
    #[must_use]
    pub fn results_for(&self, workflow: Workflow) -> Vec<StageResult> {
        for stage in self.entries.keys().filter(|stage| !workflow.reads(**stage)) {
            tracing::debug!(stage = %stage, workflow = %workflow, "Ignoring supplied data the workflow does not read");
        }
        self.injected(workflow)
            .map(|(stage, payload)| StageResult::injected(stage, payload.clone()))
            .collect()
    }

    fn injected(&self, workflow: Workflow) -> impl Iterator<Item = (StageId, &serde_json::Value)> {
        self.entries
            .iter()
            .filter(move |(stage, _)| workflow.reads(**stage))
            .map(|(stage, payload)| (*stage, payload))
    }
}

/// The input-file key a stage's data is read from.
fn input_key(stage: StageId) -> &'static str {
    PRECURSOR_KEYS
        .iter()
        .find(|(_, s)| *s == stage)
        .map_or("stage_data", |(key, _)| key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ResultOrigin;
    use serde_json::json;

    #[test]
    fn test_stage_lists() {
        assert_eq!(Workflow::FullValidation.stages(), &StageId::ALL);
        assert_eq!(Workflow::MarketOnly.stages(), &[StageId::Market]);
        assert_eq!(Workflow::MvpOnly.stages(), &[StageId::Mvp]);
        assert_eq!(Workflow::MvpOnly.required_precursors(), &[StageId::Market]);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("market_only".parse::<Workflow>(), Ok(Workflow::MarketOnly));
        assert_eq!("MVP-only".parse::<Workflow>(), Ok(Workflow::MvpOnly));
        assert!("everything".parse::<Workflow>().is_err());
        for workflow in Workflow::ALL {
            assert_eq!(workflow.as_str().parse::<Workflow>(), Ok(workflow));
        }
    }

    #[test]
    fn test_mvp_only_requires_market_data() {
        let err = Precursors::new().validate_for(Workflow::MvpOnly).unwrap_err();
        assert!(matches!(err, ValidatorError::MissingPrecursor { ref stage, .. } if stage == "market"));

        let supplied = Precursors::new().with(StageId::Market, json!({"market_size_usd": 2e9}));
        assert!(supplied.validate_for(Workflow::MvpOnly).is_ok());
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let precursors = Precursors::new().with(StageId::Market, json!("big market"));
        let err = precursors.validate_for(Workflow::MvpOnly).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("market_data"));
    }

    #[test]
    fn test_mistyped_field_rejected_by_name() {
        let precursors = Precursors::new().with(
            StageId::Market,
            json!({"growth_rate": "25%", "market_size_usd": 5e9}),
        );
        let err = precursors.validate_for(Workflow::MvpOnly).unwrap_err();

        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("market_data.growth_rate"));
        assert!(!err.to_string().contains("market_size_usd"));
        match err {
            ValidatorError::InvalidInput(input) => {
                assert_eq!(input.fields, vec!["market_data.growth_rate".to_string()]);
                assert_eq!(input.error_info.map(|i| i.code).as_deref(), Some("INPUT-002-PRECURSOR"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let personas = Precursors::new()
            .with(StageId::Market, json!({"growth_rate": 12.0}))
            .with(StageId::Persona, json!({"personas": [{"pain_level": "extreme"}]}));
        let err = personas.validate_for(Workflow::MvpOnly).unwrap_err();
        assert!(err.to_string().contains("customer_personas.personas[0].pain_level"));
    }

    #[test]
    fn test_blocks_the_workflow_does_not_read_are_not_checked() {
        let stale = Precursors::new().with(StageId::Competitor, json!("stale export"));
        assert!(stale.validate_for(Workflow::MarketOnly).is_ok());
        assert!(stale.results_for(Workflow::MarketOnly).is_empty());

        let read = stale.clone().with(StageId::Market, json!({"growth_rate": 8.0}));
        assert!(read.validate_for(Workflow::MvpOnly).is_err());

        let live = Precursors::new()
            .with(StageId::Market, json!("stale export"))
            .with(StageId::Mvp, json!({"development_time": {"weeks": "soon"}}));
        assert!(live.validate_for(Workflow::FullValidation).is_ok());
        assert!(live.results_for(Workflow::FullValidation).is_empty());
    }

    #[test]
    fn test_from_input_reads_known_blocks() {
        let document = json!({
            "name": "FreshMeal",
            "market_data": {"growth_rate": 12.0},
            "customer_personas": {"personas": []},
            "competitor_data": null
        });
        let precursors = Precursors::from_input(&document);
        assert_eq!(precursors.stages(), vec![StageId::Market, StageId::Persona]);
    }

    #[test]
    fn test_results_for_skips_live_stages() {
        let precursors = Precursors::new()
            .with(StageId::Market, json!({"growth_rate": 3.0}))
            .with(StageId::Mvp, json!({}));

        let results = precursors.results_for(Workflow::MvpOnly);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].stage(), StageId::Market);
        assert_eq!(results[0].origin(), ResultOrigin::Injected);
        assert_eq!(results[0].payload(), &json!({"growth_rate": 3.0}));

        assert!(precursors.results_for(Workflow::FullValidation).is_empty());
    }
}
