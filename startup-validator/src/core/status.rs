//! Stage identifier and status enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four fixed analysis steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Market research.
    Market,
    /// Competitor analysis.
    Competitor,
    /// Customer persona generation.
    Persona,
    /// MVP planning.
    Mvp,
}

impl StageId {
    /// All stages in pipeline order.
    pub const ALL: [Self; 4] = [Self::Market, Self::Competitor, Self::Persona, Self::Mvp];

    /// The wire name of the stage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Competitor => "competitor",
            Self::Persona => "persona",
            Self::Mvp => "mvp",
        }
    }

    /// Stages whose results this stage reads when they are present.
    #[must_use]
    pub fn dependencies(&self) -> &'static [Self] {
        match self {
            Self::Market => &[],
            Self::Competitor => &[Self::Market],
            Self::Persona => &[Self::Market, Self::Competitor],
            Self::Mvp => &[Self::Market, Self::Competitor, Self::Persona],
        }
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Market => "market research",
            Self::Competitor => "competitor analysis",
            Self::Persona => "customer persona",
            Self::Mvp => "MVP planning",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market" => Ok(Self::Market),
            "competitor" => Ok(Self::Competitor),
            "persona" => Ok(Self::Persona),
            "mvp" => Ok(Self::Mvp),
            other => Err(format!("unknown stage '{other}'")),
        }
    }
}

/// The execution status of a stage attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage completed successfully.
    #[default]
    Ok,
    /// Stage failed.
    Fail,
    /// Stage observed cancellation and stopped.
    Cancel,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Fail => write!(f, "fail"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail | Self::Cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_id_display_and_parse() {
        for stage in StageId::ALL {
            assert_eq!(stage.to_string().parse::<StageId>(), Ok(stage));
        }
        assert!("pricing".parse::<StageId>().is_err());
    }

    #[test]
    fn test_stage_id_serialize() {
        let json = serde_json::to_string(&StageId::Mvp).unwrap();
        assert_eq!(json, r#""mvp""#);
    }

    #[test]
    fn test_dependencies_only_point_backwards() {
        for (index, stage) in StageId::ALL.iter().enumerate() {
            for dep in stage.dependencies() {
                let dep_index = StageId::ALL.iter().position(|s| s == dep).unwrap();
                assert!(dep_index < index, "{stage} depends on later stage {dep}");
            }
        }
    }

    #[test]
    fn test_stage_status() {
        assert!(StageStatus::Ok.is_success());
        assert!(StageStatus::Fail.is_failure());
        assert!(StageStatus::Cancel.is_failure());
        assert_eq!(StageStatus::Cancel.to_string(), "cancel");
    }
}
