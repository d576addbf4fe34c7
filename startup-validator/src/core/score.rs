//! Validation score and its interpretation bands.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A validation score, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    /// The highest possible score.
    pub const MAX: u8 = 100;

    /// Builds a score from any raw value, clamping into range.
    #[must_use]
    pub fn clamped(raw: i64) -> Self {
        let bounded = raw.clamp(0, i64::from(Self::MAX));
        Self(u8::try_from(bounded).unwrap_or(Self::MAX))
    }

    /// The numeric value.
    #[must_use]
    pub fn value(&self) -> u8 {
        self.0
    }

    /// The interpretation band.
    #[must_use]
    pub fn band(&self) -> ScoreBand {
        ScoreBand::from_score(*self)
    }
}

impl TryFrom<u8> for Score {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > Self::MAX {
            Err(format!("score {value} is outside 0..=100"))
        } else {
            Ok(Self(value))
        }
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/100", self.0)
    }
}

/// Banded interpretation of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    /// 0-39.
    Challenging,
    /// 40-59.
    ModeratePotential,
    /// 60-79.
    Promising,
    /// 80-100.
    HighlyPromising,
}

impl ScoreBand {
    /// The band a score falls into.
    #[must_use]
    pub fn from_score(score: Score) -> Self {
        match score.value() {
            80..=u8::MAX => Self::HighlyPromising,
            60..=79 => Self::Promising,
            40..=59 => Self::ModeratePotential,
            _ => Self::Challenging,
        }
    }

    /// Display label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Challenging => "Challenging",
            Self::ModeratePotential => "Moderate Potential",
            Self::Promising => "Promising",
            Self::HighlyPromising => "Highly Promising",
        }
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped() {
        assert_eq!(Score::clamped(-40).value(), 0);
        assert_eq!(Score::clamped(55).value(), 55);
        assert_eq!(Score::clamped(400).value(), 100);
        assert_eq!(Score::clamped(i64::MIN).value(), 0);
        assert_eq!(Score::clamped(i64::MAX).value(), 100);
    }

    #[test]
    fn test_band_boundaries() {
        assert_eq!(Score::clamped(39).band(), ScoreBand::Challenging);
        assert_eq!(Score::clamped(40).band(), ScoreBand::ModeratePotential);
        assert_eq!(Score::clamped(59).band(), ScoreBand::ModeratePotential);
        assert_eq!(Score::clamped(60).band(), ScoreBand::Promising);
        assert_eq!(Score::clamped(79).band(), ScoreBand::Promising);
        assert_eq!(Score::clamped(80).band(), ScoreBand::HighlyPromising);
        assert_eq!(Score::clamped(100).band(), ScoreBand::HighlyPromising);
    }

    #[test]
    fn test_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Score>("101").is_err());
        assert_eq!(serde_json::from_str::<Score>("72").unwrap().value(), 72);
    }

    #[test]
    fn test_band_label() {
        assert_eq!(ScoreBand::ModeratePotential.to_string(), "Moderate Potential");
    }
}
