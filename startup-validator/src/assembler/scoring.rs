//! Rule-based validation score.
//!
//! The score starts at [`BASE_SCORE`] and each rule adds or subtracts a fixed
//! number of points. Rules whose input is missing are skipped.

use super::findings::Findings;
use crate::core::Score;
use crate::stages::persona::Level;

/// Starting point before any rule applies.
pub const BASE_SCORE: i64 = 50;

/// One applied rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreFactor {
    /// What the rule looked at.
    pub factor: &'static str,
    /// Signed points.
    pub points: i64,
}

/// The rules applied to one set of findings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreCard {
    factors: Vec<ScoreFactor>,
}

impl ScoreCard {
    /// Applies every rule to the findings.
    #[must_use]
    pub fn evaluate(findings: &Findings) -> Self {
        let mut card = Self::default();

        if let Some(size) = findings.market_size_usd {
            if size > 1_000_000_000.0 {
                card.add("market_size", 10);
            } else if size > 100_000_000.0 {
                card.add("market_size", 5);
            } else if size < 10_000_000.0 {
                card.add("market_size", -5);
            }
        }

        if let Some(growth) = findings.growth_rate {
            if growth > 20.0 {
                card.add("growth_rate", 10);
            } else if growth > 10.0 {
                card.add("growth_rate", 5);
            } else if growth < 0.0 {
                card.add("growth_rate", -10);
            } else if growth < 5.0 {
                card.add("growth_rate", -5);
            }
        }

        match findings.direct_competitors {
            Some(0) => card.add("competition", 5),
            Some(n) if n > 10 => card.add("competition", -5),
            _ => {}
        }

        if let Some(gaps) = &findings.market_gaps {
            if !gaps.is_empty() {
                card.add("market_gaps", 5);
            }
            if gaps.len() > 3 {
                card.add("market_gaps", 5);
            }
        }

        match findings.primary_pain {
            Some(Level::High) => card.add("pain_level", 10),
            Some(Level::Medium) => card.add("pain_level", 5),
            Some(Level::Low) => card.add("pain_level", -5),
            None => {}
        }

        match findings.primary_willingness {
            Some(Level::High) => card.add("willingness_to_pay", 5),
            Some(Level::Low) => card.add("willingness_to_pay", -5),
            _ => {}
        }

        if let Some(weeks) = findings.mvp_weeks {
            if weeks < 6.0 {
                card.add("development_time", 5);
            } else if weeks > 12.0 {
                card.add("development_time", -5);
            }
        }

        if let Some(cost) = findings.mvp_min_cost {
            if cost < 15_000.0 {
                card.add("development_cost", 5);
            } else if cost > 50_000.0 {
                card.add("development_cost", -5);
            }
        }

        card
    }

    fn add(&mut self, factor: &'static str, points: i64) {
        self.factors.push(ScoreFactor { factor, points });
    }

    /// The applied rules, in evaluation order.
    #[must_use]
    pub fn factors(&self) -> &[ScoreFactor] {
        &self.factors
    }

    /// Unclamped total.
    #[must_use]
    pub fn raw(&self) -> i64 {
        BASE_SCORE + self.factors.iter().map(|f| f.points).sum::<i64>()
    }

    /// The total clamped into `0..=100`.
    #[must_use]
    pub fn score(&self) -> Score {
        Score::clamped(self.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ScoreBand;
    use pretty_assertions::assert_eq;

    fn strong() -> Findings {
        Findings {
            market_size_usd: Some(5e9),
            growth_rate: Some(30.0),
            direct_competitors: Some(0),
            market_gaps: Some(vec!["a".into(), "b".into(), "c".into(), "d".into()]),
            primary_pain: Some(Level::High),
            primary_willingness: Some(Level::High),
            has_features: true,
            mvp_weeks: Some(4.0),
            mvp_min_cost: Some(9_000.0),
            ..Findings::default()
        }
    }

    fn weak() -> Findings {
        Findings {
            market_size_usd: Some(1e6),
            growth_rate: Some(-3.0),
            direct_competitors: Some(25),
            market_gaps: Some(Vec::new()),
            primary_pain: Some(Level::Low),
            primary_willingness: Some(Level::Low),
            mvp_weeks: Some(30.0),
            mvp_min_cost: Some(120_000.0),
            ..Findings::default()
        }
    }

    #[test]
    fn test_empty_findings_score_base() {
        let card = ScoreCard::evaluate(&Findings::default());
        assert!(card.factors().is_empty());
        assert_eq!(card.score().value(), 50);
        assert_eq!(card.score().band(), ScoreBand::ModeratePotential);
    }

    #[test]
    fn test_extremes_are_clamped() {
        let high = ScoreCard::evaluate(&strong());
        assert_eq!(high.raw(), 110);
        assert_eq!(high.score().value(), 100);

        let low = ScoreCard::evaluate(&weak());
        assert_eq!(low.raw(), 10);
        assert_eq!(low.score().band(), ScoreBand::Challenging);
    }

    #[test]
    fn test_negative_growth_takes_precedence() {
        let findings = Findings {
            growth_rate: Some(-1.0),
            ..Findings::default()
        };
        assert_eq!(
            ScoreCard::evaluate(&findings).factors(),
            &[ScoreFactor {
                factor: "growth_rate",
                points: -10
            }]
        );
    }

    #[test]
    fn test_score_is_monotone_in_growth() {
        let mut previous = i64::MIN;
        for growth in [-5.0, 2.0, 7.0, 15.0, 25.0] {
            let findings = Findings {
                growth_rate: Some(growth),
                ..Findings::default()
            };
            let raw = ScoreCard::evaluate(&findings).raw();
            assert!(raw >= previous, "growth {growth} lowered the score");
            previous = raw;
        }
    }

    #[test]
    fn test_score_is_monotone_in_pain() {
        let raw = |level| {
            ScoreCard::evaluate(&Findings {
                primary_pain: Some(level),
                ..Findings::default()
            })
            .raw()
        };
        assert!(raw(Level::Low) < raw(Level::Medium));
        assert!(raw(Level::Medium) < raw(Level::High));
    }

    #[test]
    fn test_score_decreases_with_cost() {
        let raw = |cost| {
            ScoreCard::evaluate(&Findings {
                mvp_min_cost: Some(cost),
                ..Findings::default()
            })
            .raw()
        };
        assert!(raw(10_000.0) > raw(30_000.0));
        assert!(raw(30_000.0) > raw(80_000.0));
    }
}
