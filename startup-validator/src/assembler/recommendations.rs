//! Recommendation text derived from the findings.

use super::findings::Findings;
use crate::core::StageId;

const GENERAL: [&str; 2] = [
    "Validate your assumptions with real customer interviews before building the MVP.",
    "Consider running small experiments to test key hypotheses about your target market.",
];

/// Builds the recommendation list, most specific first.
#[must_use]
pub fn recommend(findings: &Findings) -> Vec<String> {
    let mut recommendations = Vec::new();

    if let Some(growth) = findings.growth_rate {
        if growth < 5.0 {
            recommendations.push(
                "Consider pivoting to a higher-growth market segment as the current market shows low growth."
                    .to_string(),
            );
        } else if growth > 20.0 {
            recommendations.push(
                "The market is growing rapidly. Consider securing funding quickly to capitalize on growth opportunities."
                    .to_string(),
            );
        }
    }

    if let Some(gaps) = findings.market_gaps.as_deref().filter(|g| !g.is_empty()) {
        recommendations.push(format!(
            "Focus on these identified gaps in the market: {}",
            top_three(gaps)
        ));
    }

    if !findings.pain_points.is_empty() {
        recommendations.push(format!(
            "Prioritize addressing these customer pain points: {}",
            top_three(&findings.pain_points)
        ));
    }

    if findings.has_features {
        recommendations.push(
            "Focus on building and validating the core MVP features before expanding scope."
                .to_string(),
        );
    }

    if let Some(risk) = &findings.first_risk {
        recommendations.push(format!("Mitigate key risks early: {risk}"));
    }

    if recommendations.len() < 3 {
        recommendations.extend(GENERAL.iter().map(ToString::to_string));
    }

    recommendations.extend(findings.failed_stages.iter().map(|stage| rerun_note(*stage)));
    recommendations
}

fn top_three(items: &[String]) -> String {
    items.iter().take(3).map(String::as_str).collect::<Vec<_>>().join(", ")
}

fn rerun_note(stage: StageId) -> String {
    format!(
        "Re-run the {} analysis; it failed during this run and did not contribute to the score.",
        stage.as_str()
    )
}
