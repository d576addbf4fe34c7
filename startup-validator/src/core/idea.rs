//! The startup idea under evaluation.

use crate::errors::{ErrorInfo, InputValidationError};
use serde::{Deserialize, Serialize};

const MAX_NAME_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 5000;

/// A record describing the idea under evaluation.
///
/// Immutable once submitted for a run: the runner shares it behind an `Arc`
/// and stages only ever see a shared reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupIdea {
    /// Name of the idea.
    pub name: String,
    /// Detailed description.
    pub description: String,
    /// Who the product is for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    /// Industry or category.
    #[serde(default, alias = "industry", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// The problem being solved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_statement: Option<String>,
    /// The proposed solution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    /// How the product makes money.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_model: Option<String>,
    /// Free-form notes from the founder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_thoughts: Option<String>,
    /// Market hints: search terms to research.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_terms: Vec<String>,
}

impl StartupIdea {
    /// Creates an idea with the required fields.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Sets the target audience.
    #[must_use]
    pub fn with_target_audience(mut self, audience: impl Into<String>) -> Self {
        self.target_audience = Some(audience.into());
        self
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the search terms.
    #[must_use]
    pub fn with_search_terms(mut self, terms: Vec<String>) -> Self {
        self.search_terms = terms;
        self
    }

    /// Checks required fields and size limits, reporting every offending field.
    pub fn validate(&self) -> Result<(), InputValidationError> {
        let mut problems = Vec::new();
        let mut fields = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("name is required".to_string());
            fields.push("name".to_string());
        } else if self.name.chars().count() > MAX_NAME_LEN {
            problems.push(format!("name exceeds {MAX_NAME_LEN} characters"));
            fields.push("name".to_string());
        }

        if self.description.trim().is_empty() {
            problems.push("description is required".to_string());
            fields.push("description".to_string());
        } else if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            problems.push(format!("description exceeds {MAX_DESCRIPTION_LEN} characters"));
            fields.push("description".to_string());
        }

        if problems.is_empty() {
            return Ok(());
        }

        let info = ErrorInfo::new("INPUT-001-IDEA", "The startup idea is incomplete")
            .with_fix_hint("Provide a non-empty 'name' and 'description' in the input file.")
            .with_context_entry("fields", fields.join(","));
        Err(InputValidationError::new(format!("Invalid startup idea: {}", problems.join("; ")))
            .with_fields(fields)
            .with_error_info(info))
    }

    /// Reads an idea from an input document.
    ///
    /// The idea is taken from a nested `idea` object when present, otherwise
    /// from the document root. A root-level `search_terms` list applies when
    /// the idea itself has none.
    pub fn from_document(document: &serde_json::Value) -> Result<Self, InputValidationError> {
        let source = document
            .get("idea")
            .filter(|v| v.is_object())
            .unwrap_or(document);
        if !source.is_object() {
            return Err(format_error("the input must be a JSON object"));
        }

        let mut idea: Self = serde_json::from_value(source.clone())
            .map_err(|e| format_error(&e.to_string()))?;
        if idea.search_terms.is_empty() {
            if let Some(terms) = document.get("search_terms").and_then(|v| v.as_array()) {
                idea.search_terms = terms
                    .iter()
                    .filter_map(|t| t.as_str())
                    .map(str::to_string)
                    .collect();
            }
        }
        Ok(idea)
    }

    /// A lowercase, underscore-separated form of the name for file names.
    #[must_use]
    pub fn slug(&self) -> String {
        let slug: String = self
            .name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        let collapsed = slug
            .split('_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_");
        if collapsed.is_empty() {
            "idea".to_string()
        } else {
            collapsed
        }
    }

    /// Renders the idea as prompt text.
    #[must_use]
    pub fn summary_text(&self) -> String {
        let mut lines = vec![
            format!("Name: {}", self.name),
            format!("Description: {}", self.description),
        ];
        let optional = [
            ("Target audience", &self.target_audience),
            ("Category", &self.category),
            ("Problem", &self.problem_statement),
            ("Solution", &self.solution),
            ("Revenue model", &self.revenue_model),
            ("Notes", &self.initial_thoughts),
        ];
        for (label, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                lines.push(format!("{label}: {value}"));
            }
        }
        lines.join("\n")
    }

    /// All idea text, lowercased, for keyword matching.
    #[must_use]
    pub fn searchable_text(&self) -> String {
        [
            Some(self.name.as_str()),
            Some(self.description.as_str()),
            self.target_audience.as_deref(),
            self.category.as_deref(),
            self.problem_statement.as_deref(),
            self.solution.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
    }
}

fn format_error(detail: &str) -> InputValidationError {
    let info = ErrorInfo::new("INPUT-000-FORMAT", "The input document is malformed")
        .with_fix_hint(
            "Supply a JSON object with 'name' and 'description', optionally nested under 'idea'.",
        );
    InputValidationError::new(format!("Invalid input document: {detail}")).with_error_info(info)
}
