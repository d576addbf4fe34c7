//! Error types for the validation pipeline.
//!
//! Input problems fail fast before any stage runs, provider problems are
//! stage-local and classified as retryable or not, and everything that
//! reaches the binary maps onto a stable category and exit status.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// HTTP status codes that are worth retrying.
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// The main error type for validator operations.
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// The submitted idea or a supplied payload is malformed.
    #[error("{0}")]
    InvalidInput(#[from] InputValidationError),

    /// An external collaborator failed outside of a stage.
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// A stage failed and the run stopped.
    #[error("Stage '{stage}' failed: {message}")]
    StageFailed {
        /// The failed stage.
        stage: String,
        /// The recorded error.
        message: String,
    },

    /// The reviewer rejected the MVP proposal.
    #[error("Rejected by reviewer: {reason}")]
    Rejected {
        /// The reviewer's reason.
        reason: String,
    },

    /// A workflow needs externally supplied stage data that is missing.
    #[error("Workflow '{workflow}' requires pre-supplied {stage} data")]
    MissingPrecursor {
        /// The selected workflow.
        workflow: String,
        /// The stage whose data is missing.
        stage: String,
    },

    /// The run was cancelled.
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for ValidatorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl ValidatorError {
    /// Stable category code used in logs and CLI output.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Provider(_) => "provider",
            Self::StageFailed { .. } => "stage_failed",
            Self::Rejected { .. } => "rejected",
            Self::MissingPrecursor { .. } => "missing_precursor",
            Self::Cancelled(_) => "cancelled",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
            Self::Internal(_) => "internal",
        }
    }

    /// Process exit status for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidInput(_) | Self::MissingPrecursor { .. } | Self::Config(_) => 2,
            Self::Rejected { .. } => 3,
            Self::Cancelled(_) => 130,
            _ => 1,
        }
    }

    /// A short hint for the operator, when one exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::InvalidInput(err) => err
                .error_info
                .as_ref()
                .and_then(|info| info.fix_hint.clone()),
            Self::MissingPrecursor { stage, .. } => Some(format!(
                "Add a '{stage}_data' block to the input file or pass --market-data <file>."
            )),
            Self::StageFailed { stage, .. } => Some(format!(
                "Re-run with --best-effort to keep going past a failed {stage} stage."
            )),
            Self::Config(_) => Some("Check the config file field names and values.".to_string()),
            Self::Provider(err) if !err.is_retryable() => {
                Some("Check API keys and provider settings.".to_string())
            }
            _ => None,
        }
    }
}

/// Diagnostic metadata attached to input errors.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (e.g., "INPUT-001-REQUIRED").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl ErrorInfo {
    /// Creates new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: BTreeMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Raised when the submitted idea or an injected payload fails validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct InputValidationError {
    /// The error message.
    pub message: String,
    /// The offending fields.
    pub fields: Vec<String>,
    /// Optional diagnostic info.
    pub error_info: Option<ErrorInfo>,
}

impl InputValidationError {
    /// Creates a new input validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the offending fields.
    #[must_use]
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    /// Sets the diagnostic info.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }
}

/// Errors returned by LLM, search, scraping and vector collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider has no credentials or endpoint.
    #[error("{provider} is not configured: {reason}")]
    NotConfigured {
        /// Provider name.
        provider: String,
        /// Why it cannot be used.
        reason: String,
    },

    /// The provider answered with a non-success status.
    #[error("{provider} returned HTTP {status}")]
    Http {
        /// Provider name.
        provider: String,
        /// HTTP status code.
        status: u16,
    },

    /// The request never completed.
    #[error("{provider} request failed: {message}")]
    Transport {
        /// Provider name.
        provider: String,
        /// Underlying message.
        message: String,
    },

    /// The response body was not what we expected.
    #[error("{provider} response could not be decoded: {message}")]
    Decode {
        /// Provider name.
        provider: String,
        /// Underlying message.
        message: String,
    },

    /// The request did not finish in time.
    #[error("{provider} timed out after {after_secs}s")]
    Timeout {
        /// Provider name.
        provider: String,
        /// The configured limit.
        after_secs: u64,
    },

    /// The provider answered but had nothing usable.
    #[error("{provider} returned no usable content")]
    Empty {
        /// Provider name.
        provider: String,
    },
}

impl ProviderError {
    /// Creates a transport error.
    #[must_use]
    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a not-configured error.
    #[must_use]
    pub fn not_configured(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotConfigured {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Whether a later attempt could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => RETRYABLE_STATUS_CODES.contains(status),
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::NotConfigured { .. } | Self::Decode { .. } | Self::Empty { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_info_builder() {
        let info = ErrorInfo::new("INPUT-001", "Missing name")
            .with_fix_hint("Add a name")
            .with_context_entry("field", "name");

        assert_eq!(info.code, "INPUT-001");
        assert_eq!(info.fix_hint.as_deref(), Some("Add a name"));
        assert_eq!(info.context.get("field").map(String::as_str), Some("name"));
    }

    #[test]
    fn test_provider_error_retryable() {
        let throttled = ProviderError::Http {
            provider: "serper".to_string(),
            status: 429,
        };
        let forbidden = ProviderError::Http {
            provider: "serper".to_string(),
            status: 403,
        };

        assert!(throttled.is_retryable());
        assert!(!forbidden.is_retryable());
        assert!(ProviderError::transport("llm", "reset").is_retryable());
        assert!(!ProviderError::decode("llm", "bad json").is_retryable());
        assert!(ProviderError::Timeout {
            provider: "scraper".to_string(),
            after_secs: 30
        }
        .is_retryable());
    }

    #[test]
    fn test_exit_codes_and_categories() {
        let invalid: ValidatorError = InputValidationError::new("bad idea").into();
        assert_eq!(invalid.exit_code(), 2);
        assert_eq!(invalid.category(), "invalid_input");

        let rejected = ValidatorError::Rejected {
            reason: "too costly".to_string(),
        };
        assert_eq!(rejected.exit_code(), 3);
        assert_eq!(rejected.category(), "rejected");

        let cancelled = ValidatorError::Cancelled("ctrl-c".to_string());
        assert_eq!(cancelled.exit_code(), 130);

        let io: ValidatorError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert_eq!(io.exit_code(), 1);
        assert_eq!(io.category(), "io");
    }

    #[test]
    fn test_missing_precursor_hint() {
        let err = ValidatorError::MissingPrecursor {
            workflow: "mvp_only".to_string(),
            stage: "market".to_string(),
        };
        assert!(err.to_string().contains("mvp_only"));
        assert!(err.hint().is_some_and(|h| h.contains("market_data")));
    }
}
