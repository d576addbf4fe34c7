//! Validator configuration.
//!
//! Configuration is an explicit record handed to the validator. It is built
//! from defaults, an optional TOML file, then environment variables, and the
//! binary applies command-line flags last.

use crate::errors::ValidatorError;
use crate::pipeline::{ExecutionMode, FailureMode, Workflow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the OpenAI API key.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Environment variable overriding the OpenAI-compatible base URL.
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
/// Environment variable overriding the completion model.
pub const ENV_MODEL: &str = "VALIDATOR_MODEL";
/// Environment variable holding the Serper API key.
pub const ENV_SERPER_API_KEY: &str = "SERPER_API_KEY";
/// Environment variable holding the SerpAPI key.
pub const ENV_SERPAPI_API_KEY: &str = "SERPAPI_API_KEY";

/// Retry limits for transient stage failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Attempts per stage, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Delay cap.
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

/// Credentials and knobs for external collaborators.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
    /// OpenAI (or compatible) API key.
    pub openai_api_key: Option<String>,
    /// Base URL of the chat completions API.
    pub openai_base_url: String,
    /// Completion model.
    pub model: String,
    /// Serper API key.
    pub serper_api_key: Option<String>,
    /// SerpAPI key.
    pub serpapi_api_key: Option<String>,
    /// Search country code.
    pub search_country: String,
    /// Organic results requested per query.
    pub search_results: u32,
    /// User agent for page fetches.
    pub user_agent: String,
    /// Per-request HTTP timeout.
    pub http_timeout_secs: u64,
    /// Competitor pages fetched per run.
    pub max_competitors: usize,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            serper_api_key: None,
            serpapi_api_key: None,
            search_country: "us".to_string(),
            search_results: 10,
            user_agent: "Mozilla/5.0 (compatible; startup-validator/0.1)".to_string(),
            http_timeout_secs: 30,
            max_competitors: 5,
        }
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(key: Option<&String>) -> &'static str {
            if key.is_some() {
                "<redacted>"
            } else {
                "<unset>"
            }
        }
        f.debug_struct("ProviderSettings")
            .field("openai_api_key", &redact(self.openai_api_key.as_ref()))
            .field("openai_base_url", &self.openai_base_url)
            .field("model", &self.model)
            .field("serper_api_key", &redact(self.serper_api_key.as_ref()))
            .field("serpapi_api_key", &redact(self.serpapi_api_key.as_ref()))
            .field("search_country", &self.search_country)
            .field("search_results", &self.search_results)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("max_competitors", &self.max_competitors)
            .finish_non_exhaustive()
    }
}

/// Everything a validation run is configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Where reports and intermediate files go.
    pub output_dir: PathBuf,
    /// Which stages to run.
    pub workflow: Workflow,
    /// What to do when a stage fails.
    pub failure_mode: FailureMode,
    /// Sequential or dependency-wave execution.
    pub execution_mode: ExecutionMode,
    /// Pause for a reviewer after MVP planning.
    pub interactive: bool,
    /// Verbose logging.
    pub debug: bool,
    /// Write `runs/<run_id>/<stage>_result.json` files next to the reports.
    pub save_intermediate_results: bool,
    /// Limit for a single stage attempt.
    pub stage_timeout_secs: u64,
    /// Limit for the reviewer's decision.
    pub review_timeout_secs: u64,
    /// Retry limits.
    pub retry: RetrySettings,
    /// Collaborator settings.
    pub providers: ProviderSettings,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./outputs"),
            workflow: Workflow::default(),
            failure_mode: FailureMode::default(),
            execution_mode: ExecutionMode::default(),
            interactive: false,
            debug: false,
            save_intermediate_results: true,
            stage_timeout_secs: 120,
            review_timeout_secs: 600,
            retry: RetrySettings::default(),
            providers: ProviderSettings::default(),
        }
    }
}

impl ValidatorConfig {
    /// Creates a default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ValidatorError> {
        toml::from_str(text).map_err(|e| ValidatorError::Config(e.to_string()))
    }

    /// Loads configuration from `path`, falling back to defaults when the
    /// path is absent or the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ValidatorError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|e| match e {
            ValidatorError::Config(msg) => {
                ValidatorError::Config(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Overlays provider settings from the process environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_env_lookup(|key| std::env::var(key).ok())
    }

    /// Overlays provider settings from `lookup`. Blank values are ignored.
    #[must_use]
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = read(ENV_OPENAI_API_KEY) {
            self.providers.openai_api_key = Some(key);
        }
        if let Some(url) = read(ENV_OPENAI_BASE_URL) {
            self.providers.openai_base_url = url;
        }
        if let Some(model) = read(ENV_MODEL) {
            self.providers.model = model;
        }
        if let Some(key) = read(ENV_SERPER_API_KEY) {
            self.providers.serper_api_key = Some(key);
        }
        if let Some(key) = read(ENV_SERPAPI_API_KEY) {
            self.providers.serpapi_api_key = Some(key);
        }
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the workflow.
    #[must_use]
    pub fn with_workflow(mut self, workflow: Workflow) -> Self {
        self.workflow = workflow;
        self
    }

    /// Sets the failure mode.
    #[must_use]
    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Sets the execution mode.
    #[must_use]
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    /// Enables or disables the reviewer checkpoint.
    #[must_use]
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Enables or disables intermediate result files.
    #[must_use]
    pub fn with_save_intermediate_results(mut self, save: bool) -> Self {
        self.save_intermediate_results = save;
        self
    }

    /// Sets the per-attempt stage timeout.
    #[must_use]
    pub fn with_stage_timeout_secs(mut self, secs: u64) -> Self {
        self.stage_timeout_secs = secs;
        self
    }

    /// Sets the reviewer timeout.
    #[must_use]
    pub fn with_review_timeout_secs(mut self, secs: u64) -> Self {
        self.review_timeout_secs = secs;
        self
    }

    /// Sets the retry limits.
    #[must_use]
    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    /// Per-attempt stage timeout.
    #[must_use]
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    /// Reviewer timeout.
    #[must_use]
    pub fn review_timeout(&self) -> Duration {
        Duration::from_secs(self.review_timeout_secs)
    }

    /// Rejects settings no run could work with.
    pub fn validate(&self) -> Result<(), ValidatorError> {
        let mut problems = Vec::new();
        if self.output_dir.as_os_str().is_empty() {
            problems.push("output_dir must not be empty");
        }
        if self.stage_timeout_secs == 0 {
            problems.push("stage_timeout_secs must be greater than zero");
        }
        if self.review_timeout_secs == 0 {
            problems.push("review_timeout_secs must be greater than zero");
        }
        if self.retry.max_attempts == 0 {
            problems.push("retry.max_attempts must be at least 1");
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            problems.push("retry.base_delay_ms must not exceed retry.max_delay_ms");
        }
        if self.providers.http_timeout_secs == 0 {
            problems.push("providers.http_timeout_secs must be greater than zero");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidatorError::Config(problems.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ValidatorConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("./outputs"));
        assert_eq!(config.workflow, Workflow::FullValidation);
        assert_eq!(config.failure_mode, FailureMode::FailFast);
        assert_eq!(config.stage_timeout(), Duration::from_secs(120));
        assert_eq!(config.review_timeout(), Duration::from_secs(600));
        assert!(config.save_intermediate_results);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ValidatorConfig::from_toml_str(
            r#"
            workflow = "market_only"
            failure_mode = "best_effort"
            stage_timeout_secs = 30

            [retry]
            max_attempts = 5

            [providers]
            max_competitors = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.workflow, Workflow::MarketOnly);
        assert_eq!(config.failure_mode, FailureMode::BestEffort);
        assert_eq!(config.stage_timeout_secs, 30);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 500);
        assert_eq!(config.providers.max_competitors, 2);
        assert_eq!(config.providers.search_country, "us");
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = ValidatorConfig::from_toml_str("stage_timeout = 5").unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ValidatorConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, ValidatorConfig::default());
    }

    #[test]
    fn test_load_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validator.toml");
        std::fs::write(&path, "interactive = \"yes\"").unwrap();

        let err = ValidatorConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("validator.toml"));
    }

    #[test]
    fn test_env_overlay_ignores_blank_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_SERPER_API_KEY, "serper-123"),
            (ENV_OPENAI_API_KEY, "   "),
            (ENV_MODEL, "gpt-4o"),
        ]);
        let config = ValidatorConfig::default()
            .with_env_lookup(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.providers.serper_api_key.as_deref(), Some("serper-123"));
        assert_eq!(config.providers.openai_api_key, None);
        assert_eq!(config.providers.model, "gpt-4o");
    }

    #[test]
    fn test_validate_collects_problems() {
        let config = ValidatorConfig::default()
            .with_output_dir("")
            .with_stage_timeout_secs(0)
            .with_retry(RetrySettings {
                max_attempts: 0,
                ..RetrySettings::default()
            });

        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("output_dir"));
        assert!(message.contains("stage_timeout_secs"));
        assert!(message.contains("max_attempts"));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let settings = ProviderSettings {
            serper_api_key: Some("secret-value".to_string()),
            ..ProviderSettings::default()
        };
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("<redacted>"));
    }
}
