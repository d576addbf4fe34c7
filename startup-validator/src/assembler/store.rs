//! Writes reports and stage results to the output directory.

use crate::core::ValidationReport;
use crate::errors::ValidatorError;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const REPORT_TAG_LEN: usize = 12;

/// Files written for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedReport {
    /// The report file.
    pub report_path: PathBuf,
    /// One file per live stage result, when enabled.
    pub intermediate_paths: Vec<PathBuf>,
}

/// Filesystem persistence rooted at an output directory.
///
/// Layout:
///
/// ```text
/// <output_dir>/reports/validation_report_<slug>_<YYYYmmdd_HHMMSS>_<report tag>.json
/// <output_dir>/runs/<run_id>/<stage>_result.json
/// ```
///
/// The report tag is taken from the random tail of the report id, so runs of
/// the same idea within one second never share a file.
#[derive(Debug, Clone)]
pub struct ReportStore {
    output_dir: PathBuf,
    save_intermediate_results: bool,
}

impl ReportStore {
    /// Creates a store that also writes stage results.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            save_intermediate_results: true,
        }
    }

    /// Enables or disables per-stage result files.
    #[must_use]
    pub fn with_intermediate_results(mut self, enabled: bool) -> Self {
        self.save_intermediate_results = enabled;
        self
    }

    /// The root directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Directory holding the report files.
    #[must_use]
    pub fn reports_dir(&self) -> PathBuf {
        self.output_dir.join("reports")
    }

    /// Directory holding the stage result files of one run.
    #[must_use]
    pub fn run_dir(&self, run_id: Uuid) -> PathBuf {
        self.output_dir.join("runs").join(run_id.to_string())
    }

    /// The file name a report is written under.
    #[must_use]
    pub fn report_file_name(report: &ValidationReport) -> String {
        let id = report.report_id().simple().to_string();
        format!(
            "validation_report_{}_{}_{}.json",
            report.idea().slug(),
            report.created_at().format("%Y%m%d_%H%M%S"),
            &id[id.len() - REPORT_TAG_LEN..]
        )
    }

    /// Writes the report and, when enabled, each live stage result.
    pub async fn persist(&self, report: &ValidationReport) -> Result<PersistedReport, ValidatorError> {
        let reports_dir = self.reports_dir();
        tokio::fs::create_dir_all(&reports_dir).await?;

        let report_path = reports_dir.join(Self::report_file_name(report));
        write_json(&report_path, report).await?;

        let mut intermediate_paths = Vec::new();
        if self.save_intermediate_results {
            let run_dir = self.run_dir(report.run_id());
            tokio::fs::create_dir_all(&run_dir).await?;
            for result in report.stage_results() {
                let path = run_dir.join(format!("{}_result.json", result.stage().as_str()));
                write_json(&path, result).await?;
                intermediate_paths.push(path);
            }
        }

        tracing::info!(
            run_id = %report.run_id(),
            path = %report_path.display(),
            intermediate = intermediate_paths.len(),
            "Persisted validation report"
        );

        Ok(PersistedReport {
            report_path,
            intermediate_paths,
        })
    }

    /// Reads a persisted report back.
    pub async fn load(path: impl AsRef<Path>) -> Result<ValidationReport, ValidatorError> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ValidatorError> {
    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');
    tokio::fs::write(path, body).await?;
    Ok(())
}
