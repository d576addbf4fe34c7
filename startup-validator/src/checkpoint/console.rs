//! Terminal reviewer.

use super::{ReviewDecision, ReviewRequest, Reviewer};
use crate::errors::ValidatorError;
use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Asks on stdin/stdout: `y` approves, `n` rejects, `e` reads an edited plan
/// from a JSON file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReviewer;

impl ConsoleReviewer {
    /// Creates a console reviewer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn load_edit(path: &str) -> Result<serde_json::Value, String> {
        let text = std::fs::read_to_string(Path::new(path))
            .map_err(|e| format!("cannot read {path}: {e}"))?;
        let payload: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| format!("invalid JSON in {path}: {e}"))?;
        if payload.is_object() {
            Ok(payload)
        } else {
            Err(format!("{path} must contain a JSON object"))
        }
    }

    /// Runs the prompt loop over arbitrary streams.
    pub fn decide<R: BufRead, W: Write>(
        request: &ReviewRequest,
        input: &mut R,
        output: &mut W,
    ) -> io::Result<ReviewDecision> {
        writeln!(output)?;
        for line in request.summary_lines() {
            writeln!(output, "{line}")?;
        }

        loop {
            write!(output, "\nApprove this MVP plan? [y]es / [n]o / [e]dit: ")?;
            output.flush()?;
            let Some(answer) = Self::read_line(input)? else {
                return Ok(ReviewDecision::Reject {
                    reason: "No decision entered".to_string(),
                });
            };

            match answer.to_lowercase().as_str() {
                "y" | "yes" => return Ok(ReviewDecision::Approve),
                "n" | "no" => {
                    write!(output, "Reason (optional): ")?;
                    output.flush()?;
                    let reason = Self::read_line(input)?
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "Rejected by reviewer".to_string());
                    return Ok(ReviewDecision::Reject { reason });
                }
                "e" | "edit" => {
                    write!(output, "Path to the edited plan (JSON): ")?;
                    output.flush()?;
                    let Some(path) = Self::read_line(input)? else {
                        continue;
                    };
                    match Self::load_edit(&path) {
                        Ok(payload) => return Ok(ReviewDecision::Edit { payload }),
                        Err(message) => writeln!(output, "{message}")?,
                    }
                }
                other => writeln!(output, "Unrecognized answer '{other}'")?,
            }
        }
    }
}

#[async_trait]
impl Reviewer for ConsoleReviewer {
    fn name(&self) -> &str {
        "console"
    }

    async fn review(&self, request: &ReviewRequest) -> Result<ReviewDecision, ValidatorError> {
        let request = request.clone();
        let decision = tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            let stdout = io::stdout();
            Self::decide(&request, &mut stdin.lock(), &mut stdout.lock())
        })
        .await
        .map_err(|e| ValidatorError::Internal(format!("console reviewer task failed: {e}")))??;
        Ok(decision)
    }
}
