//! Audit ledger sink.
//!
//! Mirrors every processed report to an append-only ledger. The sink
//! is best-effort by construction: `append` returns `()` and logs
//! failures internally, so a broken ledger can never fail a job.

use crate::report::Report;
use crate::{Result, TriageError};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Append-only row destination for the audit ledger.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Append one row of values to the named range/target.
    async fn append_row(&self, range: &str, values: &[String]) -> Result<()>;
}

/// Best-effort ledger sink.
pub struct LedgerSink {
    api: std::sync::Arc<dyn LedgerApi>,
    range: String,
}

impl LedgerSink {
    pub fn new(api: std::sync::Arc<dyn LedgerApi>, range: impl Into<String>) -> Self {
        Self {
            api,
            range: range.into(),
        }
    }

    /// Append a processed report to the ledger.
    ///
    /// Failures are logged and swallowed; the caller cannot observe
    /// them and must not branch on ledger health.
    pub async fn append(&self, report: &Report, issue_number: i64) {
        let row = build_row(report, issue_number);
        match self.api.append_row(&self.range, &row).await {
            Ok(()) => {
                debug!(report_id = report.id, issue_number, "Ledger row appended");
            }
            Err(e) => {
                warn!(
                    report_id = report.id,
                    issue_number,
                    error = %e,
                    "Ledger append failed; continuing"
                );
            }
        }
    }
}

/// Build the fixed 13-column ledger row for a report.
///
/// Column order is part of the ledger contract; downstream tooling
/// reads by position.
fn build_row(report: &Report, issue_number: i64) -> Vec<String> {
    vec![
        format!("#{issue_number}"),
        report.id.to_string(),
        report.category.clone(),
        report.title.clone(),
        report.page.clone().unwrap_or_default(),
        report.mood.clone().unwrap_or_default(),
        report.submitter_classification.clone(),
        report.queue_status.to_string(),
        report.trust_score.to_string(),
        report.steps_to_reproduce.join(" | "),
        report.console_errors.join(" | "),
        report.attachments.join(" | "),
        report.submitter_id.clone().unwrap_or_default(),
    ]
}

/// File-appending [`LedgerApi`] writing CSV rows to a local file.
///
/// The range is informational only; all rows land in the one file.
pub struct CsvLedger {
    path: PathBuf,
}

impl CsvLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[async_trait]
impl LedgerApi for CsvLedger {
    async fn append_row(&self, _range: &str, values: &[String]) -> Result<()> {
        let line = values
            .iter()
            .map(|v| csv_escape(v))
            .collect::<Vec<_>>()
            .join(",");

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| TriageError::Ledger(format!("open {}: {e}", self.path.display())))?;

        file.write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|e| TriageError::Ledger(format!("write {}: {e}", self.path.display())))?;

        Ok(())
    }
}
