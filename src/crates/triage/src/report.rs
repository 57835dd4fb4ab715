//! Report model and queue-status lifecycle.

use crate::{Result, TriageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a report within the triage pipeline.
///
/// `Open` is set at submission time, outside this crate. `Completed`
/// and `Failed` are terminal: a terminal report is never re-processed
/// except through explicit external resubmission, which creates a
/// fresh report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueStatus {
    /// Awaiting processing.
    Open,
    /// Processed successfully; tracking issue filed.
    Completed,
    /// Processing hit an unrecovered error.
    Failed,
}

impl QueueStatus {
    /// Terminal statuses permit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Failed)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueStatus::Open => write!(f, "OPEN"),
            QueueStatus::Completed => write!(f, "COMPLETED"),
            QueueStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for QueueStatus {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OPEN" => Ok(QueueStatus::Open),
            "COMPLETED" => Ok(QueueStatus::Completed),
            "FAILED" => Ok(QueueStatus::Failed),
            other => Err(TriageError::Config(format!("unknown queue status: {other}"))),
        }
    }
}

/// Structured environment metadata captured at submission time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Environment {
    #[serde(default)]
    pub browser: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    /// Free-form performance timings (load times, memory, etc.).
    #[serde(default)]
    pub performance: Option<serde_json::Value>,
}

/// A bug report record, the unit of work for the pipeline.
///
/// Created `Open` outside this crate; the worker holds a transient
/// in-memory copy for the duration of one job and writes the issue
/// reference and terminal status back through the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Identifier assigned by the store at creation.
    pub id: i64,

    /// Submitter-supplied category. Possibly wrong; the enrichment
    /// engine's corrected category takes precedence downstream.
    pub category: String,

    /// Report title/summary.
    pub title: String,

    /// Detailed description.
    pub description: String,

    /// Ordered steps to reproduce, as submitted.
    pub steps_to_reproduce: Vec<String>,

    /// Page/location the report refers to.
    pub page: Option<String>,

    /// Submitter mood/sentiment tag.
    pub mood: Option<String>,

    /// Submitter classification, e.g. "verified"/"unverified".
    pub submitter_classification: String,

    /// Attachment URI references.
    pub attachments: Vec<String>,

    /// Structured environment metadata.
    pub environment: Environment,

    /// Console/error log snapshot lines.
    pub console_errors: Vec<String>,

    /// Numeric trust/verification score.
    pub trust_score: f64,

    /// External tracking-issue number, set during processing.
    pub tracking_issue_number: Option<i64>,

    /// External tracking-issue URL, set during processing.
    pub tracking_issue_url: Option<String>,

    /// Pipeline lifecycle status.
    pub queue_status: QueueStatus,

    /// Submitter identifier, if known.
    pub submitter_id: Option<String>,

    /// Creation timestamp (ISO8601 string).
    pub created_at: String,

    /// Last update timestamp (ISO8601 string).
    pub updated_at: String,
}

impl Report {
    /// Create a new open report with required fields.
    pub fn new(id: i64, category: impl Into<String>, title: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id,
            category: category.into(),
            title: title.into(),
            description: String::new(),
            steps_to_reproduce: Vec::new(),
            page: None,
            mood: None,
            submitter_classification: "unverified".to_string(),
            attachments: Vec::new(),
            environment: Environment::default(),
            console_errors: Vec::new(),
            trust_score: 0.0,
            tracking_issue_number: None,
            tracking_issue_url: None,
            queue_status: QueueStatus::Open,
            submitter_id: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set steps to reproduce.
    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.steps_to_reproduce = steps;
        self
    }

    /// Transition the queue status.
    ///
    /// Transitions out of a terminal status are rejected. Only the
    /// worker drives this; no other component mutates the status.
    pub fn transition(&mut self, status: QueueStatus) -> Result<()> {
        if self.queue_status.is_terminal() {
            return Err(TriageError::InvalidStateTransition {
                from: self.queue_status.to_string(),
                to: status.to_string(),
            });
        }
        self.queue_status = status;
        self.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_roundtrip() {
        for status in [QueueStatus::Open, QueueStatus::Completed, QueueStatus::Failed] {
            let parsed: QueueStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("open".parse::<QueueStatus>().is_err());
    }

    #[test]
    fn test_open_is_not_terminal() {
        assert!(!QueueStatus::Open.is_terminal());
        assert!(QueueStatus::Completed.is_terminal());
        assert!(QueueStatus::Failed.is_terminal());
    }

    #[test]
    fn test_transition_to_completed() {
        let mut report = Report::new(1, "bug", "Broken login");
        assert!(report.transition(QueueStatus::Completed).is_ok());
        assert_eq!(report.queue_status, QueueStatus::Completed);
    }

    #[test]
    fn test_no_transition_out_of_terminal() {
        let mut report = Report::new(1, "bug", "Broken login");
        report.transition(QueueStatus::Failed).unwrap();

        let err = report.transition(QueueStatus::Open).unwrap_err();
        assert!(matches!(err, TriageError::InvalidStateTransition { .. }));
        assert_eq!(report.queue_status, QueueStatus::Failed);

        assert!(report.transition(QueueStatus::Completed).is_err());
    }

    #[test]
    fn test_report_builder() {
        let report = Report::new(42, "ui", "Button misaligned")
            .with_description("The submit button overlaps the footer")
            .with_steps(vec!["Open /checkout".to_string(), "Scroll down".to_string()]);

        assert_eq!(report.id, 42);
        assert_eq!(report.queue_status, QueueStatus::Open);
        assert_eq!(report.steps_to_reproduce.len(), 2);
        assert!(report.tracking_issue_number.is_none());
    }
}
