//! Tracking-issue sink.

use crate::enrichment::EnrichmentResult;
use crate::report::Report;
use crate::retry::{with_retry, RetryConfig};
use crate::store::ReportStore;
use crate::Result;
use async_trait::async_trait;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{info, instrument};

/// Reference to a created tracking issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIssue {
    /// External issue number.
    pub number: i64,
    /// Issue URL.
    pub url: String,
}

/// External bug-tracking system.
///
/// Implementations map their failures onto
/// [`TriageError::IssueCreation`](crate::TriageError::IssueCreation)
/// and [`TriageError::LabelApplication`](crate::TriageError::LabelApplication)
/// respectively.
#[async_trait]
pub trait TrackingApi: Send + Sync {
    /// Create an issue, returning its number and URL.
    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        assignee: Option<&str>,
    ) -> Result<CreatedIssue>;

    /// Apply labels to an existing issue.
    async fn add_labels(&self, issue_number: i64, labels: &[String]) -> Result<()>;
}

/// Files tracking issues for enriched reports.
///
/// Creation is retried up to the configured attempt bound; the issue
/// reference is persisted onto the report as soon as creation
/// succeeds, and label application happens after that, once, with a
/// failure treated as fatal. A label failure therefore leaves a
/// report that carries a real issue reference yet ends up FAILED with
/// the issue unlabeled; that window is a property of the flow this
/// sink reproduces, kept deliberately.
pub struct IssueSink {
    api: Arc<dyn TrackingApi>,
    store: Arc<dyn ReportStore>,
    retry: RetryConfig,
    assignee: Option<String>,
}

impl IssueSink {
    /// Create a sink over the given tracking API and report store.
    pub fn new(api: Arc<dyn TrackingApi>, store: Arc<dyn ReportStore>) -> Self {
        Self {
            api,
            store,
            retry: RetryConfig::default(),
            assignee: None,
        }
    }

    /// Set the retry configuration for issue creation.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the default assignee for created issues.
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Derive issue labels from an enrichment result:
    /// `priority: P{n}`, `severity: {level}`, then each tag verbatim.
    pub fn derive_labels(enrichment: &EnrichmentResult) -> Vec<String> {
        let mut labels = vec![
            format!("priority: {}", enrichment.summary.priority),
            format!("severity: {}", enrichment.summary.severity),
        ];
        labels.extend(enrichment.tags.iter().cloned());
        labels
    }

    fn issue_title(report: &Report, enrichment: &EnrichmentResult) -> String {
        format!(
            "[{}][{}] {}",
            enrichment.summary.priority, enrichment.summary.severity, report.title
        )
    }

    fn issue_body(report: &Report, enrichment: &EnrichmentResult) -> String {
        let s = &enrichment.summary;
        let mut body = String::new();

        let _ = writeln!(body, "## Description\n\n{}\n", report.description);

        if !report.steps_to_reproduce.is_empty() {
            let _ = writeln!(body, "## Steps to reproduce\n");
            for (i, step) in report.steps_to_reproduce.iter().enumerate() {
                let _ = writeln!(body, "{}. {}", i + 1, step);
            }
            body.push('\n');
        }

        let _ = writeln!(body, "## Triage\n");
        let _ = writeln!(body, "- **Category**: {}", s.category);
        let _ = writeln!(body, "- **Severity**: {}", s.severity);
        let _ = writeln!(body, "- **Priority**: {}", s.priority);
        let _ = writeln!(body, "- **User impact**: {}", s.user_impact);
        let _ = writeln!(body, "- **Business impact**: {}", s.business_impact);
        let _ = writeln!(body, "- **Affected users**: {:?}", s.affected_users);
        let _ = writeln!(body, "- **Technical area**: {}", s.technical_area);
        if let Some(root_cause) = &s.root_cause {
            let _ = writeln!(body, "- **Root-cause hypothesis**: {root_cause}");
        }
        let _ = writeln!(body, "- **Reproducibility**: {}", s.reproducibility);
        let _ = writeln!(body, "- **Recommended action**: {}", s.recommended_action);
        let _ = writeln!(body, "- **Confidence**: {:.2}\n", s.confidence);

        let _ = writeln!(body, "## Context\n");
        let _ = writeln!(body, "- Report id: {}", report.id);
        if let Some(page) = &report.page {
            let _ = writeln!(body, "- Page: {page}");
        }
        if let Some(mood) = &report.mood {
            let _ = writeln!(body, "- Reporter mood: {mood}");
        }
        let _ = writeln!(
            body,
            "- Submitter: {} ({}, trust {:.2})",
            report.submitter_id.as_deref().unwrap_or("anonymous"),
            report.submitter_classification,
            report.trust_score
        );
        if let Some(browser) = &report.environment.browser {
            let _ = writeln!(body, "- Browser: {browser}");
        }
        if let Some(os) = &report.environment.os {
            let _ = writeln!(body, "- OS: {os}");
        }

        if !report.console_errors.is_empty() {
            let _ = writeln!(body, "\n## Console errors\n\n```");
            for line in &report.console_errors {
                let _ = writeln!(body, "{line}");
            }
            let _ = writeln!(body, "```");
        }

        if !report.attachments.is_empty() {
            let _ = writeln!(body, "\n## Attachments\n");
            for uri in &report.attachments {
                let _ = writeln!(body, "- {uri}");
            }
        }

        body
    }

    /// Create the tracking issue for an enriched report.
    ///
    /// Side-effect order: create (retried) → persist issue reference
    /// onto the report → apply labels (once, fatal on failure).
    #[instrument(skip_all, fields(report_id = report.id))]
    pub async fn file_issue(
        &self,
        report: &Report,
        enrichment: &EnrichmentResult,
    ) -> Result<CreatedIssue> {
        let title = Self::issue_title(report, enrichment);
        let body = Self::issue_body(report, enrichment);

        let issue = with_retry(&self.retry, "create_tracking_issue", || {
            self.api
                .create_issue(&title, &body, self.assignee.as_deref())
        })
        .await?;

        info!(issue_number = issue.number, url = %issue.url, "Tracking issue created");

        self.store
            .set_issue_reference(report.id, issue.number, &issue.url)
            .await?;

        let labels = Self::derive_labels(enrichment);
        self.api.add_labels(issue.number, &labels).await?;

        Ok(issue)
    }
}
