//! Asynchronous bug-report triage pipeline.
//!
//! A submitted bug report is persisted in `OPEN` status and a job
//! referencing its id is enqueued. A worker dequeues the job, loads
//! the report, enriches it through a completion backend
//! (classification, severity, priority, tags, root-cause hypothesis),
//! files a tracking issue with derived labels, mirrors an audit row
//! to a ledger, and finalizes the report as `COMPLETED`. Any
//! unrecovered error lands the report in `FAILED`; the ledger is
//! best-effort and never fails a job.
//!
//! Components are wired through narrow injected traits
//! ([`store::ReportStore`], [`llm::CompletionBackend`],
//! [`sinks::TrackingApi`], [`sinks::LedgerApi`]) so every seam takes
//! a test double.

pub mod config;
pub mod enrichment;
pub mod queue;
pub mod report;
pub mod retry;
pub mod sinks;
pub mod store;
pub mod worker;

use sinks::{CsvLedger, GithubIssues};
use std::sync::Arc;
use std::time::Duration;
use store::SqliteReportStore;
use thiserror::Error;

/// Errors that can occur while processing a report.
#[derive(Debug, Error)]
pub enum TriageError {
    /// Referenced report missing at load time.
    #[error("Report not found: {0}")]
    ReportNotFound(i64),

    /// Backend unreachable, timed out, or returned an unparsable response.
    #[error("Enrichment failed: {0}")]
    Enrichment(String),

    /// Exhausted retries creating the tracking issue.
    #[error("Issue creation failed: {0}")]
    IssueCreation(String),

    /// Label application failed after the issue was created.
    #[error("Label application failed: {0}")]
    LabelApplication(String),

    /// Ledger append failed. Never escalated past the ledger sink.
    #[error("Ledger append failed: {0}")]
    Ledger(String),

    /// Report store error.
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Queue error (e.g. enqueue without a registered consumer).
    #[error("Queue error: {0}")]
    Queue(String),

    /// Invalid queue-status transition.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for triage operations.
pub type Result<T> = std::result::Result<T, TriageError>;

pub use config::TriageConfig;
pub use enrichment::{EnrichmentEngine, EnrichmentResult, EnrichmentSummary, Priority, Severity};
pub use queue::{Job, JobHandler, JobQueue, BUG_REPORT_JOB_TYPE};
pub use report::{QueueStatus, Report};
pub use retry::{with_retry, RetryConfig};
pub use sinks::{CreatedIssue, IssueSink, LedgerApi, LedgerSink, TrackingApi};
pub use store::{MemoryReportStore, ReportStore};
pub use worker::ReportWorker;

/// Get version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Wire a worker from configuration and subscribe it to the queue.
///
/// Connects the sqlite store (running migrations), builds the Ollama
/// backend and GitHub client, attaches the CSV ledger when one is
/// configured, and registers the worker for
/// [`BUG_REPORT_JOB_TYPE`] jobs. Returns the store so the embedding
/// application can create reports through the same pool.
pub async fn start_worker(config: &TriageConfig, queue: &JobQueue) -> Result<Arc<SqliteReportStore>> {
    config.validate()?;

    let store = Arc::new(SqliteReportStore::connect(&config.database_url).await?);

    let backend = llm::OllamaClient::new(config.llm.clone())
        .map_err(|e| TriageError::Config(e.to_string()))?;
    let engine = EnrichmentEngine::new(Arc::new(backend))
        .with_timeout(Duration::from_secs(config.enrichment_timeout_secs));

    let api = Arc::new(GithubIssues::new(config.github.clone())?);
    let mut issue_sink = IssueSink::new(api, store.clone()).with_retry(config.retry.clone());
    if let Some(assignee) = &config.github.assignee {
        issue_sink = issue_sink.with_assignee(assignee);
    }

    let mut worker = ReportWorker::new(store.clone(), engine, issue_sink);
    if let Some(ledger) = &config.ledger {
        let csv = Arc::new(CsvLedger::new(&ledger.path));
        worker = worker.with_ledger(LedgerSink::new(csv, &ledger.range));
    }

    queue.subscribe(BUG_REPORT_JOB_TYPE, Arc::new(worker))?;
    Ok(store)
}
