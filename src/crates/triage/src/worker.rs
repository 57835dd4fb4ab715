//! Report processing worker.
//!
//! Consumes bug-report jobs and drives each report to a terminal
//! status. The handler boundary is absorbing: every failure is logged
//! and recorded as a FAILED report, none escapes to the queue.

use crate::enrichment::EnrichmentEngine;
use crate::queue::{Job, JobHandler, ReportJobPayload};
use crate::report::{QueueStatus, Report};
use crate::sinks::{IssueSink, LedgerSink};
use crate::store::ReportStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Worker consuming bug-report jobs from the queue.
///
/// One instance subscribes per process; the queue guarantees it sees
/// each job exactly once, in enqueue order.
pub struct ReportWorker {
    store: Arc<dyn ReportStore>,
    engine: EnrichmentEngine,
    issue_sink: IssueSink,
    ledger: Option<LedgerSink>,
}

impl ReportWorker {
    pub fn new(store: Arc<dyn ReportStore>, engine: EnrichmentEngine, issue_sink: IssueSink) -> Self {
        Self {
            store,
            engine,
            issue_sink,
            ledger: None,
        }
    }

    /// Attach an audit ledger. Optional; processing is identical
    /// without one.
    pub fn with_ledger(mut self, ledger: LedgerSink) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Mark the report FAILED, absorbing any store error.
    async fn fail(&self, report_id: i64) {
        if let Err(e) = self
            .store
            .set_queue_status(report_id, QueueStatus::Failed)
            .await
        {
            error!(report_id, error = %e, "Could not record FAILED status");
        }
    }

    async fn process(&self, report: Report) {
        let report_id = report.id;

        let enrichment = match self.engine.enrich(&report).await {
            Ok(enrichment) => enrichment,
            Err(e) => {
                error!(report_id, error = %e, "Enrichment failed");
                self.fail(report_id).await;
                return;
            }
        };

        info!(
            report_id,
            category = %enrichment.summary.category,
            severity = %enrichment.summary.severity,
            priority = %enrichment.summary.priority,
            "Report enriched"
        );

        let issue = match self.issue_sink.file_issue(&report, &enrichment).await {
            Ok(issue) => issue,
            Err(e) => {
                error!(report_id, error = %e, "Issue filing failed");
                self.fail(report_id).await;
                return;
            }
        };

        if let Some(ledger) = &self.ledger {
            ledger.append(&report, issue.number).await;
        }

        if let Err(e) = self
            .store
            .set_queue_status(report_id, QueueStatus::Completed)
            .await
        {
            error!(report_id, error = %e, "Could not record COMPLETED status");
            return;
        }

        info!(report_id, issue_number = issue.number, "Report processed");
    }
}

#[async_trait]
impl JobHandler for ReportWorker {
    async fn handle(&self, job: Job) {
        let payload: ReportJobPayload = match serde_json::from_value(job.payload) {
            Ok(payload) => payload,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Malformed job payload");
                return;
            }
        };

        let report = match self.store.get(payload.report_id).await {
            Ok(Some(report)) => report,
            Ok(None) => {
                warn!(report_id = payload.report_id, "Report not found; dropping job");
                return;
            }
            Err(e) => {
                // A store that cannot serve the load cannot record
                // FAILED either; log and drop, like a missing report.
                error!(report_id = payload.report_id, error = %e, "Report load failed");
                return;
            }
        };

        // Redelivered or resubmitted work on an already-settled report
        // must be a no-op: no enrichment, no issue, no status write.
        if report.queue_status.is_terminal() {
            info!(
                report_id = report.id,
                status = %report.queue_status,
                "Report already terminal; skipping"
            );
            return;
        }

        self.process(report).await;
    }
}
