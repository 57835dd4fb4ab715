//! Report persistence.
//!
//! The pipeline owns no report data; it reads and patches records
//! through the narrow [`ReportStore`] trait. The sqlite-backed
//! implementation lives in [`sqlite`]; [`MemoryReportStore`] backs
//! tests and embedding.

pub mod sqlite;

use crate::report::{QueueStatus, Report};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

pub use sqlite::SqliteReportStore;

/// Narrow persistence interface the worker mutates reports through.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Insert a new report, returning its assigned id.
    ///
    /// Submission happens outside the pipeline; this exists so the
    /// submitting side and tests share one interface. The caller's
    /// contract is to commit the report before enqueuing its job.
    async fn create(&self, report: Report) -> Result<i64>;

    /// Fetch a report by id.
    async fn get(&self, id: i64) -> Result<Option<Report>>;

    /// Persist the external tracking-issue reference.
    async fn set_issue_reference(&self, id: i64, issue_number: i64, issue_url: &str) -> Result<()>;

    /// Persist a queue-status transition.
    async fn set_queue_status(&self, id: i64, status: QueueStatus) -> Result<()>;
}

/// In-memory report store for tests and embedding.
#[derive(Default)]
pub struct MemoryReportStore {
    reports: Mutex<HashMap<i64, Report>>,
    next_id: Mutex<i64>,
}

impl MemoryReportStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            reports: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
        }
    }

    /// Insert a report keeping its existing id. Test convenience.
    pub fn insert(&self, report: Report) {
        self.reports.lock().unwrap().insert(report.id, report);
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn create(&self, mut report: Report) -> Result<i64> {
        let mut next = self.next_id.lock().unwrap();
        let id = *next;
        *next += 1;
        drop(next);

        report.id = id;
        self.reports.lock().unwrap().insert(id, report);
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Option<Report>> {
        Ok(self.reports.lock().unwrap().get(&id).cloned())
    }

    async fn set_issue_reference(&self, id: i64, issue_number: i64, issue_url: &str) -> Result<()> {
        let mut reports = self.reports.lock().unwrap();
        let report = reports
            .get_mut(&id)
            .ok_or(crate::TriageError::ReportNotFound(id))?;
        report.tracking_issue_number = Some(issue_number);
        report.tracking_issue_url = Some(issue_url.to_string());
        report.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(())
    }

    async fn set_queue_status(&self, id: i64, status: QueueStatus) -> Result<()> {
        let mut reports = self.reports.lock().unwrap();
        let report = reports
            .get_mut(&id)
            .ok_or(crate::TriageError::ReportNotFound(id))?;
        report.transition(status)
    }
}
