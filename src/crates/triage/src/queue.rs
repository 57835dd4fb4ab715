//! In-process job queue.
//!
//! Durable hand-off between report submission and enrichment
//! processing, decoupling request latency from backend latency.
//! There is one channel per job type; enqueue returns immediately and
//! never blocks on downstream processing, delivery is FIFO per job
//! type, and one consumer loop per type processes jobs one at a time,
//! so at most one consumer ever holds a given job.
//!
//! The queue offers no redelivery. A handler returns `()`, never an
//! error; a job is "handled" either way and failure visibility is the
//! report's FAILED status, written by the worker. The queue is an
//! explicitly constructed value passed into whatever needs it; there
//! is no global connection.

use crate::{Result, TriageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Job type for bug-report enrichment processing.
pub const BUG_REPORT_JOB_TYPE: &str = "bug-report-processing";

/// A queued unit of work.
///
/// The payload carries identifiers only, never data copies, so the
/// worker always loads fresh state at processing time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: Uuid,
    /// Job type the consumer subscribed to.
    pub job_type: String,
    /// Small JSON payload referencing the work.
    pub payload: serde_json::Value,
    /// Enqueue timestamp.
    pub enqueued_at: DateTime<Utc>,
}

/// Payload for [`BUG_REPORT_JOB_TYPE`] jobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReportJobPayload {
    pub report_id: i64,
}

/// Consumer callback for a job type.
///
/// Returns `()` by contract: the queue never observes a failed job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: Job);
}

struct Channel {
    tx: mpsc::UnboundedSender<Job>,
    // Held until a consumer subscribes; jobs enqueued before that
    // buffer in the channel.
    rx: Option<mpsc::UnboundedReceiver<Job>>,
}

/// In-process job queue with one FIFO channel per job type.
#[derive(Default)]
pub struct JobQueue {
    channels: Mutex<HashMap<String, Channel>>,
}

impl JobQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Enqueue a job. Returns immediately.
    pub fn enqueue(&self, job_type: &str, payload: serde_json::Value) -> Result<Job> {
        let job = Job {
            id: Uuid::new_v4(),
            job_type: job_type.to_string(),
            payload,
            enqueued_at: Utc::now(),
        };

        let mut channels = self.channels.lock().unwrap();
        let channel = channels
            .entry(job_type.to_string())
            .or_insert_with(new_channel);

        channel
            .tx
            .send(job.clone())
            .map_err(|_| TriageError::Queue(format!("consumer for '{job_type}' is gone")))?;

        debug!(job_id = %job.id, job_type, "Enqueued job");
        Ok(job)
    }

    /// Enqueue enrichment processing for a newly created report.
    ///
    /// The caller must have committed the report in OPEN status before
    /// calling this, so the worker's load never races an uncommitted
    /// write.
    pub fn enqueue_bug_report_processing(&self, report_id: i64) -> Result<Job> {
        self.enqueue(
            BUG_REPORT_JOB_TYPE,
            serde_json::to_value(ReportJobPayload { report_id })?,
        )
    }

    /// Register the consumer for a job type and start its loop.
    ///
    /// At most one consumer per job type; a second subscription is an
    /// error. Jobs enqueued before subscription are delivered first,
    /// in order.
    pub fn subscribe(&self, job_type: &str, handler: Arc<dyn JobHandler>) -> Result<()> {
        let mut rx = {
            let mut channels = self.channels.lock().unwrap();
            let channel = channels
                .entry(job_type.to_string())
                .or_insert_with(new_channel);
            channel
                .rx
                .take()
                .ok_or_else(|| TriageError::Queue(format!("'{job_type}' already has a consumer")))?
        };

        let job_type = job_type.to_string();
        tokio::spawn(async move {
            info!(job_type, "Job consumer started");
            while let Some(job) = rx.recv().await {
                debug!(job_id = %job.id, job_type, "Dispatching job");
                handler.handle(job).await;
            }
            info!(job_type, "Job consumer stopped");
        });

        Ok(())
    }
}

fn new_channel() -> Channel {
    let (tx, rx) = mpsc::unbounded_channel();
    Channel { tx, rx: Some(rx) }
}
