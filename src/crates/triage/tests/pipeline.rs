//! End-to-end pipeline tests over the in-process queue with test
//! doubles at every seam: fixed completion backend, counting tracking
//! API, failing ledger, in-memory report store.

use async_trait::async_trait;
use llm::CompletionBackend;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use triage::queue::ReportJobPayload;
use triage::sinks::issue::{CreatedIssue, TrackingApi};
use triage::sinks::{IssueSink, LedgerApi, LedgerSink};
use triage::store::MemoryReportStore;
use triage::{
    EnrichmentEngine, JobHandler, JobQueue, QueueStatus, Report, ReportStore, ReportWorker, Result,
    TriageError, BUG_REPORT_JOB_TYPE,
};

struct FixedBackend(String);

#[async_trait]
impl CompletionBackend for FixedBackend {
    async fn complete(&self, _system: &str, _user: &str) -> llm::Result<String> {
        Ok(self.0.clone())
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// Tracking API double: fails creation a scripted number of times,
/// counts calls, records labels, and notifies per processed job.
struct ScriptedApi {
    fail_creates: u32,
    creates: AtomicU32,
    labels: Mutex<Vec<String>>,
}

impl ScriptedApi {
    fn new(fail_creates: u32) -> Self {
        Self {
            fail_creates,
            creates: AtomicU32::new(0),
            labels: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TrackingApi for ScriptedApi {
    async fn create_issue(
        &self,
        _title: &str,
        _body: &str,
        _assignee: Option<&str>,
    ) -> Result<CreatedIssue> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.fail_creates {
            return Err(TriageError::IssueCreation("503 service unavailable".to_string()));
        }
        Ok(CreatedIssue {
            number: 100 + n as i64,
            url: format!("https://github.com/acme/platform/issues/{}", 100 + n),
        })
    }

    async fn add_labels(&self, _issue_number: i64, labels: &[String]) -> Result<()> {
        self.labels.lock().unwrap().extend(labels.iter().cloned());
        Ok(())
    }
}

struct RecordingLedger {
    rows: Mutex<Vec<Vec<String>>>,
    fail: bool,
}

impl RecordingLedger {
    fn new(fail: bool) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            fail,
        }
    }
}

#[async_trait]
impl LedgerApi for RecordingLedger {
    async fn append_row(&self, _range: &str, values: &[String]) -> Result<()> {
        if self.fail {
            return Err(TriageError::Ledger("quota exceeded".to_string()));
        }
        self.rows.lock().unwrap().push(values.to_vec());
        Ok(())
    }
}

/// Wraps the worker to signal when a job has been fully handled, so
/// tests can await queue-driven processing deterministically.
struct NotifyingHandler {
    inner: ReportWorker,
    done: Arc<Notify>,
    handled: AtomicU32,
}

#[async_trait]
impl JobHandler for NotifyingHandler {
    async fn handle(&self, job: triage::Job) {
        self.inner.handle(job).await;
        self.handled.fetch_add(1, Ordering::SeqCst);
        self.done.notify_waiters();
    }
}

impl NotifyingHandler {
    async fn wait_for(&self, n: u32) {
        while self.handled.load(Ordering::SeqCst) < n {
            self.done.notified().await;
        }
    }
}

fn low_priority_response() -> String {
    r#"{"summary":{"category":"bug","severity":"low","priority":"P3",
    "user_impact":"Minor visual glitch","business_impact":"Negligible",
    "affected_users":"edge_cases","technical_area":"frontend","root_cause":null,
    "reproducibility":"always","recommended_action":"Fix in next sprint",
    "confidence":0.8},"tags":["ui"]}"#
        .to_string()
}

fn high_priority_response() -> String {
    r#"{"summary":{"category":"bug","severity":"high","priority":"P1",
    "user_impact":"Users cannot log in","business_impact":"Signups blocked",
    "affected_users":"all","technical_area":"auth","root_cause":"stale session token",
    "reproducibility":"always","recommended_action":"Roll back",
    "confidence":0.92},"tags":["Login","login","Chrome"]}"#
        .to_string()
}

struct Pipeline {
    store: Arc<MemoryReportStore>,
    api: Arc<ScriptedApi>,
    ledger: Arc<RecordingLedger>,
    queue: JobQueue,
    handler: Arc<NotifyingHandler>,
}

/// Route pipeline logs through the test harness. `RUST_LOG` selects
/// verbosity; repeated calls are no-ops.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn pipeline(response: String, fail_creates: u32, fail_ledger: bool) -> Pipeline {
    init_tracing();

    let store = Arc::new(MemoryReportStore::new());
    let api = Arc::new(ScriptedApi::new(fail_creates));
    let ledger = Arc::new(RecordingLedger::new(fail_ledger));

    let engine = EnrichmentEngine::new(Arc::new(FixedBackend(response)));
    let sink = IssueSink::new(api.clone(), store.clone());
    let worker = ReportWorker::new(store.clone(), engine, sink)
        .with_ledger(LedgerSink::new(ledger.clone(), "reports"));

    let handler = Arc::new(NotifyingHandler {
        inner: worker,
        done: Arc::new(Notify::new()),
        handled: AtomicU32::new(0),
    });

    let queue = JobQueue::new();
    queue.subscribe(BUG_REPORT_JOB_TYPE, handler.clone()).unwrap();

    Pipeline {
        store,
        api,
        ledger,
        queue,
        handler,
    }
}

fn open_report(id: i64) -> Report {
    let mut report = Report::new(id, "bug", "Cannot log in")
        .with_description("Clicking the login button does nothing")
        .with_steps(vec!["Open /login".to_string(), "Click submit".to_string()]);
    report.page = Some("/login".to_string());
    report.trust_score = 0.7;
    report
}

#[tokio::test]
async fn test_happy_path_completes_report() {
    // Scenario: open report, valid enrichment, first-try issue
    // creation, working ledger.
    let p = pipeline(low_priority_response(), 0, false);
    p.store.insert(open_report(42));

    p.queue.enqueue_bug_report_processing(42).unwrap();
    p.handler.wait_for(1).await;

    let report = p.store.get(42).await.unwrap().unwrap();
    assert_eq!(report.queue_status, QueueStatus::Completed);
    assert!(report.tracking_issue_number.is_some());
    assert!(report.tracking_issue_url.is_some());
    assert_eq!(p.api.creates.load(Ordering::SeqCst), 1);
    assert_eq!(p.ledger.rows.lock().unwrap().len(), 1);
    assert_eq!(
        *p.api.labels.lock().unwrap(),
        vec!["priority: P3", "severity: low", "ui"]
    );
}

#[tokio::test]
async fn test_unparsable_enrichment_fails_report_before_issue_sink() {
    // Scenario: backend returns prose with no JSON object at all.
    let p = pipeline("I cannot classify this report, sorry.".to_string(), 0, false);
    p.store.insert(open_report(42));

    p.queue.enqueue_bug_report_processing(42).unwrap();
    p.handler.wait_for(1).await;

    let report = p.store.get(42).await.unwrap().unwrap();
    assert_eq!(report.queue_status, QueueStatus::Failed);
    assert!(report.tracking_issue_number.is_none());
    // issue sink never invoked without a successful enrichment
    assert_eq!(p.api.creates.load(Ordering::SeqCst), 0);
    assert!(p.ledger.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_issue_creation_exhaustion_fails_report() {
    // Scenario: enrichment fine, tracker down for all 3 attempts.
    let p = pipeline(low_priority_response(), 3, false);
    p.store.insert(open_report(42));

    p.queue.enqueue_bug_report_processing(42).unwrap();
    p.handler.wait_for(1).await;

    let report = p.store.get(42).await.unwrap().unwrap();
    assert_eq!(report.queue_status, QueueStatus::Failed);
    assert!(report.tracking_issue_number.is_none());
    assert_eq!(p.api.creates.load(Ordering::SeqCst), 3);
    assert!(p.ledger.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_issue_creation_recovers_within_bound() {
    let p = pipeline(low_priority_response(), 2, false);
    p.store.insert(open_report(42));

    p.queue.enqueue_bug_report_processing(42).unwrap();
    p.handler.wait_for(1).await;

    let report = p.store.get(42).await.unwrap().unwrap();
    assert_eq!(report.queue_status, QueueStatus::Completed);
    assert!(report.tracking_issue_number.is_some());
    // 2 failures then the succeeding attempt, nothing beyond
    assert_eq!(p.api.creates.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_ledger_failure_does_not_downgrade_status() {
    // Scenario: everything succeeds except the ledger.
    let p = pipeline(low_priority_response(), 0, true);
    p.store.insert(open_report(42));

    p.queue.enqueue_bug_report_processing(42).unwrap();
    p.handler.wait_for(1).await;

    let report = p.store.get(42).await.unwrap().unwrap();
    assert_eq!(report.queue_status, QueueStatus::Completed);
    assert!(report.tracking_issue_number.is_some());
}

#[tokio::test]
async fn test_terminal_report_redelivery_is_inert() {
    let p = pipeline(low_priority_response(), 0, false);
    let mut report = open_report(42);
    report.queue_status = QueueStatus::Failed;
    p.store.insert(report);

    p.queue.enqueue_bug_report_processing(42).unwrap();
    p.handler.wait_for(1).await;

    let report = p.store.get(42).await.unwrap().unwrap();
    assert_eq!(report.queue_status, QueueStatus::Failed);
    assert!(report.tracking_issue_number.is_none());
    // no enrichment side effects of any kind
    assert_eq!(p.api.creates.load(Ordering::SeqCst), 0);
    assert!(p.ledger.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_tag_hygiene_applied_end_to_end() {
    // The backend echoes mixed-case duplicate tags; the labels that
    // reach the tracker must be normalized.
    let p = pipeline(high_priority_response(), 0, false);
    p.store.insert(open_report(42));

    p.queue.enqueue_bug_report_processing(42).unwrap();
    p.handler.wait_for(1).await;

    assert_eq!(
        *p.api.labels.lock().unwrap(),
        vec!["priority: P1", "severity: high", "login", "chrome"]
    );
}

#[tokio::test]
async fn test_sequential_reports_processed_in_order() {
    let p = pipeline(low_priority_response(), 0, false);
    for id in 1..=3 {
        p.store.insert(open_report(id));
        p.queue.enqueue_bug_report_processing(id).unwrap();
    }

    p.handler.wait_for(3).await;

    for id in 1..=3 {
        let report = p.store.get(id).await.unwrap().unwrap();
        assert_eq!(report.queue_status, QueueStatus::Completed);
    }

    // ledger rows appear in job order, keyed by report id column
    let rows = p.ledger.rows.lock().unwrap();
    let ids: Vec<&str> = rows.iter().map(|row| row[1].as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_job_payload_carries_report_id_only() {
    let p = pipeline(low_priority_response(), 0, false);
    p.store.insert(open_report(7));

    let job = p.queue.enqueue_bug_report_processing(7).unwrap();
    let payload: ReportJobPayload = serde_json::from_value(job.payload).unwrap();
    assert_eq!(payload.report_id, 7);

    p.handler.wait_for(1).await;
}
