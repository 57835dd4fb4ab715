//! External output sinks.
//!
//! The issue sink files a tracking issue (correctness-critical,
//! retried, failures fatal to the job); the ledger sink mirrors an
//! audit row (best effort, failures invisible to the caller by type).

pub mod github;
pub mod issue;
pub mod ledger;

pub use github::{GithubConfig, GithubIssues};
pub use issue::{CreatedIssue, IssueSink, TrackingApi};
pub use ledger::{CsvLedger, LedgerApi, LedgerSink};
