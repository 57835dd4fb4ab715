//! Report enrichment.
//!
//! Transforms a raw bug report into a structured triage result
//! (corrected category, severity, priority, tags, impact narratives,
//! root-cause hypothesis) by prompting a completion backend and
//! parsing its output. The backend may be non-deterministic; the
//! engine's contract is schema conformance, not determinism.

pub mod parser;
pub mod prompt;

use crate::report::Report;
use crate::{Result, TriageError};
use llm::CompletionBackend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

pub use parser::{parse_enrichment_response, ParseError};

/// Maximum number of tags an enrichment result may carry.
pub const MAX_TAGS: usize = 5;

/// Ordinal severity vocabulary. Fixed; the engine never invents values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// Ordinal priority vocabulary, P0 (drop everything) to P3 (backlog).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::P0 => write!(f, "P0"),
            Priority::P1 => write!(f, "P1"),
            Priority::P2 => write!(f, "P2"),
            Priority::P3 => write!(f, "P3"),
        }
    }
}

/// Who the defect hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffectedUsers {
    All,
    Some,
    EdgeCases,
    Unknown,
}

/// Classification/triage summary produced by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichmentSummary {
    /// Corrected category. Takes precedence over the submitter's
    /// possibly-wrong classification.
    pub category: String,

    pub severity: Severity,
    pub priority: Priority,

    /// Narrative of the impact on end users.
    #[serde(default)]
    pub user_impact: String,

    /// Narrative of the business impact.
    #[serde(default)]
    pub business_impact: String,

    #[serde(default = "default_affected_users")]
    pub affected_users: AffectedUsers,

    /// Affected technical area, e.g. "frontend", "auth", "payments".
    #[serde(default)]
    pub technical_area: String,

    /// Root-cause hypothesis, if the backend formed one.
    #[serde(default)]
    pub root_cause: Option<String>,

    /// Reproducibility classification, e.g. "always", "intermittent".
    #[serde(default)]
    pub reproducibility: String,

    /// Recommended next action for the triaging team.
    #[serde(default)]
    pub recommended_action: String,

    /// Advisory confidence score, 0.0 - 1.0.
    #[serde(default)]
    pub confidence: f32,
}

fn default_affected_users() -> AffectedUsers {
    AffectedUsers::Unknown
}

/// Structured enrichment result: summary plus free-text tags.
///
/// Not persisted as its own entity; consumed immediately to build the
/// tracking-issue payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichmentResult {
    pub summary: EnrichmentSummary,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl EnrichmentResult {
    /// Enforce tag hygiene: lowercase, trimmed, deduplicated, at most
    /// [`MAX_TAGS`], and never echoing the submitter's category when
    /// the engine judged it wrong.
    pub fn sanitize_tags(&mut self, submitter_category: &str) {
        let corrected = !self
            .summary
            .category
            .eq_ignore_ascii_case(submitter_category);
        let rejected = submitter_category.trim().to_lowercase();

        let mut seen = Vec::with_capacity(MAX_TAGS);
        for tag in &self.tags {
            let tag = tag.trim().to_lowercase();
            if tag.is_empty() || seen.contains(&tag) {
                continue;
            }
            if corrected && tag == rejected {
                continue;
            }
            seen.push(tag);
            if seen.len() == MAX_TAGS {
                break;
            }
        }
        self.tags = seen;
    }
}

/// Enrichment engine: prompt construction, backend call, parsing.
///
/// No retry happens here; a failed or timed-out backend call surfaces
/// as a single enrichment failure and the retry burden stays with the
/// issue sink.
pub struct EnrichmentEngine {
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
}

impl EnrichmentEngine {
    /// Create an engine over the given backend.
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            timeout: Duration::from_secs(60),
        }
    }

    /// Set the backend call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enrich a report.
    ///
    /// Backend unavailability, timeout, and unparsable output all
    /// surface as [`TriageError::Enrichment`]; there are no partial
    /// results.
    #[instrument(skip(self, report), fields(report_id = report.id))]
    pub async fn enrich(&self, report: &Report) -> Result<EnrichmentResult> {
        let user_prompt = prompt::report_prompt(report);

        let raw = tokio::time::timeout(
            self.timeout,
            self.backend.complete(prompt::SYSTEM_PROMPT, &user_prompt),
        )
        .await
        .map_err(|_| {
            TriageError::Enrichment(format!("backend timed out after {:?}", self.timeout))
        })?
        .map_err(|e| TriageError::Enrichment(e.to_string()))?;

        debug!(raw_len = raw.len(), "Received enrichment response");

        let mut result = parse_enrichment_response(&raw)
            .map_err(|e| TriageError::Enrichment(e.to_string()))?;
        result.sanitize_tags(&report.category);

        Ok(result)
    }
}
