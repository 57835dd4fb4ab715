//! Prompt construction for report enrichment.
//!
//! The user prompt serializes every available report field; the
//! classifier degrades sharply when under-informed, so nothing is
//! discarded here.

use crate::report::Report;
use std::fmt::Write;

/// System prompt fixing the output schema and the ordinal vocabularies.
pub const SYSTEM_PROMPT: &str = r#"You are a bug-triage assistant for a social blogging platform.

Given a user-submitted bug report, classify and triage it. The submitter's category may be wrong; correct it when the evidence says otherwise.

Respond with ONLY a JSON object in exactly this shape, no other text:

{
  "summary": {
    "category": "corrected category",
    "severity": "low" | "medium" | "high",
    "priority": "P0" | "P1" | "P2" | "P3",
    "user_impact": "how this affects end users",
    "business_impact": "how this affects the business",
    "affected_users": "all" | "some" | "edge_cases" | "unknown",
    "technical_area": "affected technical area",
    "root_cause": "most likely root cause, or null",
    "reproducibility": "always" | "intermittent" | "once" | "unknown",
    "recommended_action": "recommended next step",
    "confidence": 0.0
  },
  "tags": ["up to 5 lowercase tags reflecting your corrected classification"]
}"#;

fn push_field(out: &mut String, label: &str, value: &str) {
    if !value.is_empty() {
        let _ = writeln!(out, "{label}: {value}");
    }
}

fn push_opt(out: &mut String, label: &str, value: &Option<String>) {
    if let Some(v) = value {
        push_field(out, label, v);
    }
}

/// Serialize a report into the enrichment user prompt.
///
/// Includes ALL available signal: description, steps, page, mood,
/// submitter classification and trust score, attachments, environment
/// metadata, and the console-error snapshot.
pub fn report_prompt(report: &Report) -> String {
    let mut out = String::new();

    push_field(&mut out, "Report id", &report.id.to_string());
    push_field(&mut out, "Submitted category", &report.category);
    push_field(&mut out, "Title", &report.title);
    push_field(&mut out, "Description", &report.description);

    if !report.steps_to_reproduce.is_empty() {
        let _ = writeln!(out, "Steps to reproduce:");
        for (i, step) in report.steps_to_reproduce.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", i + 1, step);
        }
    }

    push_opt(&mut out, "Page", &report.page);
    push_opt(&mut out, "Reporter mood", &report.mood);
    push_field(
        &mut out,
        "Submitter classification",
        &report.submitter_classification,
    );
    let _ = writeln!(out, "Trust score: {:.2}", report.trust_score);

    push_opt(&mut out, "Browser", &report.environment.browser);
    push_opt(&mut out, "OS", &report.environment.os);
    push_opt(&mut out, "Device", &report.environment.device);
    if let Some(perf) = &report.environment.performance {
        let _ = writeln!(out, "Performance: {perf}");
    }

    if !report.console_errors.is_empty() {
        let _ = writeln!(out, "Console errors:");
        for line in &report.console_errors {
            let _ = writeln!(out, "  {line}");
        }
    }

    if !report.attachments.is_empty() {
        let _ = writeln!(
            out,
            "Attachments: {}",
            report.attachments.join(", ")
        );
    }

    out
}
