//! Audit result validation — the single gate between untrusted generated
//! text and downstream consumers.
//!
//! Whatever the audit stage produced, validation always yields a complete,
//! range-valid `AuditResult`. Missing fields are default-filled, numeric
//! fields are clamped, and a structurally unusable payload collapses into a
//! fixed fail-safe record routed to human review. This function never fails.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Final audit decision for one resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Accept,
    Review,
    Reject,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Accept => "ACCEPT",
            Decision::Review => "REVIEW",
            Decision::Reject => "REJECT",
        }
    }
}

/// Canonical audit record. Every field is present and range-valid after
/// validation. Serializes camelCase to match the persisted artifact format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub audit_score: f64,
    pub original_score: f64,
    pub recommended_score: f64,
    pub accuracy_assessment: String,
    pub completeness_review: String,
    pub bias_analysis: String,
    pub scoring_rationale: String,
    pub concerns: Vec<String>,
    pub strengths: Vec<String>,
    pub recommendations: Vec<String>,
    pub final_decision: Decision,
    pub confidence: f64,
    pub audit_notes: String,
}

/// Validates and normalizes the audit stage's parsed output.
pub fn validate_audit(value: &Value) -> AuditResult {
    match try_validate(value) {
        Ok(result) => result,
        Err(reason) => {
            warn!(%reason, "audit validation failed, substituting fail-safe record");
            fallback(&reason)
        }
    }
}

/// Decision thresholds, applied only when the generated decision is missing
/// or not one of ACCEPT/REVIEW/REJECT.
pub fn derive_decision(recommended_score: f64) -> Decision {
    if recommended_score >= 80.0 {
        Decision::Accept
    } else if recommended_score >= 60.0 {
        Decision::Review
    } else {
        Decision::Reject
    }
}

fn try_validate(value: &Value) -> Result<AuditResult, String> {
    let map = value
        .as_object()
        .ok_or_else(|| format!("audit output is not a JSON object (found {})", json_type(value)))?;

    let recommended_score = clamp_score(number_or(map, "recommendedScore", 0.0));

    let final_decision = match map.get("finalDecision").and_then(Value::as_str) {
        Some("ACCEPT") => Decision::Accept,
        Some("REVIEW") => Decision::Review,
        Some("REJECT") => Decision::Reject,
        _ => derive_decision(recommended_score),
    };

    Ok(AuditResult {
        audit_score: clamp_score(number_or(map, "auditScore", 0.0)),
        original_score: clamp_score(number_or(map, "originalScore", 0.0)),
        recommended_score,
        accuracy_assessment: text_or(map, "accuracyAssessment"),
        completeness_review: text_or(map, "completenessReview"),
        bias_analysis: text_or(map, "biasAnalysis"),
        scoring_rationale: text_or(map, "scoringRationale"),
        concerns: list_or(map, "concerns"),
        strengths: list_or(map, "strengths"),
        recommendations: list_or(map, "recommendations"),
        final_decision,
        confidence: number_or(map, "confidence", 0.5).clamp(0.0, 1.0),
        audit_notes: text_or(map, "auditNotes"),
    })
}

/// The fixed fail-safe record: everything zeroed, decision REVIEW, and the
/// error description preserved in the notes so a human can see what happened.
fn fallback(reason: &str) -> AuditResult {
    AuditResult {
        audit_score: 0.0,
        original_score: 0.0,
        recommended_score: 0.0,
        accuracy_assessment: "Validation error".to_string(),
        completeness_review: "Validation error".to_string(),
        bias_analysis: "Validation error".to_string(),
        scoring_rationale: "Validation error".to_string(),
        concerns: vec!["Audit validation failed".to_string()],
        strengths: vec![],
        recommendations: vec!["Manual review required".to_string()],
        final_decision: Decision::Review,
        confidence: 0.0,
        audit_notes: format!("Validation error: {reason}"),
    }
}

/// Non-numeric values coerce to the default before clamping.
fn number_or(map: &Map<String, Value>, key: &str, default: f64) -> f64 {
    map.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn text_or(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "Not assessed".to_string())
}

fn list_or(map: &Map<String, Value>, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
