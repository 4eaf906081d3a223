//! Screening workflow — one job description against a batch of resumes.
//!
//! Requirements extraction is the shared prefix of every resume's pipeline,
//! so it runs inside the full pipeline for the first resume only; every
//! later resume gets the cached `job_requirements` value and the three-stage
//! shape. One resume's failure is logged and recorded, never propagated out
//! of the batch loop.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::llm_client::TextGenerator;
use crate::pipeline::audit::{validate_audit, AuditResult};
use crate::pipeline::{Pipeline, PipelineState, StateKey};
use crate::prompts::PromptLibrary;
use crate::usage::UsageLedger;

/// One resume's text, already extracted from its source document.
#[derive(Debug, Clone)]
pub struct ResumeDocument {
    pub name: String,
    pub text: String,
}

/// Terminal fields of one successfully screened resume.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeOutcome {
    pub resume: String,
    pub parsed_resume: String,
    pub compatibility_score: String,
    pub audit: AuditResult,
}

/// A resume whose pipeline invocation aborted.
#[derive(Debug, Clone, Serialize)]
pub struct FailedResume {
    pub resume: String,
    pub error: String,
}

/// Everything the batch produced. Failures are carried explicitly; whether
/// they appear in the rendered results is the caller's choice.
#[derive(Debug, Serialize)]
pub struct ScreeningReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub job_requirements: String,
    pub outcomes: Vec<ResumeOutcome>,
    pub failures: Vec<FailedResume>,
}

/// Screens every resume against the job description, sequentially and in
/// input order. Returns the report plus the token-usage ledger accumulated
/// across all stage invocations.
pub async fn run_screening(
    job_description: &str,
    resumes: &[ResumeDocument],
    prompts: &PromptLibrary,
    generator: &dyn TextGenerator,
) -> (ScreeningReport, UsageLedger) {
    let run_id = Uuid::new_v4();
    let mut ledger = UsageLedger::new();
    let mut outcomes = Vec::new();
    let mut failures = Vec::new();

    let full = Pipeline::full(prompts);
    let per_resume = Pipeline::per_resume(prompts);

    // Computed exactly once per job, then reused for every later resume.
    let mut cached_requirements: Option<String> = None;

    for resume in resumes {
        info!(%run_id, resume = %resume.name, "screening resume");

        let mut state = PipelineState::new();
        state.set(StateKey::JobDescription, job_description);
        state.set(StateKey::ResumeText, resume.text.as_str());

        let pipeline = match &cached_requirements {
            Some(requirements) => {
                state.set(StateKey::JobRequirements, requirements.as_str());
                &per_resume
            }
            None => &full,
        };

        let result = pipeline.run(&mut state, generator, &mut ledger).await;

        // Cache the requirements even if a later stage failed: the shared
        // prefix is valid and must not be recomputed for the next resume.
        if cached_requirements.is_none() {
            if let Some(requirements) = state.get(StateKey::JobRequirements) {
                cached_requirements = Some(requirements.to_string());
            }
        }

        match result {
            Ok(_) => outcomes.push(build_outcome(resume, &state)),
            Err(err) => {
                error!(%run_id, resume = %resume.name, error = %err, "resume pipeline failed");
                failures.push(FailedResume {
                    resume: resume.name.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    let report = ScreeningReport {
        run_id,
        generated_at: Utc::now(),
        job_requirements: cached_requirements.unwrap_or_else(|| "{}".to_string()),
        outcomes,
        failures,
    };

    info!(
        %run_id,
        scored = report.outcomes.len(),
        failed = report.failures.len(),
        "screening batch complete"
    );

    (report, ledger)
}

fn build_outcome(resume: &ResumeDocument, state: &PipelineState) -> ResumeOutcome {
    let audit_raw = state.get(StateKey::AuditResult).unwrap_or("{}");
    // Raw-text degradation means the audit field may not be JSON at all;
    // a string value routes it through the validator's fail-safe path.
    let audit_value: Value = serde_json::from_str(audit_raw)
        .unwrap_or_else(|_| Value::String(audit_raw.to_string()));
    let audit = validate_audit(&audit_value);

    ResumeOutcome {
        resume: resume.name.clone(),
        parsed_resume: state
            .get(StateKey::ParsedResume)
            .unwrap_or("{}")
            .to_string(),
        compatibility_score: state
            .get(StateKey::CompatibilityScore)
            .unwrap_or("{}")
            .to_string(),
        audit,
    }
}

/// Pretty-prints JSON text for the console report; non-JSON text is
/// returned unchanged.
pub fn pretty_json(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_string())
        }
        Err(_) => text.to_string(),
    }
}
