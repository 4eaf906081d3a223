//! Pipeline core — the shared state record, the generic stage contract, and
//! the linear state machine that drives one screening run.
//!
//! Stages advance strictly forward:
//! Start → JobRequirements → ResumeParsed → CompatibilityScored → Audited →
//! Done, with an absorbing Failed state on the first unrecovered error.
//! Each stage validates its required state fields, renders its prompt
//! template, calls the text generator, and writes exactly one output field.

pub mod audit;
pub mod extract;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::errors::PipelineError;
use crate::llm_client::{GenerationRequest, TextGenerator, AUDIT_MODEL, EXTRACTION_MODEL};
use crate::prompts::{PromptLibrary, PromptTemplate};
use crate::usage::UsageLedger;

/// Named fields of the pipeline state. Presence of a key is the contract
/// between stages; values are always strings (raw text or JSON text).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKey {
    JobDescription,
    ResumeText,
    JobRequirements,
    ParsedResume,
    CompatibilityScore,
    AuditResult,
}

impl StateKey {
    pub fn as_str(self) -> &'static str {
        match self {
            StateKey::JobDescription => "job_description",
            StateKey::ResumeText => "resume_text",
            StateKey::JobRequirements => "job_requirements",
            StateKey::ParsedResume => "parsed_resume",
            StateKey::CompatibilityScore => "compatibility_score",
            StateKey::AuditResult => "audit_result",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mutable record threaded through all stages of one pipeline invocation.
/// One instance per (job, resume) pair, discarded after the run terminates.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    fields: BTreeMap<StateKey, String>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: StateKey, value: impl Into<String>) {
        self.fields.insert(key, value.into());
    }

    pub fn get(&self, key: StateKey) -> Option<&str> {
        self.fields.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: StateKey) -> bool {
        self.fields.contains_key(&key)
    }

    /// The subset of `required` not present in the state, in declaration order.
    pub fn missing(&self, required: &[StateKey]) -> Vec<StateKey> {
        required
            .iter()
            .copied()
            .filter(|key| !self.contains(*key))
            .collect()
    }

    /// Compact snapshot for stage logs: key names with value lengths.
    fn snapshot(&self) -> String {
        self.fields
            .iter()
            .map(|(key, value)| format!("{key}({} chars)", value.chars().count()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Progress of one pipeline invocation through the stage sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    JobRequirements,
    ResumeParsed,
    CompatibilityScored,
    Audited,
    Done,
    /// Terminal: the invocation aborted on an unrecovered stage error.
    Failed,
}

fn phase_after(output: StateKey) -> Phase {
    match output {
        StateKey::JobRequirements => Phase::JobRequirements,
        StateKey::ParsedResume => Phase::ResumeParsed,
        StateKey::CompatibilityScore => Phase::CompatibilityScored,
        StateKey::AuditResult => Phase::Audited,
        // Input keys are never stage outputs.
        StateKey::JobDescription | StateKey::ResumeText => Phase::Start,
    }
}

/// One pipeline stage: required fields in, one output field written.
pub struct Stage {
    pub name: &'static str,
    pub required: &'static [StateKey],
    pub output: StateKey,
    pub template: PromptTemplate,
    pub model: &'static str,
    pub temperature: f32,
}

impl Stage {
    /// Runs the stage against `state`, recording token usage in `ledger`.
    ///
    /// Precondition failures and generation errors propagate; an output with
    /// no parseable JSON degrades to storing the raw text.
    pub async fn run(
        &self,
        state: &mut PipelineState,
        generator: &dyn TextGenerator,
        ledger: &mut UsageLedger,
    ) -> Result<(), PipelineError> {
        let missing = state.missing(self.required);
        if !missing.is_empty() {
            return Err(PipelineError::MissingState {
                stage: self.name,
                missing,
            });
        }

        debug!(stage = self.name, state = %state.snapshot(), "stage input state");

        let mut prompt = self.template.text().to_string();
        for &key in self.required {
            if let Some(value) = state.get(key) {
                prompt = prompt.replace(&format!("{{{{{key}}}}}"), value);
            }
        }

        let generation = generator
            .generate(GenerationRequest {
                prompt: &prompt,
                model: self.model,
                temperature: self.temperature,
            })
            .await
            .map_err(|source| PipelineError::Generation {
                stage: self.name,
                source,
            })?;

        ledger.record(self.name, &generation.usage);

        match extract::extract_json(&generation.text) {
            Ok(value) => state.set(self.output, value.to_string()),
            Err(extract::ExtractionFailure) => {
                warn!(
                    stage = self.name,
                    "no parseable JSON in generated output, storing raw text"
                );
                state.set(self.output, generation.text);
            }
        }

        info!(stage = self.name, output = %self.output, "stage complete");
        Ok(())
    }
}

/// A fixed-order sequence of stages over one shared state record.
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// The full four-stage shape, used once per job: requirements extraction
    /// runs here and its output is cached for the remaining resumes.
    pub fn full(prompts: &PromptLibrary) -> Self {
        Self {
            stages: vec![
                job_requirements_stage(prompts.job_requirements.clone()),
                resume_parsing_stage(prompts.resume_parser.clone()),
                compatibility_stage(prompts.compatibility.clone()),
                audit_stage(prompts.audit.clone()),
            ],
        }
    }

    /// The three-stage per-resume shape, seeded with cached `job_requirements`
    /// so requirements extraction never repeats for the same job.
    pub fn per_resume(prompts: &PromptLibrary) -> Self {
        Self {
            stages: vec![
                resume_parsing_stage(prompts.resume_parser.clone()),
                compatibility_stage(prompts.compatibility.clone()),
                audit_stage(prompts.audit.clone()),
            ],
        }
    }

    /// Runs all stages in order. Returns the terminal phase (`Done`) or the
    /// first unrecovered error; `Failed` is absorbing, so nothing after the
    /// failing stage executes.
    pub async fn run(
        &self,
        state: &mut PipelineState,
        generator: &dyn TextGenerator,
        ledger: &mut UsageLedger,
    ) -> Result<Phase, PipelineError> {
        let mut phase = Phase::Start;
        for stage in &self.stages {
            if let Err(err) = stage.run(state, generator, ledger).await {
                error!(
                    stage = stage.name,
                    error = %err,
                    from = ?phase,
                    to = ?Phase::Failed,
                    "pipeline failed"
                );
                return Err(err);
            }
            phase = phase_after(stage.output);
            debug!(?phase, "pipeline advanced");
        }
        Ok(Phase::Done)
    }
}

fn job_requirements_stage(template: PromptTemplate) -> Stage {
    Stage {
        name: "job_requirements",
        required: &[StateKey::JobDescription],
        output: StateKey::JobRequirements,
        template,
        model: EXTRACTION_MODEL,
        temperature: 0.0,
    }
}

fn resume_parsing_stage(template: PromptTemplate) -> Stage {
    Stage {
        name: "resume_parsing",
        required: &[StateKey::ResumeText],
        output: StateKey::ParsedResume,
        template,
        model: EXTRACTION_MODEL,
        temperature: 0.0,
    }
}

fn compatibility_stage(template: PromptTemplate) -> Stage {
    Stage {
        name: "compatibility_scoring",
        required: &[StateKey::JobRequirements, StateKey::ParsedResume],
        output: StateKey::CompatibilityScore,
        template,
        model: EXTRACTION_MODEL,
        temperature: 0.0,
    }
}

fn audit_stage(template: PromptTemplate) -> Stage {
    Stage {
        name: "audit",
        required: &[
            StateKey::JobRequirements,
            StateKey::ParsedResume,
            StateKey::CompatibilityScore,
        ],
        output: StateKey::AuditResult,
        template,
        model: AUDIT_MODEL,
        // Slightly above zero for more nuanced critique.
        temperature: 0.1,
    }
}
