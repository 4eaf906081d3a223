use std::path::PathBuf;

use thiserror::Error;

use crate::llm_client::LlmError;
use crate::pipeline::StateKey;

/// Errors that abort a single pipeline invocation (or, for `Configuration`,
/// every future invocation of the affected stage).
///
/// Extraction failures are deliberately NOT represented here: a response with
/// no parseable JSON degrades to storing the raw text and the pipeline
/// continues. See `pipeline::extract::ExtractionFailure`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required prompt template could not be loaded. The stage must refuse
    /// to run rather than send an incomplete prompt.
    #[error("prompt template '{path}' could not be loaded: {reason}")]
    Configuration { path: PathBuf, reason: String },

    /// A stage was invoked without its declared required state fields.
    #[error(
        "stage '{stage}' is missing required state keys: [{}]",
        .missing.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
    )]
    MissingState {
        stage: &'static str,
        missing: Vec<StateKey>,
    },

    /// The external text-generation call failed. No retry at this layer;
    /// retry policy lives inside the client.
    #[error("generation failed in stage '{stage}': {source}")]
    Generation {
        stage: &'static str,
        #[source]
        source: LlmError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_state_lists_keys_in_message() {
        let err = PipelineError::MissingState {
            stage: "compatibility_scoring",
            missing: vec![StateKey::JobRequirements, StateKey::ParsedResume],
        };
        let msg = err.to_string();
        assert!(msg.contains("compatibility_scoring"));
        assert!(msg.contains("job_requirements"));
        assert!(msg.contains("parsed_resume"));
    }

    #[test]
    fn test_configuration_error_names_path() {
        let err = PipelineError::Configuration {
            path: PathBuf::from("prompts/audit.txt"),
            reason: "No such file or directory".to_string(),
        };
        assert!(err.to_string().contains("prompts/audit.txt"));
    }
}
