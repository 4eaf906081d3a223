//! Prompt templates — one plain-text file per stage, loaded once at startup.
//!
//! Templates carry `{{field}}` placeholders that are substituted verbatim
//! with pipeline state values (no escaping, no nested templates). A missing
//! template file is a configuration error at load time; a stage is never
//! allowed to run with an incomplete prompt.

use std::fs;
use std::path::Path;

use crate::errors::PipelineError;

/// An immutable prompt template for a single stage.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    name: &'static str,
    text: String,
}

impl PromptTemplate {
    pub fn new(name: &'static str, text: impl Into<String>) -> Self {
        Self {
            name,
            text: text.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// All four stage templates, loaded together so a missing file fails fast
/// at startup instead of mid-batch.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    pub job_requirements: PromptTemplate,
    pub resume_parser: PromptTemplate,
    pub compatibility: PromptTemplate,
    pub audit: PromptTemplate,
}

impl PromptLibrary {
    pub fn load(dir: &Path) -> Result<Self, PipelineError> {
        Ok(Self {
            job_requirements: load_template(dir, "job_requirements.txt")?,
            resume_parser: load_template(dir, "resume_parser.txt")?,
            compatibility: load_template(dir, "compatibility.txt")?,
            audit: load_template(dir, "audit.txt")?,
        })
    }
}

fn load_template(dir: &Path, file: &'static str) -> Result<PromptTemplate, PipelineError> {
    let path = dir.join(file);
    let text = fs::read_to_string(&path).map_err(|e| PipelineError::Configuration {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    Ok(PromptTemplate::new(file, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_all_templates(dir: &Path) {
        for (file, body) in [
            ("job_requirements.txt", "Extract: {{job_description}}"),
            ("resume_parser.txt", "Parse: {{resume_text}}"),
            (
                "compatibility.txt",
                "Score: {{job_requirements}} vs {{parsed_resume}}",
            ),
            (
                "audit.txt",
                "Audit: {{job_requirements}} {{parsed_resume}} {{compatibility_score}}",
            ),
        ] {
            fs::write(dir.join(file), body).unwrap();
        }
    }

    #[test]
    fn test_load_reads_all_four_templates() {
        let dir = tempfile::tempdir().unwrap();
        write_all_templates(dir.path());

        let library = PromptLibrary::load(dir.path()).unwrap();
        assert!(library
            .job_requirements
            .text()
            .contains("{{job_description}}"));
        assert!(library.resume_parser.text().contains("{{resume_text}}"));
        assert!(library.compatibility.text().contains("{{parsed_resume}}"));
        assert!(library.audit.text().contains("{{compatibility_score}}"));
    }

    #[test]
    fn test_missing_template_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        write_all_templates(dir.path());
        fs::remove_file(dir.path().join("audit.txt")).unwrap();

        let err = PromptLibrary::load(dir.path()).unwrap_err();
        match err {
            PipelineError::Configuration { path, .. } => {
                assert!(path.ends_with("audit.txt"));
            }
            other => panic!("expected Configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_template_name_is_file_name() {
        let dir = tempfile::tempdir().unwrap();
        write_all_templates(dir.path());
        let library = PromptLibrary::load(dir.path()).unwrap();
        assert_eq!(library.resume_parser.name(), "resume_parser.txt");
    }
}
