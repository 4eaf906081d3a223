//! PDF ingest — derives plain-text documents from the PDFs in a job folder.
//!
//! Empty extracted text is valid input for the pipeline, not a failure, and
//! extraction errors degrade to empty text the same way.

use anyhow::Result;
use tracing::{info, warn};

use crate::storage::DocumentStore;

/// Extracts text from PDF bytes. Never fails: unreadable PDFs yield empty text.
pub fn pdf_to_text(name: &str, bytes: &[u8]) -> String {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => text,
        Err(err) => {
            warn!(document = name, %err, "PDF text extraction failed, treating as empty");
            String::new()
        }
    }
}

/// `resume.pdf` → `resume.txt`; names without a `.pdf` suffix gain `.txt`.
pub fn txt_name(pdf_name: &str) -> String {
    format!("{}.txt", pdf_stem(pdf_name))
}

/// The file name with a trailing `.pdf` removed.
pub fn pdf_stem(name: &str) -> &str {
    name.strip_suffix(".pdf")
        .or_else(|| name.strip_suffix(".PDF"))
        .unwrap_or(name)
}

/// Derives any missing `.txt` files for the job folder: the JD text lands
/// next to its PDF, resume texts land under `<job>/parsed/`. Skips the whole
/// derivation when both already exist.
pub async fn ensure_parsed(store: &DocumentStore, job_folder: &str) -> Result<()> {
    let job_files = store.list_files(job_folder).await?;
    let parsed_files = store
        .list_files(&format!("{job_folder}/parsed"))
        .await
        .unwrap_or_default();

    let has_jd_txt = job_files.iter().any(|f| f.ends_with(".txt"));
    let has_resume_txt = parsed_files.iter().any(|f| f.ends_with(".txt"));
    if has_jd_txt && has_resume_txt {
        info!(job = job_folder, "parsed text files already exist");
        return Ok(());
    }

    info!(job = job_folder, "deriving text files from PDFs");

    for pdf in job_files.iter().filter(|f| f.ends_with(".pdf")) {
        let bytes = store.download_bytes(&format!("{job_folder}/{pdf}")).await?;
        let text = pdf_to_text(pdf, &bytes);
        store
            .upload_text(&format!("{job_folder}/{}", txt_name(pdf)), &text, "text/plain")
            .await?;
    }

    let resumes = store
        .list_files(&format!("{job_folder}/resumes"))
        .await
        .unwrap_or_default();
    for pdf in resumes.iter().filter(|f| f.ends_with(".pdf")) {
        let bytes = store
            .download_bytes(&format!("{job_folder}/resumes/{pdf}"))
            .await?;
        let text = pdf_to_text(pdf, &bytes);
        store
            .upload_text(
                &format!("{job_folder}/parsed/{}", txt_name(pdf)),
                &text,
                "text/plain",
            )
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txt_name_replaces_pdf_suffix() {
        assert_eq!(txt_name("resume.pdf"), "resume.txt");
        assert_eq!(txt_name("Senior_Rust_JD.PDF"), "Senior_Rust_JD.txt");
    }

    #[test]
    fn test_txt_name_without_pdf_suffix_appends() {
        assert_eq!(txt_name("notes"), "notes.txt");
    }

    #[test]
    fn test_pdf_stem() {
        assert_eq!(pdf_stem("jobdesc.pdf"), "jobdesc");
        assert_eq!(pdf_stem("short"), "short");
        assert_eq!(pdf_stem(".pdf"), "");
    }

    #[test]
    fn test_pdf_to_text_degrades_to_empty_on_garbage() {
        assert_eq!(pdf_to_text("bad.pdf", b"definitely not a pdf"), "");
    }
}
