mod config;
mod errors;
mod ingest;
mod llm_client;
mod pipeline;
mod prompts;
mod storage;
mod usage;
mod workflow;

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::ingest::{ensure_parsed, pdf_stem};
use crate::llm_client::GroqClient;
use crate::prompts::PromptLibrary;
use crate::storage::DocumentStore;
use crate::workflow::{pretty_json, run_screening, ResumeDocument, ScreeningReport};

/// Screens a batch of resumes against one job description via staged LLM
/// calls, with a secondary audit pass over the compatibility scoring.
#[derive(Debug, Parser)]
#[command(name = "screener", version)]
struct Cli {
    /// Job folder in the document bucket. Prompts interactively when omitted.
    #[arg(long)]
    job: Option<String>,

    /// List failed resumes in the final report instead of only counting them.
    #[arg(long)]
    include_failures: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    info!("Starting screener v{}", env!("CARGO_PKG_VERSION"));

    let s3 = build_s3_client(&config).await;
    let store = DocumentStore::new(s3, config.s3_bucket.clone());
    info!("Document store ready (bucket: {})", store.bucket());

    let prompts = PromptLibrary::load(Path::new(&config.prompts_dir))?;
    let llm = GroqClient::new(config.groq_api_key.clone());

    let job_folder = select_job_folder(&store, cli.job).await?;
    info!(job = %job_folder, "selected job folder");

    ensure_parsed(&store, &job_folder).await?;

    let (jd_text, resumes) = fetch_inputs(&store, &job_folder).await?;
    info!(resumes = resumes.len(), "inputs loaded");

    let (report, ledger) = run_screening(&jd_text, &resumes, &prompts, &llm).await;

    upload_requirements_artifact(&store, &job_folder, &report).await?;

    print_report(&report, cli.include_failures);
    println!("{}", ledger.summary_table());

    if report.outcomes.is_empty() {
        bail!("No compatibility scores generated");
    }
    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "screener-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}

/// Resolves the job folder: the `--job` flag when given (validated against
/// the bucket), otherwise an interactive numbered pick.
async fn select_job_folder(store: &DocumentStore, requested: Option<String>) -> Result<String> {
    let folders = store.list_folders("").await?;
    if folders.is_empty() {
        bail!("No job folders found in bucket '{}'", store.bucket());
    }

    if let Some(job) = requested {
        if !folders.contains(&job) {
            bail!(
                "Job folder '{job}' not found. Available: {}",
                folders.join(", ")
            );
        }
        return Ok(job);
    }

    println!("\nAvailable job folders:\n");
    for (idx, folder) in folders.iter().enumerate() {
        println!("{}. {}", idx + 1, folder);
    }
    print!("\nSelect a job folder number: ");
    std::io::stdout().flush().context("flushing stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("reading selection")?;
    let selection: usize = line.trim().parse().context("selection must be a number")?;
    let folder = folders
        .get(selection.checked_sub(1).context("selection must be >= 1")?)
        .with_context(|| format!("selection must be between 1 and {}", folders.len()))?;
    Ok(folder.clone())
}

/// Locates and downloads the JD text plus every parsed resume text.
///
/// The JD is the `.txt` directly under the job folder whose name mentions
/// "job" or "jd"; resumes are all `.txt` files under `<job>/parsed/`.
async fn fetch_inputs(
    store: &DocumentStore,
    job_folder: &str,
) -> Result<(String, Vec<ResumeDocument>)> {
    let job_files = store.list_files(job_folder).await?;
    let jd_txt = job_files
        .iter()
        .find(|name| {
            let lower = name.to_lowercase();
            name.ends_with(".txt") && (lower.contains("job") || lower.contains("jd"))
        })
        .with_context(|| format!("no job description .txt found in '{job_folder}'"))?;
    let jd_text = store
        .download_text(&format!("{job_folder}/{jd_txt}"))
        .await?;

    let parsed_folder = format!("{job_folder}/parsed");
    let resume_names: Vec<String> = store
        .list_files(&parsed_folder)
        .await?
        .into_iter()
        .filter(|name| name.ends_with(".txt"))
        .collect();
    if resume_names.is_empty() {
        bail!("no parsed resumes found under '{parsed_folder}'");
    }

    let mut resumes = Vec::with_capacity(resume_names.len());
    for name in resume_names {
        let text = store
            .download_text(&format!("{parsed_folder}/{name}"))
            .await?;
        resumes.push(ResumeDocument { name, text });
    }

    Ok((jd_text, resumes))
}

/// Uploads the cached job-requirements JSON next to the JD, named after the
/// JD PDF when one exists (`<stem>.json`), else `job_requirements.json`.
async fn upload_requirements_artifact(
    store: &DocumentStore,
    job_folder: &str,
    report: &ScreeningReport,
) -> Result<()> {
    let job_files = store.list_files(job_folder).await?;
    let artifact_name = job_files
        .iter()
        .find(|name| name.ends_with(".pdf"))
        .map(|pdf| format!("{}.json", pdf_stem(pdf)))
        .unwrap_or_else(|| "job_requirements.json".to_string());

    store
        .upload_text(
            &format!("{job_folder}/{artifact_name}"),
            &report.job_requirements,
            "application/json",
        )
        .await
}

fn print_report(report: &ScreeningReport, include_failures: bool) {
    println!("\n[Job Requirements]");
    println!("{}", pretty_json(&report.job_requirements));

    for outcome in &report.outcomes {
        println!("\n{}", "=".repeat(60));
        println!("RESUME: {}", outcome.resume);
        println!("{}", "-".repeat(60));
        println!("[Parsed Resume]");
        println!("{}", pretty_json(&outcome.parsed_resume));
        println!("{}", "-".repeat(60));
        println!("[Compatibility Result]");
        println!("{}", pretty_json(&outcome.compatibility_score));
        println!("{}", "-".repeat(60));
        println!("[Audit]");
        match serde_json::to_string_pretty(&outcome.audit) {
            Ok(json) => println!("{json}"),
            Err(_) => println!("{:?}", outcome.audit),
        }
        println!(
            "Decision: {} (confidence {:.2})",
            outcome.audit.final_decision.as_str(),
            outcome.audit.confidence
        );
    }

    println!("\n{}", "=".repeat(60));
    println!(
        "Scored {} of {} resumes ({} failed)",
        report.outcomes.len(),
        report.outcomes.len() + report.failures.len(),
        report.failures.len()
    );
    if include_failures {
        for failure in &report.failures {
            println!("FAILED: {}: {}", failure.resume, failure.error);
        }
    }
    println!();
}
