//! Job submission, the background worker state machine, and the reaper.
//!
//! State machine per job: `pending → processing → {complete | error}`.
//! The owning worker is the only writer for its id; pollers only read.
//! Every failure inside the worker is converted to a terminal `error`
//! record — nothing escapes the spawned task.

use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::{fetch, prompts};
use crate::db::DatabaseOperations;
use crate::llm::CompletionRequest;
use crate::models::{AnalysisRecord, AppState};
use crate::queue::jobs::{repo_tail, Job, JobKind, JobPatch, JobStatus, ScanSource};
use crate::queue::store::JobStore;
use crate::types::{AppError, AppResult};

/// Returned by `submit`: the id the client polls with, plus the handle of
/// the spawned worker task. Call sites may drop the handle; keeping it on
/// the ticket leaves room for cancellation or error propagation later.
#[derive(Debug)]
pub struct JobTicket {
    pub id: Uuid,
    pub handle: JoinHandle<()>,
}

/// Validate the payload, create the tracked job and hand off to a
/// background worker. Returns immediately with the job id.
pub async fn submit(
    state: &AppState,
    mut kind: JobKind,
    owner: Option<String>,
) -> AppResult<JobTicket> {
    validate(&kind)?;
    truncate_payload(&mut kind, state.config.analysis.text_limit);

    let job = Job::new(kind, owner);
    let id = job.id;
    state.jobs.create(job).await?;
    info!(job_id = %id, "analysis job submitted");

    let handle = tokio::spawn(run_job(state.clone(), id));
    Ok(JobTicket { id, handle })
}

fn validate(kind: &JobKind) -> AppResult<()> {
    match kind {
        JobKind::Document { text, .. } => {
            if text.trim().is_empty() {
                return Err(AppError::Validation(
                    "No code provided. Paste some code or upload a file.".to_string(),
                ));
            }
        }
        JobKind::Repository { repo_url, .. } => {
            if repo_url.trim().is_empty() {
                return Err(AppError::Validation("Repository URL is required.".to_string()));
            }
        }
        JobKind::SecurityScan { source, .. } => match source {
            ScanSource::Code(code) => {
                if code.trim().is_empty() {
                    return Err(AppError::Validation(
                        "No code provided for the security scan.".to_string(),
                    ));
                }
            }
            ScanSource::Repository { repo_url, .. } => {
                if repo_url.trim().is_empty() {
                    return Err(AppError::Validation("Repository URL is required.".to_string()));
                }
            }
        },
    }
    Ok(())
}

fn truncate_payload(kind: &mut JobKind, limit: usize) {
    match kind {
        JobKind::Document { text, .. } => {
            *text = prompts::truncate(text, limit).to_string();
        }
        JobKind::SecurityScan {
            source: ScanSource::Code(code),
            ..
        } => {
            *code = prompts::truncate(code, limit).to_string();
        }
        _ => {}
    }
}

/// The background worker for one job. Owns every write to its record.
pub async fn run_job(state: AppState, id: Uuid) {
    let Some(job) = state.jobs.get(id).await else {
        warn!(job_id = %id, "job vanished before the worker started");
        return;
    };

    milestone_status(&state.jobs, id, JobStatus::Processing).await;
    let started = Instant::now();

    match execute(&state, id, &job.kind).await {
        Ok(result) => {
            let is_mock = !state.analyzer.is_live();
            let patch = JobPatch {
                is_mock: Some(is_mock),
                ..JobPatch::complete(result)
            };
            if let Err(e) = state.jobs.update(id, patch).await {
                warn!(job_id = %id, error = %e, "could not record completion");
            }
            info!(job_id = %id, elapsed_ms = started.elapsed().as_millis() as u64, "analysis complete");

            record_outcome(&state, id, &job, is_mock, started.elapsed()).await;
        }
        Err(err) => {
            let (error_text, message) = describe_failure(&err);
            if let Err(e) = state.jobs.update(id, JobPatch::error(error_text, message)).await {
                warn!(job_id = %id, error = %e, "could not record failure");
            }
            warn!(job_id = %id, error = %err, "analysis failed");
        }
    }

    reap(
        &state.jobs,
        id,
        state.config.analysis.high_water_mark,
        state.config.analysis.low_water_mark,
    )
    .await;
}

async fn execute(state: &AppState, id: Uuid, kind: &JobKind) -> AppResult<String> {
    match kind {
        JobKind::Document {
            doc_type,
            level,
            text,
            questions,
        } => {
            milestone(&state.jobs, id, 0.2, "Parsing code structure...").await;
            let line_count = text.lines().count();

            milestone(
                &state.jobs,
                id,
                0.4,
                format!("Analyzing {line_count} lines with AI..."),
            )
            .await;
            let request = prompts::document_prompt(*doc_type, level, text, questions);

            milestone(&state.jobs, id, 0.6, "Processing with AI engine...").await;
            let result = call_analyzer(state, &request).await?;

            milestone(&state.jobs, id, 0.8, "Formatting technical insights...").await;
            Ok(result)
        }

        JobKind::Repository {
            repo_url,
            branch,
            include_patterns,
            level,
            questions,
        } => {
            milestone(
                &state.jobs,
                id,
                0.2,
                format!("Cloning {}...", repo_tail(repo_url)),
            )
            .await;
            let filter = fetch::FileFilter::from_patterns(include_patterns);
            let files = fetch::fetch_repository(repo_url, branch, filter).await?;

            milestone(&state.jobs, id, 0.4, "Analyzing repository structure...").await;
            let request = prompts::repository_prompt(repo_url, branch, level, questions, &files);

            milestone(
                &state.jobs,
                id,
                0.6,
                format!("Analyzing {} files with AI...", files.len()),
            )
            .await;
            let result = call_analyzer(state, &request).await?;

            milestone(&state.jobs, id, 0.8, "Generating report...").await;
            Ok(result)
        }

        JobKind::SecurityScan {
            source,
            scan_type,
            threshold,
            questions,
        } => {
            let request = match source {
                ScanSource::Code(code) => {
                    milestone(&state.jobs, id, 0.3, "Analyzing code patterns...").await;
                    prompts::security_code_prompt(*scan_type, threshold, questions, code)
                }
                ScanSource::Repository { repo_url, branch } => {
                    milestone(
                        &state.jobs,
                        id,
                        0.2,
                        format!("Cloning {} for security scan...", repo_tail(repo_url)),
                    )
                    .await;
                    let files =
                        fetch::fetch_repository(repo_url, branch, fetch::FileFilter::Security)
                            .await?;

                    milestone(
                        &state.jobs,
                        id,
                        0.4,
                        format!("Scanning {} files for secrets and vulnerabilities...", files.len()),
                    )
                    .await;
                    prompts::security_repo_prompt(
                        repo_url, branch, *scan_type, threshold, questions, &files,
                    )
                }
            };

            milestone(&state.jobs, id, 0.6, "Running security scans...").await;
            let result = call_analyzer(state, &request).await?;

            milestone(&state.jobs, id, 0.8, "Generating security report...").await;
            Ok(result)
        }
    }
}

/// One attempt against the remote analyzer under the configured wall-clock
/// bound. No retry: a timeout is a terminal job error, and the abandoned
/// call may well keep running server-side, unobserved.
async fn call_analyzer(state: &AppState, request: &CompletionRequest) -> AppResult<String> {
    let bound = Duration::from_secs(state.config.analysis.remote_timeout_secs);
    match tokio::time::timeout(bound, state.analyzer.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(format!(
            "the AI call exceeded {}s. Try a single file, a smaller module, or a more specific question.",
            state.config.analysis.remote_timeout_secs
        ))),
    }
}

/// Stored error string and the short status message shown while polling.
fn describe_failure(err: &AppError) -> (String, String) {
    match err {
        AppError::Timeout(_) => (err.to_string(), "Analysis timed out".to_string()),
        AppError::RemoteService(_) => (err.to_string(), "AI service error".to_string()),
        AppError::Validation(msg) => (msg.clone(), "Analysis failed".to_string()),
        other => (
            format!("System error: {other}"),
            "System error".to_string(),
        ),
    }
}

/// Best-effort accounting after a successful run: history row plus the
/// owner's usage counter. Failures are logged and never affect the job.
async fn record_outcome(
    state: &AppState,
    id: Uuid,
    job: &Job,
    is_mock: bool,
    elapsed: Duration,
) {
    let Some(email) = &job.owner else {
        return;
    };

    let record = AnalysisRecord {
        id: id.to_string(),
        user_email: email.clone(),
        kind: job.kind.label().to_string(),
        name: job.kind.display_name(),
        created_at: Utc::now().to_rfc3339(),
        duration_ms: elapsed.as_millis() as i64,
        is_mock,
    };
    if let Err(e) = DatabaseOperations::record_analysis(&state.pool, &record).await {
        warn!(job_id = %id, error = %e, "could not record analysis history");
    }
    if let Err(e) = DatabaseOperations::increment_usage(&state.pool, email).await {
        warn!(job_id = %id, error = %e, "could not update usage counter");
    }
}

async fn milestone(store: &JobStore, id: Uuid, progress: f64, message: impl Into<String>) {
    if let Err(e) = store.update(id, JobPatch::progress(progress, message)).await {
        warn!(job_id = %id, error = %e, "milestone update failed");
    }
}

async fn milestone_status(store: &JobStore, id: Uuid, status: JobStatus) {
    let patch = JobPatch {
        status: Some(status),
        ..Default::default()
    };
    if let Err(e) = store.update(id, patch).await {
        warn!(job_id = %id, error = %e, "status update failed");
    }
}

/// Trim the store to its most recent entries once it outgrows the high
/// water mark. Runs inline on whichever worker crossed the threshold; that
/// worker's own id is never removed.
pub async fn reap(store: &JobStore, keep: Uuid, high_water_mark: usize, low_water_mark: usize) {
    let size = store.size().await;
    if size <= high_water_mark {
        return;
    }

    let excess = size - low_water_mark;
    let oldest: Vec<Uuid> = store
        .ids_by_recency()
        .await
        .into_iter()
        .take(excess)
        .collect();

    let mut removed = 0usize;
    for id in oldest {
        if id == keep {
            continue;
        }
        store.remove(id).await;
        removed += 1;
    }
    info!(removed, size_before = size, "reaped old analysis jobs");
}
