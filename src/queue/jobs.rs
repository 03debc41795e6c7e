// Job records tracked by the in-memory queue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created by the submitter, worker not started yet.
    Pending,
    /// Worker is running; progress/message advance through milestones.
    Processing,
    /// Terminal. `result` is set, progress is 1.0.
    Complete,
    /// Terminal. `error` is set, `result` stays unset.
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// Document wizard analysis flavors. Unknown form values fall back to
/// `Other`, which gets the generic prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocType {
    Github,
    Api,
    Legacy,
    Security,
    Dependency,
    Functions,
    Config,
    Documentation,
    /// Code-anxiety peace report.
    Peace,
    Other,
}

impl DocType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "github" => DocType::Github,
            "api" => DocType::Api,
            "legacy" => DocType::Legacy,
            "security" => DocType::Security,
            "dependency" => DocType::Dependency,
            "functions" => DocType::Functions,
            "config" => DocType::Config,
            "documentation" => DocType::Documentation,
            "peace" => DocType::Peace,
            _ => DocType::Other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DocType::Github => "github",
            DocType::Api => "api",
            DocType::Legacy => "legacy",
            DocType::Security => "security",
            DocType::Dependency => "dependency",
            DocType::Functions => "functions",
            DocType::Config => "config",
            DocType::Documentation => "documentation",
            DocType::Peace => "peace",
            DocType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    Full,
    Secrets,
    Dependencies,
}

impl ScanType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "secrets" => ScanType::Secrets,
            "dependencies" => ScanType::Dependencies,
            _ => ScanType::Full,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScanType::Full => "full",
            ScanType::Secrets => "secrets",
            ScanType::Dependencies => "dependencies",
        }
    }
}

/// Where a security scan takes its code from.
#[derive(Debug, Clone)]
pub enum ScanSource {
    Code(String),
    Repository { repo_url: String, branch: String },
}

/// Per-flavor payload, fixed at creation time and read-only afterwards.
#[derive(Debug, Clone)]
pub enum JobKind {
    Document {
        doc_type: DocType,
        level: String,
        text: String,
        questions: String,
    },
    Repository {
        repo_url: String,
        branch: String,
        include_patterns: String,
        level: String,
        questions: String,
    },
    SecurityScan {
        source: ScanSource,
        scan_type: ScanType,
        threshold: String,
        questions: String,
    },
}

impl JobKind {
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::Document { .. } => "document",
            JobKind::Repository { .. } => "github",
            JobKind::SecurityScan { .. } => "security",
        }
    }

    /// Short human name for history/dashboard rows.
    pub fn display_name(&self) -> String {
        match self {
            JobKind::Document { doc_type, .. } => format!("{} analysis", doc_type.name()),
            JobKind::Repository { repo_url, .. } => repo_tail(repo_url).to_string(),
            JobKind::SecurityScan { source, .. } => match source {
                ScanSource::Code(_) => "Security scan - pasted code".to_string(),
                ScanSource::Repository { repo_url, .. } => {
                    format!("Security scan - {}", repo_tail(repo_url))
                }
            },
        }
    }
}

pub fn repo_tail(repo_url: &str) -> &str {
    repo_url.trim_end_matches('/').rsplit('/').next().unwrap_or(repo_url)
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: f64,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub is_mock: bool,
    /// Email of the submitting user, when logged in. Used for usage
    /// accounting only.
    pub owner: Option<String>,
    pub kind: JobKind,
}

impl Job {
    pub fn new(kind: JobKind, owner: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            progress: 0.1,
            message: "Starting analysis...".to_string(),
            created_at: Utc::now(),
            result: None,
            error: None,
            is_mock: false,
            owner,
            kind,
        }
    }
}

/// Partial update merged into a job record. Fields left as `None` keep
/// their current value.
#[derive(Debug, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<f64>,
    pub message: Option<String>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub is_mock: Option<bool>,
}

impl JobPatch {
    pub fn progress(progress: f64, message: impl Into<String>) -> Self {
        Self {
            progress: Some(progress),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn complete(result: String) -> Self {
        Self {
            status: Some(JobStatus::Complete),
            progress: Some(1.0),
            message: Some("Analysis complete!".to_string()),
            result: Some(result),
            ..Default::default()
        }
    }

    pub fn error(error: String, message: String) -> Self {
        Self {
            status: Some(JobStatus::Error),
            message: Some(message),
            error: Some(error),
            ..Default::default()
        }
    }

    /// Merge into `job`. Terminal jobs never change again, and progress
    /// never moves backwards.
    pub fn apply(self, job: &mut Job) {
        if job.status.is_terminal() {
            return;
        }
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(progress) = self.progress {
            if progress > job.progress {
                job.progress = progress;
            }
        }
        if let Some(message) = self.message {
            job.message = message;
        }
        if let Some(result) = self.result {
            job.result = Some(result);
        }
        if let Some(error) = self.error {
            job.error = Some(error);
        }
        if let Some(is_mock) = self.is_mock {
            job.is_mock = is_mock;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document_job() -> Job {
        Job::new(
            JobKind::Document {
                doc_type: DocType::Functions,
                level: "professional".to_string(),
                text: "def f(): pass".to_string(),
                questions: String::new(),
            },
            None,
        )
    }

    #[test]
    fn test_new_job_starts_pending() {
        let job = document_job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0.1);
        assert_eq!(job.message, "Starting analysis...");
        assert!(job.result.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert_eq!(serde_json::to_string(&JobStatus::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn test_patch_never_lowers_progress() {
        let mut job = document_job();
        JobPatch::progress(0.6, "Processing with AI engine...").apply(&mut job);
        assert_eq!(job.progress, 0.6);
        JobPatch::progress(0.4, "stale milestone").apply(&mut job);
        assert_eq!(job.progress, 0.6);
        assert_eq!(job.message, "stale milestone");
    }

    #[test]
    fn test_terminal_jobs_are_immutable() {
        let mut job = document_job();
        JobPatch::complete("report".to_string()).apply(&mut job);
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.progress, 1.0);

        JobPatch::error("late failure".to_string(), "oops".to_string()).apply(&mut job);
        assert_eq!(job.status, JobStatus::Complete);
        assert!(job.error.is_none());
        assert_eq!(job.result.as_deref(), Some("report"));
    }

    #[test]
    fn test_doc_type_round_trip_with_fallback() {
        assert_eq!(DocType::from_name("legacy"), DocType::Legacy);
        assert_eq!(DocType::from_name("spreadsheet"), DocType::Other);
        assert_eq!(DocType::Dependency.name(), "dependency");
    }

    #[test]
    fn test_repo_tail() {
        assert_eq!(repo_tail("https://github.com/fastapi/fastapi"), "fastapi");
        assert_eq!(repo_tail("https://github.com/org/repo/"), "repo");
    }
}
