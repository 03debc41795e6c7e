// Shared state and request/response types
// Note: FromRow is needed for runtime query_as (no DATABASE_URL at compile time)

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::llm::Analyzer;
use crate::queue::store::JobStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub jobs: JobStore,
    pub analyzer: Arc<dyn Analyzer>,
}

// Database rows

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct UserUsage {
    pub email: String,
    pub analyses_used: i64,
    pub analyses_limit: i64,
    pub reset_date: String,
    pub subscription_status: String,
}

impl UserUsage {
    pub fn balance(&self) -> i64 {
        self.analyses_limit - self.analyses_used
    }
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct AnalysisRecord {
    pub id: String,
    pub user_email: String,
    pub kind: String,
    pub name: String,
    pub created_at: String,
    pub duration_ms: i64,
    pub is_mock: bool,
}

// Form payloads

#[derive(Debug, serde::Deserialize)]
pub struct DocumentForm {
    pub doc_type: String,
    pub level: String,
    pub document_text: String,
    #[serde(default)]
    pub specific_questions: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct UrlForm {
    pub doc_type: String,
    #[serde(default = "default_level")]
    pub level: String,
    pub url: String,
    #[serde(default)]
    pub specific_questions: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct GithubForm {
    pub repo_url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_patterns")]
    pub include_patterns: String,
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub specific_questions: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct SecurityForm {
    pub code: String,
    #[serde(default = "default_scan_type")]
    pub scan_type: String,
    #[serde(default = "default_threshold")]
    pub threshold: String,
    #[serde(default)]
    pub specific_questions: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct GithubSecurityForm {
    pub repo_url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_scan_type")]
    pub scan_type: String,
    #[serde(default = "default_threshold")]
    pub threshold: String,
    #[serde(default)]
    pub specific_questions: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct LoginForm {
    pub email: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_patterns() -> String {
    "*.py,*.js,*.rs,*.json,*.md,*.yml".to_string()
}

fn default_level() -> String {
    "professional".to_string()
}

fn default_scan_type() -> String {
    "full".to_string()
}

fn default_threshold() -> String {
    "medium".to_string()
}

// API responses

/// Poll payload for `/api/analysis-status/{id}`. `status` is also
/// `"not_found"` for ids the store no longer (or never) held.
#[derive(Debug, serde::Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub progress: f64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
}
