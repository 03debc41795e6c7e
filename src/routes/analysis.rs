//! Analysis submission, polling and result rendering.
//!
//! Submissions return immediately with a polling page; a background
//! worker drives the job to a terminal state and the browser polls
//! `/api/analysis-status/{id}` until it can redirect to `/result/{id}`.

use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use tracing::debug;
use uuid::Uuid;

use crate::analysis::extract::{extract_text, webpage_text};
use crate::auth::session_email;
use crate::models::{
    AppState, DocumentForm, GithubForm, GithubSecurityForm, SecurityForm, StatusResponse, UrlForm,
};
use crate::queue::jobs::{DocType, JobKind, JobStatus, ScanSource, ScanType};
use crate::queue::worker;
use crate::routes::{escape_html, layout};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/wizard", get(wizard_page))
        .route("/analyze/github", get(github_page))
        .route("/analyze/security", get(security_page))
        .route("/process", post(process_document))
        .route("/process-upload", post(process_upload))
        .route("/process-url", post(process_url))
        .route("/process-github", post(process_github))
        .route("/process-security", post(process_security))
        .route("/process-security-upload", post(process_security_upload))
        .route("/process-github-security", post(process_github_security))
        .route("/api/analysis-status/{id}", get(analysis_status))
        .route("/result/{id}", get(result_page))
        .with_state(state)
}

// Form pages

async fn wizard_page() -> Html<String> {
    layout(
        "Document Wizard",
        r#"<h1>What are we looking at?</h1>
    <div class="card">
      <form method="post" action="/process">
        <label for="doc_type">Document type</label>
        <select id="doc_type" name="doc_type">
          <option value="functions">Code / functions</option>
          <option value="api">API documentation</option>
          <option value="legacy">Legacy system</option>
          <option value="config">Configuration file</option>
          <option value="dependency">Dependency manifest</option>
          <option value="documentation">Technical documentation</option>
          <option value="security">Security-sensitive code</option>
        </select>
        <label for="level">Explain it for</label>
        <select id="level" name="level">
          <option value="beginner">A beginner</option>
          <option value="professional" selected>A professional</option>
          <option value="expert">An expert</option>
        </select>
        <label for="document_text">Paste the content</label>
        <textarea id="document_text" name="document_text" rows="14"
                  placeholder="Paste code, config or docs here..."></textarea>
        <label for="specific_questions">Specific questions (optional)</label>
        <input id="specific_questions" name="specific_questions"
               placeholder="e.g. What does the retry logic do?">
        <button type="submit">Analyze</button>
      </form>
    </div>
    <div class="card">
      <h3>Or analyze a webpage</h3>
      <form method="post" action="/process-url">
        <input type="hidden" name="doc_type" value="documentation">
        <input type="hidden" name="level" value="professional">
        <label for="url">URL</label>
        <input id="url" name="url" placeholder="https://docs.example.com/api">
        <button type="submit">Fetch and analyze</button>
      </form>
    </div>
    <div class="card">
      <h3>Or upload a file</h3>
      <form method="post" action="/process-upload" enctype="multipart/form-data">
        <input type="hidden" name="doc_type" value="functions">
        <input type="hidden" name="level" value="professional">
        <label for="file">File (text or code, up to a few MB)</label>
        <input id="file" type="file" name="file">
        <button type="submit">Upload and analyze</button>
      </form>
    </div>
    <p><a href="/">Back home</a></p>"#,
    )
}

async fn github_page() -> Html<String> {
    layout(
        "Analyze a Repository",
        r#"<h1>GitHub repository analysis</h1>
    <div class="card">
      <form method="post" action="/process-github">
        <label for="repo_url">Repository URL</label>
        <input id="repo_url" name="repo_url" placeholder="https://github.com/owner/repo">
        <label for="branch">Branch</label>
        <input id="branch" name="branch" value="main">
        <label for="include_patterns">Include patterns</label>
        <input id="include_patterns" name="include_patterns"
               value="*.py,*.js,*.rs,*.json,*.md,*.yml">
        <label for="level">Explain it for</label>
        <select id="level" name="level">
          <option value="beginner">A beginner</option>
          <option value="professional" selected>A professional</option>
          <option value="expert">An expert</option>
        </select>
        <label for="specific_questions">Specific questions (optional)</label>
        <input id="specific_questions" name="specific_questions">
        <button type="submit">Analyze repository</button>
      </form>
    </div>
    <p><a href="/">Back home</a></p>"#,
    )
}

async fn security_page() -> Html<String> {
    layout(
        "Security Scan",
        r#"<h1>Security scan</h1>
    <div class="card">
      <h3>Paste code</h3>
      <form method="post" action="/process-security">
        <label for="code">Code to scan</label>
        <textarea id="code" name="code" rows="14"></textarea>
        <label for="scan_type">Scan type</label>
        <select id="scan_type" name="scan_type">
          <option value="full" selected>Full audit</option>
          <option value="secrets">Secrets only</option>
          <option value="dependencies">Dependencies</option>
        </select>
        <label for="threshold">Report findings at</label>
        <select id="threshold" name="threshold">
          <option value="low">Low and above</option>
          <option value="medium" selected>Medium and above</option>
          <option value="high">High only</option>
        </select>
        <button type="submit">Scan code</button>
      </form>
    </div>
    <div class="card">
      <h3>Upload a file</h3>
      <form method="post" action="/process-security-upload" enctype="multipart/form-data">
        <input type="file" name="file">
        <input type="hidden" name="scan_type" value="full">
        <input type="hidden" name="threshold" value="medium">
        <button type="submit">Scan file</button>
      </form>
    </div>
    <div class="card">
      <h3>Scan a repository</h3>
      <form method="post" action="/process-github-security">
        <label for="sec_repo_url">Repository URL</label>
        <input id="sec_repo_url" name="repo_url" placeholder="https://github.com/owner/repo">
        <label for="sec_branch">Branch</label>
        <input id="sec_branch" name="branch" value="main">
        <input type="hidden" name="scan_type" value="full">
        <input type="hidden" name="threshold" value="medium">
        <button type="submit">Scan repository</button>
      </form>
    </div>
    <p><a href="/">Back home</a></p>"#,
    )
}

// Submission handlers. All of them validate via `worker::submit`, which
// rejects empty payloads before anything is stored.

async fn process_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<DocumentForm>,
) -> AppResult<Response> {
    let kind = JobKind::Document {
        doc_type: DocType::from_name(&form.doc_type),
        level: form.level,
        text: form.document_text,
        questions: form.specific_questions,
    };
    start_job(&state, &headers, kind, "Analyzing your document").await
}

async fn process_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Response> {
    let upload = read_upload(multipart, state.config.analysis.text_limit).await?;
    let text = upload
        .text
        .ok_or_else(|| AppError::Validation("No file uploaded.".to_string()))?;

    let kind = JobKind::Document {
        doc_type: DocType::from_name(&upload.doc_type),
        level: upload.level,
        text,
        questions: upload.questions,
    };
    start_job(&state, &headers, kind, "Analyzing your file").await
}

/// Fetch a webpage and run its readable text through the document
/// pipeline. The fetch happens here, before a job exists, so fetch
/// failures surface as plain validation errors.
async fn process_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<UrlForm>,
) -> AppResult<Response> {
    let url = form.url.trim().to_string();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(AppError::Validation(
            "Enter a full URL starting with http:// or https://.".to_string(),
        ));
    }

    let response = reqwest::Client::new()
        .get(&url)
        .header(reqwest::header::USER_AGENT, "Mozilla/5.0 (DocuDecipher Bot)")
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| {
            AppError::Validation(format!(
                "Failed to fetch {url}: {e}. Make sure the URL is public and accessible."
            ))
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Validation(format!(
            "Failed to fetch {url}: HTTP {status}. Make sure the URL is public and accessible."
        )));
    }

    let html = response.text().await.map_err(|e| {
        AppError::Validation(format!("Could not read the response from {url}: {e}"))
    })?;
    let text = webpage_text(&html, state.config.analysis.text_limit)?;

    let kind = JobKind::Document {
        doc_type: DocType::from_name(&form.doc_type),
        level: form.level,
        text,
        questions: form.specific_questions,
    };
    start_job(&state, &headers, kind, "Fetching and analyzing the page").await
}

async fn process_github(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<GithubForm>,
) -> AppResult<Response> {
    let kind = JobKind::Repository {
        repo_url: form.repo_url,
        branch: form.branch,
        include_patterns: form.include_patterns,
        level: form.level,
        questions: form.specific_questions,
    };
    start_job(&state, &headers, kind, "Cloning and analyzing the repository").await
}

async fn process_security(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SecurityForm>,
) -> AppResult<Response> {
    let kind = JobKind::SecurityScan {
        source: ScanSource::Code(form.code),
        scan_type: ScanType::from_name(&form.scan_type),
        threshold: form.threshold,
        questions: form.specific_questions,
    };
    start_job(&state, &headers, kind, "Scanning your code").await
}

async fn process_security_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Response> {
    let upload = read_upload(multipart, state.config.analysis.text_limit).await?;
    let code = upload
        .text
        .ok_or_else(|| AppError::Validation("No file uploaded.".to_string()))?;

    let kind = JobKind::SecurityScan {
        source: ScanSource::Code(code),
        scan_type: ScanType::from_name(&upload.scan_type),
        threshold: upload.threshold,
        questions: upload.questions,
    };
    start_job(&state, &headers, kind, "Scanning your file").await
}

async fn process_github_security(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<GithubSecurityForm>,
) -> AppResult<Response> {
    let kind = JobKind::SecurityScan {
        source: ScanSource::Repository {
            repo_url: form.repo_url,
            branch: form.branch,
        },
        scan_type: ScanType::from_name(&form.scan_type),
        threshold: form.threshold,
        questions: form.specific_questions,
    };
    start_job(&state, &headers, kind, "Cloning and scanning the repository").await
}

async fn start_job(
    state: &AppState,
    headers: &HeaderMap,
    kind: JobKind,
    heading: &str,
) -> AppResult<Response> {
    let owner = session_email(state, headers).await;
    let subject = kind.display_name();
    let ticket = worker::submit(state, kind, owner).await?;
    debug!(job_id = %ticket.id, "submission accepted, returning polling page");
    Ok(loading_page(ticket.id, heading, &subject).into_response())
}

/// Fields common to the multipart upload endpoints. The select fields
/// arrive as plain parts alongside the file.
struct UploadFields {
    doc_type: String,
    level: String,
    scan_type: String,
    threshold: String,
    questions: String,
    text: Option<String>,
}

async fn read_upload(mut multipart: Multipart, limit: usize) -> AppResult<UploadFields> {
    let mut fields = UploadFields {
        doc_type: "functions".to_string(),
        level: "professional".to_string(),
        scan_type: "full".to_string(),
        threshold: "medium".to_string(),
        questions: String::new(),
        text: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid upload: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload.txt").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;
                fields.text = Some(extract_text(&filename, &bytes, limit)?);
            }
            "doc_type" => fields.doc_type = field_text(field).await?,
            "level" => fields.level = field_text(field).await?,
            "scan_type" => fields.scan_type = field_text(field).await?,
            "threshold" => fields.threshold = field_text(field).await?,
            "specific_questions" => fields.questions = field_text(field).await?,
            _ => {}
        }
    }

    Ok(fields)
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid form field: {e}")))
}

// Polling and results

async fn analysis_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<StatusResponse> {
    // Unparseable ids get the same answer as expired ones. The polling
    // page treats not_found as "stop polling, show the expired notice".
    let job = match Uuid::parse_str(&id) {
        Ok(id) => state.jobs.get(id).await,
        Err(_) => None,
    };

    let response = match job {
        Some(job) => StatusResponse {
            status: job.status.to_string(),
            progress: job.progress,
            message: job.message,
            error: job.error,
        },
        None => StatusResponse {
            status: "not_found".to_string(),
            progress: 0.0,
            message: "Analysis not found. It may have expired.".to_string(),
            error: None,
        },
    };
    Json(response)
}

async fn result_page(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let job = match Uuid::parse_str(&id) {
        Ok(id) => state.jobs.get(id).await,
        Err(_) => None,
    };

    let Some(job) = job else {
        return expired_page().into_response();
    };

    match job.status {
        JobStatus::Complete => {
            let mock_banner = if job.is_mock {
                r#"<div class="card"><strong>Demo mode.</strong> This report was generated
                without a live API key and shows the report format, not a real analysis.
                Set <code>DEEPSEEK_API_KEY</code> for live results.</div>"#
            } else {
                ""
            };
            let report = escape_html(job.result.as_deref().unwrap_or(""));
            layout(
                "Analysis Result",
                &format!(
                    r#"<h1>{}</h1>
    {mock_banner}
    <div class="card"><pre>{report}</pre></div>
    <p><a href="/">Analyze something else</a> · <a href="/dashboard">Dashboard</a></p>"#,
                    escape_html(&job.kind.display_name()),
                ),
            )
            .into_response()
        }
        JobStatus::Error => {
            let detail = escape_html(job.error.as_deref().unwrap_or("Unknown error"));
            layout(
                "Analysis Failed",
                &format!(
                    r#"<h1>Analysis failed</h1>
    <div class="card">
      <p>{}</p>
      <pre>{detail}</pre>
      <ul>
        <li>Very large inputs are truncated; try a smaller excerpt.</li>
        <li>Repository scans need a public repo and a valid branch name.</li>
        <li>API key errors mean <code>DEEPSEEK_API_KEY</code> is missing or invalid.</li>
      </ul>
    </div>
    <p><a href="/">Try again</a></p>"#,
                    escape_html(&job.message),
                ),
            )
            .into_response()
        }
        // Direct navigation before the worker finished; resume polling.
        JobStatus::Pending | JobStatus::Processing => {
            loading_page(job.id, "Still working", &job.kind.display_name()).into_response()
        }
    }
}

fn expired_page() -> Html<String> {
    layout(
        "Result Not Found",
        r#"<h1>Analysis not found</h1>
    <div class="card">
      <p>This result is not available. Results are held in memory and
      older ones are cleared to make room, so it may have expired —
      or the server restarted since it was produced.</p>
    </div>
    <p><a href="/">Run a new analysis</a></p>"#,
    )
}

/// The intermediate page returned by every `/process*` endpoint. Polls
/// the status endpoint every two seconds and redirects to the result
/// page once the job reaches a terminal state.
pub(crate) fn loading_page(id: Uuid, heading: &str, subject: &str) -> Html<String> {
    layout(
        "Analyzing",
        &format!(
            r#"<h1>{heading}</h1>
    <div class="card" data-analysis-id="{id}">
      <p>{}</p>
      <div style="background:#334155;border-radius:8px;overflow:hidden;">
        <div id="bar" style="background:#0cc0df;height:10px;width:10%;"></div>
      </div>
      <p id="status-message">Starting analysis...</p>
    </div>
    <script>
      const analysisId = "{id}";
      async function poll() {{
        try {{
          const resp = await fetch('/api/analysis-status/' + analysisId);
          const data = await resp.json();
          if (data.status === 'complete' || data.status === 'error') {{
            window.location = '/result/' + analysisId;
            return;
          }}
          if (data.status === 'not_found') {{
            document.getElementById('status-message').textContent =
              'Analysis not found. It may have expired.';
            return;
          }}
          document.getElementById('bar').style.width = (data.progress * 100) + '%';
          document.getElementById('status-message').textContent = data.message;
        }} catch (e) {{
          // transient network error, keep polling
        }}
        setTimeout(poll, 2000);
      }}
      setTimeout(poll, 1000);
    </script>"#,
            escape_html(subject),
        ),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::llm::MockAnalyzer;
    use crate::queue::store::JobStore;

    async fn test_app() -> Router {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let state = AppState {
            pool,
            config: Config::test_defaults(),
            jobs: JobStore::new(),
            analyzer: Arc::new(MockAnalyzer),
        };
        router(state)
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn form_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn extract_analysis_id(page: &str) -> String {
        let marker = "data-analysis-id=\"";
        let start = page.find(marker).expect("polling page carries the job id") + marker.len();
        page[start..start + 36].to_string()
    }

    #[tokio::test]
    async fn test_wizard_page_renders() {
        let app = test_app().await;
        let response = app
            .oneshot(Request::builder().uri("/wizard").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let page = body_string(response).await;
        assert!(page.contains("/process"));
        assert!(page.contains("document_text"));
    }

    #[tokio::test]
    async fn test_empty_document_is_rejected() {
        let app = test_app().await;
        let response = app
            .oneshot(form_request(
                "/process",
                "doc_type=functions&level=professional&document_text=",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_submission_returns_polling_page() {
        let app = test_app().await;
        let response = app
            .oneshot(form_request(
                "/process",
                "doc_type=functions&level=beginner&document_text=def hello(): pass",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let page = body_string(response).await;
        let id = extract_analysis_id(&page);
        assert!(Uuid::parse_str(&id).is_ok());
        assert!(page.contains("/api/analysis-status/"));
    }

    #[tokio::test]
    async fn test_poll_then_result() {
        let app = test_app().await;
        let response = app
            .clone()
            .oneshot(form_request(
                "/process",
                "doc_type=functions&level=beginner&document_text=def hello(): pass",
            ))
            .await
            .unwrap();
        let id = extract_analysis_id(&body_string(response).await);

        // The mock analyzer completes quickly; poll until terminal.
        let mut status = String::new();
        for _ in 0..50 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(format!("/api/analysis-status/{id}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            let payload: serde_json::Value =
                serde_json::from_str(&body_string(response).await).unwrap();
            status = payload["status"].as_str().unwrap().to_string();
            assert!(["pending", "processing", "complete", "error"].contains(&status.as_str()));
            if status == "complete" || status == "error" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(status, "complete");

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/result/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_string(response).await;
        assert!(page.contains("Demo mode"));
    }

    #[tokio::test]
    async fn test_unknown_id_polls_as_not_found() {
        let app = test_app().await;
        for uri in [
            format!("/api/analysis-status/{}", Uuid::new_v4()),
            "/api/analysis-status/not-a-uuid".to_string(),
        ] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let payload: serde_json::Value =
                serde_json::from_str(&body_string(response).await).unwrap();
            assert_eq!(payload["status"], "not_found");
        }
    }

    #[tokio::test]
    async fn test_result_for_unknown_id_shows_expired_page() {
        let app = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/result/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("Analysis not found"));
    }

    #[tokio::test]
    async fn test_url_without_scheme_is_rejected() {
        let app = test_app().await;
        let response = app
            .oneshot(form_request(
                "/process-url",
                "doc_type=documentation&level=professional&url=docs.example.com",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_url_submission_fetches_page_and_returns_polling_page() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/guide")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><script>x()</script><body><h1>Setup guide</h1><p>Run make install.</p></body></html>")
            .create_async()
            .await;

        let app = test_app().await;
        let response = app
            .oneshot(form_request(
                "/process-url",
                &format!(
                    "doc_type=documentation&level=professional&url={}/guide",
                    server.url()
                ),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let page = body_string(response).await;
        let id = extract_analysis_id(&page);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_url_is_a_validation_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/gone")
            .with_status(404)
            .create_async()
            .await;

        let app = test_app().await;
        let response = app
            .oneshot(form_request(
                "/process-url",
                &format!("doc_type=documentation&level=professional&url={}/gone", server.url()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_security_scan_is_rejected() {
        let app = test_app().await;
        let response = app
            .oneshot(form_request("/process-security", "code="))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
