//! The "code peace report": upload the code that keeps you up at night,
//! describe how it makes you feel, get a calming plain-language plan.

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::analysis::extract::extract_text;
use crate::auth::session_email;
use crate::models::AppState;
use crate::queue::jobs::{DocType, JobKind};
use crate::queue::worker;
use crate::routes::{analysis::loading_page, layout};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/peace", get(peace_page))
        .route("/peace/analyze", post(peace_analyze))
        .with_state(state)
}

async fn peace_page() -> Html<String> {
    layout(
        "Code Peace Report",
        r#"<h1>Find peace with your codebase</h1>
    <p>Inherited something scary? Upload the files that worry you and say
    what makes them scary. You get a calm, jargon-free report and a plan.</p>
    <div class="card">
      <form method="post" action="/peace/analyze" enctype="multipart/form-data">
        <label for="user_context">What's stressing you out about this code?</label>
        <textarea id="user_context" name="user_context" rows="4"
                  placeholder="e.g. Nobody knows how the billing module works and the person who wrote it left..."></textarea>
        <label for="code_files">Code files (you can pick several)</label>
        <input id="code_files" type="file" name="code_files" multiple>
        <button type="submit">Generate my peace report</button>
      </form>
    </div>
    <p><a href="/">Back home</a></p>"#,
    )
}

async fn peace_analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut context = String::new();
    let mut combined = String::new();
    let limit = state.config.analysis.text_limit;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid upload: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "user_context" => {
                context = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid form field: {e}")))?;
            }
            "code_files" => {
                let filename = field.file_name().unwrap_or("upload.txt").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;
                if bytes.is_empty() {
                    continue;
                }
                let text = extract_text(&filename, &bytes, limit)?;
                combined.push_str(&format!("=== {filename} ===\n{text}\n\n"));
            }
            _ => {}
        }
    }

    if combined.trim().is_empty() {
        return Err(AppError::Validation(
            "Upload at least one code file for the peace report.".to_string(),
        ));
    }

    let owner = session_email(&state, &headers).await;
    let kind = JobKind::Document {
        doc_type: DocType::Peace,
        level: "beginner".to_string(),
        text: combined,
        questions: context,
    };
    let ticket = worker::submit(&state, kind, owner).await?;
    Ok(loading_page(ticket.id, "Preparing your peace report", "Code peace report")
        .into_response())
}
