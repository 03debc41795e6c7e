// Frontpage, dashboard, settings and history pages

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use chrono::{Datelike, NaiveDate, Utc};

use crate::auth::session_email;
use crate::db::DatabaseOperations;
use crate::models::AppState;
use crate::routes::{escape_html, layout};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(frontpage))
        .route("/dashboard", get(dashboard))
        .route("/settings", get(settings_page))
        .route("/history", get(history_page))
        .with_state(state)
}

async fn frontpage() -> Response {
    layout(
        "Code Analysis Platform",
        r#"<h1>DocuDecipher</h1>
    <p>Paste scary code, get a calm, plain-language report.</p>
    <div class="card">
      <h3>Document wizard</h3>
      <p>Analyze code, APIs, configs or docs for any audience level.</p>
      <a href="/wizard">Start analyzing</a>
    </div>
    <div class="card">
      <h3>GitHub repository</h3>
      <p>Point at a repo and get an architecture and onboarding overview.</p>
      <a href="/analyze/github">Analyze a repository</a>
    </div>
    <div class="card">
      <h3>Security audit</h3>
      <p>Scan code or a repository for secrets and vulnerabilities.</p>
      <a href="/analyze/security">Run a security scan</a>
    </div>
    <div class="card">
      <h3>Code peace report</h3>
      <p>Overwhelmed by an inherited codebase? Turn anxiety into a plan.</p>
      <a href="/peace">Generate a peace report</a>
    </div>
    <p><a href="/login">Log in</a> · <a href="/dashboard">Dashboard</a></p>"#,
    )
    .into_response()
}

async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let Some(email) = session_email(&state, &headers).await else {
        return Ok(Redirect::to("/login").into_response());
    };

    // Creates the usage row for first-time visitors and applies the
    // monthly free-credit reset.
    DatabaseOperations::ensure_user(&state.pool, &email, state.config.analysis.free_monthly_credits)
        .await?;

    let usage = DatabaseOperations::get_usage(&state.pool, &email).await?;
    let (used, limit) = usage
        .map(|u| (u.analyses_used, u.analyses_limit))
        .unwrap_or((0, state.config.analysis.free_monthly_credits));
    let (repo_count, security_scans, document_count) =
        DatabaseOperations::kind_counts(&state.pool, &email).await?;
    let recent = DatabaseOperations::recent_analyses(&state.pool, &email, 10).await?;

    let recent_rows = if recent.is_empty() {
        "<tr><td colspan=\"4\">No analyses yet.</td></tr>".to_string()
    } else {
        recent
            .iter()
            .map(|r| {
                format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    r.kind,
                    escape_html(&r.name),
                    r.created_at,
                    if r.is_mock { "mock" } else { "live" }
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    let email = escape_html(&email);

    Ok(layout(
        "Dashboard",
        &format!(
            r#"<h1>Dashboard</h1>
    <p>Signed in as <strong>{email}</strong> · <a href="/settings">Settings</a> · <a href="/logout">Log out</a></p>
    <div class="card">
      <h3>Credits</h3>
      <p>{used} of {limit} analyses used this month.</p>
    </div>
    <div class="card">
      <h3>Totals</h3>
      <p>Repositories analyzed: {repo_count} · Security scans: {security_scans} · Documents: {document_count}</p>
    </div>
    <div class="card">
      <h3>Recent analyses</h3>
      <table>
        <tr><th>Type</th><th>Name</th><th>When</th><th>Mode</th></tr>
        {recent_rows}
      </table>
      <p><a href="/history">Full history</a></p>
    </div>"#
        ),
    )
    .into_response())
}

async fn settings_page(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let Some(email) = session_email(&state, &headers).await else {
        return Ok(Redirect::to("/login").into_response());
    };

    let usage = DatabaseOperations::get_usage(&state.pool, &email).await?;
    let (balance, per_month, plan) = match usage {
        Some(u) => {
            let plan = title_case(&u.subscription_status);
            (u.balance(), u.analyses_limit, plan)
        }
        None => {
            let free = state.config.analysis.free_monthly_credits;
            (free, free, "Free".to_string())
        }
    };

    let user_id = escape_html(&format!("usr_{}", email.replace('@', "_at_").replace('.', "_")));
    let email = escape_html(&email);
    let renewal_date = first_of_next_month();

    Ok(layout(
        "Settings",
        &format!(
            r#"<h1>Settings</h1>
    <div class="card">
      <p>Account: <strong>{email}</strong> ({user_id})</p>
      <p>Plan: {plan}</p>
      <p>Credits per month: {per_month}</p>
      <p>Remaining balance: {balance}</p>
      <p>Credits renew on {renewal_date}</p>
    </div>
    <p><a href="/dashboard">Back to dashboard</a></p>"#
        ),
    )
    .into_response())
}

async fn history_page(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let Some(email) = session_email(&state, &headers).await else {
        return Ok(Redirect::to("/login").into_response());
    };

    let analyses = DatabaseOperations::recent_analyses(&state.pool, &email, 50).await?;
    let rows = if analyses.is_empty() {
        "<tr><td colspan=\"5\">Nothing here yet. Run your first analysis.</td></tr>".to_string()
    } else {
        analyses
            .iter()
            .map(|r| {
                format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{} ms</td><td>{}</td></tr>",
                    r.kind,
                    escape_html(&r.name),
                    r.created_at,
                    r.duration_ms,
                    if r.is_mock { "mock" } else { "live" }
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    Ok(layout(
        "History",
        &format!(
            r#"<h1>Analysis history</h1>
    <div class="card">
      <table>
        <tr><th>Type</th><th>Name</th><th>When</th><th>Duration</th><th>Mode</th></tr>
        {rows}
      </table>
    </div>
    <p><a href="/dashboard">Back to dashboard</a></p>"#
        ),
    )
    .into_response())
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => "Free".to_string(),
    }
}

fn first_of_next_month() -> String {
    let today = Utc::now().date_naive();
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%B %d, %Y").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::llm::MockAnalyzer;
    use crate::models::AnalysisRecord;
    use crate::queue::store::JobStore;

    async fn test_state() -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        AppState {
            pool,
            config: Config::test_defaults(),
            jobs: JobStore::new(),
            analyzer: Arc::new(MockAnalyzer),
        }
    }

    #[tokio::test]
    async fn test_history_escapes_analysis_names() {
        let state = test_state().await;
        DatabaseOperations::store_magic_token(&state.pool, "a@b.com", "magic_t1")
            .await
            .unwrap();
        // Repository analyses name jobs after the URL tail, which the
        // submitter controls.
        DatabaseOperations::record_analysis(
            &state.pool,
            &AnalysisRecord {
                id: "r1".to_string(),
                user_email: "a@b.com".to_string(),
                kind: "github".to_string(),
                name: "<script>alert(1)</script>".to_string(),
                created_at: "2026-08-27T00:00:00Z".to_string(),
                duration_ms: 5,
                is_mock: false,
            },
        )
        .await
        .unwrap();

        let app = router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/history")
                    .header(header::COOKIE, "session=magic_t1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!page.contains("<script>alert"));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("free"), "Free");
        assert_eq!(title_case("pro"), "Pro");
        assert_eq!(title_case(""), "Free");
    }

    #[test]
    fn test_first_of_next_month_format() {
        let date = first_of_next_month();
        assert!(date.contains(" 01, "));
        assert!(NaiveDate::parse_from_str(&date, "%B %d, %Y").is_ok());
    }
}
