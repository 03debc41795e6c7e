// Magic-link login flow

use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use tracing::info;

use crate::auth;
use crate::db::DatabaseOperations;
use crate::models::{AppState, EmailQuery, LoginForm, TokenQuery};
use crate::routes::{escape_html, layout};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/login", get(login_page).post(login_request))
        .route("/check-email", get(check_email))
        .route("/auth", get(auth_callback))
        .route("/logout", get(logout))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct LoginPageQuery {
    error: Option<String>,
}

async fn login_page(Query(query): Query<LoginPageQuery>) -> Response {
    let notice = match query.error.as_deref() {
        Some("invalid_token") => {
            r#"<p style="color: #dc2626;">That link is invalid or has expired. Request a new one.</p>"#
        }
        Some(_) => r#"<p style="color: #dc2626;">Something went wrong. Try again.</p>"#,
        None => "",
    };

    layout(
        "Log in",
        &format!(
            r#"<h1>Log in</h1>
    {notice}
    <div class="card">
      <form action="/login" method="post">
        <label for="email">Email address</label>
        <input type="email" id="email" name="email" placeholder="you@example.com" required>
        <button type="submit">Send magic link</button>
      </form>
    </div>
    <p><a href="/">Back to home</a></p>"#
        ),
    )
    .into_response()
}

async fn login_request(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Redirect> {
    let token = auth::create_magic_token();
    DatabaseOperations::store_magic_token(&state.pool, &form.email, &token).await?;

    // No email service configured; the link goes to the log instead.
    info!(email = %form.email, "magic link issued: /auth?token={token}");

    Ok(Redirect::to(&format!("/check-email?email={}", form.email)))
}

async fn check_email(Query(query): Query<EmailQuery>) -> Response {
    layout(
        "Check your email",
        &format!(
            r#"<h1>Check your email</h1>
    <div class="card">
      <p>We sent a login link to <strong>{}</strong>.</p>
      <p>Click the link in that email to sign in. It is valid for one login.</p>
    </div>"#,
            escape_html(&query.email)
        ),
    )
    .into_response()
}

async fn auth_callback(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> AppResult<Response> {
    let email = DatabaseOperations::verify_magic_link(&state.pool, &query.token, true).await?;

    match email {
        Some(email) => {
            info!(email = %email, "magic link login");
            Ok((
                AppendHeaders([(SET_COOKIE, auth::set_session_cookie(&query.token))]),
                Redirect::to("/dashboard"),
            )
                .into_response())
        }
        None => Ok(Redirect::to("/login?error=invalid_token").into_response()),
    }
}

async fn logout() -> Response {
    (
        AppendHeaders([(SET_COOKIE, auth::clear_session_cookie())]),
        Redirect::to("/"),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::llm::MockAnalyzer;
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
    async fn test_check_email_escapes_the_address() {
        let app = router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/check-email?email=%3Cscript%3Ealert(1)%3C%2Fscript%3E")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>alert"));
    }

    #[tokio::test]
    async fn test_unknown_token_redirects_to_login() {
        let app = router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth?token=magic_nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("location").unwrap(),
            "/login?error=invalid_token"
        );
    }
}
