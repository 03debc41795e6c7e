//! HTTP routes
//!
//! - `/` and friends - server-rendered pages (dashboard, wizard, forms)
//! - `/process*` - analysis submission endpoints (return a polling page)
//! - `/api/analysis-status/{id}` - JSON poll endpoint
//! - `/result/{id}` - rendered analysis result
//! - `/login`, `/auth`, `/logout` - magic-link authentication
//! - `/api/health` - health check

pub mod analysis;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod peace;

use axum::response::Html;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::models::AppState;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    Router::new()
        .merge(health::router(state.clone()))
        .merge(auth::router(state.clone()))
        .merge(dashboard::router(state.clone()))
        .merge(analysis::router(state.clone()))
        .merge(peace::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Escape user-controlled text before interpolating it into a page. Every
/// handler that renders emails, analysis names or report bodies goes
/// through this.
pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Shared page shell. The HTML layer is deliberately thin; pages are
/// rendered inline the same way the result/loading views are.
pub(crate) fn layout(title: &str, content: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title} - DocuDecipher</title>
  <style>
    body {{ background: #0f172a; color: white; margin: 0; padding: 0;
           font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; }}
    a {{ color: #0cc0df; }}
    .container {{ max-width: 800px; margin: 0 auto; padding: 2rem 1rem; }}
    .card {{ background: #1e293b; border: 1px solid #334155; border-radius: 12px;
            padding: 1.5rem; margin: 1rem 0; }}
    label {{ display: block; margin-top: 0.75rem; font-weight: 600; }}
    input, textarea, select {{ width: 100%; padding: 0.5rem; background: #0f172a;
            color: white; border: 1px solid #334155; border-radius: 6px; }}
    button {{ margin-top: 1rem; padding: 0.6rem 1.5rem; background: #0cc0df;
            color: white; border: none; border-radius: 8px; font-size: 1rem; }}
    pre {{ white-space: pre-wrap; background: #1e293b; padding: 1rem; border-radius: 8px; }}
    table {{ width: 100%; border-collapse: collapse; }}
    td, th {{ padding: 0.5rem; border-bottom: 1px solid #334155; text-align: left; }}
  </style>
</head>
<body>
  <div class="container">
  {content}
  </div>
</body>
</html>"#
    ))
}
