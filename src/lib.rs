// DocuDecipher - code and document analysis platform with AI-backed reports

pub mod analysis;
pub mod auth;
pub mod config;
pub mod db;
pub mod llm;
pub mod models;
pub mod queue;
pub mod routes;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
