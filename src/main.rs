use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docudecipher::llm::{Analyzer, DeepSeekAdapter, MockAnalyzer};
use docudecipher::queue::store::JobStore;
use docudecipher::{config::Config, create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docudecipher=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    // Connect to database and run migrations
    let pool = docudecipher::db::create_pool(&config.database).await?;
    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    info!("Database migrations completed");

    // Pick the analyzer. Without a usable API key the server still runs,
    // serving clearly-marked demo reports.
    let analyzer: Arc<dyn Analyzer> = if config.has_live_api_key() {
        info!(model = %config.llm.model, "using live analysis backend");
        Arc::new(DeepSeekAdapter::new(
            &config.llm.api_key,
            &config.llm.base_url,
            &config.llm.model,
        ))
    } else {
        warn!("DEEPSEEK_API_KEY not set; running in demo mode with mock reports");
        Arc::new(MockAnalyzer)
    };

    // Create shared state
    let state = AppState {
        pool,
        config: config.clone(),
        jobs: JobStore::new(),
        analyzer,
    };

    // Create router and start server
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
