use market_edge::{api::start_server, app::MarketEdge, config::Settings};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;

    if settings.api_key.is_none() {
        eprintln!("⚠️  MARKET_EDGE_API_KEY not set; analysis will use canned model text");
    }

    info!("🚀 Market Edge - API Server");
    info!("📍 Port: {}", settings.port);
    info!(model = %settings.model, mode = ?settings.response_mode, "Inference configured");

    let app = Arc::new(MarketEdge::from_settings(&settings)?);
    let auth = app.bootstrap().await;

    info!(authenticated = auth.session().is_some(), "✅ Market Edge initialized");
    info!("📡 Starting API server...");

    start_server(app, settings.port).await?;

    Ok(())
}
