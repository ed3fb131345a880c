use std::sync::Arc;

use saas_adal::config;
use saas_adal::database::manager::DatabaseManager;
use saas_adal::database::repository::Store;
use saas_adal::handlers::{self, AppState};
use saas_adal::testing::SystemClock;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config();
    tracing::info!("Starting saas-adal in {:?} mode", config.environment);

    let pool = DatabaseManager::connect(&config.database).await?;
    let store = Store::from_config(pool, config);
    let app = handlers::router(AppState::with_clock(store, Arc::new(SystemClock)), config);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
