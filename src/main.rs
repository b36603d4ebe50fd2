use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use salonbook::config::AppConfig;
use salonbook::db;
use salonbook::handlers;
use salonbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    anyhow::ensure!(
        !config.admin_token.is_empty(),
        "ADMIN_TOKEN must not be empty"
    );
    if config.admin_token == "changeme" {
        tracing::warn!("ADMIN_TOKEN is the default value; set it before exposing the server");
    }

    let conn = db::init_db(&config.database_url)?;
    tracing::info!(database = %config.database_url, "database ready");

    let state = Arc::new(AppState::new(conn, config.clone()));
    let app = handlers::router(state).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
