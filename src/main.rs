mod api;
mod app;
mod config;
mod db;
mod domain;
mod error;
mod logging;
mod middleware;
mod routes;
mod services;

use std::sync::Arc;

use anyhow::Result;

use services::notifications::PgNotificationSink;
use services::NotificationSink;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = config::Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting rfqhub backend"
    );

    // Create database pool and apply migrations
    let pool = db::create_pool(&settings).await?;
    sqlx::migrate!().run(&pool).await?;

    // Notification sink backed by the notifications table
    let sink: Arc<dyn NotificationSink> = Arc::new(PgNotificationSink::new(pool.clone()));

    // Background expiry sweep; page loads also sweep the thread they touch,
    // this catches threads nobody is looking at.
    tokio::spawn(services::expiry::run_sweeper(
        pool.clone(),
        sink.clone(),
        settings.expiry_sweep_interval_seconds,
    ));

    // Create application state
    let state = app::AppState::new(pool, settings.clone(), sink);

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
