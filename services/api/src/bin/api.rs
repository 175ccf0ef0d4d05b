//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, HttpMessagingAdapter, HttpSummarizerAdapter},
    config::Config,
    error::ApiError,
    web::{build_router, AppState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Worker Adapters ---
    let summarizer = Arc::new(HttpSummarizerAdapter::new(
        config.summarizer_url.clone(),
        config.http_timeout,
    )?);
    let messenger = Arc::new(HttpMessagingAdapter::new(
        config.messaging_url.clone(),
        config.http_timeout,
    )?);
    info!(
        "Summarization worker at {}, messaging worker at {}",
        config.summarizer_url, config.messaging_url
    );

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        db_adapter,
        summarizer,
        messenger,
    ));

    // --- 5. Expire Stale Pending Requests ---
    if let Some(ttl) = config.pending_ttl {
        let queue = app_state.summary_queue.clone();
        let period = ttl.min(Duration::from_secs(60));
        info!("Pending summary requests expire after {:?}.", ttl);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let purged = queue.pending().purge_expired();
                if purged > 0 {
                    info!("Dropped {} expired pending summary requests.", purged);
                }
            }
        });
    }

    // --- 6. Create the Web Router ---
    let app = build_router(app_state);

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
