use anyhow::Context;
use chrono::Utc;
use robogram_server::{api, config, counters, db, state::AppState};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "robogram_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load settings
    let settings = config::Settings::new().context("Failed to load settings")?;

    // Initialize database
    let db = db::Database::new(&settings.database.path).context("Failed to create database")?;
    db.initialize().context("Failed to initialize database schema")?;

    if settings.database.seed_personas {
        let seeded = db.seed_personas().context("Failed to seed personas")?;
        tracing::info!("Seeded {} personas", seeded);
    }

    tracing::info!("Database initialized successfully");

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Failed to parse server address")?;
    let interval_secs = settings.automation.interval_secs;

    // Create application state
    let state = AppState::from_settings(db, settings)?;

    // Expired stories left over from a previous run
    if let Err(e) = counters::cleanup_expired_stories(&state.db, Utc::now()) {
        tracing::error!("Failed to clean up expired stories on startup: {:#}", e);
    }

    // Optional in-process automation; otherwise an external cron hits /internal
    if interval_secs > 0 {
        let scheduler_state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            // The first tick fires immediately; give the server a moment to come up
            interval.tick().await;
            loop {
                interval.tick().await;
                tracing::debug!("Running scheduled automation...");
                match scheduler_state.scheduler.run_all_automated().await {
                    Ok(Some(report)) => tracing::info!(
                        "Scheduled run: {} performed, {} skipped, {} failed",
                        report.performed.len(),
                        report.skipped,
                        report.failed
                    ),
                    Ok(None) => {}
                    Err(e) => tracing::error!("Scheduled run failed: {:#}", e),
                }
                if let Err(e) = counters::cleanup_expired_stories(&scheduler_state.db, Utc::now()) {
                    tracing::error!("Periodic story cleanup failed: {:#}", e);
                }
            }
        });
        tracing::info!("In-process automation every {}s", interval_secs);
    }

    let app = api::router(state);

    // Start server
    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
