// src/main.rs

use exam_session::backend::HttpBackend;
use exam_session::clock::SqliteClockStore;
use exam_session::config::Config;
use exam_session::routes;
use exam_session::session::{SessionRegistry, SessionSettings};
use exam_session::state::AppState;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (.env included)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "exam-session.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let pool = connect_with_retry(&config.database_url).await?;
    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied successfully.");

    let backend = Arc::new(HttpBackend::new(&config.backend_url, config.request_timeout())?);
    let clocks = Arc::new(SqliteClockStore::new(pool));
    let registry = Arc::new(SessionRegistry::new(
        backend.clone(),
        clocks,
        SessionSettings::from(&config),
    ));

    // Create AppState
    let state = AppState { registry, backend };

    // Create the Axum application router
    let app = routes::create_router(state);

    tracing::info!(
        backend = %config.backend_url,
        autosave_secs = config.autosave_interval_secs,
        "Listening on {}",
        config.bind_addr
    );
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    // Start the server
    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize Database Pool with Retry
async fn connect_with_retry(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let mut retry_count = 0;
    loop {
        match SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to connect to database after 5 retries: {}", e);
                    return Err(e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
