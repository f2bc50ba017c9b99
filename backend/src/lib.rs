//! PharmStock - pharmacy and hospital stock core
//!
//! Tracks stock at batch granularity, explains every quantity change through
//! an immutable movement ledger, allocates deductions first-expiring-first-out
//! across batches, and drives the purchase order workflow from draft to goods
//! receipt.
//!
//! This crate is the core only: callers supply already-validated tenant and
//! actor identifiers, and render or bill the returned data elsewhere.

use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod config;
pub mod error;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};

/// Application state shared across services
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
}

/// Initialize tracing with an env-filter override
/// (`RUST_LOG=pharmstock_backend=debug,sqlx=warn` etc.).
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pharmstock_backend=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load configuration and build the application state with a connected pool.
pub async fn bootstrap() -> anyhow::Result<AppState> {
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting PharmStock core");
    tracing::info!("Environment: {}", config.environment);

    let db = connect(&config).await?;

    if config.environment == "development" {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db).await?;
        tracing::info!("Migrations completed");
    }

    Ok(AppState {
        db,
        config: Arc::new(config),
    })
}

/// Create the database connection pool
pub async fn connect(config: &Config) -> anyhow::Result<sqlx::PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;
    tracing::info!("Database connection established");
    Ok(pool)
}
