//! One-shot migration runner for the device schema
//!
//! Applies the pending migrations, including the irreversible legacy-table
//! consolidation, and exits non-zero on any failure so deploy scripts can
//! gate on it.

use tracing_subscriber::EnvFilter;

use keywarden_store::{PostgresDeviceStore, StorageError};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Migration failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StorageError> {
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| StorageError::Connection("DATABASE_URL is not set".to_string()))?;

    let store = PostgresDeviceStore::new(&database_url).await?;
    store.migrate().await?;

    tracing::info!("Device schema is up to date");
    Ok(())
}
