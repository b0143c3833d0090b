//! # Photogram Server
//!
//! Assembles the storage adapter, the core services and the HTTP router from
//! layered settings, then serves until interrupted.

use std::sync::Arc;

use anyhow::Context;
use api_adapters::{router, AppState};
use configs::{DatabaseBackend, LogFormat, LoggingSettings, Settings};
use domains::SystemClock;
use services::{IdAllocator, Services};
use storage_adapters::MemoryStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingSettings) {
    // RUST_LOG wins over the configured directive
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn build_services(settings: &Settings) -> anyhow::Result<Services> {
    let ids = IdAllocator::random(settings.ids.length, settings.ids.max_attempts);
    let clock = Arc::new(SystemClock);

    match settings.database.backend {
        DatabaseBackend::Memory => {
            warn!("using the in-memory store; all data is lost on exit");
            Ok(Services::new(Arc::new(MemoryStore::new()), ids, clock))
        }
        #[cfg(feature = "db-sqlite")]
        DatabaseBackend::Sqlite => {
            let store = storage_adapters::SqliteStore::connect(
                &settings.database.url,
                settings.database.max_connections,
            )
            .await
            .with_context(|| format!("opening {}", settings.database.url))?;
            Ok(Services::new(Arc::new(store), ids, clock))
        }
        #[cfg(not(feature = "db-sqlite"))]
        DatabaseBackend::Sqlite => {
            anyhow::bail!("database.backend = \"sqlite\" but this build lacks the db-sqlite feature")
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_tracing(&settings.logging);

    let services = build_services(&settings).await?;
    let app = router(
        AppState::new(Arc::new(services)),
        settings.server.max_upload_bytes,
    );

    let address = settings.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(%address, "photogram listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
