//! Dropzone API Server
//!
//! Main entry point for the Dropzone backend service.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::net::TcpListener;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dropzone_api::{AppState, create_router};
use dropzone_core::cleanup::CleanupService;
use dropzone_core::presence::PresenceHub;
use dropzone_core::storage::{StorageConfig, StorageProvider, StorageService};
use dropzone_db::connect;
use dropzone_db::repositories::CleanupRepository;
use dropzone_shared::AppConfig;
use dropzone_shared::config::StorageSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dropzone=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Connect to database
    let db = connect(&config.database.url).await?;
    info!("Connected to database");

    // Create storage service
    let storage_config = storage_config_from(&config.storage);
    let storage = Arc::new(StorageService::from_config(storage_config)?);
    info!(provider = %config.storage.provider, "Storage configured");

    // Create the presence hub; every event-publishing service receives it
    // explicitly through the application state.
    let hub = Arc::new(PresenceHub::new());

    // Create application state
    let state = AppState {
        db: Arc::new(db),
        storage: storage.clone(),
        hub,
    };

    // Background reaper: periodically purge expired and soft-deleted zones.
    spawn_reaper(&state, storage, config.cleanup.sweep_interval_secs);

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Map the storage section of the app config onto a storage service config.
fn storage_config_from(settings: &StorageSettings) -> StorageConfig {
    let provider = match settings.provider.as_str() {
        "s3" => StorageProvider::s3(
            &settings.endpoint,
            &settings.bucket,
            &settings.access_key_id,
            &settings.secret_access_key,
            &settings.region,
        ),
        "azure_blob" => {
            StorageProvider::azure_blob(&settings.account, &settings.access_key, &settings.container)
        }
        _ => StorageProvider::local_fs(&settings.root),
    };

    StorageConfig::new(provider).with_max_file_size(settings.max_file_size)
}

/// Spawn the expiry reaper on a fixed interval.
///
/// The sweep shares its cleanup routine with explicit owner deletes, so
/// both racing on the same zone is harmless.
fn spawn_reaper(state: &AppState, storage: Arc<StorageService>, interval_secs: u64) {
    let db = state.db.clone();
    tokio::spawn(async move {
        let repo = Arc::new(CleanupRepository::new((*db).clone()));
        let service = CleanupService::new(storage, repo);

        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match service.sweep(Utc::now()).await {
                Ok(0) => {}
                Ok(reaped) => info!(reaped, "Expired-zone sweep complete"),
                Err(e) => error!(error = %e, "Expired-zone sweep failed"),
            }
        }
    });
}
