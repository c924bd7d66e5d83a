use std::sync::Arc;

use settings::Settings;
use tokio::sync::broadcast;

use crate::station::{StationEvent, StationFactory, StationRegistry};

mod adapter;
mod core;
mod settings;
mod station;

#[tokio::main(flavor = "multi_thread")]
pub async fn main() {
    let settings = Settings::new().expect("Error reading configuration");

    settings.monitoring.init().expect("Error initializing monitoring");

    let registry = Arc::new(StationRegistry::new(StationFactory::new(
        settings.http_client.clone(),
        settings.state_dir.clone(),
    )));

    for station in settings.stations.iter() {
        match registry.get_or_create(station).await {
            Ok(client) => {
                tokio::spawn(log_station_events(client.subscribe()));
            }
            Err(e) => tracing::error!("Error starting station {}: {:?}", station.host, e),
        }
    }

    let http_server_exec = {
        let registry = registry.clone();
        let http_client = settings.http_client.clone();

        async move {
            settings
                .http_server
                .run_server(move || vec![adapter::api::routes(registry.clone(), http_client.clone())])
                .await
                .expect("HTTP server execution failed");
        }
    };

    tracing::info!("Starting main loop");

    tokio::select!(
        _ = http_server_exec => {},
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
        },
    );

    registry.shutdown().await;
    tracing::info!("Shutdown completed");
}

//commands run asynchronously, their outcome only shows up here
async fn log_station_events(mut rx: broadcast::Receiver<StationEvent>) {
    loop {
        match rx.recv().await {
            Ok(StationEvent::TimezoneChanged(changed)) if changed.success => {
                tracing::info!(
                    "Timezone of {} set to {} (dst {})",
                    changed.host,
                    changed.timezone,
                    changed.dst
                );
            }
            Ok(StationEvent::TimezoneChanged(changed)) => {
                tracing::warn!(
                    "Setting timezone of {} failed: {}",
                    changed.host,
                    changed.error.unwrap_or_default()
                );
            }
            Ok(StationEvent::LastRainChanged { host, last_rain }) => {
                tracing::info!("Last rain at {} is now {}", host, last_rain.format("%Y-%m-%d"));
            }
            Ok(StationEvent::RebootRequested { host, success }) => {
                tracing::info!("Reboot of {} requested, accepted: {}", host, success);
            }
            Ok(StationEvent::PollFailed { host, error }) => {
                tracing::debug!("Poll of {} failed with {}", host, error.kind());
            }
            Ok(StationEvent::SnapshotUpdated(snapshot)) => {
                tracing::trace!(
                    "Snapshot of {} updated with {} sensors",
                    snapshot.info.host,
                    snapshot.sensors.len()
                );
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Station event log lagged behind by {} events", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
