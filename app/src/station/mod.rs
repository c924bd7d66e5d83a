pub mod adapter;
mod config_cache;
pub mod domain;
mod registry;
mod service;
mod validate;

pub use registry::{Registration, StationFactory, StationRegistry};
pub use service::{PollError, PollTrigger, StationStatus};
pub use validate::{validate_host, validate_scan_interval, validate_timezone_update, ValidationError};

use std::{path::Path, sync::Arc};

use infrastructure::HttpClientConfig;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

use crate::{
    core::time::Duration,
    station::{
        adapter::{FetchError, LastRainStore, StationHttpClient},
        domain::{LastRainReport, Snapshot},
        service::StationService,
    },
};

pub const MIN_SCAN_INTERVAL_SECS: u64 = 10;
pub const MAX_SCAN_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StationSettings {
    pub host: String,
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}

#[derive(Debug, Clone)]
pub enum StationEvent {
    SnapshotUpdated(Arc<Snapshot>),
    PollFailed { host: String, error: FetchError },
    LastRainChanged { host: String, last_rain: crate::core::time::DateTime },
    RebootRequested { host: String, success: bool },
    TimezoneChanged(TimezoneChanged),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimezoneUpdate {
    pub timezone: f64,
    pub dst: bool,
}

impl TimezoneUpdate {
    pub fn new(timezone: f64, dst: bool) -> Self {
        Self { timezone, dst }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimezoneChanged {
    pub host: String,
    pub timezone: f64,
    pub dst: bool,
    pub success: bool,
    pub error: Option<String>,
}

type RefreshReply = oneshot::Sender<Result<Arc<Snapshot>, PollError>>;

pub struct StationRunner {
    service: Arc<StationService>,
    scan_interval: Duration,
    cancel: CancellationToken,
    refresh_tx: mpsc::Sender<RefreshReply>,
    refresh_rx: mpsc::Receiver<RefreshReply>,
}

//cheap to clone, shares the service with its runner
#[derive(Clone)]
pub struct StationClient {
    service: Arc<StationService>,
    refresh_tx: mpsc::Sender<RefreshReply>,
}

impl StationRunner {
    pub fn new(
        host: &str,
        scan_interval: Duration,
        http_client: &HttpClientConfig,
        state_dir: &Path,
        cancel: CancellationToken,
    ) -> anyhow::Result<Self> {
        let client = StationHttpClient::new(host, http_client)?;
        let (event_tx, _) = broadcast::channel(64);
        let (refresh_tx, refresh_rx) = mpsc::channel(8);

        let service = StationService::new(
            host,
            client,
            LastRainStore::new(state_dir, host),
            cancel.clone(),
            event_tx,
        );

        Ok(Self {
            service: Arc::new(service),
            scan_interval,
            cancel,
            refresh_tx,
            refresh_rx,
        })
    }

    pub fn client(&self) -> StationClient {
        StationClient {
            service: self.service.clone(),
            refresh_tx: self.refresh_tx.clone(),
        }
    }

    pub async fn run(mut self) {
        let host = self.service.host().to_owned();
        tracing::info!("Starting station runner for {} every {}", host, self.scan_interval);

        self.service.restore_last_rain().await;

        let mut interval = tokio::time::interval(self.scan_interval.into());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,

                _ = interval.tick() => {
                    //failures are reported by the service
                    let _ = self.run_cycle(PollTrigger::Scheduled).await;
                }

                Some(reply) = self.refresh_rx.recv() => {
                    let result = self.run_cycle(PollTrigger::OnDemand).await;
                    if reply.send(result).is_err() {
                        tracing::debug!("Refresh of {} finished, but requester is gone", host);
                    }
                }
            }
        }

        tracing::info!("Station runner for {} stopped", host);
    }

    //a cancelled cycle is dropped at its next await point
    async fn run_cycle(&self, trigger: PollTrigger) -> Result<Arc<Snapshot>, PollError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(PollError::Cancelled),
            result = self.service.poll(trigger) => result,
        }
    }
}

impl StationClient {
    pub fn host(&self) -> &str {
        self.service.host()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StationEvent> {
        self.service.subscribe()
    }

    pub async fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.service.snapshot().await
    }

    pub async fn status(&self) -> StationStatus {
        self.service.status().await
    }

    pub async fn last_rain(&self) -> LastRainReport {
        self.service.last_rain().await
    }

    /// Runs a cycle right away, queued behind a cycle that may already be running.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, PollError> {
        let (tx, rx) = oneshot::channel();

        self.refresh_tx.send(tx).await.map_err(|_| PollError::Stopped)?;
        rx.await.map_err(|_| PollError::Stopped)?
    }

    pub async fn reboot(&self) -> bool {
        self.service.reboot().await
    }

    pub async fn set_timezone(&self, update: TimezoneUpdate) -> TimezoneChanged {
        self.service.set_timezone(update).await
    }
}
