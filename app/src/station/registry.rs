use std::{collections::HashMap, path::PathBuf, sync::Arc};

use infrastructure::HttpClientConfig;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::core::time::Duration;

use super::{StationClient, StationRunner, StationSettings};

pub struct StationFactory {
    http_client: HttpClientConfig,
    state_dir: PathBuf,
}

struct StationHandle {
    client: StationClient,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

type Slot = Arc<Mutex<Option<StationHandle>>>;

/// Outcome of registering a host, tells callers whether this call started the runner.
pub enum Registration {
    Created(StationClient),
    Existing(StationClient),
}

impl Registration {
    pub fn into_client(self) -> StationClient {
        match self {
            Registration::Created(client) | Registration::Existing(client) => client,
        }
    }
}

/// One runner per host. Owned by the supervisor, shared with the API.
pub struct StationRegistry {
    factory: StationFactory,
    cancel: CancellationToken,
    stations: Mutex<HashMap<String, Slot>>,
}

impl StationFactory {
    pub fn new(http_client: HttpClientConfig, state_dir: PathBuf) -> Self {
        Self { http_client, state_dir }
    }

    fn start(&self, host: &str, scan_interval: u64, cancel: CancellationToken) -> anyhow::Result<StationHandle> {
        let runner = StationRunner::new(
            host,
            Duration::seconds(scan_interval as i64),
            &self.http_client,
            &self.state_dir,
            cancel.clone(),
        )?;

        let client = runner.client();
        let task = tokio::spawn(runner.run());

        Ok(StationHandle { client, cancel, task })
    }
}

impl StationHandle {
    async fn stop(self) {
        self.cancel.cancel();

        if let Err(e) = self.task.await {
            tracing::error!("Station runner for {} ended abnormally: {}", self.client.host(), e);
        }
    }
}

impl StationRegistry {
    pub fn new(factory: StationFactory) -> Self {
        Self {
            factory,
            cancel: CancellationToken::new(),
            stations: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_create(&self, settings: &StationSettings) -> anyhow::Result<StationClient> {
        self.register(settings).await.map(Registration::into_client)
    }

    pub async fn register(&self, settings: &StationSettings) -> anyhow::Result<Registration> {
        let host = settings.host.trim();

        let slot = {
            let mut stations = self.stations.lock().await;
            stations.entry(host.to_owned()).or_default().clone()
        };

        //held for check-and-create only, the map lock is already released
        let mut slot = slot.lock().await;
        if let Some(handle) = slot.as_ref() {
            tracing::debug!("Station runner for {} already exists", host);
            return Ok(Registration::Existing(handle.client.clone()));
        }

        let handle = self
            .factory
            .start(host, settings.scan_interval, self.cancel.child_token())?;
        let client = handle.client.clone();
        *slot = Some(handle);

        tracing::info!("Station runner for {} created", host);
        Ok(Registration::Created(client))
    }

    pub async fn get(&self, host: &str) -> Option<StationClient> {
        let slot = self.stations.lock().await.get(host).cloned()?;
        let slot = slot.lock().await;

        slot.as_ref().map(|handle| handle.client.clone())
    }

    pub async fn clients(&self) -> Vec<StationClient> {
        let slots: Vec<Slot> = self.stations.lock().await.values().cloned().collect();

        let mut clients = vec![];
        for slot in slots {
            if let Some(handle) = slot.lock().await.as_ref() {
                clients.push(handle.client.clone());
            }
        }

        clients.sort_by(|a, b| a.host().cmp(b.host()));
        clients
    }

    pub async fn remove(&self, host: &str) -> bool {
        let Some(slot) = self.stations.lock().await.remove(host) else {
            return false;
        };

        let handle = slot.lock().await.take();
        match handle {
            Some(handle) => {
                handle.stop().await;
                tracing::info!("Station runner for {} removed", host);
                true
            }
            None => false,
        }
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let slots: Vec<Slot> = self.stations.lock().await.drain().map(|(_, slot)| slot).collect();

        let mut handles = vec![];
        for slot in slots {
            if let Some(handle) = slot.lock().await.take() {
                handles.push(handle);
            }
        }

        tracing::info!("Stopping {} station runners", handles.len());
        futures::future::join_all(handles.into_iter().map(StationHandle::stop)).await;
    }
}
