use std::sync::Arc;

use derive_more::derive::{Display, Error};
use infrastructure::meter;
use moka::future::Cache;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::{
    core::time::{DateTime, Duration},
    station::{
        StationEvent, TimezoneChanged, TimezoneUpdate,
        adapter::{FetchError, LastRainStore, StationHttpClient},
        config_cache::ConfigurationCache,
        domain::{
            DeviceConfiguration, LastRainObservation, LastRainReport, SensorKey, Snapshot, extract::extract_live_data,
            normalize::normalize,
        },
    },
    t,
};

const POLL_METRIC: &str = "ws1500_poll_total";
const SENSOR_METRIC: &str = "ws1500_sensor_value";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTrigger {
    Scheduled,
    OnDemand,
}

#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum PollError {
    #[display("Error fetching live data of {host}: {source}")]
    Telemetry { host: String, source: FetchError },

    #[display("Poll cycle was cancelled")]
    Cancelled,

    #[display("Station runner is not running")]
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StationStatus {
    pub available: bool,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime>,
}

pub struct StationService {
    host: String,
    client: StationHttpClient,
    config_cache: ConfigurationCache,
    telemetry_cache: Cache<(), String>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    status: RwLock<StationStatus>,
    last_rain: Mutex<LastRainObservation>,
    last_rain_store: LastRainStore,
    cancel: CancellationToken,
    event_tx: broadcast::Sender<StationEvent>,
}

impl StationService {
    pub fn new(
        host: &str,
        client: StationHttpClient,
        last_rain_store: LastRainStore,
        cancel: CancellationToken,
        event_tx: broadcast::Sender<StationEvent>,
    ) -> Self {
        let telemetry_cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::seconds(5).into())
            .build();

        Self {
            host: host.to_owned(),
            config_cache: ConfigurationCache::new(host, client.clone(), t!(30 seconds)),
            client,
            telemetry_cache,
            snapshot: RwLock::new(None),
            status: RwLock::new(StationStatus::default()),
            last_rain: Mutex::new(LastRainObservation::default()),
            last_rain_store,
            cancel,
            event_tx,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StationEvent> {
        self.event_tx.subscribe()
    }

    pub async fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().await.clone()
    }

    pub async fn status(&self) -> StationStatus {
        self.status.read().await.clone()
    }

    pub async fn last_rain(&self) -> LastRainReport {
        self.last_rain.lock().await.report(t!(now))
    }

    pub async fn restore_last_rain(&self) {
        match self.last_rain_store.load().await {
            Ok(Some(observation)) => {
                tracing::info!("Restored last rain of {}: {:?}", self.host, observation.last_rain);
                *self.last_rain.lock().await = observation;
            }
            Ok(None) => tracing::debug!("No last rain state stored for {}", self.host),
            Err(e) => tracing::warn!("Error restoring last rain of {}, starting empty: {:?}", self.host, e),
        }
    }

    #[tracing::instrument(skip(self), fields(host = %self.host))]
    pub async fn poll(&self, trigger: PollTrigger) -> Result<Arc<Snapshot>, PollError> {
        let config = self.config_cache.get().await;

        let html = match self.fetch_live_data(trigger).await {
            Ok(html) => html,
            Err(e) => return Err(self.handle_failure(e).await),
        };

        let readings = normalize(extract_live_data(&html), &config);

        if self.cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }

        let now = t!(now);
        let snapshot = Arc::new(Snapshot::new(&self.host, &readings, &config, now));
        self.publish(snapshot.clone(), &config).await;
        self.observe_rain(snapshot.number(SensorKey::DailyRain), now).await;

        Ok(snapshot)
    }

    async fn fetch_live_data(&self, trigger: PollTrigger) -> Result<String, FetchError> {
        match trigger {
            PollTrigger::Scheduled => {
                let html = self.client.fetch_live_data().await?;
                self.telemetry_cache.insert((), html.clone()).await;
                Ok(html)
            }
            PollTrigger::OnDemand => self
                .telemetry_cache
                .try_get_with((), self.client.fetch_live_data())
                .await
                .map_err(|e| (*e).clone()),
        }
    }

    async fn publish(&self, snapshot: Arc<Snapshot>, config: &DeviceConfiguration) {
        tracing::info!(
            "Snapshot of {} updated with {} sensors (temperature unit {})",
            self.host,
            snapshot.sensors.len(),
            config.temperature_unit
        );

        meter::increment(POLL_METRIC, &[("host", self.host.as_str()), ("result", "success")]);
        for (key, value) in snapshot.numeric_sensors() {
            meter::set(SENSOR_METRIC, value, &[("host", self.host.as_str()), ("sensor", key.as_str())]);
        }

        *self.snapshot.write().await = Some(snapshot.clone());
        {
            let mut status = self.status.write().await;
            status.available = true;
            status.consecutive_failures = 0;
            status.last_error = None;
            status.last_success = Some(snapshot.info.last_update);
        }

        self.send(StationEvent::SnapshotUpdated(snapshot));
    }

    async fn handle_failure(&self, error: FetchError) -> PollError {
        if self.cancel.is_cancelled() {
            return PollError::Cancelled;
        }

        let failures = {
            let mut status = self.status.write().await;
            status.available = false;
            status.consecutive_failures += 1;
            status.last_error = Some(error.to_string());
            status.consecutive_failures
        };

        tracing::error!("Error polling {} ({} consecutive failures): {}", self.host, failures, error);
        meter::increment(POLL_METRIC, &[("host", self.host.as_str()), ("result", error.kind())]);

        self.send(StationEvent::PollFailed {
            host: self.host.clone(),
            error: error.clone(),
        });

        PollError::Telemetry {
            host: self.host.clone(),
            source: error,
        }
    }

    async fn observe_rain(&self, daily_rain: Option<f64>, now: DateTime) {
        let observation = {
            let mut last_rain = self.last_rain.lock().await;
            if !last_rain.observe(daily_rain, now) {
                return;
            }
            *last_rain
        };

        tracing::info!("Rain detected at {}, last rain is now {:?}", self.host, observation.last_rain);

        if let Err(e) = self.last_rain_store.save(&observation).await {
            tracing::error!("Error persisting last rain of {}: {:?}", self.host, e);
        }

        if let Some(last_rain) = observation.last_rain {
            self.send(StationEvent::LastRainChanged {
                host: self.host.clone(),
                last_rain,
            });
        }
    }

    #[tracing::instrument(skip(self), fields(host = %self.host))]
    pub async fn reboot(&self) -> bool {
        let success = match self.client.reboot().await {
            Ok(_) => {
                tracing::info!("Reboot of {} accepted", self.host);
                true
            }
            Err(e) => {
                tracing::warn!("Reboot of {} failed: {}", self.host, e);
                false
            }
        };

        self.send(StationEvent::RebootRequested {
            host: self.host.clone(),
            success,
        });

        success
    }

    #[tracing::instrument(skip(self), fields(host = %self.host))]
    pub async fn set_timezone(&self, update: TimezoneUpdate) -> TimezoneChanged {
        let result = self.client.post_clock_settings(update.timezone, update.dst).await;

        let changed = TimezoneChanged {
            host: self.host.clone(),
            timezone: update.timezone,
            dst: update.dst,
            success: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
        };

        match result {
            Ok(_) => {
                tracing::info!(
                    "Clock settings of {} changed to timezone {} dst {}",
                    self.host,
                    update.timezone,
                    update.dst
                );
                self.config_cache.invalidate().await;
            }
            Err(e) => tracing::warn!("Error changing clock settings of {}: {}", self.host, e),
        }

        self.send(StationEvent::TimezoneChanged(changed.clone()));
        changed
    }

    fn send(&self, event: StationEvent) {
        //no subscribers is fine
        if let Err(e) = self.event_tx.send(event) {
            tracing::trace!("Station event of {} not delivered: {}", self.host, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use infrastructure::HttpClientConfig;
    use mockito::{Mock, Server, ServerGuard};

    use super::*;
    use crate::core::time::FIXED_NOW;
    use crate::station::domain::SensorValue;

    const LIVE_DATA: &str = r#"
        <input name="outTemp" disabled="disabled" type="text" value="68" maxlength="5" />
        <input name="windir" disabled="disabled" type="text" value="180" maxlength="5" />
        <input name="rainofhourly" disabled="disabled" type="text" value="0.00" maxlength="5" />
        <input name="rainofdaily" disabled="disabled" type="text" value="0.00" maxlength="5" />
        <input name="pm25in" disabled="disabled" type="text" value="----" maxlength="5" />
    "#;

    const STATION_PAGE: &str = r#"
        <input name="timezone" type="text" value="-5" />
        <select name="u_Temperature"><option value="0">C</option><option value="1" selected="selected">F</option></select>
    "#;

    struct Fixture {
        server: ServerGuard,
        service: StationService,
        events: broadcast::Receiver<StationEvent>,
        _state_dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let server = Server::new_async().await;
        let state_dir = tempfile::tempdir().unwrap();
        let host = server.host_with_port();
        let client = StationHttpClient::new(&host, &HttpClientConfig::default()).unwrap();
        let (event_tx, events) = broadcast::channel(16);

        let service = StationService::new(
            &host,
            client,
            LastRainStore::new(state_dir.path(), &host),
            CancellationToken::new(),
            event_tx,
        );

        Fixture {
            server,
            service,
            events,
            _state_dir: state_dir,
        }
    }

    async fn mock_page(server: &mut ServerGuard, path: &str, body: &str) -> Mock {
        server.mock("GET", path).with_status(200).with_body(body).create_async().await
    }

    #[tokio::test]
    async fn poll_publishes_normalized_snapshot() {
        let mut f = fixture().await;
        let _station = mock_page(&mut f.server, "/station.htm", STATION_PAGE).await;
        let _live = mock_page(&mut f.server, "/livedata.htm", LIVE_DATA).await;

        let snapshot = f.service.poll(PollTrigger::Scheduled).await.unwrap();

        assert_eq!(snapshot.number(SensorKey::OutTemp), Some(20.0));
        assert_eq!(snapshot.number(SensorKey::WindDirection), Some(180.0));
        assert_eq!(snapshot.value(SensorKey::Pm25Indoor), None);
        assert_eq!(snapshot.value(SensorKey::Uvi), None);
        assert_eq!(snapshot.is_raining(), Some(false));
        assert_eq!(snapshot.info.timezone, "UTC-5");
        assert_eq!(snapshot.info.temperature_unit, "°F");

        assert_eq!(f.service.snapshot().await, Some(snapshot.clone()));
        assert!(f.service.status().await.available);
        assert!(matches!(f.events.try_recv(), Ok(StationEvent::SnapshotUpdated(_))));
    }

    #[tokio::test]
    async fn telemetry_failure_keeps_previous_snapshot() {
        let mut f = fixture().await;
        let _station = mock_page(&mut f.server, "/station.htm", STATION_PAGE).await;
        let live = mock_page(&mut f.server, "/livedata.htm", LIVE_DATA).await;

        let first = f.service.poll(PollTrigger::Scheduled).await.unwrap();
        live.remove_async().await;
        let _failing = f
            .server
            .mock("GET", "/livedata.htm")
            .with_status(500)
            .create_async()
            .await;

        let result = f.service.poll(PollTrigger::Scheduled).await;

        assert!(matches!(
            result,
            Err(PollError::Telemetry {
                source: FetchError::HttpStatus { status: 500 },
                ..
            })
        ));
        assert_eq!(f.service.snapshot().await, Some(first));

        let status = f.service.status().await;
        assert!(!status.available);
        assert_eq!(status.consecutive_failures, 1);
        assert!(status.last_error.is_some());
        assert!(status.last_success.is_some());

        assert!(matches!(f.events.try_recv(), Ok(StationEvent::SnapshotUpdated(_))));
        assert!(matches!(f.events.try_recv(), Ok(StationEvent::PollFailed { .. })));
    }

    #[tokio::test]
    async fn unreachable_config_falls_back_to_defaults() {
        let mut f = fixture().await;
        let _station = f.server.mock("GET", "/station.htm").with_status(404).create_async().await;
        let _live = mock_page(&mut f.server, "/livedata.htm", LIVE_DATA).await;

        let snapshot = f.service.poll(PollTrigger::Scheduled).await.unwrap();

        assert_eq!(snapshot.number(SensorKey::OutTemp), Some(68.0));
        assert_eq!(snapshot.info.timezone, "unknown");
        assert_eq!(snapshot.info.temperature_unit, "°C");
    }

    #[tokio::test]
    async fn on_demand_poll_reuses_recent_telemetry() {
        let mut f = fixture().await;
        let _station = mock_page(&mut f.server, "/station.htm", STATION_PAGE).await;
        let live = f
            .server
            .mock("GET", "/livedata.htm")
            .with_body(LIVE_DATA)
            .expect(1)
            .create_async()
            .await;

        f.service.poll(PollTrigger::Scheduled).await.unwrap();
        f.service.poll(PollTrigger::OnDemand).await.unwrap();

        live.assert_async().await;
    }

    #[tokio::test]
    async fn text_values_are_published_raw() {
        let mut f = fixture().await;
        let _station = mock_page(&mut f.server, "/station.htm", STATION_PAGE).await;
        let _live = mock_page(
            &mut f.server,
            "/livedata.htm",
            r#"<input name="outTemp" value="6.8.0" /><input name="outBattSta1" value="Normal" />"#,
        )
        .await;

        let snapshot = f.service.poll(PollTrigger::Scheduled).await.unwrap();

        assert_eq!(snapshot.value(SensorKey::OutTemp), Some(&SensorValue::Text("6.8.0".to_string())));
        assert_eq!(
            snapshot.value(SensorKey::Outdoor1Battery),
            Some(&SensorValue::Text("Normal".to_string()))
        );
    }

    #[tokio::test]
    async fn cancelled_service_publishes_nothing() {
        let mut f = fixture().await;
        let _station = mock_page(&mut f.server, "/station.htm", STATION_PAGE).await;
        let _live = mock_page(&mut f.server, "/livedata.htm", LIVE_DATA).await;
        f.service.cancel.cancel();

        let result = f.service.poll(PollTrigger::Scheduled).await;

        assert_eq!(result, Err(PollError::Cancelled));
        assert_eq!(f.service.snapshot().await, None);
        assert!(f.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn rain_is_tracked_and_persisted() {
        let mut f = fixture().await;
        let _station = mock_page(&mut f.server, "/station.htm", STATION_PAGE).await;
        let _live = mock_page(
            &mut f.server,
            "/livedata.htm",
            r#"<input name="rainofdaily" value="0.12" /><input name="rainofhourly" value="0.04" />"#,
        )
        .await;
        let now = DateTime::from_iso("2024-06-03T15:00:00Z").unwrap();

        let snapshot = FIXED_NOW.scope(now, f.service.poll(PollTrigger::Scheduled)).await.unwrap();

        assert_eq!(snapshot.is_raining(), Some(true));
        let report = FIXED_NOW.scope(now, f.service.last_rain()).await;
        assert_eq!(report.days_since_rain, Some(0));

        let stored = f.service.last_rain_store.load().await.unwrap().unwrap();
        assert_eq!(stored.last_rain.map(|t| t.date()), Some(now.date()));
    }

    #[tokio::test]
    async fn last_rain_stays_on_first_day_of_repeated_reading() {
        let mut f = fixture().await;
        let _station = mock_page(&mut f.server, "/station.htm", STATION_PAGE).await;
        let first_day = DateTime::from_iso("2024-06-01T12:00:00Z").unwrap();

        for (i, daily_rain) in ["0.0", "0.0", "3.2", "3.2", "0.0"].iter().enumerate() {
            let live = mock_page(
                &mut f.server,
                "/livedata.htm",
                &format!(r#"<input name="rainofdaily" value="{daily_rain}" />"#),
            )
            .await;

            let now = first_day + Duration::days(i as i64);
            FIXED_NOW.scope(now, f.service.poll(PollTrigger::Scheduled)).await.unwrap();
            live.remove_async().await;
        }

        let last_day = first_day + Duration::days(4);
        let report = FIXED_NOW.scope(last_day, f.service.last_rain()).await;
        assert_eq!(report.last_rain.map(|t| t.date()), Some((first_day + Duration::days(2)).date()));
        assert_eq!(report.days_since_rain, Some(2));

        let stored = f.service.last_rain_store.load().await.unwrap().unwrap();
        assert_eq!(stored.last_rain.map(|t| t.date()), Some((first_day + Duration::days(2)).date()));
    }

    #[tokio::test]
    async fn reboot_failure_returns_false() {
        let mut f = fixture().await;
        let _reboot = f.server.mock("GET", "/msgreboot.htm").with_status(500).create_async().await;

        assert!(!f.service.reboot().await);
        assert!(matches!(
            f.events.try_recv(),
            Ok(StationEvent::RebootRequested { success: false, .. })
        ));
    }

    #[tokio::test]
    async fn reboot_does_not_touch_snapshot() {
        let mut f = fixture().await;
        let _reboot = mock_page(&mut f.server, "/msgreboot.htm", "Rebooting").await;

        assert!(f.service.reboot().await);
        assert_eq!(f.service.snapshot().await, None);
    }

    #[tokio::test]
    async fn successful_timezone_change_refreshes_configuration() {
        let mut f = fixture().await;
        let station = f
            .server
            .mock("GET", "/station.htm")
            .with_body(STATION_PAGE)
            .expect(2)
            .create_async()
            .await;
        let _live = mock_page(&mut f.server, "/livedata.htm", LIVE_DATA).await;
        let _post = f.server.mock("POST", "/station.htm").with_status(200).create_async().await;

        f.service.poll(PollTrigger::Scheduled).await.unwrap();
        let changed = f.service.set_timezone(TimezoneUpdate::new(2.0, true)).await;
        f.service.poll(PollTrigger::Scheduled).await.unwrap();

        assert!(changed.success);
        assert_eq!(changed.error, None);
        station.assert_async().await;
    }

    #[tokio::test]
    async fn failed_timezone_change_is_reported() {
        let mut f = fixture().await;
        let _post = f.server.mock("POST", "/station.htm").with_status(500).create_async().await;

        let changed = f.service.set_timezone(TimezoneUpdate::new(-3.5, false)).await;

        assert!(!changed.success);
        assert!(changed.error.is_some());
        assert!(matches!(
            f.events.try_recv(),
            Ok(StationEvent::TimezoneChanged(TimezoneChanged { success: false, .. }))
        ));
    }
}
