use infrastructure::meter;
use tokio::sync::Mutex;

use crate::core::time::{DateTime, Duration};
use crate::station::adapter::StationHttpClient;
use crate::station::domain::DeviceConfiguration;
use crate::t;

const METRIC_NAME: &str = "ws1500_config_fetch_total";

#[derive(Debug, Clone)]
struct CachedConfig {
    config: DeviceConfiguration,
    fetched_at: DateTime,
    invalidated: bool,
}

/// Device configuration changes rarely, so it is fetched at most once per
/// `max_age`. A failed refresh keeps serving the last known configuration.
pub struct ConfigurationCache {
    host: String,
    client: StationHttpClient,
    max_age: Duration,
    entry: Mutex<Option<CachedConfig>>,
}

impl ConfigurationCache {
    pub fn new(host: &str, client: StationHttpClient, max_age: Duration) -> Self {
        Self {
            host: host.to_owned(),
            client,
            max_age,
            entry: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> DeviceConfiguration {
        let mut entry = self.entry.lock().await;
        let now = t!(now);

        if let Some(cached) = entry.as_ref() {
            let age = now.elapsed_since(cached.fetched_at);

            //negative age means the clock stepped back, treat as expired
            if !cached.invalidated && age >= Duration::zero() && age < self.max_age {
                tracing::debug!("Using cached configuration of {}", self.host);
                return cached.config;
            }
        }

        match self.client.fetch_station_page().await {
            Ok(html) => {
                let config = DeviceConfiguration::parse(&html);
                tracing::debug!("Fetched configuration of {}: {:?}", self.host, config);
                meter::increment(METRIC_NAME, &[("host", self.host.as_str()), ("result", "success")]);

                *entry = Some(CachedConfig {
                    config,
                    fetched_at: now,
                    invalidated: false,
                });
                config
            }
            Err(e) => {
                meter::increment(METRIC_NAME, &[("host", self.host.as_str()), ("result", e.kind())]);

                match entry.as_ref() {
                    Some(cached) => {
                        tracing::warn!(
                            "Error fetching configuration of {}, using configuration from {}: {}",
                            self.host,
                            cached.fetched_at.to_human_readable(),
                            e
                        );
                        cached.config
                    }
                    None => {
                        tracing::warn!("Error fetching configuration of {}, using defaults: {}", self.host, e);
                        DeviceConfiguration::default()
                    }
                }
            }
        }
    }

    //keeps the value as fallback, only forces the next read to go to the device
    pub async fn invalidate(&self) {
        if let Some(cached) = self.entry.lock().await.as_mut() {
            cached.invalidated = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use infrastructure::HttpClientConfig;
    use mockito::Server;

    use super::*;
    use crate::core::time::FIXED_NOW;
    use crate::station::domain::{TemperatureUnit, Timezone};

    const STATION_PAGE: &str = r#"
        <input name="timezone" type="text" value="1" />
        <select name="u_Temperature"><option value="0">C</option><option value="1" selected="selected">F</option></select>
    "#;

    fn start() -> DateTime {
        DateTime::from_iso("2024-06-01T12:00:00Z").unwrap()
    }

    fn cache_for(server: &Server) -> ConfigurationCache {
        let client = StationHttpClient::new(&server.host_with_port(), &HttpClientConfig::default()).unwrap();
        ConfigurationCache::new("ws1500", client, t!(30 seconds))
    }

    async fn get_at(cache: &ConfigurationCache, at: DateTime) -> DeviceConfiguration {
        FIXED_NOW.scope(at, cache.get()).await
    }

    #[tokio::test]
    async fn fetches_once_within_max_age() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/station.htm")
            .with_body(STATION_PAGE)
            .expect(1)
            .create_async()
            .await;
        let cache = cache_for(&server);

        let first = get_at(&cache, start()).await;
        let second = get_at(&cache, start() + t!(10 seconds)).await;

        assert_eq!(first, second);
        assert_eq!(first.temperature_unit, TemperatureUnit::Fahrenheit);
        assert_eq!(first.timezone, Timezone::Offset(1.0));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn refetches_after_max_age() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/station.htm")
            .with_body(STATION_PAGE)
            .expect(2)
            .create_async()
            .await;
        let cache = cache_for(&server);

        get_at(&cache, start()).await;
        get_at(&cache, start() + t!(31 seconds)).await;

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn refetches_when_clock_steps_back() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/station.htm")
            .with_body(STATION_PAGE)
            .expect(2)
            .create_async()
            .await;
        let cache = cache_for(&server);

        get_at(&cache, start()).await;
        get_at(&cache, start() + t!(-5 seconds)).await;

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn stale_configuration_is_used_on_error() {
        let mut server = Server::new_async().await;
        let ok = server
            .mock("GET", "/station.htm")
            .with_body(STATION_PAGE)
            .expect(1)
            .create_async()
            .await;
        let cache = cache_for(&server);

        let first = get_at(&cache, start()).await;
        ok.remove_async().await;
        let _failing = server.mock("GET", "/station.htm").with_status(500).create_async().await;

        let second = get_at(&cache, start() + t!(45 seconds)).await;

        assert_eq!(second, first);
        assert_eq!(second.temperature_unit, TemperatureUnit::Fahrenheit);
    }

    #[tokio::test]
    async fn default_is_used_without_cached_value() {
        let mut server = Server::new_async().await;
        let _failing = server.mock("GET", "/station.htm").with_status(500).create_async().await;
        let cache = cache_for(&server);

        let config = get_at(&cache, start()).await;

        assert_eq!(config, DeviceConfiguration::default());
    }

    #[tokio::test]
    async fn invalidation_forces_refetch() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/station.htm")
            .with_body(STATION_PAGE)
            .expect(2)
            .create_async()
            .await;
        let cache = cache_for(&server);

        get_at(&cache, start()).await;
        cache.invalidate().await;
        get_at(&cache, start() + t!(1 seconds)).await;

        mock.assert_async().await;
    }
}
