use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::time::DateTime;

use super::extract::Readings;
use super::{DeviceConfiguration, SensorKey, SensorValue};

pub const MANUFACTURER: &str = "Fine Offset";
pub const MODEL: &str = "WS1500";
pub const SW_VERSION: &str = "Legacy";

/// Result of one successful poll cycle, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub sensors: BTreeMap<SensorKey, Option<SensorValue>>,
    pub info: StationInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationInfo {
    pub host: String,
    pub last_update: DateTime,
    pub timezone: String,
    pub dst: String,
    pub wind_unit: String,
    pub rain_unit: String,
    pub pressure_unit: String,
    pub temperature_unit: String,
    pub solar_unit: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub sw_version: &'static str,
    pub configuration_url: String,
}

impl Snapshot {
    pub fn new(host: &str, readings: &Readings, config: &DeviceConfiguration, last_update: DateTime) -> Self {
        let sensors = readings.iter().map(|(key, r)| (*key, r.published_value())).collect();

        Self {
            sensors,
            info: StationInfo {
                host: host.to_owned(),
                last_update,
                timezone: config.timezone.to_string(),
                dst: config.dst.to_string(),
                wind_unit: config.wind_unit.to_string(),
                rain_unit: config.rain_unit.to_string(),
                pressure_unit: config.pressure_unit.to_string(),
                temperature_unit: config.temperature_unit.to_string(),
                solar_unit: config.solar_unit.to_string(),
                manufacturer: MANUFACTURER,
                model: MODEL,
                sw_version: SW_VERSION,
                configuration_url: format!("http://{}", host),
            },
        }
    }

    pub fn value(&self, key: SensorKey) -> Option<&SensorValue> {
        self.sensors.get(&key).and_then(|v| v.as_ref())
    }

    pub fn number(&self, key: SensorKey) -> Option<f64> {
        self.value(key).and_then(SensorValue::as_f64)
    }

    pub fn is_raining(&self) -> Option<bool> {
        self.number(SensorKey::HourlyRain).map(|v| v > 0.0)
    }

    pub fn numeric_sensors(&self) -> impl Iterator<Item = (SensorKey, f64)> + '_ {
        self.sensors
            .iter()
            .filter_map(|(key, v)| v.as_ref().and_then(SensorValue::as_f64).map(|v| (*key, v)))
    }
}
