use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKey {
    WindDirection,
    WindSpeed,
    WindGust,
    MaxDailyGust,
    OutTemp,
    OutHumidity,
    InTemp,
    InHumidity,
    SolarRad,
    Uvi,
    HourlyRain,
    EventRain,
    DailyRain,
    WeeklyRain,
    MonthlyRain,
    YearlyRain,
    AbsPressure,
    RelPressure,
    #[serde(rename = "pm25_indoor")]
    Pm25Indoor,
    #[serde(rename = "pm25_outdoor")]
    Pm25Outdoor,
    #[serde(rename = "outdoor1_id")]
    Outdoor1Id,
    #[serde(rename = "outdoor1_battery")]
    Outdoor1Battery,
    CurrentTime,
}

impl SensorKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKey::WindDirection => "wind_direction",
            SensorKey::WindSpeed => "wind_speed",
            SensorKey::WindGust => "wind_gust",
            SensorKey::MaxDailyGust => "max_daily_gust",
            SensorKey::OutTemp => "out_temp",
            SensorKey::OutHumidity => "out_humidity",
            SensorKey::InTemp => "in_temp",
            SensorKey::InHumidity => "in_humidity",
            SensorKey::SolarRad => "solar_rad",
            SensorKey::Uvi => "uvi",
            SensorKey::HourlyRain => "hourly_rain",
            SensorKey::EventRain => "event_rain",
            SensorKey::DailyRain => "daily_rain",
            SensorKey::WeeklyRain => "weekly_rain",
            SensorKey::MonthlyRain => "monthly_rain",
            SensorKey::YearlyRain => "yearly_rain",
            SensorKey::AbsPressure => "abs_pressure",
            SensorKey::RelPressure => "rel_pressure",
            SensorKey::Pm25Indoor => "pm25_indoor",
            SensorKey::Pm25Outdoor => "pm25_outdoor",
            SensorKey::Outdoor1Id => "outdoor1_id",
            SensorKey::Outdoor1Battery => "outdoor1_battery",
            SensorKey::CurrentTime => "current_time",
        }
    }
}

impl Display for SensorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of looking up one field in a device page.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Field not present at all, usually an older firmware or a different model.
    Missing,
    /// Field present, but rendered with a "sensor not installed" placeholder.
    NotInstalled,
    Captured(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub key: SensorKey,
    pub raw: RawValue,
    pub value: Option<f64>,
}

impl SensorReading {
    pub fn new(key: SensorKey, raw: RawValue, value: Option<f64>) -> Self {
        Self { key, raw, value }
    }

    /// What gets published: the number if there is one, the raw text if the
    /// capture could not be read as a number, nothing otherwise.
    pub fn published_value(&self) -> Option<SensorValue> {
        match (&self.value, &self.raw) {
            (Some(v), _) => Some(SensorValue::Number(*v)),
            (None, RawValue::Captured(text)) => Some(SensorValue::Text(text.clone())),
            (None, _) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    Number(f64),
    Text(String),
}

impl SensorValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SensorValue::Number(v) => Some(*v),
            SensorValue::Text(_) => None,
        }
    }
}
