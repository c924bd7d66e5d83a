use std::fmt::Display;
use std::str::FromStr;

use super::pattern::{self, Selector};
use super::unit::{PressureUnit, RainUnit, SolarUnit, TemperatureUnit, UnitFamily, WindUnit, UNKNOWN};

/// Clock and display-unit settings as reported by the station page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceConfiguration {
    pub timezone: Timezone,
    pub dst: DstSetting,
    pub wind_unit: WindUnit,
    pub rain_unit: RainUnit,
    pub pressure_unit: PressureUnit,
    pub temperature_unit: TemperatureUnit,
    pub solar_unit: SolarUnit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timezone {
    Offset(f64),
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstSetting {
    On,
    Off,
    Unknown,
}

impl Default for DeviceConfiguration {
    fn default() -> Self {
        Self {
            timezone: Timezone::Unknown,
            dst: DstSetting::Unknown,
            wind_unit: WindUnit::KilometersPerHour,
            rain_unit: RainUnit::Millimeter,
            pressure_unit: PressureUnit::Hectopascal,
            temperature_unit: TemperatureUnit::Celsius,
            solar_unit: SolarUnit::WattPerSquareMeter,
        }
    }
}

impl DeviceConfiguration {
    /// Reads the station page. Every field is resolved on its own, anything not
    /// found ends up as unknown.
    pub fn parse(html: &str) -> Self {
        let timezone = pattern::TIMEZONE_PATTERN
            .captures(html)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .map(Timezone::Offset)
            .unwrap_or(Timezone::Unknown);

        let code = |selector: Selector| -> Option<u32> {
            pattern::SELECTOR_PATTERNS
                .iter()
                .find(|(s, _)| *s == selector)
                .and_then(|(_, regex)| regex.captures(html))
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
        };

        Self {
            timezone,
            dst: code(Selector::Dst).map(DstSetting::from_code).unwrap_or(DstSetting::Unknown),
            wind_unit: code(Selector::WindUnit).map(WindUnit::from_code).unwrap_or(WindUnit::Unknown),
            rain_unit: code(Selector::RainUnit).map(RainUnit::from_code).unwrap_or(RainUnit::Unknown),
            pressure_unit: code(Selector::PressureUnit)
                .map(PressureUnit::from_code)
                .unwrap_or(PressureUnit::Unknown),
            temperature_unit: code(Selector::TemperatureUnit)
                .map(TemperatureUnit::from_code)
                .unwrap_or(TemperatureUnit::Unknown),
            solar_unit: code(Selector::SolarUnit).map(SolarUnit::from_code).unwrap_or(SolarUnit::Unknown),
        }
    }

    pub fn to_metric(&self, family: UnitFamily, value: f64) -> f64 {
        match family {
            UnitFamily::Temperature => self.temperature_unit.to_celsius(value),
            UnitFamily::WindSpeed => self.wind_unit.to_kilometers_per_hour(value),
            UnitFamily::Rain => self.rain_unit.to_millimeter(value),
            UnitFamily::Pressure => self.pressure_unit.to_hectopascal(value),
            UnitFamily::Solar => self.solar_unit.to_watt_per_square_meter(value),
        }
    }
}

impl DstSetting {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => DstSetting::On,
            _ => DstSetting::Off,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DstSetting::On => "on",
            DstSetting::Off => "off",
            DstSetting::Unknown => UNKNOWN,
        }
    }
}

impl FromStr for DstSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "on" | "true" => Ok(DstSetting::On),
            "0" | "off" | "false" => Ok(DstSetting::Off),
            other => Err(format!("Unsupported DST value {other}")),
        }
    }
}

impl Display for DstSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Display for Timezone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timezone::Offset(hours) => write!(f, "UTC{:+}", hours),
            Timezone::Unknown => f.write_str(UNKNOWN),
        }
    }
}
