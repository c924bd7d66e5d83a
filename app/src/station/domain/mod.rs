mod config;
pub mod extract;
mod last_rain;
pub mod normalize;
pub mod pattern;
mod sensor;
mod snapshot;
mod unit;

pub use config::{DeviceConfiguration, DstSetting};
pub use last_rain::{LastRainObservation, LastRainReport};
pub use sensor::{RawValue, SensorKey, SensorReading, SensorValue};
pub use snapshot::Snapshot;
pub use unit::UnitFamily;

#[cfg(test)]
pub use config::Timezone;
#[cfg(test)]
pub use unit::{PressureUnit, RainUnit, SolarUnit, TemperatureUnit, WindUnit};
