use super::extract::Readings;
use super::pattern::LIVE_DATA_FIELDS;
use super::DeviceConfiguration;

/// Converts every reading with a unit family to metric, using the units the
/// device reported in the same poll cycle.
pub fn normalize(mut readings: Readings, config: &DeviceConfiguration) -> Readings {
    for field in LIVE_DATA_FIELDS {
        let Some(family) = field.family else {
            continue;
        };

        if let Some(reading) = readings.get_mut(&field.key) {
            reading.value = reading.value.map(|v| config.to_metric(family, v));
        }
    }

    readings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::domain::{
        extract::extract_live_data, PressureUnit, RainUnit, RawValue, SensorKey, SensorValue, SolarUnit,
        TemperatureUnit, WindUnit,
    };

    fn imperial() -> DeviceConfiguration {
        DeviceConfiguration {
            wind_unit: WindUnit::MilesPerHour,
            rain_unit: RainUnit::Inch,
            pressure_unit: PressureUnit::InchOfMercury,
            temperature_unit: TemperatureUnit::Fahrenheit,
            solar_unit: SolarUnit::Lux,
            ..DeviceConfiguration::default()
        }
    }

    fn page(fields: &[(&str, &str)]) -> String {
        fields
            .iter()
            .map(|(name, value)| format!(r#"<input name="{name}" type="text" value="{value}" />"#))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn fahrenheit_is_converted() {
        let readings = extract_live_data(&page(&[("outTemp", "68"), ("inTemp", "32")]));

        let normalized = normalize(readings, &imperial());

        assert_eq!(normalized[&SensorKey::OutTemp].value, Some(20.0));
        assert_eq!(normalized[&SensorKey::InTemp].value, Some(0.0));
    }

    #[test]
    fn every_family_uses_its_own_unit() {
        let readings = extract_live_data(&page(&[
            ("avgwind", "10"),
            ("rainofdaily", "2"),
            ("RelPress", "30"),
            ("solarrad", "1000"),
        ]));

        let normalized = normalize(readings, &imperial());

        assert!((normalized[&SensorKey::WindSpeed].value.unwrap() - 16.0934).abs() < 1e-9);
        assert!((normalized[&SensorKey::DailyRain].value.unwrap() - 50.8).abs() < 1e-9);
        assert!((normalized[&SensorKey::RelPressure].value.unwrap() - 1015.917).abs() < 1e-9);
        assert!((normalized[&SensorKey::SolarRad].value.unwrap() - 7.9).abs() < 1e-9);
    }

    #[test]
    fn unitless_values_are_untouched() {
        let readings = extract_live_data(&page(&[("windir", "270"), ("outHumi", "55"), ("uvi", "4")]));

        let normalized = normalize(readings, &imperial());

        assert_eq!(normalized[&SensorKey::WindDirection].value, Some(270.0));
        assert_eq!(normalized[&SensorKey::OutHumidity].value, Some(55.0));
        assert_eq!(normalized[&SensorKey::Uvi].value, Some(4.0));
    }

    #[test]
    fn canonical_configuration_is_identity() {
        let readings = extract_live_data(&page(&[("outTemp", "21.4"), ("avgwind", "12.5"), ("RelPress", "1013.2")]));

        let normalized = normalize(readings.clone(), &DeviceConfiguration::default());

        assert_eq!(normalized, readings);
    }

    #[test]
    fn absence_and_text_pass_through() {
        let readings = extract_live_data(&page(&[("outTemp", "--.-"), ("inTemp", "1.2.3")]));

        let normalized = normalize(readings, &imperial());

        assert_eq!(normalized[&SensorKey::OutTemp].raw, RawValue::NotInstalled);
        assert_eq!(normalized[&SensorKey::OutTemp].value, None);
        assert_eq!(
            normalized[&SensorKey::InTemp].published_value(),
            Some(SensorValue::Text("1.2.3".to_string()))
        );
    }
}
