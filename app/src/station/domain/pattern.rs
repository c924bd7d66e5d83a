use std::sync::LazyLock;

use regex::Regex;

use super::{SensorKey, UnitFamily};

/// Tokens the firmware renders for sensors that are not installed.
pub const UNAVAILABLE_VALUES: [&str; 5] = ["----", "--", "--.-", "0x--", "- -"];

pub fn is_unavailable(value: &str) -> bool {
    UNAVAILABLE_VALUES.contains(&value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    Decimal,
    Integer,
    Text,
}

impl Capture {
    //placeholders are accepted in numeric fields so they can be told apart from missing fields
    fn pattern(&self) -> &'static str {
        match self {
            Capture::Decimal => r"0x--|- -|[-0-9.]+",
            Capture::Integer => r"0x--|- -|--\.-|-+|[0-9]+",
            Capture::Text => r#"[^"]*"#,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parser {
    Number,
    Text,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldPattern {
    pub key: SensorKey,
    pub field: &'static str,
    pub capture: Capture,
    pub parser: Parser,
    pub family: Option<UnitFamily>,
}

const fn number(key: SensorKey, field: &'static str, capture: Capture, family: Option<UnitFamily>) -> FieldPattern {
    FieldPattern {
        key,
        field,
        capture,
        parser: Parser::Number,
        family,
    }
}

const fn text(key: SensorKey, field: &'static str) -> FieldPattern {
    FieldPattern {
        key,
        field,
        capture: Capture::Text,
        parser: Parser::Text,
        family: None,
    }
}

use Capture::{Decimal, Integer};
use UnitFamily::{Pressure, Rain, Solar, Temperature, WindSpeed};

pub const LIVE_DATA_FIELDS: &[FieldPattern] = &[
    number(SensorKey::WindDirection, "windir", Integer, None),
    number(SensorKey::WindSpeed, "avgwind", Decimal, Some(WindSpeed)),
    number(SensorKey::WindGust, "gustspeed", Decimal, Some(WindSpeed)),
    number(SensorKey::MaxDailyGust, "dailygust", Decimal, Some(WindSpeed)),
    number(SensorKey::OutTemp, "outTemp", Decimal, Some(Temperature)),
    number(SensorKey::OutHumidity, "outHumi", Integer, None),
    number(SensorKey::SolarRad, "solarrad", Decimal, Some(Solar)),
    number(SensorKey::Uvi, "uvi", Integer, None),
    number(SensorKey::HourlyRain, "rainofhourly", Decimal, Some(Rain)),
    number(SensorKey::EventRain, "eventrain", Decimal, Some(Rain)),
    number(SensorKey::DailyRain, "rainofdaily", Decimal, Some(Rain)),
    number(SensorKey::WeeklyRain, "rainofweekly", Decimal, Some(Rain)),
    number(SensorKey::MonthlyRain, "rainofmonthly", Decimal, Some(Rain)),
    number(SensorKey::YearlyRain, "rainofyearly", Decimal, Some(Rain)),
    number(SensorKey::InTemp, "inTemp", Decimal, Some(Temperature)),
    //free text on the device, some firmwares render "--" or "0x--"
    number(SensorKey::InHumidity, "inHumi", Capture::Text, None),
    number(SensorKey::AbsPressure, "AbsPress", Decimal, Some(Pressure)),
    number(SensorKey::RelPressure, "RelPress", Decimal, Some(Pressure)),
    number(SensorKey::Pm25Indoor, "pm25in", Decimal, None),
    number(SensorKey::Pm25Outdoor, "pm25out", Decimal, None),
    text(SensorKey::Outdoor1Id, "Outdoor1ID"),
    text(SensorKey::Outdoor1Battery, "outBattSta1"),
    text(SensorKey::CurrentTime, "CurrTime"),
];

pub static LIVE_DATA_PATTERNS: LazyLock<Vec<(&'static FieldPattern, Regex)>> = LazyLock::new(|| {
    LIVE_DATA_FIELDS
        .iter()
        .map(|field| (field, attribute_value_regex(field.field, field.capture.pattern())))
        .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector {
    Dst,
    WindUnit,
    RainUnit,
    PressureUnit,
    TemperatureUnit,
    SolarUnit,
}

pub const STATION_SELECTORS: &[(Selector, &str)] = &[
    (Selector::Dst, "dst"),
    (Selector::WindUnit, "unit_Wind"),
    (Selector::RainUnit, "u_Rainfall"),
    (Selector::PressureUnit, "unit_Pressure"),
    (Selector::TemperatureUnit, "u_Temperature"),
    (Selector::SolarUnit, "unit_Solar"),
];

pub static TIMEZONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| attribute_value_regex("timezone", r"[-0-9.]+"));

pub static SELECTOR_PATTERNS: LazyLock<Vec<(Selector, Regex)>> = LazyLock::new(|| {
    STATION_SELECTORS
        .iter()
        .map(|(selector, field)| (*selector, selected_option_regex(field)))
        .collect()
});

//single-line scope: `.` in `[^>]*` never crosses a tag
fn attribute_value_regex(field: &str, capture: &str) -> Regex {
    let pattern = format!(r#"name="{}"[^>]*value="({})""#, regex::escape(field), capture);
    Regex::new(&pattern).unwrap_or_else(|e| panic!("Invalid pattern for field {field}: {e}"))
}

//multi-line scope, the first selected option after the select element wins
fn selected_option_regex(field: &str) -> Regex {
    let pattern = format!(
        r#"(?s)name="{}".*?<option value="(\d+)"[^>]*selected"#,
        regex::escape(field)
    );
    Regex::new(&pattern).unwrap_or_else(|e| panic!("Invalid pattern for selector {field}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_pattern(key: SensorKey) -> Option<&'static FieldPattern> {
        LIVE_DATA_FIELDS.iter().find(|f| f.key == key)
    }

    #[test]
    fn all_patterns_compile() {
        assert_eq!(LIVE_DATA_PATTERNS.len(), LIVE_DATA_FIELDS.len());
        assert_eq!(SELECTOR_PATTERNS.len(), STATION_SELECTORS.len());
        assert!(TIMEZONE_PATTERN.is_match(r#"<input name="timezone" type="text" value="-5">"#));
    }

    #[test]
    fn every_key_has_exactly_one_field() {
        for field in LIVE_DATA_FIELDS {
            let count = LIVE_DATA_FIELDS.iter().filter(|f| f.key == field.key).count();
            assert_eq!(count, 1, "{} is mapped {} times", field.key, count);
        }
    }

    #[test]
    fn unit_families_follow_measurement() {
        assert_eq!(field_pattern(SensorKey::OutTemp).unwrap().family, Some(UnitFamily::Temperature));
        assert_eq!(field_pattern(SensorKey::DailyRain).unwrap().family, Some(UnitFamily::Rain));
        assert_eq!(field_pattern(SensorKey::WindGust).unwrap().family, Some(UnitFamily::WindSpeed));
        assert_eq!(field_pattern(SensorKey::RelPressure).unwrap().family, Some(UnitFamily::Pressure));
        assert_eq!(field_pattern(SensorKey::SolarRad).unwrap().family, Some(UnitFamily::Solar));
        assert_eq!(field_pattern(SensorKey::Uvi).unwrap().family, None);
        assert_eq!(field_pattern(SensorKey::WindDirection).unwrap().family, None);
    }

    #[test]
    fn attribute_pattern_does_not_cross_tags() {
        let (_, regex) = LIVE_DATA_PATTERNS
            .iter()
            .find(|(f, _)| f.key == SensorKey::Uvi)
            .unwrap();

        assert!(!regex.is_match(r#"<input name="uvi"><input name="other" value="4">"#));
        assert!(regex.is_match(r#"<input name="uvi" class="item" value="4">"#));
    }

    #[test]
    fn placeholder_tokens_are_recognized() {
        for token in UNAVAILABLE_VALUES {
            assert!(is_unavailable(token));
        }
        assert!(!is_unavailable("0"));
        assert!(!is_unavailable("-"));
    }
}
