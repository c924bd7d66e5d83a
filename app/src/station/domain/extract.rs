use std::collections::BTreeMap;

use regex::Regex;

use super::pattern::{self, FieldPattern, Parser};
use super::{RawValue, SensorKey, SensorReading};

pub type Readings = BTreeMap<SensorKey, SensorReading>;

pub fn extract_live_data(html: &str) -> Readings {
    extract(html, &pattern::LIVE_DATA_PATTERNS)
}

pub fn extract(html: &str, patterns: &[(&'static FieldPattern, Regex)]) -> Readings {
    patterns
        .iter()
        .map(|(field, regex)| (field.key, read_field(html, field, regex)))
        .collect()
}

fn read_field(html: &str, field: &FieldPattern, regex: &Regex) -> SensorReading {
    let raw = match regex.captures(html).and_then(|c| c.get(1)) {
        None => RawValue::Missing,
        Some(m) if pattern::is_unavailable(m.as_str()) => RawValue::NotInstalled,
        Some(m) => RawValue::Captured(m.as_str().to_owned()),
    };

    let value = match (&raw, field.parser) {
        (RawValue::Captured(text), Parser::Number) => match text.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => {
                tracing::debug!("Value {:?} of field {} is not a number, keeping raw text", text, field.field);
                None
            }
        },
        _ => None,
    };

    SensorReading::new(field.key, raw, value)
}

/// Cheap check that a page comes from a WS1500 style receiver.
pub fn looks_like_live_data(html: &str) -> bool {
    html.contains(r#"name="outTemp""#) || html.contains(r#"name="windir""#)
}
