use derive_more::derive::{Display, Error};
use infrastructure::HttpClientConfig;

use super::{
    adapter::{FetchError, StationHttpClient},
    domain::{extract::looks_like_live_data, DstSetting},
    TimezoneUpdate, MAX_SCAN_INTERVAL_SECS, MIN_SCAN_INTERVAL_SECS,
};

const MAX_TIMEZONE_OFFSET: f64 = 12.0;

#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum ValidationError {
    #[display("invalid_host")]
    InvalidHost,

    #[display("cannot_connect")]
    CannotConnect,

    #[display("timeout")]
    Timeout,

    #[display("not_ws1500")]
    NotWs1500,

    #[display("already_configured")]
    AlreadyConfigured,

    #[display("invalid_scan_interval")]
    InvalidScanInterval { value: u64 },

    #[display("invalid_timezone")]
    InvalidTimezone { value: f64 },

    #[display("invalid_dst")]
    InvalidDst { value: String },
}

impl ValidationError {
    pub fn message(&self) -> String {
        match self {
            ValidationError::InvalidHost => "Host must be a plain host name or address".to_string(),
            ValidationError::CannotConnect => "Cannot connect to the station".to_string(),
            ValidationError::Timeout => "Station did not answer in time".to_string(),
            ValidationError::NotWs1500 => "Device does not look like a WS1500 station".to_string(),
            ValidationError::AlreadyConfigured => "Station is already configured".to_string(),
            ValidationError::InvalidScanInterval { value } => format!(
                "Scan interval {} is outside of [{}, {}] seconds",
                value, MIN_SCAN_INTERVAL_SECS, MAX_SCAN_INTERVAL_SECS
            ),
            ValidationError::InvalidTimezone { value } => {
                format!("Timezone offset {} is outside of [-12, 12] hours", value)
            }
            ValidationError::InvalidDst { value } => format!("DST value {} is not one of 0, 1, on, off", value),
        }
    }
}

/// Checks that the host answers with a live data page. Returns the trimmed host.
#[tracing::instrument(skip(http_client))]
pub async fn validate_host(host: &str, http_client: &HttpClientConfig) -> Result<String, ValidationError> {
    let host = host.trim();
    if host.is_empty() || host.contains(char::is_whitespace) || host.contains('/') {
        return Err(ValidationError::InvalidHost);
    }

    let client = StationHttpClient::new(host, http_client).map_err(|e| {
        tracing::warn!("Error creating HTTP client for {}: {:?}", host, e);
        ValidationError::CannotConnect
    })?;

    let html = client.fetch_live_data().await.map_err(|e| match e {
        FetchError::Timeout => ValidationError::Timeout,
        _ => ValidationError::CannotConnect,
    })?;

    if !looks_like_live_data(&html) {
        return Err(ValidationError::NotWs1500);
    }

    Ok(host.to_owned())
}

pub fn validate_scan_interval(value: u64) -> Result<u64, ValidationError> {
    if (MIN_SCAN_INTERVAL_SECS..=MAX_SCAN_INTERVAL_SECS).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::InvalidScanInterval { value })
    }
}

pub fn validate_timezone_update(timezone: f64, dst: &str) -> Result<TimezoneUpdate, ValidationError> {
    if !timezone.is_finite() || timezone.abs() > MAX_TIMEZONE_OFFSET {
        return Err(ValidationError::InvalidTimezone { value: timezone });
    }

    let dst = match dst.parse::<DstSetting>() {
        Ok(DstSetting::On) => true,
        Ok(_) => false,
        Err(_) => return Err(ValidationError::InvalidDst { value: dst.to_owned() }),
    };

    Ok(TimezoneUpdate::new(timezone, dst))
}
