use serde::{Deserialize, Serialize};

use crate::core::time::DateTime;

/// Most recent day on which new rain was seen. Only ever moves forward.
///
/// Rain counts as new when the daily rain counter rises above the value of the previous cycle.
/// A counter that stays at the same level keeps the day pinned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LastRainObservation {
    pub last_rain: Option<DateTime>,
    #[serde(skip)]
    previous_daily_rain: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RainStatus {
    RainingToday,
    RainedYesterday,
    RecentRain,
    NoRecentRain,
    NoRainDetected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastRainReport {
    pub last_rain: Option<DateTime>,
    pub days_since_rain: Option<i64>,
    pub status: RainStatus,
    pub last_rain_human: Option<String>,
}

impl LastRainObservation {
    #[cfg(test)]
    pub fn restored(last_rain: Option<DateTime>) -> Self {
        Self {
            last_rain,
            previous_daily_rain: None,
        }
    }

    /// Returns true when the stored day changed and should be persisted.
    pub fn observe(&mut self, daily_rain: Option<f64>, now: DateTime) -> bool {
        let Some(current) = daily_rain else {
            return false;
        };

        //unknown previous value (first cycle after start) counts as a rise
        let rising = self.previous_daily_rain.is_none_or(|previous| current > previous);
        self.previous_daily_rain = Some(current);

        if current <= 0.0 || !rising {
            return false;
        }

        let today = now.start_of_day();
        match self.last_rain {
            Some(previous) if previous.date() >= today.date() => false,
            _ => {
                self.last_rain = Some(today);
                true
            }
        }
    }

    pub fn days_since(&self, now: DateTime) -> Option<i64> {
        self.last_rain.map(|last| now.days_since(&last).max(0))
    }

    pub fn status(&self, now: DateTime) -> RainStatus {
        match self.days_since(now) {
            None => RainStatus::NoRainDetected,
            Some(0) => RainStatus::RainingToday,
            Some(1) => RainStatus::RainedYesterday,
            Some(2..=7) => RainStatus::RecentRain,
            Some(_) => RainStatus::NoRecentRain,
        }
    }

    pub fn report(&self, now: DateTime) -> LastRainReport {
        LastRainReport {
            last_rain: self.last_rain,
            days_since_rain: self.days_since(now),
            status: self.status(now),
            last_rain_human: self.last_rain.map(|t| t.to_human_readable()),
        }
    }
}
