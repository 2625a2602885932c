use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::WeatherPoint;

/// Hourly weather forecast source. Implementations return at least
/// `hours_ahead` points starting at the current hour, or an error.
#[async_trait]
pub trait WeatherForecastProvider: Send + Sync {
    async fn get_forecast(&self, hours_ahead: u32) -> Result<Vec<WeatherPoint>>;
}

/// Serves whatever forecast was last stored. Used for replay and tests.
#[derive(Default)]
pub struct StaticWeatherProvider {
    points: RwLock<Vec<WeatherPoint>>,
}

impl StaticWeatherProvider {
    pub fn new(points: Vec<WeatherPoint>) -> Self {
        Self {
            points: RwLock::new(points),
        }
    }

    pub fn set(&self, points: Vec<WeatherPoint>) {
        *self.points.write() = points;
    }
}

#[async_trait]
impl WeatherForecastProvider for StaticWeatherProvider {
    async fn get_forecast(&self, _hours_ahead: u32) -> Result<Vec<WeatherPoint>> {
        Ok(self.points.read().clone())
    }
}

#[cfg(feature = "sim")]
pub use synthetic::SyntheticWeatherProvider;

#[cfg(feature = "sim")]
mod synthetic {
    use super::*;
    use chrono::{Duration, DurationRound, Timelike, Utc};
    use std::f64::consts::PI;

    /// Diurnal weather around a mean temperature, for running without a feed.
    #[derive(Debug, Clone)]
    pub struct SyntheticWeatherProvider {
        pub mean_temp_c: f64,
        pub daily_swing_c: f64,
        pub wind_speed_ms: f64,
        pub wind_direction_deg: f64,
    }

    impl Default for SyntheticWeatherProvider {
        fn default() -> Self {
            Self {
                mean_temp_c: -2.0,
                daily_swing_c: 3.0,
                wind_speed_ms: 4.0,
                wind_direction_deg: 250.0,
            }
        }
    }

    #[async_trait]
    impl WeatherForecastProvider for SyntheticWeatherProvider {
        async fn get_forecast(&self, hours_ahead: u32) -> Result<Vec<WeatherPoint>> {
            let start = Utc::now().fixed_offset().duration_trunc(Duration::hours(1))?;
            let points = (0..hours_ahead)
                .map(|i| {
                    let timestamp = start + Duration::hours(i64::from(i));
                    let phase = 2.0 * PI * (f64::from(timestamp.hour()) - 14.0) / 24.0;
                    WeatherPoint {
                        timestamp,
                        temperature_c: self.mean_temp_c + self.daily_swing_c * phase.cos(),
                        wind_speed_ms: self.wind_speed_ms,
                        wind_direction_deg: self.wind_direction_deg,
                        cloud_cover_oktas: if i % 6 < 3 { 2.0 } else { 6.0 },
                    }
                })
                .collect();
            Ok(points)
        }
    }
}
