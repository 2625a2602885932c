use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Hourly weather forecast point as delivered by the weather provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherPoint {
    pub timestamp: DateTime<FixedOffset>,
    pub temperature_c: f64,
    pub wind_speed_ms: f64,
    /// Meteorological direction the wind blows from, degrees.
    pub wind_direction_deg: f64,
    /// Cloud cover in oktas (0 clear, 8 overcast).
    pub cloud_cover_oktas: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time_start: DateTime<FixedOffset>,
    pub time_end: DateTime<FixedOffset>,
    pub price_sek_per_kwh: f64,
}

/// Everything the planner knows about one hour of the horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourConditions {
    pub timestamp: DateTime<FixedOffset>,
    /// Hour of day in the house's local time zone, 0..=23.
    pub local_hour: u32,
    pub outdoor_temp: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub cloud_cover: f64,
    pub price: f64,
    /// Whether the price was synthesised from yesterday's price.
    pub price_is_fallback: bool,
}

/// Indoor temperatures of both zones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneTemps {
    pub zone_a: f64,
    pub zone_b: f64,
}

impl ZoneTemps {
    pub const fn new(zone_a: f64, zone_b: f64) -> Self {
        Self { zone_a, zone_b }
    }
}
