use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::domain::{PricePoint, TuningParameters};

/// Day-ahead electricity prices. A day whose prices are not published yet
/// yields an empty list; errors are reserved for a failed fetch.
#[async_trait]
pub trait PriceForecastProvider: Send + Sync {
    async fn get_prices(&self, day: NaiveDate) -> Result<Vec<PricePoint>>;
}

#[derive(Default)]
pub struct StaticPriceProvider {
    days: RwLock<HashMap<NaiveDate, Vec<PricePoint>>>,
}

impl StaticPriceProvider {
    pub fn insert(&self, day: NaiveDate, points: Vec<PricePoint>) {
        self.days.write().insert(day, points);
    }
}

#[async_trait]
impl PriceForecastProvider for StaticPriceProvider {
    async fn get_prices(&self, day: NaiveDate) -> Result<Vec<PricePoint>> {
        Ok(self.days.read().get(&day).cloned().unwrap_or_default())
    }
}

/// Estimate an unpublished price from yesterday's price at the same hour.
///
/// Windy hours are discounted (more wind power on the grid), weekends are
/// discounted, and hours below the cold threshold carry a surcharge per degree.
pub fn fallback_price(
    yesterday_price: f64,
    wind_speed: f64,
    outdoor_temp: f64,
    weekend: bool,
    tuning: &TuningParameters,
) -> f64 {
    let wind = 1.0 - tuning.wind_price_discount * wind_speed;
    let weekend = if weekend {
        1.0 - tuning.weekend_price_discount
    } else {
        1.0
    };
    let cold =
        1.0 + tuning.cold_price_surcharge * (tuning.cold_price_threshold - outdoor_temp).max(0.0);
    (yesterday_price * wind * weekend * cold).max(0.0)
}

#[cfg(feature = "sim")]
pub use synthetic::SyntheticPriceProvider;

#[cfg(feature = "sim")]
mod synthetic {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use chrono_tz::Tz;

    /// Two daily peaks on a flat base. Only today and earlier are published,
    /// so the rest of the horizon goes through the fallback.
    #[derive(Debug, Clone)]
    pub struct SyntheticPriceProvider {
        pub tz: Tz,
        pub base_price: f64,
        pub peak_premium: f64,
    }

    impl SyntheticPriceProvider {
        pub fn new(tz: Tz) -> Self {
            Self {
                tz,
                base_price: 0.9,
                peak_premium: 0.8,
            }
        }

        fn price_at(&self, hour: u32) -> f64 {
            match hour {
                7..=9 | 17..=20 => self.base_price + self.peak_premium,
                0..=5 => self.base_price * 0.6,
                _ => self.base_price,
            }
        }
    }

    #[async_trait]
    impl PriceForecastProvider for SyntheticPriceProvider {
        async fn get_prices(&self, day: NaiveDate) -> Result<Vec<PricePoint>> {
            if day > Utc::now().with_timezone(&self.tz).date_naive() {
                return Ok(Vec::new());
            }
            let points = (0..24)
                .filter_map(|hour| {
                    let start = self
                        .tz
                        .from_local_datetime(&day.and_hms_opt(hour, 0, 0)?)
                        .earliest()?
                        .fixed_offset();
                    Some(PricePoint {
                        time_start: start,
                        time_end: start + Duration::hours(1),
                        price_sek_per_kwh: self.price_at(hour),
                    })
                })
                .collect();
            Ok(points)
        }
    }
}
