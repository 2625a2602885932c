use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, DurationRound, FixedOffset, NaiveDate, Timelike, Weekday};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{fallback_price, PriceForecastProvider, WeatherForecastProvider};
use crate::domain::{HourConditions, PricePoint, TuningParameters, WeatherPoint};
use crate::error::PlanningError;

/// Merges the weather forecast and day-ahead prices into the planning horizon.
pub struct ForecastEngine {
    weather: Arc<dyn WeatherForecastProvider>,
    prices: Arc<dyn PriceForecastProvider>,
    tz: Tz,
}

fn covering<'a>(points: &'a [WeatherPoint], t: DateTime<FixedOffset>) -> Option<&'a WeatherPoint> {
    points
        .iter()
        .find(|p| p.timestamp <= t && t < p.timestamp + Duration::hours(1))
}

fn price_at(points: &[PricePoint], t: DateTime<FixedOffset>) -> Option<f64> {
    points
        .iter()
        .find(|p| p.time_start <= t && t < p.time_end)
        .map(|p| p.price_sek_per_kwh)
}

impl ForecastEngine {
    pub fn new(
        weather: Arc<dyn WeatherForecastProvider>,
        prices: Arc<dyn PriceForecastProvider>,
        tz: Tz,
    ) -> Self {
        Self { weather, prices, tz }
    }

    /// Conditions for `horizon_hours` hours starting at the hour containing
    /// `now`. Fails with `PlanningError::InputUnavailable` when weather is
    /// missing for any hour, or a price is missing and cannot be synthesised.
    pub async fn conditions(
        &self,
        now: DateTime<FixedOffset>,
        horizon_hours: u32,
        tuning: &TuningParameters,
    ) -> Result<Vec<HourConditions>> {
        let start = now.duration_trunc(Duration::hours(1))?;

        let weather = self
            .weather
            .get_forecast(horizon_hours)
            .await
            .map_err(|e| PlanningError::InputUnavailable(format!("weather forecast: {e:#}")))?;
        if weather.is_empty() {
            return Err(PlanningError::InputUnavailable("weather forecast is empty".into()).into());
        }

        let mut days: HashMap<NaiveDate, Vec<PricePoint>> = HashMap::new();
        let mut conditions = Vec::with_capacity(horizon_hours as usize);
        let mut fallbacks = 0usize;

        for i in 0..horizon_hours {
            let timestamp = start + Duration::hours(i64::from(i));
            let local = timestamp.with_timezone(&self.tz);
            let w = covering(&weather, timestamp).ok_or_else(|| {
                PlanningError::InputUnavailable(format!("no weather forecast for {timestamp}"))
            })?;

            let today = self.day(&mut days, local.date_naive()).await?;
            let (price, price_is_fallback) = match price_at(today, timestamp) {
                Some(price) => (price, false),
                None => {
                    let yesterday = timestamp - Duration::hours(24);
                    let day = yesterday.with_timezone(&self.tz).date_naive();
                    let yesterday_price = price_at(self.day(&mut days, day).await?, yesterday)
                        .ok_or_else(|| {
                            PlanningError::InputUnavailable(format!(
                                "no price for {timestamp} nor for the same hour yesterday"
                            ))
                        })?;
                    let weekend = matches!(local.weekday(), Weekday::Sat | Weekday::Sun);
                    fallbacks += 1;
                    (
                        fallback_price(
                            yesterday_price,
                            w.wind_speed_ms,
                            w.temperature_c,
                            weekend,
                            tuning,
                        ),
                        true,
                    )
                }
            };

            conditions.push(HourConditions {
                timestamp,
                local_hour: local.hour(),
                outdoor_temp: w.temperature_c,
                wind_speed: w.wind_speed_ms,
                wind_direction: w.wind_direction_deg,
                cloud_cover: w.cloud_cover_oktas,
                price,
                price_is_fallback,
            });
        }

        if fallbacks > 0 {
            warn!(fallbacks, "synthesised prices from yesterday's prices");
        }
        debug!(hours = conditions.len(), %start, "horizon assembled");
        Ok(conditions)
    }

    async fn day<'a>(
        &self,
        cache: &'a mut HashMap<NaiveDate, Vec<PricePoint>>,
        day: NaiveDate,
    ) -> Result<&'a [PricePoint]> {
        if !cache.contains_key(&day) {
            let points = self.prices.get_prices(day).await.map_err(|e| {
                PlanningError::InputUnavailable(format!("prices for {day}: {e:#}"))
            })?;
            cache.insert(day, points);
        }
        Ok(cache.get(&day).map(Vec::as_slice).unwrap_or_default())
    }
}
