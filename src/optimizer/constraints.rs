use serde::{Deserialize, Serialize};
use validator::Validate;

/// Comfort band the plan has to respect.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ComfortLimits {
    pub min_zone_a: f64,
    pub min_zone_b: f64,
    /// Ceiling for zone A used when buffering heat in cheap hours.
    pub max_zone_a: f64,
    /// Price / horizon average above which the minimums start to relax.
    #[validate(range(min = 1.0))]
    pub price_relax_ratio: f64,
    /// Largest relaxation (°C) applied to a minimum during a price spike.
    #[validate(range(min = 0.0, max = 2.0))]
    pub max_price_relax: f64,
}

impl Default for ComfortLimits {
    fn default() -> Self {
        Self {
            min_zone_a: 20.5,
            min_zone_b: 20.0,
            max_zone_a: 23.0,
            price_relax_ratio: 1.5,
            max_price_relax: 0.5,
        }
    }
}

impl ComfortLimits {
    /// How far the minimums may slip in an hour with `price`.
    ///
    /// A step: the full `max_price_relax` once the price is strictly above
    /// `price_relax_ratio` times the horizon average, zero otherwise.
    pub fn relaxation(&self, price: f64, average_price: f64) -> f64 {
        if average_price <= 0.0 || !price.is_finite() {
            return 0.0;
        }
        if price > average_price * self.price_relax_ratio {
            self.max_price_relax
        } else {
            0.0
        }
    }
}

/// Knobs of the repair algorithm.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OptimizerLimits {
    /// Hard cap on iterations of each phase.
    #[validate(range(min = 1, max = 10000))]
    pub max_iterations: usize,
    #[validate(range(min = 0.0, max = 10.0))]
    pub max_offset: f64,
    #[validate(range(min = 0.1, max = 10.0))]
    pub offset_step: f64,
    /// Score multiplier for a REST hour next to a RUN hour.
    pub continuity_bonus: f64,
    /// Score multiplier for a single isolated RUN hour when pruning.
    pub isolated_run_penalty: f64,
    /// Share of the horizon treated as cheap for buffering.
    #[validate(range(min = 0.0, max = 1.0))]
    pub cheap_fraction: f64,
    pub boost_hot_water_hours: usize,
    /// Price / average above which hot water and ventilation go conservative.
    pub expensive_ratio: f64,
}

impl Default for OptimizerLimits {
    fn default() -> Self {
        Self {
            max_iterations: 40,
            max_offset: 4.0,
            offset_step: 1.0,
            continuity_bonus: 0.8,
            isolated_run_penalty: 1.5,
            cheap_fraction: 1.0 / 3.0,
            boost_hot_water_hours: 3,
            expensive_ratio: 1.4,
        }
    }
}
