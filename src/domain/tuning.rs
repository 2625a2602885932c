use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// A per-zone coefficient. Zone A is the radiant slab zone, zone B the
/// radiator (convective) zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneCoefficients {
    pub a: f64,
    pub b: f64,
}

impl ZoneCoefficients {
    pub const fn new(a: f64, b: f64) -> Self {
        Self { a, b }
    }
}

/// Immutable snapshot of the physical and economic coefficients used by one
/// planning cycle.
///
/// Built once per cycle from the key/value tuning store and passed by
/// reference into the engine and optimizer; never reloaded mid-cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningParameters {
    /// Fraction of the indoor/outdoor difference lost per hour.
    pub thermal_leakage: ZoneCoefficients,
    /// Radiator emitter efficiency (zone B).
    pub rad_efficiency: f64,
    /// Floor slab emitter efficiency (zone A).
    pub slab_efficiency: f64,
    /// Loss multiplier per (m/s)^2 of wind.
    pub wind_sensitivity: ZoneCoefficients,
    /// Extra loss factor for zone B when the wind blows from the west quadrant.
    pub wind_direction_west_factor: f64,
    /// °C per hour per unit of clear sky during daylight.
    pub solar_gain_coeff: ZoneCoefficients,
    /// Constant °C per hour from occupants and appliances.
    pub internal_heat_gain: ZoneCoefficients,
    pub inter_zone_transfer: f64,
    /// Mixing valve ceiling on supply temperature delivered to zone A.
    pub shunt_limit: f64,
    /// Supply temperature at 20 °C outdoor.
    pub heating_curve_base: f64,
    /// Supply °C added per °C outdoor drops below 20.
    pub heating_curve_slope: f64,
    pub wind_price_discount: f64,
    pub weekend_price_discount: f64,
    pub cold_price_surcharge: f64,
    pub cold_price_threshold: f64,
}

impl Default for TuningParameters {
    fn default() -> Self {
        Self {
            thermal_leakage: ZoneCoefficients::new(0.010, 0.012),
            rad_efficiency: 0.006,
            slab_efficiency: 0.03,
            wind_sensitivity: ZoneCoefficients::new(0.002, 0.003),
            wind_direction_west_factor: 1.2,
            solar_gain_coeff: ZoneCoefficients::new(0.05, 0.03),
            internal_heat_gain: ZoneCoefficients::new(0.05, 0.05),
            inter_zone_transfer: 0.05,
            shunt_limit: 32.0,
            heating_curve_base: 22.0,
            heating_curve_slope: 1.0,
            wind_price_discount: 0.02,
            weekend_price_discount: 0.1,
            cold_price_surcharge: 0.01,
            cold_price_threshold: 0.0,
        }
    }
}

/// Tuning store keys, in the order they are documented.
pub const TUNING_KEYS: [&str; 19] = [
    "thermal_leakage_a",
    "thermal_leakage_b",
    "rad_efficiency",
    "slab_efficiency",
    "wind_sensitivity_a",
    "wind_sensitivity_b",
    "wind_direction_west_factor",
    "solar_gain_coeff_a",
    "solar_gain_coeff_b",
    "internal_heat_gain_a",
    "internal_heat_gain_b",
    "inter_zone_transfer",
    "shunt_limit",
    "heating_curve_base",
    "heating_curve_slope",
    "wind_price_discount",
    "weekend_price_discount",
    "cold_price_surcharge",
    "cold_price_threshold",
];

impl TuningParameters {
    /// Build a snapshot from store values; absent keys keep their default.
    pub fn from_map(values: &HashMap<String, f64>) -> Self {
        let mut params = Self::default();
        for (key, value) in values {
            if !params.set(key, *value) {
                debug!(key = %key, "ignoring unknown tuning key");
            }
        }
        params
    }

    pub fn to_map(&self) -> HashMap<String, f64> {
        TUNING_KEYS
            .iter()
            .filter_map(|k| self.get(k).map(|v| (k.to_string(), v)))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        let v = match key {
            "thermal_leakage_a" => self.thermal_leakage.a,
            "thermal_leakage_b" => self.thermal_leakage.b,
            "rad_efficiency" => self.rad_efficiency,
            "slab_efficiency" => self.slab_efficiency,
            "wind_sensitivity_a" => self.wind_sensitivity.a,
            "wind_sensitivity_b" => self.wind_sensitivity.b,
            "wind_direction_west_factor" => self.wind_direction_west_factor,
            "solar_gain_coeff_a" => self.solar_gain_coeff.a,
            "solar_gain_coeff_b" => self.solar_gain_coeff.b,
            "internal_heat_gain_a" => self.internal_heat_gain.a,
            "internal_heat_gain_b" => self.internal_heat_gain.b,
            "inter_zone_transfer" => self.inter_zone_transfer,
            "shunt_limit" => self.shunt_limit,
            "heating_curve_base" => self.heating_curve_base,
            "heating_curve_slope" => self.heating_curve_slope,
            "wind_price_discount" => self.wind_price_discount,
            "weekend_price_discount" => self.weekend_price_discount,
            "cold_price_surcharge" => self.cold_price_surcharge,
            "cold_price_threshold" => self.cold_price_threshold,
            _ => return None,
        };
        Some(v)
    }

    fn set(&mut self, key: &str, value: f64) -> bool {
        let slot = match key {
            "thermal_leakage_a" => &mut self.thermal_leakage.a,
            "thermal_leakage_b" => &mut self.thermal_leakage.b,
            "rad_efficiency" => &mut self.rad_efficiency,
            "slab_efficiency" => &mut self.slab_efficiency,
            "wind_sensitivity_a" => &mut self.wind_sensitivity.a,
            "wind_sensitivity_b" => &mut self.wind_sensitivity.b,
            "wind_direction_west_factor" => &mut self.wind_direction_west_factor,
            "solar_gain_coeff_a" => &mut self.solar_gain_coeff.a,
            "solar_gain_coeff_b" => &mut self.solar_gain_coeff.b,
            "internal_heat_gain_a" => &mut self.internal_heat_gain.a,
            "internal_heat_gain_b" => &mut self.internal_heat_gain.b,
            "inter_zone_transfer" => &mut self.inter_zone_transfer,
            "shunt_limit" => &mut self.shunt_limit,
            "heating_curve_base" => &mut self.heating_curve_base,
            "heating_curve_slope" => &mut self.heating_curve_slope,
            "wind_price_discount" => &mut self.wind_price_discount,
            "weekend_price_discount" => &mut self.weekend_price_discount,
            "cold_price_surcharge" => &mut self.cold_price_surcharge,
            "cold_price_threshold" => &mut self.cold_price_threshold,
            _ => return false,
        };
        *slot = value;
        true
    }
}
