//! Device seams. The real REST client lives outside this crate; anything
//! implementing these traits can drive the planner and controller.

#[cfg(feature = "sim")]
pub mod simulated;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

#[cfg(feature = "sim")]
pub use simulated::SimulatedHeatPump;

/// Point read/write against the physical unit.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Fetch every point of the device in one call.
    async fn get_all_points(&self, device_id: &str) -> Result<HashMap<String, f64>>;
    async fn set_point(&self, device_id: &str, parameter_id: &str, value: f64) -> Result<()>;
}

/// Latest value of a logged sensor (zone and hot water temperatures).
#[async_trait]
pub trait SensorAccessor: Send + Sync {
    async fn get_latest(&self, parameter_id: &str) -> Result<f64>;
}

/// Parameter ids of the device points the core reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PointIds {
    pub degree_minutes: String,
    pub hot_water_temp: String,
    pub hot_water_mode: String,
    pub ventilation_mode: String,
    pub zone_a_temp: String,
    pub zone_b_temp: String,
}

impl Default for PointIds {
    fn default() -> Self {
        Self {
            degree_minutes: "40940".to_string(),
            hot_water_temp: "40013".to_string(),
            hot_water_mode: "47041".to_string(),
            ventilation_mode: "10001".to_string(),
            zone_a_temp: "40033".to_string(),
            zone_b_temp: "40030".to_string(),
        }
    }
}
