use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::debug;

use super::{DeviceClient, PointIds, SensorAccessor};
use crate::domain::HotWaterMode;

/// DM at or below which the simulated compressor starts.
const COMPRESSOR_START_DM: f64 = -60.0;
/// DM at or above which it stops.
const COMPRESSOR_STOP_DM: f64 = 0.0;
const DM_GAIN_RUNNING: f64 = 8.0;
const DM_LOSS_IDLE: f64 = 5.0;
const HOT_WATER_LOSS_PER_MIN: f64 = 0.02;
const HOT_WATER_GAIN_PER_MIN: f64 = 0.5;
const HOT_WATER_BAND: f64 = 5.0;

#[derive(Debug)]
struct PumpState {
    points: HashMap<String, f64>,
    compressor_on: bool,
    heating_water: bool,
    last_advance: Instant,
}

/// In-process heat pump so the binary runs without hardware.
///
/// Degree minutes fall while the compressor idles and recover while it runs;
/// hot water cools slowly and is reheated below a mode dependent start
/// temperature. Time advances in whole minutes of `tokio::time`.
#[derive(Debug)]
pub struct SimulatedHeatPump {
    ids: PointIds,
    state: Mutex<PumpState>,
}

impl SimulatedHeatPump {
    pub fn new(ids: PointIds) -> Self {
        let mut points = HashMap::new();
        points.insert(ids.degree_minutes.clone(), 0.0);
        points.insert(ids.hot_water_temp.clone(), 48.0);
        points.insert(ids.hot_water_mode.clone(), HotWaterMode::Normal.device_value());
        points.insert(ids.ventilation_mode.clone(), 0.0);
        points.insert(ids.zone_a_temp.clone(), 21.0);
        points.insert(ids.zone_b_temp.clone(), 20.5);
        Self {
            ids,
            state: Mutex::new(PumpState {
                points,
                compressor_on: false,
                heating_water: false,
                last_advance: Instant::now(),
            }),
        }
    }

    pub fn point(&self, parameter_id: &str) -> Option<f64> {
        self.state.lock().points.get(parameter_id).copied()
    }

    /// Overwrite a point without going through the device write path.
    pub fn force_point(&self, parameter_id: &str, value: f64) {
        self.state.lock().points.insert(parameter_id.to_string(), value);
    }

    /// Run the device model for `minutes`.
    pub fn advance(&self, minutes: u32) {
        let mut state = self.state.lock();
        for _ in 0..minutes {
            self.advance_minute(&mut state);
        }
    }

    fn advance_minute(&self, state: &mut PumpState) {
        let dm = state.points.get(&self.ids.degree_minutes).copied().unwrap_or(0.0);
        if dm <= COMPRESSOR_START_DM {
            state.compressor_on = true;
        } else if dm >= COMPRESSOR_STOP_DM {
            state.compressor_on = false;
        }
        let next_dm = if state.compressor_on {
            dm + DM_GAIN_RUNNING
        } else {
            dm - DM_LOSS_IDLE
        };
        state.points.insert(self.ids.degree_minutes.clone(), next_dm);

        let mode = state
            .points
            .get(&self.ids.hot_water_mode)
            .and_then(|v| HotWaterMode::from_device_value(*v))
            .unwrap_or_default();
        let start = match mode {
            HotWaterMode::Economy => 38.0,
            HotWaterMode::Normal => 42.0,
            HotWaterMode::Luxury => 46.0,
        };
        let water = state.points.get(&self.ids.hot_water_temp).copied().unwrap_or(start);
        if water <= start {
            state.heating_water = true;
        } else if water >= start + HOT_WATER_BAND {
            state.heating_water = false;
        }
        let next_water = if state.heating_water {
            water + HOT_WATER_GAIN_PER_MIN
        } else {
            water - HOT_WATER_LOSS_PER_MIN
        };
        state.points.insert(self.ids.hot_water_temp.clone(), next_water);
    }

    fn catch_up(&self) {
        let mut state = self.state.lock();
        let minutes = state.last_advance.elapsed().as_secs() / 60;
        if minutes == 0 {
            return;
        }
        for _ in 0..minutes {
            self.advance_minute(&mut state);
        }
        state.last_advance += std::time::Duration::from_secs(minutes * 60);
    }
}

#[async_trait]
impl DeviceClient for SimulatedHeatPump {
    async fn get_all_points(&self, _device_id: &str) -> Result<HashMap<String, f64>> {
        self.catch_up();
        Ok(self.state.lock().points.clone())
    }

    async fn set_point(&self, device_id: &str, parameter_id: &str, value: f64) -> Result<()> {
        if !value.is_finite() {
            anyhow::bail!("refusing non-finite value for point {parameter_id}");
        }
        debug!(device_id, parameter_id, value, "simulated point write");
        self.state.lock().points.insert(parameter_id.to_string(), value);
        Ok(())
    }
}

#[async_trait]
impl SensorAccessor for SimulatedHeatPump {
    async fn get_latest(&self, parameter_id: &str) -> Result<f64> {
        self.catch_up();
        self.point(parameter_id)
            .ok_or_else(|| anyhow::anyhow!("no such sensor: {parameter_id}"))
    }
}
