use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// What the heat pump should do during one planned hour.
///
/// `MustRun`/`MustRest` behave exactly like `Run`/`Rest` towards the engine
/// and the device, but are pinned: the optimizer never flips or prunes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum PlannedAction {
    Rest,
    Run,
    MustRun,
    MustRest,
    Hold,
    Normal,
}

impl PlannedAction {
    pub fn is_run(self) -> bool {
        matches!(self, PlannedAction::Run | PlannedAction::MustRun)
    }

    pub fn is_rest(self) -> bool {
        matches!(self, PlannedAction::Rest | PlannedAction::MustRest)
    }

    pub fn is_pinned(self) -> bool {
        matches!(self, PlannedAction::MustRun | PlannedAction::MustRest)
    }
}

/// Hot water comfort mode as understood by the device.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum HotWaterMode {
    /// Conservative: lower stop temperature, used in expensive hours.
    Economy,
    #[default]
    Normal,
    /// Boosted: higher stop temperature, used in the cheapest hours.
    Luxury,
}

impl HotWaterMode {
    pub fn device_value(self) -> f64 {
        match self {
            HotWaterMode::Economy => 0.0,
            HotWaterMode::Normal => 1.0,
            HotWaterMode::Luxury => 2.0,
        }
    }

    pub fn from_device_value(value: f64) -> Option<Self> {
        match value.round() as i64 {
            0 => Some(HotWaterMode::Economy),
            1 => Some(HotWaterMode::Normal),
            2 => Some(HotWaterMode::Luxury),
            _ => None,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum VentilationMode {
    #[default]
    Normal,
    /// Lower fan speed, trades air exchange for less heat loss.
    Reduced,
}

impl VentilationMode {
    pub fn device_value(self) -> f64 {
        match self {
            VentilationMode::Normal => 0.0,
            VentilationMode::Reduced => 1.0,
        }
    }

    pub fn from_device_value(value: f64) -> Option<Self> {
        match value.round() as i64 {
            0 => Some(VentilationMode::Normal),
            1 => Some(VentilationMode::Reduced),
            _ => None,
        }
    }
}

/// One row of the committed plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPlanEntry {
    pub timestamp: DateTime<FixedOffset>,
    pub outdoor_temp: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub cloud_cover: f64,
    pub solar_gain: f64,
    pub electricity_price: f64,
    pub planned_action: PlannedAction,
    /// Curve offset (°C) applied while the hour runs.
    pub planned_offset: f64,
    pub planned_hot_water_mode: HotWaterMode,
    pub planned_ventilation_mode: VentilationMode,
    pub simulated_zone_a_temp: f64,
    pub simulated_zone_b_temp: f64,
    pub predicted_supply_temp: f64,
}

impl HourlyPlanEntry {
    pub fn time_end(&self) -> DateTime<FixedOffset> {
        self.timestamp + Duration::hours(1)
    }

    pub fn covers(&self, t: DateTime<FixedOffset>) -> bool {
        t >= self.timestamp && t < self.time_end()
    }
}

/// A complete plan as produced by one planning cycle. Replaced wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub created_at: DateTime<FixedOffset>,
    pub entries: Vec<HourlyPlanEntry>,
    pub optimizer_version: String,
}

impl Plan {
    pub fn new(created_at: DateTime<FixedOffset>, entries: Vec<HourlyPlanEntry>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at,
            entries,
            optimizer_version: crate::optimizer::OPTIMIZER_VERSION.to_string(),
        }
    }

    pub fn entry_at(&self, t: DateTime<FixedOffset>) -> Option<&HourlyPlanEntry> {
        self.entries.iter().find(|e| e.covers(t))
    }

    pub fn valid_from(&self) -> Option<DateTime<FixedOffset>> {
        self.entries.first().map(|e| e.timestamp)
    }

    pub fn valid_until(&self) -> Option<DateTime<FixedOffset>> {
        self.entries.last().map(|e| e.time_end())
    }

    /// Entries are hourly and gap free.
    pub fn is_contiguous(&self) -> bool {
        self.entries
            .windows(2)
            .all(|w| w[1].timestamp - w[0].timestamp == Duration::hours(1))
    }

    pub fn run_hours(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.planned_action.is_run())
            .count()
    }
}
