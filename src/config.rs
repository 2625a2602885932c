use anyhow::{Context, Result};
use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::collections::HashMap;
use validator::{Validate, ValidationError};

use crate::domain::{BankLimits, TuningParameters};
use crate::hardware::PointIds;
use crate::optimizer::{ComfortLimits, OptimizerLimits};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub planner: PlannerConfig,
    #[validate(nested)]
    pub comfort: ComfortLimits,
    #[validate(nested)]
    pub optimizer: OptimizerLimits,
    #[validate(nested)]
    pub controller: ControllerConfig,
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
    /// Initial contents of the tuning store, keyed like `TUNING_KEYS`.
    pub tuning: HashMap<String, f64>,
    pub db: DbConfig,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct PlannerConfig {
    #[validate(range(min = 24, max = 72))]
    pub horizon_hours: u32,
    #[validate(range(min = 1))]
    pub reoptimize_every_minutes: u64,
    /// IANA zone of the house, used for daylight and weekend rules.
    pub timezone: String,
    /// Local hours of day pinned to MUST_RUN.
    #[validate(custom(function = "validate_hours"))]
    pub must_run_hours: Vec<u32>,
    /// Local hours of day pinned to MUST_REST.
    #[validate(custom(function = "validate_hours"))]
    pub must_rest_hours: Vec<u32>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            horizon_hours: 25,
            reoptimize_every_minutes: 60,
            timezone: "Europe/Stockholm".to_string(),
            must_run_hours: Vec::new(),
            must_rest_hours: Vec::new(),
        }
    }
}

impl PlannerConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid planner.timezone {:?}: {e}", self.timezone))
    }
}

fn validate_hours(hours: &[u32]) -> Result<(), ValidationError> {
    if hours.iter().all(|h| *h < 24) {
        Ok(())
    } else {
        Err(ValidationError::new("hour_of_day_out_of_range"))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_controller"))]
pub struct ControllerConfig {
    #[validate(range(min = 1))]
    pub tick_seconds: u64,
    pub device_id: String,
    pub min_balance: f64,
    pub max_balance: f64,
    /// Device DM movement per tick treated as implausible.
    #[validate(range(min = 1.0))]
    pub jump_threshold: f64,
    /// Call-for-heat value a RUN hour pushes the demand signal to.
    pub run_call_dm: f64,
    /// Lowest demand value ever written; below it the auxiliary heater starts.
    pub heater_safety_dm: f64,
    /// "No demand" value written during REST hours.
    pub rest_dm: f64,
    #[validate(range(min = 0.0))]
    pub dm_hysteresis: f64,
    pub hot_water_emergency_c: f64,
    #[validate(range(min = 1))]
    pub history_len: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 60,
            device_id: "heatpump".to_string(),
            min_balance: -2000.0,
            max_balance: 600.0,
            jump_threshold: 100.0,
            run_call_dm: -400.0,
            heater_safety_dm: -700.0,
            rest_dm: 100.0,
            dm_hysteresis: 5.0,
            hot_water_emergency_c: 41.0,
            history_len: 1440,
        }
    }
}

impl ControllerConfig {
    pub fn limits(&self) -> BankLimits {
        BankLimits {
            min_balance: self.min_balance,
            max_balance: self.max_balance,
        }
    }
}

fn validate_controller(cfg: &ControllerConfig) -> Result<(), ValidationError> {
    if cfg.min_balance >= cfg.max_balance {
        return Err(ValidationError::new("min_balance_not_below_max_balance"));
    }
    if cfg.heater_safety_dm > cfg.run_call_dm {
        return Err(ValidationError::new("heater_safety_dm_above_run_call_dm"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub points: PointIds,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            filter: "info,sqlx=warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub url: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/heatpump_planner".to_string(),
        }
    }
}

impl Config {
    /// Load `config/default.toml` (or `$HPP_CONFIG`) overlaid with `HPP__*` env vars.
    pub fn load() -> Result<Self> {
        let path = std::env::var("HPP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("HPP__").split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract().context("failed to parse configuration")?;
        cfg.validate().context("invalid configuration")?;
        cfg.planner.tz()?;
        Ok(cfg)
    }

    /// Default tuning overlaid with the configured store contents.
    pub fn tuning_defaults(&self) -> TuningParameters {
        TuningParameters::from_map(&self.tuning)
    }
}
