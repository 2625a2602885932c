pub mod bank;
pub mod planner;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::forecast::{ForecastEngine, PriceForecastProvider, WeatherForecastProvider};
use crate::hardware::{DeviceClient, SensorAccessor};
use crate::optimizer::ScheduleOptimizer;
use crate::repo::Repositories;

pub use bank::{demand_setpoint, DegreeMinuteBankController, RuntimeState, TickOutcome};
pub use planner::{Planner, PlanningOutcome};

/// External collaborators the planner and controller are built from.
pub struct Collaborators {
    pub device: Arc<dyn DeviceClient>,
    pub sensors: Arc<dyn SensorAccessor>,
    pub weather: Arc<dyn WeatherForecastProvider>,
    pub prices: Arc<dyn PriceForecastProvider>,
}

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub repos: Arc<Repositories>,
    pub planner: Arc<Planner>,
    pub controller: Arc<DegreeMinuteBankController>,
}

impl AppState {
    pub fn new(cfg: Config, repos: Repositories, deps: Collaborators) -> Result<Self> {
        let repos = Arc::new(repos);
        let forecasts = ForecastEngine::new(deps.weather, deps.prices, cfg.planner.tz()?);
        let planner = Arc::new(Planner::new(
            cfg.planner.clone(),
            ScheduleOptimizer::new(cfg.comfort.clone(), cfg.optimizer.clone()),
            forecasts,
            deps.sensors,
            cfg.device.points.clone(),
            repos.plans.clone(),
            repos.tuning.clone(),
        ));
        let controller = Arc::new(DegreeMinuteBankController::new(
            cfg.controller.clone(),
            cfg.device.points.clone(),
            deps.device,
            repos.plans.clone(),
            repos.bank.clone(),
        ));
        Ok(Self {
            cfg,
            repos,
            planner,
            controller,
        })
    }
}

fn now() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}

/// Re-plan on a fixed cadence. A failed cycle keeps the previous plan.
pub async fn planner_loop(planner: Arc<Planner>, every_minutes: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(every_minutes.max(1) * 60));
    loop {
        interval.tick().await;
        match planner.plan_once(now()).await {
            Ok(outcome) => info!(
                plan_id = %outcome.plan.id,
                buffered_hours = outcome.report.buffered_hours,
                pruned_hours = outcome.report.pruned_hours,
                "planning cycle done"
            ),
            Err(e) => warn!(error = %format!("{e:#}"), "planning cycle failed, previous plan kept"),
        }
    }
}

/// Tick the bank controller on a fixed cadence. A failed tick is retried on
/// the next one.
pub async fn controller_loop(controller: Arc<DegreeMinuteBankController>, tick_seconds: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(tick_seconds.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if let Err(e) = controller.tick(now()).await {
            warn!(error = %format!("{e:#}"), "controller tick failed");
        }
    }
}

pub fn spawn_loops(state: &AppState) {
    tokio::spawn(planner_loop(
        state.planner.clone(),
        state.cfg.planner.reoptimize_every_minutes,
    ));
    tokio::spawn(controller_loop(
        state.controller.clone(),
        state.cfg.controller.tick_seconds,
    ));
}
