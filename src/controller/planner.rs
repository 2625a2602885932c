use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::PlannerConfig;
use crate::domain::{HourConditions, HourlyPlanEntry, Plan, PlannedAction, TuningParameters, ZoneTemps};
use crate::error::PlanningError;
use crate::forecast::ForecastEngine;
use crate::hardware::{PointIds, SensorAccessor};
use crate::optimizer::{HourPlan, OptimizationReport, OptimizedSchedule, ScheduleOptimizer};
use crate::repo::{PlanStore, TuningStore};
use crate::simulation::ThermalSimulationEngine;

/// Result of a committed planning cycle.
#[derive(Debug, Clone)]
pub struct PlanningOutcome {
    pub plan: Plan,
    pub report: OptimizationReport,
    /// Price weighted heat output of the committed plan.
    pub cost: f64,
}

/// One planning cycle: tuning snapshot, forecasts, zone temperatures,
/// optimization and an atomic plan replacement.
pub struct Planner {
    cfg: PlannerConfig,
    optimizer: ScheduleOptimizer,
    forecasts: ForecastEngine,
    sensors: Arc<dyn SensorAccessor>,
    points: PointIds,
    plans: Arc<dyn PlanStore>,
    tuning: Arc<dyn TuningStore>,
}

impl Planner {
    pub fn new(
        cfg: PlannerConfig,
        optimizer: ScheduleOptimizer,
        forecasts: ForecastEngine,
        sensors: Arc<dyn SensorAccessor>,
        points: PointIds,
        plans: Arc<dyn PlanStore>,
        tuning: Arc<dyn TuningStore>,
    ) -> Self {
        Self {
            cfg,
            optimizer,
            forecasts,
            sensors,
            points,
            plans,
            tuning,
        }
    }

    /// Seed decisions carrying the configured pins. MUST_RUN wins when an
    /// hour is listed in both.
    pub fn pinned_seed(&self, conditions: &[HourConditions], run_offset: f64) -> Vec<HourPlan> {
        conditions
            .iter()
            .map(|c| {
                if self.cfg.must_run_hours.contains(&c.local_hour) {
                    HourPlan::with_action(PlannedAction::MustRun, run_offset)
                } else if self.cfg.must_rest_hours.contains(&c.local_hour) {
                    HourPlan::with_action(PlannedAction::MustRest, 0.0)
                } else {
                    HourPlan::rest()
                }
            })
            .collect()
    }

    async fn zone_temps(&self) -> Result<ZoneTemps> {
        let mut read = Vec::with_capacity(2);
        for parameter in [&self.points.zone_a_temp, &self.points.zone_b_temp] {
            let value = self
                .sensors
                .get_latest(parameter)
                .await
                .map_err(|e| PlanningError::Sensor {
                    parameter: parameter.clone(),
                    reason: format!("{e:#}"),
                })?;
            if !value.is_finite() {
                return Err(PlanningError::Sensor {
                    parameter: parameter.clone(),
                    reason: format!("non-finite reading {value}"),
                }
                .into());
            }
            read.push(value);
        }
        Ok(ZoneTemps::new(read[0], read[1]))
    }

    /// Run one cycle at `now` and commit the plan. On any error the previous
    /// plan stays in force.
    pub async fn plan_once(&self, now: DateTime<FixedOffset>) -> Result<PlanningOutcome> {
        let snapshot = self
            .tuning
            .snapshot()
            .await
            .context("failed to load tuning snapshot")?;
        let tuning = TuningParameters::from_map(&snapshot);

        let conditions = self
            .forecasts
            .conditions(now, self.cfg.horizon_hours, &tuning)
            .await?;
        let initial = self.zone_temps().await?;

        let engine = ThermalSimulationEngine::new(tuning);
        let seed = self.pinned_seed(&conditions, self.optimizer.limits.offset_step);
        let schedule = self.optimizer.optimize(&engine, initial, &conditions, seed);

        if let Some(hour) = schedule.report.residual_violation {
            warn!(
                hour,
                timestamp = %conditions[hour].timestamp,
                "committing best-effort plan with residual comfort violation"
            );
        }

        let cost = schedule
            .simulation
            .cost(conditions.iter().map(|c| c.price));
        let plan = Plan::new(now, plan_entries(&conditions, &schedule));
        let plan_id = plan.id;
        self.plans
            .replace(plan.clone())
            .await
            .context("failed to commit plan")?;

        info!(
            %plan_id,
            zone_a = initial.zone_a,
            zone_b = initial.zone_b,
            run_hours = plan.run_hours(),
            cost,
            "plan committed"
        );
        Ok(PlanningOutcome {
            plan,
            report: schedule.report,
            cost,
        })
    }
}

fn plan_entries(conditions: &[HourConditions], schedule: &OptimizedSchedule) -> Vec<HourlyPlanEntry> {
    conditions
        .iter()
        .zip(&schedule.hours)
        .zip(&schedule.simulation.hours)
        .map(|((c, decision), simulated)| HourlyPlanEntry {
            timestamp: c.timestamp,
            outdoor_temp: c.outdoor_temp,
            wind_speed: c.wind_speed,
            wind_direction: c.wind_direction,
            cloud_cover: c.cloud_cover,
            solar_gain: simulated.solar_factor,
            electricity_price: c.price,
            planned_action: decision.action,
            planned_offset: if decision.action.is_run() {
                decision.offset
            } else {
                0.0
            },
            planned_hot_water_mode: decision.hot_water,
            planned_ventilation_mode: decision.ventilation,
            simulated_zone_a_temp: simulated.zone_a,
            simulated_zone_b_temp: simulated.zone_b,
            predicted_supply_temp: simulated.supply_temp,
        })
        .collect()
}
