use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::config::ControllerConfig;
use crate::domain::{
    BankAccount, BankLimits, BankMode, BankSample, HotWaterMode, PlannedAction, VentilationMode,
};
use crate::error::ControllerError;
use crate::hardware::{DeviceClient, PointIds};
use crate::repo::{BankStore, PlanStore};

/// Write hysteresis state. Lives only in memory; a restart (or a failed
/// tick) resets it and the next tick rewrites every point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeState {
    /// Reference for jump detection.
    pub last_written_dm: Option<f64>,
    /// Device DM the next delta is measured from: the last written value, or
    /// the device reading when no write happened.
    pub dm_baseline: Option<f64>,
    pub last_hot_water: Option<HotWaterMode>,
    pub last_ventilation: Option<VentilationMode>,
}

/// What one committed tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub balance: f64,
    pub mode: BankMode,
    pub device_dm: f64,
    pub action: PlannedAction,
    pub target_dm: f64,
    pub written_dm: Option<f64>,
    pub hot_water: HotWaterMode,
    pub hot_water_forced: bool,
    pub ventilation: VentilationMode,
}

/// Demand value written to the device for a planned action.
///
/// RUN pushes demand down to the call-for-heat level (or further, if the
/// bank already owes more), never below the auxiliary heater threshold.
pub fn demand_setpoint(action: PlannedAction, balance: f64, cfg: &ControllerConfig) -> f64 {
    match action {
        PlannedAction::Run | PlannedAction::MustRun => {
            balance.min(cfg.run_call_dm).max(cfg.heater_safety_dm)
        }
        PlannedAction::Rest | PlannedAction::MustRest => cfg.rest_dm,
        PlannedAction::Hold | PlannedAction::Normal => balance.max(cfg.heater_safety_dm),
    }
}

/// Reconciles the virtual degree-minute bank against the device counter and
/// drives the device from the current plan entry.
pub struct DegreeMinuteBankController {
    cfg: ControllerConfig,
    limits: BankLimits,
    points: PointIds,
    device: Arc<dyn DeviceClient>,
    plans: Arc<dyn PlanStore>,
    bank: Arc<dyn BankStore>,
    runtime: Mutex<RuntimeState>,
    history: Mutex<VecDeque<BankSample>>,
}

impl DegreeMinuteBankController {
    pub fn new(
        cfg: ControllerConfig,
        points: PointIds,
        device: Arc<dyn DeviceClient>,
        plans: Arc<dyn PlanStore>,
        bank: Arc<dyn BankStore>,
    ) -> Self {
        let limits = cfg.limits();
        Self {
            cfg,
            limits,
            points,
            device,
            plans,
            bank,
            runtime: Mutex::new(RuntimeState::default()),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn runtime(&self) -> RuntimeState {
        self.runtime.lock().clone()
    }

    /// Seed the hysteresis state, e.g. when taking over from another process.
    pub fn restore_runtime(&self, state: RuntimeState) {
        *self.runtime.lock() = state;
    }

    /// Committed ticks, oldest first.
    pub fn history(&self) -> Vec<BankSample> {
        self.history.lock().iter().cloned().collect()
    }

    fn read_point(&self, points: &HashMap<String, f64>, id: &str) -> Result<f64, ControllerError> {
        points
            .get(id)
            .copied()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ControllerError::MissingPoint(id.to_string()))
    }

    /// Run one reconciliation tick at `now`.
    ///
    /// Nothing is committed (bank row, hysteresis state, history) unless every
    /// device write and the bank save succeed. A failure after the first write
    /// forgets the hysteresis state so the next tick starts from device truth.
    pub async fn tick(&self, now: DateTime<FixedOffset>) -> Result<TickOutcome> {
        let device_id = self.cfg.device_id.as_str();
        let telemetry = self
            .device
            .get_all_points(device_id)
            .await
            .map_err(|e| ControllerError::DeviceCommunication(format!("{e:#}")))?;
        let device_dm = self.read_point(&telemetry, &self.points.degree_minutes)?;
        let hot_water_temp = self.read_point(&telemetry, &self.points.hot_water_temp).ok();

        let account = self
            .bank
            .load()
            .await
            .map_err(|e| ControllerError::Persistence(format!("{e:#}")))?;

        let previous = self.runtime();
        let mut next = previous.clone();

        // Jumps are measured against the last written value, not the baseline.
        let jumped = previous
            .last_written_dm
            .map(|written| (device_dm - written).abs() > self.cfg.jump_threshold);
        let (balance, mode) = match (previous.dm_baseline, &account, jumped) {
            (Some(baseline), Some(account), Some(false)) => (
                self.limits.clamp(account.balance + (device_dm - baseline)),
                BankMode::Active,
            ),
            // Restarted with a stored balance: keep it, measure from here on.
            (None, Some(account), None) => (self.limits.clamp(account.balance), BankMode::Active),
            (baseline, _, _) => {
                info!(
                    device_dm,
                    ?baseline,
                    last_written_dm = ?previous.last_written_dm,
                    "bank resynchronised to device"
                );
                next.last_written_dm = Some(device_dm);
                (self.limits.clamp(device_dm), BankMode::Syncing)
            }
        };

        let plan = self
            .plans
            .current()
            .await
            .map_err(|e| ControllerError::Persistence(format!("{e:#}")))?;
        let entry = plan.as_ref().and_then(|p| p.entry_at(now));
        let (action, planned_hot_water, ventilation) = match entry {
            Some(e) => (
                e.planned_action,
                e.planned_hot_water_mode,
                e.planned_ventilation_mode,
            ),
            None => {
                warn!(%now, "no plan entry covers now, running NORMAL");
                (
                    PlannedAction::Normal,
                    HotWaterMode::Normal,
                    VentilationMode::Normal,
                )
            }
        };

        let hot_water_forced = hot_water_temp
            .map(|t| t < self.cfg.hot_water_emergency_c)
            .unwrap_or(false);
        let hot_water = if hot_water_forced {
            warn!(
                hot_water_temp,
                planned = %planned_hot_water,
                "hot water below emergency floor, forcing luxury"
            );
            HotWaterMode::Luxury
        } else {
            planned_hot_water
        };

        let target_dm = demand_setpoint(action, balance, &self.cfg);
        let mut written_dm = None;
        let mut wrote_any = false;

        let dm_changed = next
            .last_written_dm
            .map_or(true, |last| (last - target_dm).abs() > self.cfg.dm_hysteresis);
        if dm_changed {
            self.write(&self.points.degree_minutes, target_dm, wrote_any)
                .await?;
            wrote_any = true;
            written_dm = Some(target_dm);
            next.last_written_dm = Some(target_dm);
            next.dm_baseline = Some(target_dm);
        } else {
            trace!(target_dm, "demand within hysteresis, not written");
            next.dm_baseline = Some(device_dm);
        }

        if next.last_hot_water != Some(hot_water) {
            self.write(&self.points.hot_water_mode, hot_water.device_value(), wrote_any)
                .await?;
            wrote_any = true;
            next.last_hot_water = Some(hot_water);
        }

        if next.last_ventilation != Some(ventilation) {
            self.write(
                &self.points.ventilation_mode,
                ventilation.device_value(),
                wrote_any,
            )
            .await?;
            wrote_any = true;
            next.last_ventilation = Some(ventilation);
        }

        let account = BankAccount {
            balance,
            mode,
            last_updated: now,
        };
        if let Err(e) = self.bank.save(&account).await {
            if wrote_any {
                self.forget_runtime();
            }
            return Err(ControllerError::Persistence(format!("{e:#}")).into());
        }

        *self.runtime.lock() = next;
        {
            let mut history = self.history.lock();
            history.push_back(BankSample {
                timestamp: now,
                balance,
                device_dm,
                written_dm,
                mode,
            });
            while history.len() > self.cfg.history_len {
                history.pop_front();
            }
        }

        debug!(
            balance,
            device_dm,
            target_dm,
            action = %action,
            mode = %mode,
            written = written_dm.is_some(),
            "bank tick"
        );

        Ok(TickOutcome {
            balance,
            mode,
            device_dm,
            action,
            target_dm,
            written_dm,
            hot_water,
            hot_water_forced,
            ventilation,
        })
    }

    async fn write(&self, parameter_id: &str, value: f64, after_other_writes: bool) -> Result<()> {
        match self
            .device
            .set_point(&self.cfg.device_id, parameter_id, value)
            .await
        {
            Ok(()) => {
                debug!(parameter_id, value, "device point written");
                Ok(())
            }
            Err(e) => {
                if after_other_writes {
                    self.forget_runtime();
                }
                Err(ControllerError::DeviceCommunication(format!(
                    "write {parameter_id}={value}: {e:#}"
                ))
                .into())
            }
        }
    }

    fn forget_runtime(&self) {
        *self.runtime.lock() = RuntimeState::default();
    }
}
