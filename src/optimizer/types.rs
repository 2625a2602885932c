use serde::{Deserialize, Serialize};

use crate::domain::{HotWaterMode, PlannedAction, VentilationMode};
use crate::simulation::{HourStep, Simulation};

/// Zone whose minimum was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComfortZone {
    A,
    B,
}

/// Optimizer's decision for one hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourPlan {
    pub action: PlannedAction,
    pub offset: f64,
    pub hot_water: HotWaterMode,
    pub ventilation: VentilationMode,
}

impl HourPlan {
    pub fn rest() -> Self {
        Self::with_action(PlannedAction::Rest, 0.0)
    }

    pub fn run(offset: f64) -> Self {
        Self::with_action(PlannedAction::Run, offset)
    }

    pub fn with_action(action: PlannedAction, offset: f64) -> Self {
        Self {
            action,
            offset,
            hot_water: HotWaterMode::Normal,
            ventilation: VentilationMode::Normal,
        }
    }

    pub fn step(&self) -> HourStep {
        HourStep::new(self.action, self.offset)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub minimum_iterations: usize,
    pub buffer_trials: usize,
    pub buffered_hours: usize,
    pub prune_trials: usize,
    pub pruned_hours: usize,
    pub lowered_offsets: usize,
    /// First hour still below its minimum after repair, if any.
    pub residual_violation: Option<usize>,
    pub cost_before_pruning: f64,
    pub cost_after_pruning: f64,
    pub run_hours: usize,
}

/// Result of one optimizer run: the decisions and their final simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizedSchedule {
    pub hours: Vec<HourPlan>,
    pub simulation: Simulation,
    pub report: OptimizationReport,
}
