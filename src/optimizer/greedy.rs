use std::cmp::Reverse;
use std::collections::BTreeSet;

use itertools::Itertools;
use ordered_float::OrderedFloat;
use tracing::{debug, info, warn};

use super::{
    ComfortLimits, ComfortZone, HourPlan, OptimizationReport, OptimizedSchedule, OptimizerLimits,
};
use crate::domain::{HotWaterMode, HourConditions, VentilationMode, ZoneTemps};
use crate::simulation::{Simulation, ThermalSimulationEngine};

type Violations = BTreeSet<(usize, ComfortZone)>;

/// Constrained greedy schedule optimizer.
///
/// Builds the plan in four phases, each bounded by `max_iterations`:
/// - repair: flip the cheapest eligible REST hour (or raise an offset) until
///   no zone drops below its minimum
/// - buffering: run cheap hours while zone A stays under its ceiling
/// - pruning: drop or shrink expensive RUN hours that are not needed
/// - modes: hot water and ventilation by price rank
///
/// Every feasibility or cost question is answered by a fresh simulation of a
/// candidate copy; the working plan is only replaced when the candidate passes.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOptimizer {
    pub comfort: ComfortLimits,
    pub limits: OptimizerLimits,
}

/// Inputs shared by all phases of one optimizer run.
struct Horizon<'a> {
    engine: &'a ThermalSimulationEngine,
    initial: ZoneTemps,
    conditions: &'a [HourConditions],
    average_price: f64,
}

impl Horizon<'_> {
    fn len(&self) -> usize {
        self.conditions.len()
    }

    fn price(&self, hour: usize) -> f64 {
        self.conditions[hour].price
    }

    fn simulate(&self, hours: &[HourPlan]) -> Simulation {
        let steps: Vec<_> = hours.iter().map(HourPlan::step).collect();
        self.engine.simulate(self.initial, &steps, self.conditions)
    }

    fn cost(&self, simulation: &Simulation) -> f64 {
        simulation.cost(self.conditions.iter().map(|c| c.price))
    }
}

fn is_running(hours: &[HourPlan], hour: Option<usize>) -> bool {
    hour.and_then(|h| hours.get(h))
        .map(|p| p.action.is_run())
        .unwrap_or(false)
}

fn neighbours(hour: usize) -> (Option<usize>, Option<usize>) {
    (hour.checked_sub(1), Some(hour + 1))
}

impl ScheduleOptimizer {
    pub fn new(comfort: ComfortLimits, limits: OptimizerLimits) -> Self {
        Self { comfort, limits }
    }

    /// Optimize `seed` over `conditions`. The seed carries pinned hours; any
    /// missing hours are treated as REST and surplus hours are dropped.
    pub fn optimize(
        &self,
        engine: &ThermalSimulationEngine,
        initial: ZoneTemps,
        conditions: &[HourConditions],
        mut seed: Vec<HourPlan>,
    ) -> OptimizedSchedule {
        seed.resize(conditions.len(), HourPlan::rest());
        let average_price = if conditions.is_empty() {
            0.0
        } else {
            conditions.iter().map(|c| c.price).sum::<f64>() / conditions.len() as f64
        };
        let horizon = Horizon {
            engine,
            initial,
            conditions,
            average_price,
        };

        let mut report = OptimizationReport::default();
        let hours = self.satisfy_minimums(&horizon, seed, &mut report);
        let hours = self.buffer_cheap_hours(&horizon, hours, &mut report);
        let mut hours = self.prune(&horizon, hours, &mut report);
        self.assign_modes(&horizon, &mut hours);

        let simulation = horizon.simulate(&hours);
        report.run_hours = hours.iter().filter(|h| h.action.is_run()).count();
        info!(
            hours = hours.len(),
            run_hours = report.run_hours,
            cost_before_pruning = report.cost_before_pruning,
            cost_after_pruning = report.cost_after_pruning,
            "schedule optimized"
        );

        OptimizedSchedule {
            hours,
            simulation,
            report,
        }
    }

    /// Hours (and zones) where the simulation drops below the price-relaxed minimum.
    fn violations(&self, horizon: &Horizon<'_>, simulation: &Simulation) -> Violations {
        let mut found = Violations::new();
        for (hour, simulated) in simulation.hours.iter().enumerate() {
            // all or nothing: full relaxation above the spike ratio
            let relax = self
                .comfort
                .relaxation(horizon.price(hour), horizon.average_price);
            if simulated.zone_a < self.comfort.min_zone_a - relax {
                found.insert((hour, ComfortZone::A));
            }
            if simulated.zone_b < self.comfort.min_zone_b - relax {
                found.insert((hour, ComfortZone::B));
            }
        }
        found
    }

    fn first_violation(&self, horizon: &Horizon<'_>, hours: &[HourPlan]) -> Option<usize> {
        let simulation = horizon.simulate(hours);
        self.violations(horizon, &simulation)
            .first()
            .map(|(hour, _)| *hour)
    }

    /// Phase 1: repair until no minimum is violated or nothing is left to try.
    fn satisfy_minimums(
        &self,
        horizon: &Horizon<'_>,
        mut hours: Vec<HourPlan>,
        report: &mut OptimizationReport,
    ) -> Vec<HourPlan> {
        for _ in 0..self.limits.max_iterations {
            let Some(violation) = self.first_violation(horizon, &hours) else {
                report.residual_violation = None;
                return hours;
            };
            report.minimum_iterations += 1;

            let mut candidate = hours.clone();
            if let Some(hour) = self.cheapest_rest_hour(horizon, &hours, violation) {
                candidate[hour] = HourPlan::run(self.limits.offset_step);
                debug!(hour, violation, "flipping rest hour to run");
            } else if let Some(hour) = self.cheapest_raisable_run_hour(horizon, &hours, violation) {
                let raised = (candidate[hour].offset + self.limits.offset_step).min(self.limits.max_offset);
                candidate[hour].offset = raised;
                debug!(hour, violation, offset = raised, "raising run offset");
            } else {
                warn!(hour = violation, "comfort minimum cannot be met, keeping best-effort plan");
                report.residual_violation = Some(violation);
                return hours;
            }
            hours = candidate;
        }

        report.residual_violation = self.first_violation(horizon, &hours);
        if let Some(hour) = report.residual_violation {
            warn!(
                hour,
                max_iterations = self.limits.max_iterations,
                "iteration cap reached with comfort violation, keeping best-effort plan"
            );
        }
        hours
    }

    fn cheapest_rest_hour(
        &self,
        horizon: &Horizon<'_>,
        hours: &[HourPlan],
        violation: usize,
    ) -> Option<usize> {
        (0..=violation)
            .filter(|&h| !hours[h].action.is_pinned() && hours[h].action.is_rest())
            .min_by_key(|&h| {
                let (before, after) = neighbours(h);
                let factor = if is_running(hours, before) || is_running(hours, after) {
                    self.limits.continuity_bonus
                } else {
                    1.0
                };
                (OrderedFloat(horizon.price(h) * factor), h)
            })
    }

    fn cheapest_raisable_run_hour(
        &self,
        horizon: &Horizon<'_>,
        hours: &[HourPlan],
        violation: usize,
    ) -> Option<usize> {
        (0..=violation)
            .filter(|&h| hours[h].action.is_run() && hours[h].offset < self.limits.max_offset)
            .min_by_key(|&h| (OrderedFloat(horizon.price(h)), h))
    }

    /// Phase 2: speculatively run the cheapest hours while zone A stays
    /// under its ceiling everywhere.
    fn buffer_cheap_hours(
        &self,
        horizon: &Horizon<'_>,
        mut hours: Vec<HourPlan>,
        report: &mut OptimizationReport,
    ) -> Vec<HourPlan> {
        let cheap_count = (horizon.len() as f64 * self.limits.cheap_fraction).floor() as usize;
        let by_price = (0..horizon.len()).sorted_by_key(|&h| OrderedFloat(horizon.price(h)));

        for hour in by_price.take(cheap_count) {
            if hours[hour].action.is_pinned() || !hours[hour].action.is_rest() {
                continue;
            }
            if report.buffer_trials >= self.limits.max_iterations {
                break;
            }
            report.buffer_trials += 1;

            let mut candidate = hours.clone();
            candidate[hour] = HourPlan::run(self.limits.offset_step);
            let simulation = horizon.simulate(&candidate);
            if simulation.max_zone_a() <= self.comfort.max_zone_a {
                debug!(hour, "buffering heat in cheap hour");
                report.buffered_hours += 1;
                hours = candidate;
            }
        }
        hours
    }

    fn prune_score(&self, horizon: &Horizon<'_>, hours: &[HourPlan], hour: usize) -> f64 {
        let (before, after) = neighbours(hour);
        let isolated = !is_running(hours, before) && !is_running(hours, after);
        let factor = if isolated {
            self.limits.isolated_run_penalty
        } else {
            1.0
        };
        horizon.price(hour) * factor
    }

    /// Phase 3: remove or shrink RUN hours, most expensive first. A trial is
    /// kept only if it adds no comfort violation beyond those already present
    /// and does not raise the simulated cost.
    fn prune(
        &self,
        horizon: &Horizon<'_>,
        mut hours: Vec<HourPlan>,
        report: &mut OptimizationReport,
    ) -> Vec<HourPlan> {
        let baseline = horizon.simulate(&hours);
        let allowed = self.violations(horizon, &baseline);
        let mut current_cost = horizon.cost(&baseline);
        report.cost_before_pruning = current_cost;

        let mut ranked: Vec<(usize, f64)> = (0..hours.len())
            .filter(|&h| !hours[h].action.is_pinned() && hours[h].action.is_run())
            .map(|h| (h, self.prune_score(horizon, &hours, h)))
            .collect();
        ranked.sort_by_key(|&(_, score)| Reverse(OrderedFloat(score)));

        for (hour, _) in ranked.into_iter().take(self.limits.max_iterations) {
            report.prune_trials += 1;
            let original = hours[hour];

            let mut trials = vec![HourPlan::rest()];
            if original.offset > self.limits.offset_step {
                trials.push(HourPlan::run(self.limits.offset_step));
            }

            for trial in trials {
                let mut candidate = hours.clone();
                candidate[hour] = trial;
                let simulation = horizon.simulate(&candidate);
                let cost = horizon.cost(&simulation);
                if cost <= current_cost && self.violations(horizon, &simulation).is_subset(&allowed) {
                    if trial.action.is_run() {
                        report.lowered_offsets += 1;
                        debug!(hour, "lowering run offset");
                    } else {
                        report.pruned_hours += 1;
                        debug!(hour, "pruning run hour");
                    }
                    current_cost = cost;
                    hours = candidate;
                    break;
                }
            }
        }

        report.cost_after_pruning = current_cost;
        hours
    }

    /// Phase 4: hot water and ventilation modes by price rank.
    fn assign_modes(&self, horizon: &Horizon<'_>, hours: &mut [HourPlan]) {
        let boosted: BTreeSet<usize> = (0..hours.len())
            .sorted_by_key(|&h| OrderedFloat(horizon.price(h)))
            .take(self.limits.boost_hot_water_hours)
            .collect();
        let expensive = horizon.average_price * self.limits.expensive_ratio;

        for (hour, plan) in hours.iter_mut().enumerate() {
            let is_expensive = horizon.price(hour) > expensive;
            plan.hot_water = if boosted.contains(&hour) {
                HotWaterMode::Luxury
            } else if is_expensive {
                HotWaterMode::Economy
            } else {
                HotWaterMode::Normal
            };
            plan.ventilation = if is_expensive {
                VentilationMode::Reduced
            } else {
                VentilationMode::Normal
            };
        }
    }
}
