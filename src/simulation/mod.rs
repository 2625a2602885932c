//! # Thermal Simulation
//!
//! Lumped two-zone model of the house used by the optimizer as a pure,
//! deterministic oracle.
//!
//! ```rust
//! use heatpump_planner::simulation::{ThermalSimulationEngine, HourStep};
//! use heatpump_planner::domain::{PlannedAction, TuningParameters, ZoneTemps};
//!
//! let engine = ThermalSimulationEngine::new(TuningParameters::default());
//! let steps = [HourStep::new(PlannedAction::Run, 1.0)];
//! # let _ = (engine, steps);
//! ```

pub mod thermal;

pub use thermal::{
    heating_curve, solar_factor, HourStep, SimulatedHour, Simulation, ThermalSimulationEngine,
};
