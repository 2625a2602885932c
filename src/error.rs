use thiserror::Error;

/// Reasons a planning cycle is abandoned. The previous plan stays in force.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("Planning input unavailable: {0}")]
    InputUnavailable(String),
    #[error("Sensor {parameter} could not be read: {reason}")]
    Sensor { parameter: String, reason: String },
}

/// Reasons a controller tick is abandoned before it commits.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Device communication error: {0}")]
    DeviceCommunication(String),
    #[error("Device point {0} missing from telemetry")]
    MissingPoint(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Failures of the plan, bank and tuning stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Rejected plan: {0}")]
    InvalidPlan(String),
    #[cfg(feature = "db")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
