pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod hardware;
pub mod optimizer;
pub mod repo;
pub mod simulation;
pub mod telemetry;
