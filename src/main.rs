use anyhow::Result;
use heatpump_planner::{config, controller, repo, telemetry};
use config::Config;
use telemetry::init_tracing;
use tracing::{info, warn};

// Both loops run as cooperative tasks on this one thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cfg = Config::load()?;
    init_tracing(&cfg.logging);

    let repos = repo::Repositories::new(&cfg).await?;
    let deps = collaborators(&cfg)?;
    let state = controller::AppState::new(cfg.clone(), repos, deps)?;

    info!(
        horizon_hours = cfg.planner.horizon_hours,
        tick_seconds = cfg.controller.tick_seconds,
        timezone = %cfg.planner.timezone,
        "starting heat pump planner"
    );
    controller::spawn_loops(&state);

    telemetry::shutdown_signal().await;
    warn!("shutdown complete");
    Ok(())
}

#[cfg(feature = "sim")]
fn collaborators(cfg: &Config) -> Result<controller::Collaborators> {
    use heatpump_planner::forecast::{SyntheticPriceProvider, SyntheticWeatherProvider};
    use heatpump_planner::hardware::SimulatedHeatPump;
    use std::sync::Arc;

    warn!("running against the simulated heat pump and synthetic forecasts");
    let pump = Arc::new(SimulatedHeatPump::new(cfg.device.points.clone()));
    Ok(controller::Collaborators {
        device: pump.clone(),
        sensors: pump,
        weather: Arc::new(SyntheticWeatherProvider::default()),
        prices: Arc::new(SyntheticPriceProvider::new(cfg.planner.tz()?)),
    })
}

#[cfg(not(feature = "sim"))]
fn collaborators(_cfg: &Config) -> Result<controller::Collaborators> {
    anyhow::bail!("no device client available: build with the `sim` feature or embed the library")
}
