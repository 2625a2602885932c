#![cfg(feature = "sim")]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use heatpump_planner::config::ControllerConfig;
use heatpump_planner::controller::{DegreeMinuteBankController, RuntimeState};
use heatpump_planner::domain::{
    BankAccount, BankLimits, BankMode, HotWaterMode, HourlyPlanEntry, Plan, PlannedAction,
    VentilationMode,
};
use heatpump_planner::error::ControllerError;
use heatpump_planner::hardware::{PointIds, SimulatedHeatPump};
use heatpump_planner::repo::{BankStore, MemoryBankStore, MemoryPlanStore, PlanStore};
use proptest::prelude::*;
use std::sync::Arc;

fn now() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(3600)
        .unwrap()
        .with_ymd_and_hms(2024, 1, 10, 8, 15, 0)
        .unwrap()
}

fn plan(action: PlannedAction, hot_water: HotWaterMode) -> Plan {
    let start = now() - Duration::minutes(15);
    let entries = (0..24)
        .map(|h| HourlyPlanEntry {
            timestamp: start + Duration::hours(h),
            outdoor_temp: -3.0,
            wind_speed: 2.0,
            wind_direction: 180.0,
            cloud_cover: 6.0,
            solar_gain: 0.0,
            electricity_price: 1.2,
            planned_action: action,
            planned_offset: if action.is_run() { 1.0 } else { 0.0 },
            planned_hot_water_mode: hot_water,
            planned_ventilation_mode: VentilationMode::Normal,
            simulated_zone_a_temp: 21.0,
            simulated_zone_b_temp: 20.3,
            predicted_supply_temp: 45.0,
        })
        .collect();
    Plan::new(start, entries)
}

struct Rig {
    pump: Arc<SimulatedHeatPump>,
    bank: Arc<MemoryBankStore>,
    controller: DegreeMinuteBankController,
    ids: PointIds,
}

/// Controller whose last tick wrote `last_written` and left `balance` in the bank.
async fn rig(action: PlannedAction, last_written: f64, balance: f64) -> Rig {
    let ids = PointIds::default();
    let pump = Arc::new(SimulatedHeatPump::new(ids.clone()));
    let plans = Arc::new(MemoryPlanStore::default());
    plans.replace(plan(action, HotWaterMode::Normal)).await.unwrap();
    let bank = Arc::new(MemoryBankStore::default());
    bank.save(&BankAccount {
        balance,
        mode: BankMode::Active,
        last_updated: now() - Duration::minutes(1),
    })
    .await
    .unwrap();

    let controller = DegreeMinuteBankController::new(
        ControllerConfig::default(),
        ids.clone(),
        pump.clone(),
        plans,
        bank.clone(),
    );
    controller.restore_runtime(RuntimeState {
        last_written_dm: Some(last_written),
        dm_baseline: Some(last_written),
        last_hot_water: Some(HotWaterMode::Normal),
        last_ventilation: Some(VentilationMode::Normal),
    });
    Rig {
        pump,
        bank,
        controller,
        ids,
    }
}

#[tokio::test]
async fn test_small_delta_accumulates_into_balance() {
    let rig = rig(PlannedAction::Hold, -150.0, -150.0).await;
    rig.pump.force_point(&rig.ids.degree_minutes, -155.0);

    let outcome = rig.controller.tick(now()).await.unwrap();

    assert_eq!(outcome.mode, BankMode::Active);
    assert_eq!(outcome.balance, -155.0);
    let stored = rig.bank.load().await.unwrap().unwrap();
    assert_eq!(stored.balance, -155.0);
    assert_eq!(stored.mode, BankMode::Active);
    assert_eq!(stored.last_updated, now());
}

#[tokio::test]
async fn test_implausible_jump_resyncs_to_device() {
    let rig = rig(PlannedAction::Hold, -150.0, -150.0).await;
    rig.pump.force_point(&rig.ids.degree_minutes, 400.0);

    let outcome = rig.controller.tick(now()).await.unwrap();

    assert_eq!(outcome.mode, BankMode::Syncing);
    assert_eq!(outcome.balance, 400.0);
    assert_eq!(rig.controller.runtime().last_written_dm, Some(400.0));
    assert_eq!(rig.bank.load().await.unwrap().unwrap().balance, 400.0);
}

#[tokio::test]
async fn test_cold_hot_water_overrides_rest_plan() {
    let rig = rig(PlannedAction::Rest, -150.0, -150.0).await;
    rig.pump.force_point(&rig.ids.degree_minutes, -152.0);
    rig.pump.force_point(&rig.ids.hot_water_temp, 38.0);

    let outcome = rig.controller.tick(now()).await.unwrap();

    assert!(outcome.hot_water_forced);
    assert_eq!(outcome.hot_water, HotWaterMode::Luxury);
    assert_eq!(
        rig.pump.point(&rig.ids.hot_water_mode),
        Some(HotWaterMode::Luxury.device_value())
    );
    // REST still parks the demand signal.
    assert_eq!(outcome.written_dm, Some(100.0));
    assert_eq!(rig.pump.point(&rig.ids.degree_minutes), Some(100.0));
}

#[tokio::test]
async fn test_run_hour_calls_for_heat_and_unchanged_demand_is_not_rewritten() {
    let rig = rig(PlannedAction::Run, -150.0, -150.0).await;
    rig.pump.force_point(&rig.ids.degree_minutes, -150.0);

    let first = rig.controller.tick(now()).await.unwrap();
    assert_eq!(first.written_dm, Some(-400.0));

    // The device reports the written value back with a little drift.
    rig.pump.force_point(&rig.ids.degree_minutes, -402.0);
    let second = rig
        .controller
        .tick(now() + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(second.balance, -152.0);
    assert_eq!(second.target_dm, -400.0);
    assert_eq!(second.written_dm, None);
    assert_eq!(rig.controller.history().len(), 2);
}

#[tokio::test]
async fn test_drift_under_rest_hysteresis_resyncs_against_last_written() {
    let rig = rig(PlannedAction::Rest, 100.0, 0.0).await;

    rig.pump.force_point(&rig.ids.degree_minutes, 60.0);
    let first = rig.controller.tick(now()).await.unwrap();
    assert_eq!(first.mode, BankMode::Active);
    assert_eq!(first.balance, -40.0);
    assert_eq!(first.written_dm, None);

    rig.pump.force_point(&rig.ids.degree_minutes, 20.0);
    let second = rig
        .controller
        .tick(now() + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(second.mode, BankMode::Active);
    assert_eq!(second.balance, -80.0);
    assert_eq!(second.written_dm, None);
    assert_eq!(rig.controller.runtime().last_written_dm, Some(100.0));

    // 120 away from the parked value although each step moved only 40.
    rig.pump.force_point(&rig.ids.degree_minutes, -20.0);
    let third = rig
        .controller
        .tick(now() + Duration::minutes(2))
        .await
        .unwrap();
    assert_eq!(third.mode, BankMode::Syncing);
    assert_eq!(third.balance, -20.0);
    assert_eq!(third.written_dm, Some(100.0));
    assert_eq!(rig.bank.load().await.unwrap().unwrap().balance, -20.0);
}

struct BrokenBankStore {
    inner: MemoryBankStore,
}

#[async_trait]
impl BankStore for BrokenBankStore {
    async fn load(&self) -> Result<Option<BankAccount>> {
        self.inner.load().await
    }

    async fn save(&self, _account: &BankAccount) -> Result<()> {
        anyhow::bail!("connection reset")
    }
}

#[tokio::test]
async fn test_persistence_failure_rolls_back_runtime_state() {
    let ids = PointIds::default();
    let pump = Arc::new(SimulatedHeatPump::new(ids.clone()));
    pump.force_point(&ids.degree_minutes, -30.0);
    let plans = Arc::new(MemoryPlanStore::default());
    plans
        .replace(plan(PlannedAction::Run, HotWaterMode::Normal))
        .await
        .unwrap();
    let bank = Arc::new(BrokenBankStore {
        inner: MemoryBankStore::default(),
    });

    let controller = DegreeMinuteBankController::new(
        ControllerConfig::default(),
        ids,
        pump,
        plans,
        bank.clone(),
    );
    let err = controller.tick(now()).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ControllerError>(),
        Some(ControllerError::Persistence(_))
    ));
    assert_eq!(controller.runtime(), RuntimeState::default());
    assert!(controller.history().is_empty());
    assert_eq!(bank.load().await.unwrap(), None);
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_balance_stays_within_limits(
        readings in prop::collection::vec(-3000.0f64..3000.0, 1..12),
        action in prop::sample::select(vec![
            PlannedAction::Run,
            PlannedAction::Rest,
            PlannedAction::Hold,
            PlannedAction::Normal,
        ]),
    ) {
        let limits = BankLimits::default();
        block_on(async {
            let rig = rig(action, -150.0, -150.0).await;
            for (minute, dm) in readings.iter().enumerate() {
                rig.pump.force_point(&rig.ids.degree_minutes, *dm);
                let outcome = rig
                    .controller
                    .tick(now() + Duration::minutes(minute as i64))
                    .await
                    .unwrap();
                assert!(limits.contains(outcome.balance), "balance {}", outcome.balance);
            }
        });
    }

    #[test]
    fn prop_resync_takes_device_value(
        last_written in -1500.0f64..500.0,
        jump in 100.5f64..1500.0,
        upward in any::<bool>(),
    ) {
        let device_dm = if upward { last_written + jump } else { last_written - jump };
        prop_assume!((-2000.0..=600.0).contains(&device_dm));

        let balance = block_on(async {
            let rig = rig(PlannedAction::Normal, last_written, last_written).await;
            rig.pump.force_point(&rig.ids.degree_minutes, device_dm);
            rig.controller.tick(now()).await.unwrap().balance
        });
        prop_assert_eq!(balance, device_dm);
    }
}
