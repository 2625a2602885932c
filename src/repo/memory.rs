use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{check_plan, BankStore, PlanStore, TuningStore};
use crate::domain::{BankAccount, Plan};

/// Plan store that swaps a shared pointer, so a reader holds either the old
/// or the new plan in full.
#[derive(Default)]
pub struct MemoryPlanStore {
    current: RwLock<Option<Arc<Plan>>>,
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn replace(&self, plan: Plan) -> Result<()> {
        check_plan(&plan)?;
        *self.current.write().await = Some(Arc::new(plan));
        Ok(())
    }

    async fn current(&self) -> Result<Option<Plan>> {
        Ok(self.current.read().await.as_deref().cloned())
    }
}

#[derive(Default)]
pub struct MemoryBankStore {
    account: RwLock<Option<BankAccount>>,
}

#[async_trait]
impl BankStore for MemoryBankStore {
    async fn load(&self) -> Result<Option<BankAccount>> {
        Ok(self.account.read().await.clone())
    }

    async fn save(&self, account: &BankAccount) -> Result<()> {
        *self.account.write().await = Some(account.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTuningStore {
    values: RwLock<HashMap<String, f64>>,
}

impl MemoryTuningStore {
    pub fn new(values: HashMap<String, f64>) -> Self {
        Self {
            values: RwLock::new(values),
        }
    }
}

#[async_trait]
impl TuningStore for MemoryTuningStore {
    async fn snapshot(&self) -> Result<HashMap<String, f64>> {
        Ok(self.values.read().await.clone())
    }

    async fn set(&self, key: &str, value: f64) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HotWaterMode, HourlyPlanEntry, PlannedAction, VentilationMode};
    use chrono::{Duration, FixedOffset, TimeZone};

    fn plan(hours: i64, gap: bool) -> Plan {
        let start = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 0, 0, 0)
            .unwrap();
        let entries = (0..hours)
            .map(|h| {
                let h = if gap && h > 0 { h + 1 } else { h };
                HourlyPlanEntry {
                    timestamp: start + Duration::hours(h),
                    outdoor_temp: 0.0,
                    wind_speed: 0.0,
                    wind_direction: 0.0,
                    cloud_cover: 8.0,
                    solar_gain: 0.0,
                    electricity_price: 1.0,
                    planned_action: PlannedAction::Rest,
                    planned_offset: 0.0,
                    planned_hot_water_mode: HotWaterMode::Normal,
                    planned_ventilation_mode: VentilationMode::Normal,
                    simulated_zone_a_temp: 21.0,
                    simulated_zone_b_temp: 20.0,
                    predicted_supply_temp: 30.0,
                }
            })
            .collect();
        Plan::new(start, entries)
    }

    #[tokio::test]
    async fn test_replace_swaps_whole_plan() {
        let store = MemoryPlanStore::default();
        assert!(store.current().await.unwrap().is_none());

        let first = plan(25, false);
        let first_id = first.id;
        store.replace(first).await.unwrap();
        assert_eq!(store.current().await.unwrap().unwrap().id, first_id);

        let second = plan(26, false);
        let second_id = second.id;
        store.replace(second).await.unwrap();
        let current = store.current().await.unwrap().unwrap();
        assert_eq!(current.id, second_id);
        assert_eq!(current.entries.len(), 26);
    }

    #[tokio::test]
    async fn test_invalid_plan_keeps_previous() {
        let store = MemoryPlanStore::default();
        let good = plan(25, false);
        let good_id = good.id;
        store.replace(good).await.unwrap();

        assert!(store.replace(plan(25, true)).await.is_err());
        assert!(store.replace(plan(0, false)).await.is_err());
        assert_eq!(store.current().await.unwrap().unwrap().id, good_id);
    }

    #[tokio::test]
    async fn test_tuning_store_snapshot_is_a_copy() {
        let store = MemoryTuningStore::default();
        store.set("shunt_limit", 33.0).await.unwrap();
        let snapshot = store.snapshot().await.unwrap();
        store.set("shunt_limit", 40.0).await.unwrap();
        assert_eq!(snapshot["shunt_limit"], 33.0);
    }
}
