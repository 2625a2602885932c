use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::domain::{BankAccount, Plan};

pub mod memory;
#[cfg(feature = "db")]
pub mod pg;

pub use memory::{MemoryBankStore, MemoryPlanStore, MemoryTuningStore};

/// Holds the committed plan. `replace` must be atomic: readers see either
/// the previous plan or the new one, never a partial or empty plan.
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn replace(&self, plan: Plan) -> Result<()>;
    async fn current(&self) -> Result<Option<Plan>>;
}

/// Holds the singleton bank account row.
#[async_trait]
pub trait BankStore: Send + Sync {
    async fn load(&self) -> Result<Option<BankAccount>>;
    async fn save(&self, account: &BankAccount) -> Result<()>;
}

/// Key/value coefficient store, written only by the calibration job.
#[async_trait]
pub trait TuningStore: Send + Sync {
    async fn snapshot(&self) -> Result<HashMap<String, f64>>;
    async fn set(&self, key: &str, value: f64) -> Result<()>;
}

pub struct Repositories {
    pub plans: Arc<dyn PlanStore>,
    pub bank: Arc<dyn BankStore>,
    pub tuning: Arc<dyn TuningStore>,
}

impl Repositories {
    pub async fn new(cfg: &Config) -> Result<Self> {
        #[cfg(feature = "db")]
        {
            let repo = Arc::new(pg::PgRepo::connect(&cfg.db.url).await?);
            repo.seed_tuning(&cfg.tuning).await?;
            return Ok(Self {
                plans: repo.clone(),
                bank: repo.clone(),
                tuning: repo,
            });
        }

        #[cfg(not(feature = "db"))]
        {
            return Ok(Self::in_memory(cfg.tuning.clone()));
        }
    }

    pub fn in_memory(tuning: HashMap<String, f64>) -> Self {
        Self {
            plans: Arc::new(MemoryPlanStore::default()),
            bank: Arc::new(MemoryBankStore::default()),
            tuning: Arc::new(MemoryTuningStore::new(tuning)),
        }
    }
}

/// Reject plans that would break the hourly, gap free invariant.
pub(crate) fn check_plan(plan: &Plan) -> Result<(), crate::error::StoreError> {
    use crate::error::StoreError;
    if plan.entries.is_empty() {
        return Err(StoreError::InvalidPlan("plan has no entries".to_string()));
    }
    if !plan.is_contiguous() {
        return Err(StoreError::InvalidPlan(format!(
            "plan {} is not hourly contiguous",
            plan.id
        )));
    }
    Ok(())
}
