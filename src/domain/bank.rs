use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the balance was derived on the last tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BankMode {
    /// Balance was taken directly from the device counter.
    Syncing,
    /// Balance was advanced by the device delta since the last tick.
    Active,
}

/// The virtual degree-minute account. There is exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    pub balance: f64,
    pub mode: BankMode,
    pub last_updated: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BankLimits {
    pub min_balance: f64,
    pub max_balance: f64,
}

impl BankLimits {
    pub fn clamp(&self, balance: f64) -> f64 {
        if balance.is_nan() {
            return self.max_balance.min(0.0).max(self.min_balance);
        }
        balance.clamp(self.min_balance, self.max_balance)
    }

    pub fn contains(&self, balance: f64) -> bool {
        balance >= self.min_balance && balance <= self.max_balance
    }
}

impl Default for BankLimits {
    fn default() -> Self {
        Self {
            min_balance: -2000.0,
            max_balance: 600.0,
        }
    }
}

/// One observability sample appended per committed tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankSample {
    pub timestamp: DateTime<FixedOffset>,
    pub balance: f64,
    pub device_dm: f64,
    pub written_dm: Option<f64>,
    pub mode: BankMode,
}
