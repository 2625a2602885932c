#![cfg(feature = "db")]
//! PostgreSQL stores.
//!
//! Plans are versioned: every planning cycle inserts a new `plan_versions`
//! row with its entries and flips the `active_plan` pointer inside one
//! transaction, then drops older versions. Readers resolve the pointer and the
//! entries in a single statement, so they never observe an empty plan.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use super::{check_plan, BankStore, PlanStore, TuningStore};
use crate::domain::{BankAccount, BankMode, HourlyPlanEntry, Plan};
use crate::error::StoreError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS plan_versions (
    id UUID PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL,
    optimizer_version TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS plan_entries (
    plan_id UUID NOT NULL REFERENCES plan_versions(id) ON DELETE CASCADE,
    timestamp TIMESTAMPTZ NOT NULL,
    outdoor_temp DOUBLE PRECISION NOT NULL,
    wind_speed DOUBLE PRECISION NOT NULL,
    wind_direction DOUBLE PRECISION NOT NULL,
    cloud_cover DOUBLE PRECISION NOT NULL,
    solar_gain DOUBLE PRECISION NOT NULL,
    electricity_price DOUBLE PRECISION NOT NULL,
    planned_action TEXT NOT NULL,
    planned_offset DOUBLE PRECISION NOT NULL,
    planned_hot_water_mode TEXT NOT NULL,
    planned_ventilation_mode TEXT NOT NULL,
    simulated_zone_a_temp DOUBLE PRECISION NOT NULL,
    simulated_zone_b_temp DOUBLE PRECISION NOT NULL,
    predicted_supply_temp DOUBLE PRECISION NOT NULL,
    PRIMARY KEY (plan_id, timestamp)
);
CREATE TABLE IF NOT EXISTS active_plan (
    singleton BOOLEAN PRIMARY KEY DEFAULT TRUE CHECK (singleton),
    plan_id UUID NOT NULL REFERENCES plan_versions(id)
);
CREATE TABLE IF NOT EXISTS bank_account (
    singleton BOOLEAN PRIMARY KEY DEFAULT TRUE CHECK (singleton),
    balance DOUBLE PRECISION NOT NULL,
    mode TEXT NOT NULL,
    last_updated TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS tuning (
    key TEXT PRIMARY KEY,
    value DOUBLE PRECISION NOT NULL
);
"#;

pub struct PgRepo {
    pub pool: PgPool,
}

impl PgRepo {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(url)
            .await
            .context("failed to connect to database")?;
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .context("failed to apply schema")?;
        info!("database ready");
        Ok(Self { pool })
    }

    /// Insert configured tuning defaults without touching calibrated values.
    pub async fn seed_tuning(&self, values: &HashMap<String, f64>) -> Result<()> {
        for (key, value) in values {
            sqlx::query("INSERT INTO tuning (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING")
                .bind(key)
                .bind(value)
                .execute(&self.pool)
                .await
                .map_err(StoreError::from)?;
        }
        Ok(())
    }
}

fn parse_text<T: std::str::FromStr>(row: &sqlx::postgres::PgRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column).map_err(StoreError::from)?;
    raw.parse::<T>()
        .map_err(|_| anyhow::anyhow!("unexpected {column} value {raw:?}"))
}

#[async_trait]
impl PlanStore for PgRepo {
    async fn replace(&self, plan: Plan) -> Result<()> {
        check_plan(&plan)?;
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        sqlx::query("INSERT INTO plan_versions (id, created_at, optimizer_version) VALUES ($1, $2, $3)")
            .bind(plan.id)
            .bind(plan.created_at)
            .bind(&plan.optimizer_version)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;

        for e in &plan.entries {
            sqlx::query(
                r#"
                INSERT INTO plan_entries (
                    plan_id, timestamp, outdoor_temp, wind_speed, wind_direction, cloud_cover,
                    solar_gain, electricity_price, planned_action, planned_offset,
                    planned_hot_water_mode, planned_ventilation_mode,
                    simulated_zone_a_temp, simulated_zone_b_temp, predicted_supply_temp
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                "#,
            )
            .bind(plan.id)
            .bind(e.timestamp)
            .bind(e.outdoor_temp)
            .bind(e.wind_speed)
            .bind(e.wind_direction)
            .bind(e.cloud_cover)
            .bind(e.solar_gain)
            .bind(e.electricity_price)
            .bind(e.planned_action.to_string())
            .bind(e.planned_offset)
            .bind(e.planned_hot_water_mode.to_string())
            .bind(e.planned_ventilation_mode.to_string())
            .bind(e.simulated_zone_a_temp)
            .bind(e.simulated_zone_b_temp)
            .bind(e.predicted_supply_temp)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        }

        sqlx::query(
            "INSERT INTO active_plan (singleton, plan_id) VALUES (TRUE, $1)
             ON CONFLICT (singleton) DO UPDATE SET plan_id = EXCLUDED.plan_id",
        )
        .bind(plan.id)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        sqlx::query("DELETE FROM plan_versions WHERE id <> $1")
            .bind(plan.id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;

        tx.commit().await.map_err(StoreError::from)?;
        Ok(())
    }

    async fn current(&self) -> Result<Option<Plan>> {
        let rows = sqlx::query(
            r#"
            SELECT v.id, v.created_at, v.optimizer_version, e.*
            FROM active_plan a
            JOIN plan_versions v ON v.id = a.plan_id
            JOIN plan_entries e ON e.plan_id = v.id
            ORDER BY e.timestamp ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };
        let id: Uuid = first.try_get("id").map_err(StoreError::from)?;
        let created_at: DateTime<FixedOffset> =
            first.try_get("created_at").map_err(StoreError::from)?;
        let optimizer_version: String =
            first.try_get("optimizer_version").map_err(StoreError::from)?;

        let entries = rows
            .iter()
            .map(|row| {
                Ok(HourlyPlanEntry {
                    timestamp: row.try_get("timestamp").map_err(StoreError::from)?,
                    outdoor_temp: row.try_get("outdoor_temp").map_err(StoreError::from)?,
                    wind_speed: row.try_get("wind_speed").map_err(StoreError::from)?,
                    wind_direction: row.try_get("wind_direction").map_err(StoreError::from)?,
                    cloud_cover: row.try_get("cloud_cover").map_err(StoreError::from)?,
                    solar_gain: row.try_get("solar_gain").map_err(StoreError::from)?,
                    electricity_price: row.try_get("electricity_price").map_err(StoreError::from)?,
                    planned_action: parse_text(row, "planned_action")?,
                    planned_offset: row.try_get("planned_offset").map_err(StoreError::from)?,
                    planned_hot_water_mode: parse_text(row, "planned_hot_water_mode")?,
                    planned_ventilation_mode: parse_text(row, "planned_ventilation_mode")?,
                    simulated_zone_a_temp: row
                        .try_get("simulated_zone_a_temp")
                        .map_err(StoreError::from)?,
                    simulated_zone_b_temp: row
                        .try_get("simulated_zone_b_temp")
                        .map_err(StoreError::from)?,
                    predicted_supply_temp: row
                        .try_get("predicted_supply_temp")
                        .map_err(StoreError::from)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Plan {
            id,
            created_at,
            entries,
            optimizer_version,
        }))
    }
}

#[async_trait]
impl BankStore for PgRepo {
    async fn load(&self) -> Result<Option<BankAccount>> {
        let row = sqlx::query("SELECT balance, mode, last_updated FROM bank_account WHERE singleton")
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(BankAccount {
            balance: row.try_get("balance").map_err(StoreError::from)?,
            mode: parse_text::<BankMode>(&row, "mode")?,
            last_updated: row.try_get("last_updated").map_err(StoreError::from)?,
        }))
    }

    async fn save(&self, account: &BankAccount) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;
        sqlx::query(
            "INSERT INTO bank_account (singleton, balance, mode, last_updated) VALUES (TRUE, $1, $2, $3)
             ON CONFLICT (singleton) DO UPDATE
             SET balance = EXCLUDED.balance, mode = EXCLUDED.mode, last_updated = EXCLUDED.last_updated",
        )
        .bind(account.balance)
        .bind(account.mode.to_string())
        .bind(account.last_updated)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;
        tx.commit().await.map_err(StoreError::from)?;
        Ok(())
    }
}

#[async_trait]
impl TuningStore for PgRepo {
    async fn snapshot(&self) -> Result<HashMap<String, f64>> {
        let rows = sqlx::query("SELECT key, value FROM tuning")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;
        rows.iter()
            .map(|row| {
                let key: String = row.try_get("key").map_err(StoreError::from)?;
                let value: f64 = row.try_get("value").map_err(StoreError::from)?;
                Ok((key, value))
            })
            .collect()
    }

    async fn set(&self, key: &str, value: f64) -> Result<()> {
        sqlx::query(
            "INSERT INTO tuning (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }
}
