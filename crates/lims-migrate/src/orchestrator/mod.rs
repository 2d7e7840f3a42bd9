//! Migration orchestrator - owns both connections and runs one operation.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::{Config, DbConfig};
use crate::db::{list_columns, DbPool};
use crate::error::Result;
use crate::jobs::{self, EnrichReport, MysqlOrderStore, RemapReport, ResetReport};
use crate::transfer::{copy_table, CopyOptions, CopyReport};

/// Which database an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Source database.
    Old,
    /// Destination database.
    New,
}

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    source: DbPool,
    target: DbPool,
}

/// Result of a batch table migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Tables copied.
    pub tables_total: usize,

    /// Total rows transferred.
    pub rows_transferred: u64,

    /// Per-table results, in copy order.
    pub tables: Vec<CopyReport>,
}

impl MigrationResult {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Connectivity of both databases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
    pub healthy: bool,
}

impl Orchestrator {
    /// Connect to both databases. Either connection failing is an error.
    pub async fn new(config: Config) -> Result<Self> {
        let source = DbPool::connect(&config.database.old, "old").await?;
        let target = DbPool::connect(&config.database.new, "new").await?;
        Ok(Self {
            config,
            source,
            target,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Source (old) database pool.
    pub fn source_pool(&self) -> &DbPool {
        &self.source
    }

    /// Destination (new) database pool.
    pub fn target_pool(&self) -> &DbPool {
        &self.target
    }

    fn copy_options(&self) -> CopyOptions {
        CopyOptions {
            verify_columns: self.config.migration.verify_columns,
        }
    }

    /// Copy every configured table, in order, from old to new.
    ///
    /// Stops at the first failing table. Tables copied before it stay
    /// committed; tables after it are not attempted.
    pub async fn migrate_tables(&self) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let tables = self.config.migration.qualified_tables();
        let opts = self.copy_options();

        info!("Migrating {} tables", tables.len());

        let mut reports = Vec::with_capacity(tables.len());
        for (i, table) in tables.iter().enumerate() {
            info!("[{}/{}] {}", i + 1, tables.len(), table);
            match copy_table(&self.source, table, &self.target, table, &opts).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!(
                        "Migration stopped at {}: {} of {} tables already committed",
                        table,
                        reports.len(),
                        tables.len()
                    );
                    return Err(e);
                }
            }
        }

        let rows_transferred = reports.iter().map(|r| r.rows).sum();
        let result = MigrationResult {
            started_at,
            completed_at: Utc::now(),
            duration_seconds: start.elapsed().as_secs_f64(),
            tables_total: reports.len(),
            rows_transferred,
            tables: reports,
        };

        info!(
            "Old data migrated: {} tables, {} rows in {:.2}s",
            result.tables_total, result.rows_transferred, result.duration_seconds
        );
        Ok(result)
    }

    /// Copy a single table from old to new.
    pub async fn copy_one(&self, source_table: &str, dest_table: &str) -> Result<CopyReport> {
        copy_table(
            &self.source,
            source_table,
            &self.target,
            dest_table,
            &self.copy_options(),
        )
        .await
    }

    /// Fill the denormalized columns of `lims_order` in the new database.
    pub async fn enrich_orders(&self) -> Result<EnrichReport> {
        let store = MysqlOrderStore::new(self.target.clone());
        jobs::enrich_orders(&store).await
    }

    /// Replace retired flow ids in the new database.
    pub async fn remap_flow_id(&self, new_id: i64, old_ids: &[i64]) -> Result<RemapReport> {
        jobs::remap_flow_id(&self.target, new_id, old_ids).await
    }

    /// Empty every configured reset table in the new database.
    pub async fn reset(&self) -> Result<ResetReport> {
        jobs::reset_tables(&self.target, &self.config.migration.reset_tables).await
    }

    /// Column names of `table` on one side, in ordinal order.
    pub async fn columns(&self, side: Side, table: &str) -> Result<Vec<String>> {
        let pool = match side {
            Side::Old => &self.source,
            Side::New => &self.target,
        };
        list_columns(pool, pool.database(), table).await
    }

    /// Disconnect both pools.
    pub async fn close(self) -> Result<()> {
        self.source.close().await?;
        self.target.close().await
    }

    /// Try both connections and report instead of failing.
    pub async fn health_check(config: &Config) -> HealthCheckResult {
        let (source_connected, source_latency_ms, source_error) =
            probe(&config.database.old, "old").await;
        let (target_connected, target_latency_ms, target_error) =
            probe(&config.database.new, "new").await;

        HealthCheckResult {
            source_connected,
            source_latency_ms,
            source_error,
            target_connected,
            target_latency_ms,
            target_error,
            healthy: source_connected && target_connected,
        }
    }
}

async fn probe(config: &DbConfig, label: &str) -> (bool, u64, Option<String>) {
    let pool = match DbPool::connect(config, label).await {
        Ok(pool) => pool,
        Err(e) => return (false, 0, Some(e.to_string())),
    };
    let result = match pool.ping().await {
        Ok(latency) => (true, latency.as_millis() as u64, None),
        Err(e) => (false, 0, Some(e.to_string())),
    };
    // Best effort: the probe already has its answer.
    let _ = pool.close().await;
    result
}
