//! Destructive reset: empty every destination table before a fresh run.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::identifier::quote_mysql;
use crate::core::traits::SqlExecutor;
use crate::error::Result;

/// A table whose delete failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetFailure {
    pub table: String,
    pub error: String,
}

/// Outcome of a reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetReport {
    /// Tables emptied, in order.
    pub cleared: Vec<String>,
    /// Rows deleted across all tables.
    pub rows_deleted: u64,
    /// Tables that could not be emptied.
    pub failures: Vec<ResetFailure>,
}

impl ResetReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// `DELETE FROM` every table in order.
///
/// A failing table is logged and recorded, then the next table is attempted.
/// Only an invalid table name, caught before anything runs, is an error.
pub async fn reset_tables(dest: &dyn SqlExecutor, tables: &[String]) -> Result<ResetReport> {
    let statements = tables
        .iter()
        .map(|t| Ok((t, format!("DELETE FROM {}", quote_mysql(t)?))))
        .collect::<Result<Vec<_>>>()?;

    let mut report = ResetReport::default();
    for (table, sql) in statements {
        match dest.execute(&sql, Vec::new()).await {
            Ok(rows) => {
                info!("Cleared {} ({} rows)", table, rows);
                report.rows_deleted += rows;
                report.cleared.push(table.clone());
            }
            Err(e) => {
                warn!("Clearing {} failed: {}", table, e);
                report.failures.push(ResetFailure {
                    table: table.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "Reset finished: {} tables cleared, {} failed",
        report.cleared.len(),
        report.failures.len()
    );
    Ok(report)
}
