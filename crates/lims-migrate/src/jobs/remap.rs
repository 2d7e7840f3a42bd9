//! Flow id remapping: point flow bindings and orders that reference retired
//! flows at their replacement.

use mysql_async::Value;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::{
    FLOW_BIND_DATA_FLOW_COLUMN, FLOW_BIND_DATA_TABLE, ORDER_FLOW_COLUMN, ORDER_TABLE,
};
use crate::core::identifier::quote_mysql;
use crate::core::traits::SqlExecutor;
use crate::error::Result;

/// Rows changed per table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemapReport {
    pub new_id: i64,
    pub old_ids: Vec<i64>,
    /// Rows updated in `lims_flow_bind_data`.
    pub flow_bind_data_rows: u64,
    /// Rows updated in `lims_order`.
    pub order_rows: u64,
}

/// Rewrite the flow id of every row referencing one of `old_ids` to `new_id`,
/// first in `lims_flow_bind_data`, then in `lims_order`.
///
/// Each old id gets its own placeholder in the `IN` list. An empty `old_ids`
/// changes nothing. A failed update is returned immediately; the first table
/// stays updated if the second one fails.
pub async fn remap_flow_id(
    dest: &dyn SqlExecutor,
    new_id: i64,
    old_ids: &[i64],
) -> Result<RemapReport> {
    let mut report = RemapReport {
        new_id,
        old_ids: old_ids.to_vec(),
        ..RemapReport::default()
    };

    if old_ids.is_empty() {
        info!("No old flow ids given, nothing to remap");
        return Ok(report);
    }

    let sql = build_remap_update(FLOW_BIND_DATA_TABLE, FLOW_BIND_DATA_FLOW_COLUMN, old_ids.len())?;
    report.flow_bind_data_rows = dest.execute(&sql, remap_params(new_id, old_ids)).await?;

    let sql = build_remap_update(ORDER_TABLE, ORDER_FLOW_COLUMN, old_ids.len())?;
    report.order_rows = dest.execute(&sql, remap_params(new_id, old_ids)).await?;

    info!(
        "Remapped flow ids {:?} -> {}: {} flow bind data rows, {} orders",
        old_ids, new_id, report.flow_bind_data_rows, report.order_rows
    );
    Ok(report)
}

/// `UPDATE t SET col = ? WHERE col IN (?, ?, ...)` with one placeholder per
/// old id.
pub fn build_remap_update(table: &str, column: &str, old_id_count: usize) -> Result<String> {
    let column = quote_mysql(column)?;
    let placeholders = vec!["?"; old_id_count.max(1)].join(", ");
    Ok(format!(
        "UPDATE {} SET {} = ? WHERE {} IN ({})",
        quote_mysql(table)?,
        column,
        column,
        placeholders
    ))
}

fn remap_params(new_id: i64, old_ids: &[i64]) -> Vec<Value> {
    std::iter::once(new_id)
        .chain(old_ids.iter().copied())
        .map(Value::from)
        .collect()
}
