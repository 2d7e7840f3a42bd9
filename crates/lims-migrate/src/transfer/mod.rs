//! Single-table copy: full read from the source, one bulk insert into the
//! destination.
//!
//! Columns are mapped by position. The column list of the insert is taken
//! from the source result metadata, so the destination table must have the
//! same columns in the same order. Values are copied as raw text and never
//! converted.

use std::time::{Duration, Instant};

use mysql_async::prelude::*;
use mysql_async::{Row, TxOpts};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::identifier::{quote_mysql, quote_mysql_list};
use crate::core::value::RowBatch;
use crate::db::{list_columns, DbPool};
use crate::error::{MigrateError, Result};

/// MySQL max placeholders per prepared statement.
const MYSQL_MAX_PLACEHOLDERS: usize = 65535;

/// Options for a table copy.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Compare the destination column count with the source result before
    /// writing.
    pub verify_columns: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            verify_columns: true,
        }
    }
}

/// Outcome of one table copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyReport {
    /// Table read from.
    pub source_table: String,

    /// Table written to.
    pub dest_table: String,

    /// Rows read and inserted.
    pub rows: u64,

    /// Columns per row.
    pub columns: usize,

    /// Time spent reading the source table.
    #[serde(with = "millis")]
    pub read_time: Duration,

    /// Time spent inserting.
    #[serde(with = "millis")]
    pub write_time: Duration,
}

/// Copy every row of `source_table` into `dest_table`.
///
/// The whole table is held in memory. Rows are inserted with multi-row
/// `INSERT` statements inside one transaction, so the copy is observed as all
/// rows or none. An empty source table issues no insert and reports zero
/// rows. Existing destination rows are left alone: copying twice duplicates.
pub async fn copy_table(
    source: &DbPool,
    source_table: &str,
    dest: &DbPool,
    dest_table: &str,
    opts: &CopyOptions,
) -> Result<CopyReport> {
    let read_start = Instant::now();
    let batch = read_table(source, source_table).await?;
    let read_time = read_start.elapsed();

    let mut report = CopyReport {
        source_table: source_table.to_string(),
        dest_table: dest_table.to_string(),
        rows: batch.len() as u64,
        columns: batch.columns.len(),
        read_time,
        write_time: Duration::ZERO,
    };

    if batch.is_empty() {
        info!("Migrated table [{}]: 0 rows", source_table);
        return Ok(report);
    }

    if opts.verify_columns {
        verify_column_count(dest, dest_table, batch.columns.len()).await?;
    }

    let write_start = Instant::now();
    write_table(dest, dest_table, &batch).await?;
    report.write_time = write_start.elapsed();

    info!(
        "Migrated table [{}]: {} rows (read {:?}, write {:?})",
        source_table, report.rows, report.read_time, report.write_time
    );
    Ok(report)
}

/// Read a whole table with `SELECT *` into memory.
pub async fn read_table(source: &DbPool, table: &str) -> Result<RowBatch> {
    let sql = format!("SELECT * FROM {}", quote_mysql(table)?);
    let context = format!("reading {}", table);

    let mut conn = source.conn().await?;
    let mut result = conn
        .query_iter(sql)
        .await
        .map_err(|e| MigrateError::from_mysql(e, context.as_str()))?;

    let columns: Vec<String> = result
        .columns_ref()
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect();
    let mut batch = RowBatch::new(columns);

    let rows: Vec<Row> = result
        .collect()
        .await
        .map_err(|e| MigrateError::from_mysql(e, context.as_str()))?;

    for row in rows {
        if row.len() != batch.columns.len() {
            return Err(MigrateError::scan(
                context.as_str(),
                format!(
                    "row has {} values, result declares {} columns",
                    row.len(),
                    batch.columns.len()
                ),
            ));
        }
        // Row::unwrap hands over the owned values, it does not panic here.
        batch.push_row(row.unwrap());
    }

    debug!(
        "Read {} rows x {} columns from {}",
        batch.len(),
        batch.columns.len(),
        table
    );
    Ok(batch)
}

/// Insert a batch into `table` inside a single transaction.
pub async fn write_table(dest: &DbPool, table: &str, batch: &RowBatch) -> Result<u64> {
    if batch.is_empty() {
        return Ok(0);
    }

    let context = format!("inserting into {}", table);
    let per_statement = rows_per_statement(batch.columns.len());

    let mut conn = dest.conn().await?;
    let mut tx = conn
        .start_transaction(TxOpts::default())
        .await
        .map_err(|e| MigrateError::from_mysql(e, context.as_str()))?;

    for chunk in batch.rows.chunks(per_statement) {
        let sql = build_bulk_insert(table, &batch.columns, chunk.len())?;
        tx.exec_drop(sql, RowBatch::params(chunk))
            .await
            .map_err(|e| MigrateError::from_mysql(e, context.as_str()))?;
        debug!("{}: inserted {} rows", table, chunk.len());
    }

    tx.commit()
        .await
        .map_err(|e| MigrateError::from_mysql(e, context.as_str()))?;

    Ok(batch.len() as u64)
}

/// Fail when the destination table's column count differs from the source
/// result.
async fn verify_column_count(dest: &DbPool, table: &str, source_columns: usize) -> Result<()> {
    let dest_columns = list_columns(dest, dest.database(), table).await?;
    if dest_columns.len() != source_columns {
        return Err(MigrateError::SchemaMismatch {
            table: table.to_string(),
            source_columns,
            dest_columns: dest_columns.len(),
        });
    }
    Ok(())
}

/// Rows that fit in one statement without exceeding the placeholder limit.
pub fn rows_per_statement(num_cols: usize) -> usize {
    (MYSQL_MAX_PLACEHOLDERS / num_cols.max(1)).max(1)
}

/// Build `INSERT INTO t (cols) VALUES (?, ...), (?, ...)` for `row_count`
/// rows. Identifiers are quoted, values are left as placeholders.
pub fn build_bulk_insert(table: &str, columns: &[String], row_count: usize) -> Result<String> {
    if columns.is_empty() {
        return Err(MigrateError::scan(
            format!("inserting into {}", table),
            "result set has no columns",
        ));
    }

    let placeholders_per_row = format!("({})", vec!["?"; columns.len()].join(", "));
    let all_placeholders: Vec<String> = std::iter::repeat(placeholders_per_row)
        .take(row_count)
        .collect();

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_mysql(table)?,
        quote_mysql_list(columns)?,
        all_placeholders.join(", ")
    ))
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
