//! Column metadata from `information_schema`.

use mysql_async::prelude::*;
use mysql_async::Row;

use super::DbPool;
use crate::error::{MigrateError, Result};

// CAST to CHAR to handle collation differences between server versions
const TABLE_COLUMNS_SQL: &str = r#"
    SELECT CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME
    FROM information_schema.COLUMNS
    WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION ASC
"#;

/// List a table's column names in physical (ordinal) order.
///
/// A table that does not exist yields an empty list.
pub async fn list_columns(pool: &DbPool, db_name: &str, table: &str) -> Result<Vec<String>> {
    let context = format!("listing columns of {}.{}", db_name, table);

    let mut conn = pool.conn().await?;
    let rows: Vec<Row> = conn
        .exec(TABLE_COLUMNS_SQL, (db_name, table))
        .await
        .map_err(|e| MigrateError::from_mysql(e, context.as_str()))?;

    rows.into_iter()
        .map(|row| {
            mysql_async::from_row_opt::<(String,)>(row)
                .map(|(name,)| name)
                .map_err(|e| MigrateError::scan(context.as_str(), e))
        })
        .collect()
}
