//! Statement execution seam shared by the maintenance jobs.
//!
//! [`SqlExecutor`] is implemented by [`crate::db::DbPool`]. The remap and
//! reset jobs only need "run this statement, tell me how many rows changed",
//! so they take the trait and can be exercised against a recording fake.

use async_trait::async_trait;
use mysql_async::Value;

use crate::error::Result;

/// Execute a statement and report affected rows.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute `sql` with positional `params` bound to its `?` placeholders.
    ///
    /// Each call is its own autocommit unit.
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64>;
}
