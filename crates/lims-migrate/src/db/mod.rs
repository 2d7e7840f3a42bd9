//! MySQL connection management.
//!
//! One [`DbPool`] is opened per side of the migration at startup and handed
//! to every operation. Connecting is eager: the pool checks out a connection
//! and runs `SELECT 1` so bad credentials surface before any work starts.

pub mod introspect;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, Value};
use tracing::{debug, info};

use crate::config::DbConfig;
use crate::core::traits::SqlExecutor;
use crate::error::{MigrateError, Result};

pub use introspect::list_columns;

/// Work is sequential; a couple of spare connections cover the copier's
/// read result being open while the destination is queried.
const MAX_CONNECTIONS: usize = 4;

/// Connection pool for one database.
#[derive(Clone)]
pub struct DbPool {
    pool: Pool,
    label: String,
    database: String,
    dsn: String,
}

impl DbPool {
    /// Open a pool for `config` and verify it with a round trip.
    ///
    /// `label` names the side ("old"/"new") in logs and errors.
    pub async fn connect(config: &DbConfig, label: &str) -> Result<Self> {
        let constraints = PoolConstraints::new(1, MAX_CONNECTIONS).unwrap_or_default();
        let pool_opts = PoolOpts::new().with_constraints(constraints);

        let opts: Opts = OptsBuilder::default()
            .ip_or_hostname(config.host.as_str())
            .tcp_port(config.port)
            .db_name(Some(config.db.as_str()))
            .user(Some(config.username.as_str()))
            .pass(Some(config.password.as_str()))
            .init(vec![format!("SET NAMES {}", config.charset)])
            .pool_opts(pool_opts)
            .into();

        let db = Self {
            pool: Pool::new(opts),
            label: label.to_string(),
            database: config.db.clone(),
            dsn: config.dsn(),
        };

        db.ping().await?;

        info!("Connected to {} database: {}", db.label, db.dsn);
        Ok(db)
    }

    /// Side of the migration this pool serves ("old" or "new").
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Name of the database (schema) the pool connects to.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Password-masked DSN, for logs.
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Check out a connection.
    pub async fn conn(&self) -> Result<Conn> {
        self.pool.get_conn().await.map_err(|e| {
            MigrateError::from_mysql(e, format!("getting {} database connection", self.label))
        })
    }

    /// Run `SELECT 1` and return the round-trip time.
    pub async fn ping(&self) -> Result<Duration> {
        let start = Instant::now();
        let mut conn = self.conn().await?;
        conn.query_drop("SELECT 1").await.map_err(|e| {
            MigrateError::from_mysql(e, format!("testing {} database connection", self.label))
        })?;
        Ok(start.elapsed())
    }

    /// Disconnect every pooled connection.
    pub async fn close(self) -> Result<()> {
        let label = self.label;
        self.pool.disconnect().await.map_err(|e| {
            MigrateError::from_mysql(e, format!("closing {} database pool", label))
        })?;
        debug!("Closed {} database pool", label);
        Ok(())
    }
}

#[async_trait]
impl SqlExecutor for DbPool {
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64> {
        let mut conn = self.conn().await?;
        debug!("{}: {}", self.label, sql);

        let result = if params.is_empty() {
            conn.query_drop(sql).await
        } else {
            conn.exec_drop(sql, params).await
        };
        result.map_err(|e| MigrateError::from_mysql(e, format!("executing `{}`", sql)))?;

        Ok(conn.affected_rows())
    }
}
