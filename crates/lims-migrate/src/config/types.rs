//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings for both databases.
    pub database: DatabaseConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// The `database` section: one group per side of the migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Source database rows are read from.
    pub old: DbConfig,

    /// Destination database rows are written to.
    pub new: DbConfig,
}

/// Connection settings for one MySQL database.
#[derive(Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub db: String,

    /// Username.
    pub username: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Connection character set (default: "utf8").
    ///
    /// MySQL's `utf8` is the 3-byte utf8mb3: 4-byte characters (emoji, rare
    /// CJK) are replaced or rejected on copy. Use `utf8mb4` when the data
    /// may contain them.
    #[serde(default = "default_charset")]
    pub charset: String,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("charset", &self.charset)
            .finish()
    }
}

impl DbConfig {
    /// Connection target in `host:port/db` form.
    pub fn address(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.db)
    }

    /// DSN in the `user:password@tcp(host:port)/db?charset=...` form, with the
    /// password masked. Only meant for log output.
    pub fn dsn(&self) -> String {
        format!(
            "{}:***@tcp({}:{})/{}?charset={}",
            self.username, self.host, self.port, self.db, self.charset
        )
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Prefix prepended to every name in `tables` (default: "lims_").
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    /// Tables copied by `migrate`, without prefix, in copy order.
    #[serde(default = "catalog::default_migrate_tables")]
    pub tables: Vec<String>,

    /// Fully qualified tables cleared by `reset`, in delete order.
    #[serde(default = "catalog::default_reset_tables")]
    pub reset_tables: Vec<String>,

    /// Compare destination column count with the source before inserting
    /// (default: true).
    #[serde(default = "default_true")]
    pub verify_columns: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            table_prefix: default_table_prefix(),
            tables: catalog::default_migrate_tables(),
            reset_tables: catalog::default_reset_tables(),
            verify_columns: true,
        }
    }
}

impl MigrationConfig {
    /// Fully qualified names of the tables copied by `migrate`.
    pub fn qualified_tables(&self) -> Vec<String> {
        self.tables
            .iter()
            .map(|t| format!("{}{}", self.table_prefix, t))
            .collect()
    }
}

// Default value functions for serde
fn default_mysql_port() -> u16 {
    3306
}

fn default_charset() -> String {
    "utf8".to_string()
}

fn default_table_prefix() -> String {
    catalog::TABLE_PREFIX.to_string()
}

fn default_true() -> bool {
    true
}
