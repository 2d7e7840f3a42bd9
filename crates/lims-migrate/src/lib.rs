//! # lims-migrate
//!
//! One-shot data migration between two MySQL databases holding the LIMS
//! schema.
//!
//! Each run performs one operation:
//!
//! - **Table copy** of a fixed table list, full read plus bulk insert, columns
//!   mapped by position
//! - **Order enrichment**: denormalize user, lab and equipment details onto
//!   orders
//! - **Flow id remap** across flow bindings and orders
//! - **Reset** of every destination table
//!
//! ## Example
//!
//! ```rust,no_run
//! use lims_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lims_migrate::MigrateError> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.migrate_tables().await?;
//!     println!("Migrated {} rows", result.rows_transferred);
//!     orchestrator.close().await
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod jobs;
pub mod orchestrator;
pub mod transfer;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, DbConfig, MigrationConfig};
pub use db::DbPool;
pub use error::{MigrateError, Result};
pub use jobs::{EnrichReport, RemapReport, ResetReport};
pub use orchestrator::{HealthCheckResult, MigrationResult, Orchestrator, Side};
pub use transfer::{copy_table, CopyOptions, CopyReport};
