//! Configuration validation.

use super::{Config, DbConfig};
use crate::core::identifier::validate_identifier;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_db("database.old", &config.database.old)?;
    validate_db("database.new", &config.database.new)?;

    // Cannot migrate into the database we read from
    let old = &config.database.old;
    let new = &config.database.new;
    if old.host == new.host && old.port == new.port && old.db == new.db {
        return Err(MigrateError::Config(
            "database.old and database.new cannot be the same database".into(),
        ));
    }

    let migration = &config.migration;
    if migration.tables.is_empty() {
        return Err(MigrateError::Config(
            "migration.tables must list at least one table".into(),
        ));
    }
    for table in migration.qualified_tables() {
        validate_identifier(&table)
            .map_err(|e| MigrateError::Config(format!("migration.tables: {}", e)))?;
    }
    for table in &migration.reset_tables {
        validate_identifier(table)
            .map_err(|e| MigrateError::Config(format!("migration.reset_tables: {}", e)))?;
    }

    Ok(())
}

fn validate_db(section: &str, db: &DbConfig) -> Result<()> {
    if db.host.is_empty() {
        return Err(MigrateError::Config(format!("{}.host is required", section)));
    }
    if db.port == 0 {
        return Err(MigrateError::Config(format!(
            "{}.port must be a valid TCP port",
            section
        )));
    }
    if db.db.is_empty() {
        return Err(MigrateError::Config(format!("{}.db is required", section)));
    }
    if db.username.is_empty() {
        return Err(MigrateError::Config(format!(
            "{}.username is required",
            section
        )));
    }
    if db.charset.is_empty() || !db.charset.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(MigrateError::Config(format!(
            "{}.charset must be a MySQL character set name, got '{}'",
            section, db.charset
        )));
    }
    Ok(())
}
