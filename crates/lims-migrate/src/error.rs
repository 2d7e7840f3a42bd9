//! Error types for the migration library.

use thiserror::Error;

/// Exit code for configuration and parse errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code when a database cannot be reached.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code for failed statements.
pub const EXIT_QUERY_ERROR: u8 = 3;
/// Exit code when a row value cannot be read.
pub const EXIT_SCAN_ERROR: u8 = 4;
/// Exit code when source and destination tables do not line up.
pub const EXIT_SCHEMA_MISMATCH: u8 = 5;
/// Exit code for key, foreign key and NOT NULL violations.
pub const EXIT_CONSTRAINT_ERROR: u8 = 6;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// MySQL server error codes reported as constraint violations.
const CONSTRAINT_ERROR_CODES: &[u16] = &[
    1048, // ER_BAD_NULL_ERROR
    1062, // ER_DUP_ENTRY
    1216, // ER_NO_REFERENCED_ROW
    1217, // ER_ROW_IS_REFERENCED
    1364, // ER_NO_DEFAULT_FOR_FIELD
    1451, // ER_ROW_IS_REFERENCED_2
    1452, // ER_NO_REFERENCED_ROW_2
    3819, // ER_CHECK_CONSTRAINT_VIOLATED
];

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid values, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database unreachable, handshake failed or connection lost
    #[error("Connection error while {context}: {source}")]
    Connection {
        context: String,
        source: mysql_async::Error,
    },

    /// Statement rejected by the server
    #[error("Query failed while {context}: {source}")]
    Query {
        context: String,
        source: mysql_async::Error,
    },

    /// A returned row could not be converted into the expected shape
    #[error("Scan failed while {context}: {message}")]
    Scan { context: String, message: String },

    /// Destination column count differs from the source result set
    #[error(
        "Schema mismatch for table {table}: source has {source_columns} columns, destination has {dest_columns}"
    )]
    SchemaMismatch {
        table: String,
        source_columns: usize,
        dest_columns: usize,
    },

    /// Duplicate key, foreign key or NOT NULL violation
    #[error("Constraint violation while {context}: {source}")]
    Constraint {
        context: String,
        source: mysql_async::Error,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Classify a driver error, attaching what was being done when it happened.
    pub fn from_mysql(err: mysql_async::Error, context: impl Into<String>) -> Self {
        let context = context.into();
        let constraint = matches!(
            &err,
            mysql_async::Error::Server(server) if CONSTRAINT_ERROR_CODES.contains(&server.code)
        );
        let rejected = matches!(
            &err,
            mysql_async::Error::Server(_) | mysql_async::Error::Other(_)
        );

        if constraint {
            MigrateError::Constraint {
                context,
                source: err,
            }
        } else if rejected {
            MigrateError::Query {
                context,
                source: err,
            }
        } else {
            // Driver, Io and Url errors: the connection itself is unusable.
            MigrateError::Connection {
                context,
                source: err,
            }
        }
    }

    /// Create a Scan error
    pub fn scan(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        MigrateError::Scan {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => {
                EXIT_CONFIG_ERROR
            }
            MigrateError::Connection { .. } => EXIT_CONNECTION_ERROR,
            MigrateError::Query { .. } => EXIT_QUERY_ERROR,
            MigrateError::Scan { .. } => EXIT_SCAN_ERROR,
            MigrateError::SchemaMismatch { .. } => EXIT_SCHEMA_MISMATCH,
            MigrateError::Constraint { .. } => EXIT_CONSTRAINT_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
