//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid mode combination, bad parameter values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The target row is same-age-or-newer; the record is skipped, not failed.
    #[error("Granule {granule_id} was already migrated, skipping")]
    AlreadyMigrated { granule_id: String },

    /// A required foreign-key row does not exist in the target store.
    #[error("RecordDoesNotExist: no {table} record found for {key}")]
    MissingDependency { table: String, key: String },

    /// Files-only mode found no granule row to attach files to.
    #[error("RecordDoesNotExist: granule {granule_id} has no migrated record to sync files against")]
    GranuleNotFound { granule_id: String },

    /// The granule upsert affected zero rows.
    #[error("Granule upsert for {granule_id} returned no rows")]
    UpsertRejected { granule_id: String },

    /// A source item failed boundary validation.
    #[error("Invalid source record: {0}")]
    InvalidRecord(String),

    /// Source store scan or query error.
    #[error("Source store error: {0}")]
    Source(String),

    /// Target database connection or query error.
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error.
    #[error("Pool error: {0}")]
    Pool(String),

    /// IO error (error artifact persistence).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Format error with full details including error chain.
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
