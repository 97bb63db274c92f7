//! Parameter validation and mode normalization.

use super::{GranuleMigrationParams, MigrationMode};
use crate::error::{MigrateError, Result};

/// Parse a "true"/"false" flag string, case-insensitively.
///
/// Unset flags default to false. Any other value is a configuration error,
/// raised before the run starts rather than silently treated as false.
fn parse_flag(name: &str, value: Option<&str>) -> Result<bool> {
    match value {
        None => Ok(false),
        Some(s) => match s.to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(MigrateError::Config(format!(
                "{} must be \"true\" or \"false\", got \"{}\"",
                name, other
            ))),
        },
    }
}

/// Validate the parameters and normalize the flag pair into a [`MigrationMode`].
pub fn validate(params: &GranuleMigrationParams) -> Result<MigrationMode> {
    let overwrite = parse_flag("migrateAndOverwrite", params.migrate_and_overwrite.as_deref())?;
    let files_only = parse_flag("migrateOnlyFiles", params.migrate_only_files.as_deref())?;

    if overwrite && files_only {
        return Err(MigrateError::Config(
            "migrateAndOverwrite and migrateOnlyFiles cannot both be set".into(),
        ));
    }

    if let Some(0) = params.logging_interval {
        return Err(MigrateError::Config(
            "loggingInterval must be at least 1".into(),
        ));
    }
    if let Some(0) = params.write_concurrency {
        return Err(MigrateError::Config(
            "writeConcurrency must be at least 1".into(),
        ));
    }
    if let Some(0) = params.parallel_scan_segments {
        return Err(MigrateError::Config(
            "parallelScanSegments must be at least 1".into(),
        ));
    }

    if overwrite {
        Ok(MigrationMode::Overwrite)
    } else if files_only {
        Ok(MigrationMode::FilesOnly)
    } else {
        Ok(MigrationMode::Migrate)
    }
}
