//! Migration parameters and mode normalization.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;

impl GranuleMigrationParams {
    /// Parse parameters from a JSON payload.
    pub fn from_json(json: &str) -> Result<Self> {
        let params: GranuleMigrationParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Validate the parameters, returning the normalized mode.
    pub fn validate(&self) -> Result<MigrationMode> {
        validation::validate(self)
    }
}
