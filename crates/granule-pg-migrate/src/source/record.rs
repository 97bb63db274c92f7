//! Typed source records, validated once at the scanner boundary.
//!
//! Items arrive from the source store as loosely-typed JSON. They are
//! deserialized and checked here so that malformed input is quarantined at
//! the edge instead of surfacing deep inside the write path.

use crate::error::{MigrateError, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// Datetime value accepted as epoch millis or as an RFC 3339/2822 string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DateValue {
    Millis(i64),
    Text(String),
}

impl DateValue {
    /// Best-effort conversion; unparseable values become `None` (a NULL
    /// column) rather than failing the record.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            DateValue::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            DateValue::Text(s) => DateTime::parse_from_rfc3339(s)
                .or_else(|_| DateTime::parse_from_rfc2822(s))
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// Numeric value that some records carry as a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    pub fn to_text(&self) -> String {
        match self {
            NumberOrString::Number(n) => n.to_string(),
            NumberOrString::Text(s) => s.clone(),
        }
    }
}

/// One file embedded in a source granule record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFileRecord {
    #[serde(default)]
    pub bucket: Option<String>,

    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub file_name: Option<String>,

    /// Legacy `s3://bucket/key` URI; used when `bucket`/`key` are absent.
    #[serde(default)]
    pub filename: Option<String>,

    #[serde(default)]
    pub size: Option<i64>,

    #[serde(default)]
    pub checksum: Option<String>,

    #[serde(default)]
    pub checksum_type: Option<String>,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub path: Option<String>,

    #[serde(default, rename = "type")]
    pub file_type: Option<String>,
}

impl SourceFileRecord {
    /// Resolve the file's natural key, deriving it from a legacy s3 URI
    /// when the explicit fields are absent.
    pub fn bucket_and_key(&self) -> Result<(String, String)> {
        if let (Some(bucket), Some(key)) = (&self.bucket, &self.key) {
            return Ok((bucket.clone(), key.clone()));
        }

        if let Some(uri) = &self.filename {
            if let Some(rest) = uri.strip_prefix("s3://") {
                if let Some((bucket, key)) = rest.split_once('/') {
                    if !bucket.is_empty() && !key.is_empty() {
                        return Ok((bucket.to_string(), key.to_string()));
                    }
                }
            }
        }

        Err(MigrateError::InvalidRecord(format!(
            "file has no resolvable bucket/key (fileName: {:?})",
            self.file_name
        )))
    }
}

/// One granule record from the source store.
///
/// Unknown fields are ignored. `granuleId`, `collectionId`, `status`,
/// `createdAt`, and `updatedAt` are required; everything else is nullable.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceGranuleRecord {
    pub granule_id: String,

    /// Composite `name___version` collection reference.
    pub collection_id: String,

    pub status: String,

    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default)]
    pub pdr_name: Option<String>,

    /// Execution reference (URL); linkage is best-effort.
    #[serde(default)]
    pub execution: Option<String>,

    #[serde(default)]
    pub published: Option<bool>,

    #[serde(default)]
    pub duration: Option<f64>,

    #[serde(default)]
    pub time_to_archive: Option<f64>,

    #[serde(default, rename = "timeToPreprocess")]
    pub time_to_process: Option<f64>,

    #[serde(default)]
    pub product_volume: Option<NumberOrString>,

    #[serde(default)]
    pub cmr_link: Option<String>,

    #[serde(default)]
    pub error: Option<serde_json::Value>,

    #[serde(default)]
    pub query_fields: Option<serde_json::Value>,

    #[serde(default)]
    pub beginning_date_time: Option<DateValue>,

    #[serde(default)]
    pub ending_date_time: Option<DateValue>,

    #[serde(default)]
    pub last_update_date_time: Option<DateValue>,

    #[serde(default)]
    pub processing_start_date_time: Option<DateValue>,

    #[serde(default)]
    pub processing_end_date_time: Option<DateValue>,

    #[serde(default)]
    pub production_date_time: Option<DateValue>,

    #[serde(default)]
    pub timestamp: Option<DateValue>,

    /// Epoch millis.
    pub created_at: i64,

    /// Epoch millis; drives skip-if-not-newer conflict resolution.
    pub updated_at: i64,

    /// `None` and `[]` are equivalent: the granule has no files, and a
    /// re-migration reconciles previously written file rows away.
    #[serde(default)]
    pub files: Option<Vec<SourceFileRecord>>,
}

impl SourceGranuleRecord {
    /// Validate one raw source item into a typed record.
    pub fn from_item(item: serde_json::Value) -> Result<Self> {
        let record: SourceGranuleRecord = serde_json::from_value(item)
            .map_err(|e| MigrateError::InvalidRecord(e.to_string()))?;

        if Utc.timestamp_millis_opt(record.created_at).single().is_none()
            || Utc.timestamp_millis_opt(record.updated_at).single().is_none()
        {
            return Err(MigrateError::InvalidRecord(format!(
                "granule {} has out-of-range createdAt/updatedAt",
                record.granule_id
            )));
        }

        for file in record.files() {
            file.bucket_and_key()?;
        }

        Ok(record)
    }

    pub fn files(&self) -> &[SourceFileRecord] {
        self.files.as_deref().unwrap_or(&[])
    }

    pub fn file_count(&self) -> usize {
        self.files().len()
    }

    /// Split the composite collection reference into `(name, version)`.
    pub fn collection_name_version(&self) -> Result<(&str, &str)> {
        self.collection_id
            .split_once("___")
            .filter(|(name, version)| !name.is_empty() && !version.is_empty())
            .ok_or_else(|| {
                MigrateError::InvalidRecord(format!(
                    "granule {} has malformed collectionId \"{}\"",
                    self.granule_id, self.collection_id
                ))
            })
    }

    pub fn created_at_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.created_at)
            .single()
            .unwrap_or_default()
    }

    pub fn updated_at_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.updated_at)
            .single()
            .unwrap_or_default()
    }
}
