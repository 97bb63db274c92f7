//! Source-to-target record translation.

use crate::error::Result;
use crate::source::{DateValue, SourceFileRecord, SourceGranuleRecord};
use crate::target::{TargetFileRecord, TargetGranuleRecord};

/// Surrogate ids resolved for a granule's foreign-key references.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolvedRefs {
    pub collection_cumulus_id: i64,
    pub provider_cumulus_id: Option<i64>,
    pub pdr_cumulus_id: Option<i64>,
    pub execution_cumulus_id: Option<i64>,
}

fn to_datetime(value: &Option<DateValue>) -> Option<chrono::DateTime<chrono::Utc>> {
    value.as_ref().and_then(DateValue::to_datetime)
}

/// Map a source granule onto the relational row shape.
///
/// Absent source fields become NULL columns; nothing here can fail, since
/// the record passed boundary validation.
pub fn translate_granule(
    record: &SourceGranuleRecord,
    refs: &ResolvedRefs,
) -> TargetGranuleRecord {
    TargetGranuleRecord {
        granule_id: record.granule_id.clone(),
        status: record.status.clone(),
        collection_cumulus_id: refs.collection_cumulus_id,
        provider_cumulus_id: refs.provider_cumulus_id,
        pdr_cumulus_id: refs.pdr_cumulus_id,
        execution_cumulus_id: refs.execution_cumulus_id,
        published: record.published,
        duration: record.duration,
        time_to_archive: record.time_to_archive,
        time_to_process: record.time_to_process,
        product_volume: record.product_volume.as_ref().map(|v| v.to_text()),
        error: record.error.clone(),
        query_fields: record.query_fields.clone(),
        cmr_link: record.cmr_link.clone(),
        beginning_date_time: to_datetime(&record.beginning_date_time),
        ending_date_time: to_datetime(&record.ending_date_time),
        last_update_date_time: to_datetime(&record.last_update_date_time),
        processing_start_date_time: to_datetime(&record.processing_start_date_time),
        processing_end_date_time: to_datetime(&record.processing_end_date_time),
        production_date_time: to_datetime(&record.production_date_time),
        timestamp: to_datetime(&record.timestamp),
        created_at: record.created_at_datetime(),
        updated_at: record.updated_at_datetime(),
    }
}

/// Map one embedded source file onto the relational row shape.
pub fn translate_file(file: &SourceFileRecord) -> Result<TargetFileRecord> {
    let (bucket, key) = file.bucket_and_key()?;
    Ok(TargetFileRecord {
        bucket,
        key,
        file_size: file.size,
        file_name: file.file_name.clone(),
        checksum_value: file.checksum.clone(),
        checksum_type: file.checksum_type.clone(),
        source: file.source.clone(),
        path: file.path.clone(),
        file_type: file.file_type.clone(),
    })
}
