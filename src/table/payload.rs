use std::sync::{Arc, Once};

use arrow::array::{Array, ArrayRef, AsArray, LargeBinaryArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::warn;

use crate::conf::PayloadCodec;
use crate::core::StrataError;
use crate::io::serializer::{read_ipc_stream, write_ipc_stream};

use super::concat::concat_tables;
use super::group::{group_rows, key_columns, single_row_keys, take_rows};

/// Hidden column holding one IPC-encoded sub-table per carrier row.
pub const PAYLOAD_COLUMN: &str = "__strata_shuffle_payload";

static DISABLED_WARNING: Once = Once::new();

fn warn_disabled() {
    DISABLED_WARNING.call_once(|| {
        warn!("Shuffle payloads are not packed since the payload codec is disabled");
    });
}

/// Whether `batch` is a carrier table produced by [`pack_payload`].
pub fn is_packed(batch: &RecordBatch) -> bool {
    batch.schema().index_of(PAYLOAD_COLUMN).is_ok()
}

/// Collapse `batch` into one row per distinct `group_key` value. Each carrier
/// row keeps the key values and the whole sub-table for that key as a blob,
/// so the shuffle only ever moves key columns plus one binary column.
///
/// With the codec disabled this returns `batch` unchanged.
pub fn pack_payload(
    batch: &RecordBatch,
    group_key: &[String],
    codec: PayloadCodec,
) -> Result<RecordBatch, StrataError> {
    if codec == PayloadCodec::Disabled {
        warn_disabled();
        return Ok(batch.clone());
    }
    if group_key.is_empty() {
        return Err(StrataError::InvalidArgument(
            "payload packing needs at least one key column".into(),
        ));
    }

    let groups = group_rows(batch, group_key)?;
    let mut blobs = Vec::with_capacity(groups.len());
    for indices in &groups {
        let sub = take_rows(batch, indices)?;
        blobs.push(write_ipc_stream(&sub)?);
    }

    let schema = batch.schema();
    let mut fields = Vec::with_capacity(group_key.len() + 1);
    for name in group_key {
        fields.push(schema.field_with_name(name)?.clone());
    }
    fields.push(Field::new(PAYLOAD_COLUMN, DataType::LargeBinary, false));

    let mut columns = if groups.is_empty() {
        key_columns(batch, group_key)?
    } else {
        single_row_keys(batch, group_key, &groups)?
    };
    let payload: ArrayRef = Arc::new(LargeBinaryArray::from_iter_values(blobs));
    columns.push(payload);

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Inverse of [`pack_payload`]: decode every blob and concatenate the
/// sub-tables in carrier row order, dictionary columns on shared categories.
/// Tables without a payload column pass through untouched.
pub fn unpack_payload(batch: RecordBatch, codec: PayloadCodec) -> Result<RecordBatch, StrataError> {
    if codec == PayloadCodec::Disabled {
        warn_disabled();
        return Ok(batch);
    }
    let schema = batch.schema();
    let Ok(pos) = schema.index_of(PAYLOAD_COLUMN) else {
        return Ok(batch);
    };

    let payload = batch.column(pos).as_binary_opt::<i64>().ok_or_else(|| {
        StrataError::PayloadError(format!(
            "column '{}' is not large binary",
            PAYLOAD_COLUMN
        ))
    })?;

    if payload.is_empty() {
        let keep: Vec<usize> = (0..batch.num_columns()).filter(|i| *i != pos).collect();
        return Ok(batch.project(&keep)?);
    }

    let mut parts = Vec::with_capacity(payload.len());
    for row in 0..payload.len() {
        if payload.is_null(row) {
            return Err(StrataError::PayloadError(format!(
                "null payload in carrier row {}",
                row
            )));
        }
        let part = read_ipc_stream(payload.value(row)).map_err(|e| {
            StrataError::PayloadError(format!("decoding carrier row {}: {}", row, e))
        })?;
        parts.push(part);
    }
    concat_tables(&parts)
}
