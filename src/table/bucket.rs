use std::sync::Arc;

use ahash::RandomState;
use arrow::array::{ArrayRef, UInt8Array, UInt16Array, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::row::{RowConverter, SortField};

use crate::core::StrataError;

use super::group::key_columns;

/// Hidden column carrying the bucket id between bucketing and storage.
pub const BUCKET_COLUMN: &str = "__strata_hash_bucket";

// Fixed seeds keep bucket ids stable across processes and runs.
fn hash_state() -> RandomState {
    RandomState::with_seeds(0, 0, 0, 0)
}

#[inline]
fn combine_hashes(l: u64, r: u64) -> u64 {
    let hash = (17u64 * 37u64).wrapping_add(l);
    hash.wrapping_mul(37).wrapping_add(r)
}

/// Smallest unsigned type out of u8/u16/u32/u64 whose range covers
/// `[0, num_buckets)` with `2^width > num_buckets`.
pub fn bucket_data_type(num_buckets: u64) -> DataType {
    if num_buckets < 1 << 8 {
        DataType::UInt8
    } else if num_buckets < 1 << 16 {
        DataType::UInt16
    } else if num_buckets < 1 << 32 {
        DataType::UInt32
    } else {
        DataType::UInt64
    }
}

/// One hash per row over `arrays`. Each column is row-encoded on its own so
/// the hash depends on logical values only, then combined left to right.
pub fn hash_rows(arrays: &[ArrayRef], num_rows: usize) -> Result<Vec<u64>, StrataError> {
    let state = hash_state();
    let mut hashes = vec![0u64; num_rows];
    for (pos, array) in arrays.iter().enumerate() {
        let converter = RowConverter::new(vec![SortField::new(array.data_type().clone())])?;
        let rows = converter.convert_columns(std::slice::from_ref(array))?;
        for (hash, row) in hashes.iter_mut().zip(rows.iter()) {
            let h = state.hash_one(row.as_ref());
            *hash = if pos == 0 { h } else { combine_hashes(*hash, h) };
        }
    }
    Ok(hashes)
}

/// Append [`BUCKET_COLUMN`] to `batch`, assigning every row to one of
/// `num_buckets` buckets based on the values of `subset` (all columns when
/// `None`).
pub fn hash_bucket(
    batch: &RecordBatch,
    subset: Option<&[String]>,
    num_buckets: u64,
) -> Result<RecordBatch, StrataError> {
    if num_buckets == 0 {
        return Err(StrataError::InvalidArgument(
            "num_buckets must be a positive integer".into(),
        ));
    }
    let schema = batch.schema();
    if schema.index_of(BUCKET_COLUMN).is_ok() {
        return Err(StrataError::InvalidArgument(format!(
            "table already contains reserved column '{}'",
            BUCKET_COLUMN
        )));
    }

    let arrays = match subset {
        Some([]) => {
            return Err(StrataError::InvalidArgument(
                "bucketing needs at least one column".into(),
            ));
        }
        Some(columns) => key_columns(batch, columns)?,
        None => batch.columns().to_vec(),
    };
    let hashes = hash_rows(&arrays, batch.num_rows())?;
    let buckets = hashes.into_iter().map(|h| h % num_buckets);

    let data_type = bucket_data_type(num_buckets);
    let bucket_array: ArrayRef = match data_type {
        DataType::UInt8 => Arc::new(UInt8Array::from_iter_values(buckets.map(|b| b as u8))),
        DataType::UInt16 => Arc::new(UInt16Array::from_iter_values(buckets.map(|b| b as u16))),
        DataType::UInt32 => Arc::new(UInt32Array::from_iter_values(buckets.map(|b| b as u32))),
        _ => Arc::new(UInt64Array::from_iter_values(buckets)),
    };

    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(Field::new(BUCKET_COLUMN, data_type, false));
    let mut columns = batch.columns().to_vec();
    columns.push(bucket_array);

    let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}
