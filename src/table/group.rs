use ahash::AHashMap;
use arrow::array::{ArrayRef, UInt32Array};
use arrow::compute::{take, take_record_batch};
use arrow::record_batch::RecordBatch;
use arrow::row::{RowConverter, SortField};

use crate::core::StrataError;

/// Resolve `columns` by name, failing on the first missing one.
pub fn key_columns(batch: &RecordBatch, columns: &[String]) -> Result<Vec<ArrayRef>, StrataError> {
    columns
        .iter()
        .map(|name| {
            batch.column_by_name(name).cloned().ok_or_else(|| {
                StrataError::SchemaError(format!("column '{}' not found in table", name))
            })
        })
        .collect()
}

/// Split row indices of `batch` into groups of equal key values.
///
/// Groups come out in order of first appearance and are never empty. Keys
/// compare by logical value, so two dictionary arrays with different
/// encodings of the same strings group together.
pub fn group_rows(batch: &RecordBatch, columns: &[String]) -> Result<Vec<Vec<u32>>, StrataError> {
    let num_rows = batch.num_rows();
    if num_rows == 0 {
        return Ok(Vec::new());
    }
    if columns.is_empty() {
        return Ok(vec![(0..num_rows as u32).collect()]);
    }

    let arrays = key_columns(batch, columns)?;
    let fields = arrays
        .iter()
        .map(|a| SortField::new(a.data_type().clone()))
        .collect();
    let converter = RowConverter::new(fields)?;
    let rows = converter.convert_columns(&arrays)?;

    let mut positions = AHashMap::new();
    let mut groups: Vec<Vec<u32>> = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        let slot = *positions.entry(row).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(idx as u32);
    }
    Ok(groups)
}

/// Gather the given rows into a new batch.
pub fn take_rows(batch: &RecordBatch, indices: &[u32]) -> Result<RecordBatch, StrataError> {
    let indices = UInt32Array::from(indices.to_vec());
    Ok(take_record_batch(batch, &indices)?)
}

/// Remove `name` from `batch` if present.
pub fn drop_column(batch: RecordBatch, name: &str) -> Result<RecordBatch, StrataError> {
    match batch.schema().index_of(name) {
        Ok(pos) => {
            let keep: Vec<usize> = (0..batch.num_columns()).filter(|i| *i != pos).collect();
            Ok(batch.project(&keep)?)
        }
        Err(_) => Ok(batch),
    }
}

/// Remove all of `names` present in `batch`.
pub fn drop_columns(batch: RecordBatch, names: &[String]) -> Result<RecordBatch, StrataError> {
    let schema = batch.schema();
    let keep: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !names.contains(f.name()))
        .map(|(i, _)| i)
        .collect();
    if keep.len() == batch.num_columns() {
        return Ok(batch);
    }
    Ok(batch.project(&keep)?)
}

pub(crate) fn single_row_keys(
    batch: &RecordBatch,
    columns: &[String],
    groups: &[Vec<u32>],
) -> Result<Vec<ArrayRef>, StrataError> {
    let firsts = UInt32Array::from(groups.iter().map(|g| g[0]).collect::<Vec<_>>());
    key_columns(batch, columns)?
        .iter()
        .map(|array| take(array.as_ref(), &firsts, None).map_err(StrataError::from))
        .collect()
}
