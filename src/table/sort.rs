use arrow::array::{Array, ArrayRef, AsArray, make_array};
use arrow::compute::SortOptions;
use arrow::record_batch::RecordBatch;
use arrow::row::{RowConverter, SortField};

use crate::core::StrataError;

use super::group::{key_columns, take_rows};

const ASCENDING_NULLS_LAST: SortOptions = SortOptions {
    descending: false,
    nulls_first: false,
};

/// Dictionary columns are ordered by their keys, i.e. by the position of
/// each category in the dictionary, not by the category values.
fn sort_key(array: &ArrayRef) -> ArrayRef {
    match array.as_any_dictionary_opt() {
        Some(dict) => make_array(dict.keys().to_data()),
        None => array.clone(),
    }
}

/// Stable ascending sort of `batch` by `columns`, nulls last.
pub fn sort_values_categorical(
    batch: &RecordBatch,
    columns: &[String],
) -> Result<RecordBatch, StrataError> {
    if columns.is_empty() || batch.num_rows() < 2 {
        // still validate the columns exist
        key_columns(batch, columns)?;
        return Ok(batch.clone());
    }

    let keys: Vec<ArrayRef> = key_columns(batch, columns)?.iter().map(sort_key).collect();
    let fields = keys
        .iter()
        .map(|a| SortField::new_with_options(a.data_type().clone(), ASCENDING_NULLS_LAST))
        .collect();
    let converter = RowConverter::new(fields)?;
    let rows = converter.convert_columns(&keys)?;

    let mut indices: Vec<u32> = (0..batch.num_rows() as u32).collect();
    indices.sort_by(|a, b| rows.row(*a as usize).cmp(&rows.row(*b as usize)));
    take_rows(batch, &indices)
}
