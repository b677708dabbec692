use ahash::AHashMap;
use arrow::array::{
    Array, ArrayData, ArrayRef, AsArray, Int64Array, UInt32Array, make_array, new_empty_array,
};
use arrow::compute::{CastOptions, cast_with_options, concat, concat_batches, take};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use arrow::row::{OwnedRow, RowConverter, SortField};

use crate::core::StrataError;

/// Concatenate `parts` in order.
///
/// Dictionary columns are re-encoded against one shared category list before
/// joining: the categories of the first part in their original order, then
/// categories only later parts know, in order of appearance. Dictionary keys
/// of the result therefore keep the category rank of the first part, which a
/// plain concat does not promise once dictionaries get merged.
pub fn concat_tables(parts: &[RecordBatch]) -> Result<RecordBatch, StrataError> {
    let Some(first) = parts.first() else {
        return Err(StrataError::InvalidArgument(
            "nothing to concatenate".into(),
        ));
    };
    if parts.len() == 1 {
        return Ok(first.clone());
    }

    let schema = first.schema();
    let mut columns: Vec<Vec<ArrayRef>> = parts.iter().map(|p| p.columns().to_vec()).collect();
    for (pos, field) in schema.fields().iter().enumerate() {
        let DataType::Dictionary(key_type, _) = field.data_type() else {
            continue;
        };
        let arrays: Vec<ArrayRef> = columns.iter().map(|c| c[pos].clone()).collect();
        for (part, array) in columns.iter_mut().zip(unify_dictionary(&arrays, key_type)?) {
            part[pos] = array;
        }
    }

    let parts = parts
        .iter()
        .zip(columns)
        .map(|(part, columns)| RecordBatch::try_new(part.schema(), columns))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &parts)?)
}

/// Rebuild every dictionary in `arrays` on one shared values array. All
/// outputs reference the very same values buffers, so concat keeps keys as
/// they are.
fn unify_dictionary(arrays: &[ArrayRef], key_type: &DataType) -> Result<Vec<ArrayRef>, StrataError> {
    let dicts = arrays
        .iter()
        .map(|a| {
            a.as_any_dictionary_opt().ok_or_else(|| {
                StrataError::SchemaError(format!(
                    "expected dictionary column, found {}",
                    a.data_type()
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let value_type = dicts[0].values().data_type().clone();
    let converter = RowConverter::new(vec![SortField::new(value_type.clone())])?;
    let mut positions: AHashMap<OwnedRow, usize> = AHashMap::new();
    let mut categories: Vec<ArrayRef> = Vec::new();
    let mut mappings: Vec<Vec<usize>> = Vec::with_capacity(dicts.len());

    for dict in &dicts {
        let values = dict.values();
        let rows = converter.convert_columns(std::slice::from_ref(values))?;
        let mut mapping = Vec::with_capacity(values.len());
        let mut unseen: Vec<u32> = Vec::new();
        for (idx, row) in rows.iter().enumerate() {
            let next = positions.len();
            let slot = *positions.entry(row.owned()).or_insert_with(|| {
                unseen.push(idx as u32);
                next
            });
            mapping.push(slot);
        }
        if !unseen.is_empty() {
            categories.push(take(values.as_ref(), &UInt32Array::from(unseen), None)?);
        }
        mappings.push(mapping);
    }

    let shared = match categories.len() {
        0 => new_empty_array(&value_type),
        1 => categories[0].clone(),
        _ => {
            let refs: Vec<&dyn Array> = categories.iter().map(|a| a.as_ref()).collect();
            concat(&refs)?
        }
    };
    let shared_data = shared.to_data();
    let data_type = DataType::Dictionary(Box::new(key_type.clone()), Box::new(value_type));
    let strict = CastOptions {
        safe: false,
        ..Default::default()
    };

    dicts
        .iter()
        .zip(mappings)
        .map(|(dict, mapping)| {
            let keys = dict.keys();
            let remapped: Int64Array = dict
                .normalized_keys()
                .iter()
                .enumerate()
                .map(|(row, key)| keys.is_valid(row).then(|| mapping[*key] as i64))
                .collect();
            // fails instead of nulling keys the key type cannot hold
            let remapped = cast_with_options(&remapped, key_type, &strict)?.to_data();
            let data = ArrayData::builder(data_type.clone())
                .len(remapped.len())
                .add_buffer(remapped.buffers()[0].clone())
                .nulls(remapped.nulls().cloned())
                .add_child_data(shared_data.clone())
                .build()?;
            Ok(make_array(data))
        })
        .collect()
}
