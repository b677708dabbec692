use std::collections::{BTreeMap, BTreeSet};

use arrow::array::Array;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use serde::{Deserialize, Serialize};

use crate::core::StrataError;

/// Render every value of `array` as a string, `None` for nulls.
pub fn value_strings(array: &dyn Array) -> Result<Vec<Option<String>>, StrataError> {
    let options = FormatOptions::default();
    let formatter = ArrayFormatter::try_new(array, &options)?;
    Ok((0..array.len())
        .map(|i| {
            if array.is_null(i) {
                None
            } else {
                Some(formatter.value(i).to_string())
            }
        })
        .collect())
}

/// Inverted index fragment: column value -> labels of the physical
/// partitions holding rows with that value. Nulls are not indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryIndex {
    pub column: String,
    pub entries: BTreeMap<String, BTreeSet<String>>,
}

impl SecondaryIndex {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Index all non-null values of `array` under `label`.
    pub fn add_array(&mut self, array: &dyn Array, label: &str) -> Result<(), StrataError> {
        for value in value_strings(array)?.into_iter().flatten() {
            self.add(value, label);
        }
        Ok(())
    }

    pub fn add(&mut self, value: impl Into<String>, label: &str) {
        self.entries
            .entry(value.into())
            .or_default()
            .insert(label.to_string());
    }

    pub fn merge(&mut self, other: SecondaryIndex) -> Result<(), StrataError> {
        if other.column != self.column {
            return Err(StrataError::SchemaError(format!(
                "cannot merge index on '{}' into index on '{}'",
                other.column, self.column
            )));
        }
        for (value, labels) in other.entries {
            self.entries.entry(value).or_default().extend(labels);
        }
        Ok(())
    }

    pub fn labels(&self, value: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
