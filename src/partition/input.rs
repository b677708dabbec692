use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::core::StrataError;
use crate::table::{BUCKET_COLUMN, PAYLOAD_COLUMN};

use super::meta::MetaPartition;

/// Raw input of one update chunk.
#[derive(Debug, Clone)]
pub enum UpdateInput {
    Batch(RecordBatch),
    /// Tables keyed by table name, with an optional partition label.
    Tables {
        label: Option<String>,
        tables: HashMap<String, RecordBatch>,
    },
    Empty,
}

impl UpdateInput {
    /// The table named `table_name` in this input, if any.
    pub fn into_batch(self, table_name: &str) -> Result<Option<RecordBatch>, StrataError> {
        let mp = parse_input_to_metapartition(self, table_name)?;
        Ok(mp.partitions.into_iter().next().and_then(|p| p.data))
    }
}

impl From<RecordBatch> for UpdateInput {
    fn from(batch: RecordBatch) -> Self {
        UpdateInput::Batch(batch)
    }
}

/// Read a local Parquet file as one input chunk.
pub fn read_parquet_input(path: impl AsRef<Path>) -> Result<UpdateInput, StrataError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| StrataError::IoError(format!("opening {}: {}", path.display(), e)))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let batches = builder.build()?.collect::<Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;
    if batch.num_rows() == 0 {
        return Ok(UpdateInput::Empty);
    }
    Ok(UpdateInput::Batch(batch))
}

/// Fail if `batch` uses one of the hidden column names.
pub fn check_reserved_columns(batch: &RecordBatch) -> Result<(), StrataError> {
    for name in [BUCKET_COLUMN, PAYLOAD_COLUMN] {
        if batch.schema().index_of(name).is_ok() {
            return Err(StrataError::InvalidArgument(format!(
                "input contains reserved column '{}'",
                name
            )));
        }
    }
    Ok(())
}

pub fn parse_input_to_metapartition(
    input: UpdateInput,
    table_name: &str,
) -> Result<MetaPartition, StrataError> {
    match input {
        UpdateInput::Empty => Ok(MetaPartition::empty(table_name)),
        UpdateInput::Batch(batch) => {
            check_reserved_columns(&batch)?;
            Ok(MetaPartition::from_batch(table_name, None, batch))
        }
        UpdateInput::Tables { label, mut tables } => {
            if let Some(other) = tables.keys().find(|name| name.as_str() != table_name) {
                return Err(StrataError::InvalidArgument(format!(
                    "input contains table '{}' but the dataset table is '{}'",
                    other, table_name
                )));
            }
            match tables.remove(table_name) {
                Some(batch) => {
                    check_reserved_columns(&batch)?;
                    Ok(MetaPartition::from_batch(table_name, label, batch))
                }
                None => Ok(MetaPartition::empty(table_name)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn batch(column: &str) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new(column, DataType::Int64, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2]))]).unwrap()
    }

    #[test]
    fn test_parse_batch() {
        let mp = parse_input_to_metapartition(batch("value").into(), "t").unwrap();
        assert_eq!(mp.table_name, "t");
        assert_eq!(mp.num_rows(), 2);
    }

    #[test]
    fn test_parse_tables_with_label() {
        let input = UpdateInput::Tables {
            label: Some("part-1".into()),
            tables: HashMap::from([("t".to_string(), batch("value"))]),
        };
        let mp = parse_input_to_metapartition(input, "t").unwrap();
        assert_eq!(mp.partitions[0].label, "part-1");
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_input_to_metapartition(UpdateInput::Empty, "t").unwrap().is_empty());
        let input = UpdateInput::Tables {
            label: None,
            tables: HashMap::new(),
        };
        assert!(parse_input_to_metapartition(input, "t").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_foreign_table() {
        let input = UpdateInput::Tables {
            label: None,
            tables: HashMap::from([("other".to_string(), batch("value"))]),
        };
        let err = parse_input_to_metapartition(input, "t").unwrap_err();
        assert!(matches!(err, StrataError::InvalidArgument(_)));
    }

    #[test]
    fn test_read_parquet_input() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("chunk.parquet");
        let mut writer =
            parquet::arrow::ArrowWriter::try_new(File::create(&path).unwrap(), batch("v").schema(), None)
                .unwrap();
        writer.write(&batch("v")).unwrap();
        writer.close().unwrap();

        match read_parquet_input(&path).unwrap() {
            UpdateInput::Batch(b) => assert_eq!(b, batch("v")),
            other => panic!("unexpected input {:?}", other),
        }
        assert!(read_parquet_input(dir.path().join("missing.parquet")).is_err());
    }

    #[test]
    fn test_into_batch() {
        let b = UpdateInput::from(batch("value")).into_batch("t").unwrap();
        assert_eq!(b.unwrap().num_rows(), 2);
        assert!(UpdateInput::Empty.into_batch("t").unwrap().is_none());
    }

    #[test]
    fn test_parse_rejects_reserved_columns() {
        let err = parse_input_to_metapartition(batch(BUCKET_COLUMN).into(), "t").unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }
}
