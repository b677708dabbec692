use std::fmt::Debug;
use std::io::Cursor;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression as ParquetCompression;
use parquet::file::properties::WriterProperties;

use crate::conf::{Compression, SerializerKind};
use crate::core::StrataError;

/// Converts tables to and from the dataset's on-disk format.
pub trait TableSerializer: Debug + Send + Sync {
    /// File extension used in object keys, without the dot.
    fn extension(&self) -> &'static str;

    fn serialize(&self, batch: &RecordBatch) -> Result<Bytes, StrataError>;

    fn restore(&self, data: Bytes) -> Result<RecordBatch, StrataError>;
}

pub fn serializer_for(kind: SerializerKind, compression: Compression) -> Arc<dyn TableSerializer> {
    match kind {
        SerializerKind::Parquet => Arc::new(ParquetSerializer::new(compression)),
        SerializerKind::Ipc => Arc::new(IpcSerializer),
    }
}

#[derive(Debug, Clone)]
pub struct ParquetSerializer {
    compression: Compression,
}

impl ParquetSerializer {
    pub fn new(compression: Compression) -> Self {
        Self { compression }
    }

    fn properties(&self) -> WriterProperties {
        let compression = match self.compression {
            Compression::Snappy => ParquetCompression::SNAPPY,
            Compression::Uncompressed => ParquetCompression::UNCOMPRESSED,
        };
        WriterProperties::builder()
            .set_compression(compression)
            .build()
    }
}

impl Default for ParquetSerializer {
    fn default() -> Self {
        Self::new(Compression::default())
    }
}

impl TableSerializer for ParquetSerializer {
    fn extension(&self) -> &'static str {
        "parquet"
    }

    fn serialize(&self, batch: &RecordBatch) -> Result<Bytes, StrataError> {
        let mut writer = ArrowWriter::try_new(Vec::new(), batch.schema(), Some(self.properties()))?;
        writer.write(batch)?;
        let buf = writer.into_inner()?;
        Ok(Bytes::from(buf))
    }

    fn restore(&self, data: Bytes) -> Result<RecordBatch, StrataError> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(data)?;
        let schema = builder.schema().clone();
        let batches = builder.build()?.collect::<Result<Vec<_>, _>>()?;
        Ok(concat_batches(&schema, &batches)?)
    }
}

/// Arrow IPC stream files. Also the wire format of shuffle payloads.
#[derive(Debug, Clone, Default)]
pub struct IpcSerializer;

impl TableSerializer for IpcSerializer {
    fn extension(&self) -> &'static str {
        "arrow"
    }

    fn serialize(&self, batch: &RecordBatch) -> Result<Bytes, StrataError> {
        Ok(Bytes::from(write_ipc_stream(batch)?))
    }

    fn restore(&self, data: Bytes) -> Result<RecordBatch, StrataError> {
        read_ipc_stream(&data)
    }
}

pub(crate) fn write_ipc_stream(batch: &RecordBatch) -> Result<Vec<u8>, StrataError> {
    let mut buf = Vec::new();
    let mut writer = StreamWriter::try_new(&mut buf, &batch.schema())?;
    writer.write(batch)?;
    writer.finish()?;
    drop(writer);
    Ok(buf)
}

pub(crate) fn read_ipc_stream(data: &[u8]) -> Result<RecordBatch, StrataError> {
    let reader = StreamReader::try_new(Cursor::new(data), None)?;
    let schema = reader.schema();
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{DictionaryArray, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Int32Type, Schema};
    use rstest::rstest;

    fn sample_batch() -> RecordBatch {
        let region: DictionaryArray<Int32Type> = vec!["A", "B", "A"].into_iter().collect();
        let schema = Arc::new(Schema::new(vec![
            Field::new(
                "region",
                DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8)),
                true,
            ),
            Field::new("name", DataType::Utf8, true),
            Field::new("value", DataType::Int64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(region),
                Arc::new(StringArray::from(vec![Some("x"), None, Some("z")])),
                Arc::new(Int64Array::from(vec![1, 2, 3])),
            ],
        )
        .unwrap()
    }

    #[rstest]
    #[case::parquet_snappy(SerializerKind::Parquet, Compression::Snappy, "parquet")]
    #[case::parquet_plain(SerializerKind::Parquet, Compression::Uncompressed, "parquet")]
    #[case::ipc(SerializerKind::Ipc, Compression::Snappy, "arrow")]
    fn test_serializer_restores_batch(
        #[case] kind: SerializerKind,
        #[case] compression: Compression,
        #[case] extension: &str,
    ) {
        let serializer = serializer_for(kind, compression);
        assert_eq!(serializer.extension(), extension);

        let batch = sample_batch();
        let data = serializer.serialize(&batch).unwrap();
        let restored = serializer.restore(data).unwrap();
        assert_eq!(restored, batch);
    }

    #[test]
    fn test_restore_garbage_fails() {
        let err = ParquetSerializer::default()
            .restore(Bytes::from_static(b"not parquet"))
            .unwrap_err();
        assert!(matches!(err, StrataError::ParquetError(_)));

        let err = read_ipc_stream(b"junk").unwrap_err();
        assert!(matches!(err, StrataError::ArrowError(_)));
    }
}
