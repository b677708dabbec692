use serde::{Deserialize, Serialize};

use crate::core::StrataError;
use crate::table::{BUCKET_COLUMN, PAYLOAD_COLUMN};

/// Availability of the binary payload codec used to carry sub-tables through
/// the shuffle. Resolved once from configuration and passed down explicitly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PayloadCodec {
    #[default]
    Ipc,
    #[serde(rename = "none")]
    Disabled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SerializerKind {
    #[default]
    Parquet,
    Ipc,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Snappy,
    Uncompressed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct UpdateConfig {
    pub dataset_uuid: String,
    #[serde(default = "UpdateConfig::default_table")]
    pub table: String,
    #[serde(default)]
    pub partition_on: Vec<String>,
    #[serde(default)]
    pub secondary_indices: Vec<String>,
    #[serde(default)]
    pub sort_partitions_by: Vec<String>,
    #[serde(default)]
    pub num_buckets: Option<u64>,
    #[serde(default)]
    pub bucket_by: Option<Vec<String>>,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default)]
    pub payload_codec: PayloadCodec,
    #[serde(default)]
    pub serializer: SerializerKind,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default = "UpdateConfig::default_parallelism")]
    pub parallelism: usize,
}

impl UpdateConfig {
    fn default_table() -> String {
        String::from("table")
    }

    pub fn default_parallelism() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn new(dataset_uuid: impl Into<String>) -> Self {
        Self {
            dataset_uuid: dataset_uuid.into(),
            table: Self::default_table(),
            partition_on: Vec::new(),
            secondary_indices: Vec::new(),
            sort_partitions_by: Vec::new(),
            num_buckets: None,
            bucket_by: None,
            shuffle: false,
            payload_codec: PayloadCodec::default(),
            serializer: SerializerKind::default(),
            compression: Compression::default(),
            parallelism: Self::default_parallelism(),
        }
    }

    /// Whether rows have to be regrouped across input chunks.
    pub fn needs_shuffle(&self) -> bool {
        self.shuffle || self.num_buckets.is_some()
    }

    /// Eager checks, run before any task is scheduled.
    pub fn validate(&self) -> Result<(), StrataError> {
        if self.dataset_uuid.is_empty() {
            return Err(StrataError::InvalidArgument(
                "dataset_uuid must not be empty".into(),
            ));
        }
        if self.table.is_empty() {
            return Err(StrataError::InvalidArgument(
                "table name must not be empty".into(),
            ));
        }
        if self.parallelism == 0 {
            return Err(StrataError::InvalidArgument(
                "parallelism must be positive".into(),
            ));
        }
        if self.num_buckets == Some(0) {
            return Err(StrataError::InvalidArgument(
                "num_buckets must be a positive integer".into(),
            ));
        }
        if let Some(bucket_by) = &self.bucket_by {
            if bucket_by.is_empty() {
                return Err(StrataError::InvalidArgument(
                    "bucket_by must name at least one column".into(),
                ));
            }
            if self.num_buckets.is_none() {
                return Err(StrataError::InvalidArgument(
                    "bucket_by requires num_buckets".into(),
                ));
            }
        }
        if self.shuffle && self.partition_on.is_empty() && self.num_buckets.is_none() {
            return Err(StrataError::InvalidArgument(
                "shuffle requires partition_on columns or num_buckets".into(),
            ));
        }

        let named = self
            .partition_on
            .iter()
            .chain(&self.secondary_indices)
            .chain(&self.sort_partitions_by)
            .chain(self.bucket_by.iter().flatten());
        for column in named {
            if column == BUCKET_COLUMN || column == PAYLOAD_COLUMN {
                return Err(StrataError::InvalidArgument(format!(
                    "column name '{}' is reserved",
                    column
                )));
            }
        }
        Ok(())
    }
}
