use std::sync::Arc;

use crate::conf::{PayloadCodec, UpdateConfig};
use crate::core::StrataError;
use crate::io::{StoreFactory, TableSerializer, serializer_for};

/// Everything a pipeline task needs, shared read-only between tasks.
#[derive(Clone)]
pub struct UpdateContext {
    pub dataset_uuid: String,
    pub table: String,
    pub partition_on: Vec<String>,
    pub secondary_indices: Vec<String>,
    pub sort_partitions_by: Vec<String>,
    pub num_buckets: Option<u64>,
    pub bucket_by: Option<Vec<String>>,
    pub payload_codec: PayloadCodec,
    pub store_factory: StoreFactory,
    pub serializer: Arc<dyn TableSerializer>,
}

impl UpdateContext {
    pub fn new(config: &UpdateConfig, store_factory: StoreFactory) -> Result<Self, StrataError> {
        config.validate()?;
        Ok(Self {
            dataset_uuid: config.dataset_uuid.clone(),
            table: config.table.clone(),
            partition_on: config.partition_on.clone(),
            secondary_indices: config.secondary_indices.clone(),
            sort_partitions_by: config.sort_partitions_by.clone(),
            num_buckets: config.num_buckets,
            bucket_by: config.bucket_by.clone(),
            payload_codec: config.payload_codec,
            store_factory,
            serializer: serializer_for(config.serializer, config.compression),
        })
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn TableSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Key the shuffle groups rows by: the partition columns, plus the
    /// bucket column when bucketing.
    pub fn group_columns(&self) -> Vec<String> {
        let mut columns = self.partition_on.clone();
        if self.num_buckets.is_some() {
            columns.push(crate::table::BUCKET_COLUMN.to_string());
        }
        columns
    }
}

impl std::fmt::Debug for UpdateContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateContext")
            .field("dataset_uuid", &self.dataset_uuid)
            .field("table", &self.table)
            .field("partition_on", &self.partition_on)
            .field("num_buckets", &self.num_buckets)
            .field("serializer", &self.serializer)
            .finish_non_exhaustive()
    }
}
