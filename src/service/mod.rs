use std::collections::BTreeMap;
use std::sync::Arc;

use log::info;
use serde::Serialize;

use crate::conf::{Config, UpdateConfig};
use crate::core::StrataError;
use crate::io::{StoreFactory, store_factory};
use crate::partition::{MetaPartition, SecondaryIndex, UpdateInput};
use crate::update::{
    LocalExecutor, UpdateContext, update_partitions_one_to_one, update_partitions_shuffle,
};

/// Outcome of one update: the stored partitions plus the index fragments of
/// all of them merged per column. Nothing here is committed to a dataset
/// view yet.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateResult {
    pub partitions: Vec<MetaPartition>,
    pub indices: BTreeMap<String, SecondaryIndex>,
}

impl UpdateResult {
    fn new(partitions: Vec<MetaPartition>) -> Result<Self, StrataError> {
        let mut indices: BTreeMap<String, SecondaryIndex> = BTreeMap::new();
        for mp in &partitions {
            for (column, index) in &mp.indices {
                match indices.get_mut(column) {
                    Some(merged) => merged.merge(index.clone())?,
                    None => {
                        indices.insert(column.clone(), index.clone());
                    }
                }
            }
        }
        Ok(Self {
            partitions,
            indices,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.partitions.iter().map(|mp| mp.num_rows()).sum()
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.partitions.iter().flat_map(|mp| mp.files())
    }
}

/// Applies configured updates to a dataset, picking the shuffle pipeline
/// when rows must be regrouped and the one-to-one pipeline otherwise.
pub struct DatasetUpdater {
    ctx: Arc<UpdateContext>,
    shuffle: bool,
    executor: LocalExecutor,
}

impl DatasetUpdater {
    pub fn new(config: &Config) -> Result<Self, StrataError> {
        let factory = store_factory(&config.storage)?;
        Self::with_store_factory(&config.update, factory)
    }

    pub fn with_store_factory(
        config: &UpdateConfig,
        factory: StoreFactory,
    ) -> Result<Self, StrataError> {
        let ctx = UpdateContext::new(config, factory)?;
        Ok(Self {
            ctx: Arc::new(ctx),
            shuffle: config.needs_shuffle(),
            executor: LocalExecutor::new(config.parallelism),
        })
    }

    pub fn context(&self) -> &UpdateContext {
        &self.ctx
    }

    pub async fn update(&self, inputs: Vec<UpdateInput>) -> Result<UpdateResult, StrataError> {
        let partitions = if self.shuffle {
            let mut chunks = Vec::with_capacity(inputs.len());
            for input in inputs {
                if let Some(batch) = input.into_batch(&self.ctx.table)? {
                    chunks.push(batch);
                }
            }
            update_partitions_shuffle(&self.executor, chunks, self.ctx.clone()).await?
        } else {
            update_partitions_one_to_one(&self.executor, inputs, self.ctx.clone()).await?
        };

        let result = UpdateResult::new(partitions)?;
        info!(
            "dataset '{}': wrote {} rows into {} files",
            self.ctx.dataset_uuid,
            result.num_rows(),
            result.files().count()
        );
        Ok(result)
    }
}
