use std::sync::Arc;

use log::info;

use crate::core::StrataError;
use crate::partition::{MetaPartition, UpdateInput, parse_input_to_metapartition};

use super::context::UpdateContext;
use super::executor::TaskExecutor;
use super::finalize::prepare;

/// Store every input chunk as its own partition, without regrouping rows
/// across chunks. Bucketing and payload packing do not apply here.
pub async fn update_partitions_one_to_one<E: TaskExecutor>(
    executor: &E,
    inputs: Vec<UpdateInput>,
    ctx: Arc<UpdateContext>,
) -> Result<Vec<MetaPartition>, StrataError> {
    info!(
        "storing {} chunks of table '{}' one to one",
        inputs.len(),
        ctx.table
    );
    let partitions = executor
        .map(inputs, move |input| {
            let ctx = ctx.clone();
            async move {
                let mp = parse_input_to_metapartition(input, &ctx.table)?;
                let mp = prepare(mp, &ctx)?;
                let store = (ctx.store_factory)()?;
                mp.store_dataframes(store.as_ref(), &ctx.dataset_uuid, ctx.serializer.as_ref())
                    .await
            }
        })
        .await?;
    info!("stored {} partitions", partitions.len());
    Ok(partitions)
}
