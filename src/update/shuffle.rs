use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use log::info;

use crate::core::StrataError;
use crate::partition::{MetaPartition, check_reserved_columns};
use crate::table::{hash_bucket, pack_payload};

use super::context::UpdateContext;
use super::executor::TaskExecutor;
use super::finalize::store_partition;

/// Regroup rows of all `chunks` by the partition columns (plus bucket) and
/// store one partition per distinct key.
///
/// Every row lands in exactly one group. Zero chunks return immediately
/// without scheduling anything.
pub async fn update_partitions_shuffle<E: TaskExecutor>(
    executor: &E,
    chunks: Vec<RecordBatch>,
    ctx: Arc<UpdateContext>,
) -> Result<Vec<MetaPartition>, StrataError> {
    if chunks.is_empty() {
        return Ok(Vec::new());
    }
    if ctx.num_buckets == Some(0) {
        return Err(StrataError::InvalidArgument(
            "num_buckets must be a positive integer".into(),
        ));
    }
    let group_columns = ctx.group_columns();
    if group_columns.is_empty() {
        return Err(StrataError::InvalidArgument(
            "shuffle needs partition_on columns or num_buckets".into(),
        ));
    }

    info!(
        "shuffling {} chunks of table '{}' by {:?}",
        chunks.len(),
        ctx.table,
        group_columns
    );

    let pack_ctx = ctx.clone();
    let pack_columns = group_columns.clone();
    let packed = executor
        .map(chunks, move |chunk| {
            let ctx = pack_ctx.clone();
            let columns = pack_columns.clone();
            async move {
                check_reserved_columns(&chunk)?;
                let chunk = match ctx.num_buckets {
                    Some(num_buckets) => {
                        hash_bucket(&chunk, ctx.bucket_by.as_deref(), num_buckets)?
                    }
                    None => chunk,
                };
                pack_payload(&chunk, &columns, ctx.payload_codec)
            }
        })
        .await?;

    let partitions = executor
        .group_apply(packed, group_columns, move |group| {
            let ctx = ctx.clone();
            async move { store_partition(group, &ctx).await }
        })
        .await?;

    info!("stored {} partitions", partitions.len());
    Ok(partitions)
}
