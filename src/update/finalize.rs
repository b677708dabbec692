use arrow::record_batch::RecordBatch;
use log::debug;

use crate::core::StrataError;
use crate::partition::MetaPartition;
use crate::table::{BUCKET_COLUMN, drop_column, sort_values_categorical, unpack_payload};

use super::context::UpdateContext;

/// Sort, split by partition columns and index, in that order. Each step is
/// skipped when not configured.
pub(crate) fn prepare(mp: MetaPartition, ctx: &UpdateContext) -> Result<MetaPartition, StrataError> {
    let mut mp = mp;
    if !ctx.sort_partitions_by.is_empty() {
        mp = mp.apply(|batch| sort_values_categorical(batch, &ctx.sort_partitions_by))?;
    }
    if !ctx.partition_on.is_empty() {
        mp = mp.partition_on(&ctx.partition_on)?;
    }
    if !ctx.secondary_indices.is_empty() {
        mp = mp.build_indices(&ctx.secondary_indices)?;
    }
    Ok(mp)
}

/// Turn the rows of one shuffle group into a stored partition.
///
/// Takes its own storage handle from the factory and releases it on return,
/// whether or not the write succeeded. Files written before a failure are
/// left in place.
pub async fn store_partition(
    batch: RecordBatch,
    ctx: &UpdateContext,
) -> Result<MetaPartition, StrataError> {
    let batch = unpack_payload(batch, ctx.payload_codec)?;
    let batch = drop_column(batch, BUCKET_COLUMN)?;
    let store = (ctx.store_factory)()?;

    debug!("finalizing group of {} rows", batch.num_rows());
    // moved in: the raw table is released once partition_on has split it
    let mp = MetaPartition::from_batch(&ctx.table, None, batch);
    let mp = prepare(mp, ctx)?;
    mp.store_dataframes(store.as_ref(), &ctx.dataset_uuid, ctx.serializer.as_ref())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::{PayloadCodec, UpdateConfig};
    use crate::io::{IpcSerializer, list_files, shared_store_factory};
    use crate::table::{hash_bucket, pack_payload};
    use arrow::array::{Array, AsArray, DictionaryArray, Int32Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Int64Type, Schema};
    use object_store::ObjectStore;
    use object_store::memory::InMemory;
    use std::sync::Arc;

    fn context(store: Arc<dyn ObjectStore>, f: impl FnOnce(&mut UpdateConfig)) -> UpdateContext {
        let mut config = UpdateConfig::new("ds");
        config.table = "orders".into();
        f(&mut config);
        UpdateContext::new(&config, shared_store_factory(store)).unwrap()
    }

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("region", DataType::Utf8, false),
            Field::new("value", DataType::Int64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["A", "A", "A"])),
                Arc::new(Int64Array::from(vec![3, 1, 2])),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_store_packed_bucketed_group() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let ctx = context(store.clone(), |c| {
            c.partition_on = vec!["region".into()];
            c.sort_partitions_by = vec!["value".into()];
            c.secondary_indices = vec!["value".into()];
            c.num_buckets = Some(1);
        });

        let bucketed = hash_bucket(&batch(), None, 1).unwrap();
        let packed = pack_payload(&bucketed, &ctx.group_columns(), PayloadCodec::Ipc).unwrap();
        let mp = store_partition(packed, &ctx).await.unwrap();

        assert_eq!(mp.partitions.len(), 1);
        let partition = &mp.partitions[0];
        assert_eq!(partition.partition_keys, vec![("region".to_string(), "A".to_string())]);
        assert_eq!(mp.indices["value"].len(), 3);

        let loaded = mp.load(store.as_ref(), ctx.serializer.as_ref()).await.unwrap();
        let stored = &loaded[0];
        assert!(stored.column_by_name(BUCKET_COLUMN).is_none());
        assert!(stored.column_by_name("region").is_none());
        assert_eq!(
            stored.column_by_name("value").unwrap().as_primitive::<Int64Type>().values().to_vec(),
            vec![1, 2, 3]
        );
        assert_eq!(list_files(store.as_ref(), None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_store_plain_group_without_options() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let ctx = context(store.clone(), |_| {});
        let mp = store_partition(batch(), &ctx).await.unwrap();
        assert_eq!(mp.partitions.len(), 1);
        assert!(mp.partitions[0].partition_keys.is_empty());
        assert!(mp.indices.is_empty());

        let loaded = mp.load(store.as_ref(), ctx.serializer.as_ref()).await.unwrap();
        assert_eq!(loaded[0], batch());
    }

    #[tokio::test]
    async fn test_sort_by_category_rank() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let ctx = context(store.clone(), |c| c.sort_partitions_by = vec!["value".into()])
            .with_serializer(Arc::new(IpcSerializer));

        let keys = Int32Array::from(vec![1, 2, 0, 1]);
        let categories = Arc::new(Int64Array::from(vec![3, 1, 2]));
        let value = DictionaryArray::try_new(keys, categories).unwrap();
        let schema = Arc::new(Schema::new(vec![Field::new(
            "value",
            value.data_type().clone(),
            false,
        )]));
        let input = RecordBatch::try_new(schema, vec![Arc::new(value)]).unwrap();

        let mp = store_partition(input, &ctx).await.unwrap();
        let loaded = mp.load(store.as_ref(), ctx.serializer.as_ref()).await.unwrap();
        let decoded = arrow::compute::cast(loaded[0].column(0), &DataType::Int64).unwrap();
        assert_eq!(
            decoded.as_primitive::<Int64Type>().values().to_vec(),
            vec![3, 1, 1, 2]
        );
    }

    #[tokio::test]
    async fn test_store_failure_surfaces() {
        let mut config = UpdateConfig::new("ds");
        config.partition_on = vec!["region".into()];
        let factory: crate::io::StoreFactory =
            Arc::new(|| Err(StrataError::StoreError("unreachable".into())));
        let ctx = UpdateContext::new(&config, factory).unwrap();
        let err = store_partition(batch(), &ctx).await.unwrap_err();
        assert_eq!(err, StrataError::StoreError("unreachable".into()));
    }
}
