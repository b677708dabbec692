//! Test and benchmark utilities.
//!
//! This module is only available when the `testutil` feature is enabled.

use std::sync::Arc;

use arrow::array::*;
use arrow::datatypes::{DataType, Field, Int32Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use object_store::ObjectStore;
use object_store::memory::InMemory;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::conf::UpdateConfig;
use crate::io::shared_store_factory;
use crate::service::DatasetUpdater;

/// RNG seed for deterministic data generation
pub const RNG_SEED: u64 = 42;

pub const REGIONS: &[&str] = &["A", "B"];

/// `region` (Utf8) and `value` (Int64) columns, the shape most tests use.
pub fn region_value_batch(regions: &[&str], values: &[i64]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("region", DataType::Utf8, false),
        Field::new("value", DataType::Int64, false),
    ]));
    let regions: StringArray = regions.iter().map(|r| Some(*r)).collect();
    RecordBatch::try_new(
        schema,
        vec![Arc::new(regions), Arc::new(Int64Array::from(values.to_vec()))],
    )
    .unwrap()
}

/// Random `region`/`value` rows, regions drawn from [`REGIONS`] and values
/// from `0..max_value`.
pub fn random_region_batch(num_rows: usize, max_value: i64, seed: u64) -> RecordBatch {
    let mut rng = StdRng::seed_from_u64(seed);
    let regions: Vec<&str> = (0..num_rows)
        .map(|_| REGIONS[rng.gen_range(0..REGIONS.len())])
        .collect();
    let values: Vec<i64> = (0..num_rows).map(|_| rng.gen_range(0..max_value)).collect();
    region_value_batch(&regions, &values)
}

/// Batch with a dictionary-encoded `region`, a list column and a nullable
/// string, for checking type fidelity through the pipeline.
pub fn rich_batch(num_rows: usize, seed: u64) -> RecordBatch {
    let mut rng = StdRng::seed_from_u64(seed);
    let region: DictionaryArray<Int32Type> = (0..num_rows)
        .map(|_| Some(REGIONS[rng.gen_range(0..REGIONS.len())]))
        .collect();
    let value = Int64Array::from_iter_values(0..num_rows as i64);
    let tags = ListArray::from_iter_primitive::<Int64Type, _, _>(
        (0..num_rows).map(|i| Some(vec![Some(i as i64); i % 3])),
    );
    let note: StringArray = (0..num_rows)
        .map(|i| if i % 4 == 0 { None } else { Some(format!("n{}", i)) })
        .collect();

    let schema = Arc::new(Schema::new(vec![
        Field::new("region", region.data_type().clone(), false),
        Field::new("value", DataType::Int64, false),
        Field::new("tags", tags.data_type().clone(), true),
        Field::new("note", DataType::Utf8, true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![Arc::new(region), Arc::new(value), Arc::new(tags), Arc::new(note)],
    )
    .unwrap()
}

/// Values of the Int64 column `name`, in row order.
pub fn int64_values(batch: &RecordBatch, name: &str) -> Vec<i64> {
    batch
        .column_by_name(name)
        .unwrap()
        .as_primitive::<Int64Type>()
        .values()
        .to_vec()
}

/// Updater writing into a fresh in-memory store. Returns the store so tests
/// can inspect what was written.
pub fn memory_updater(config: &UpdateConfig) -> (DatasetUpdater, Arc<dyn ObjectStore>) {
    let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
    let updater = DatasetUpdater::with_store_factory(config, shared_store_factory(store.clone()))
        .unwrap();
    (updater, store)
}
