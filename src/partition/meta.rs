use std::collections::BTreeMap;

use arrow::record_batch::RecordBatch;
use log::debug;
use object_store::ObjectStore;
use object_store::path::{Path as ObjectPath, PathPart};
use serde::Serialize;
use uuid::Uuid;

use crate::core::StrataError;
use crate::io::TableSerializer;
use crate::table::group::{drop_columns, group_rows, key_columns, take_rows};

use super::index::{SecondaryIndex, value_strings};

pub fn gen_label() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Object key of a physical partition:
/// `{dataset_uuid}/{table}/{col=value/...}{label}.{extension}`.
pub fn object_key(
    dataset_uuid: &str,
    table: &str,
    partition_keys: &[(String, String)],
    label: &str,
    extension: &str,
) -> ObjectPath {
    let mut parts: Vec<PathPart<'static>> = vec![
        PathPart::from(dataset_uuid.to_string()),
        PathPart::from(table.to_string()),
    ];
    for (column, value) in partition_keys {
        parts.push(PathPart::from(format!("{}={}", column, value)));
    }
    parts.push(PathPart::from(format!("{}.{}", label, extension)));
    ObjectPath::from_iter(parts)
}

/// One file's worth of rows. Holds the table until it is stored, the object
/// key afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct PhysicalPartition {
    pub label: String,
    pub partition_keys: Vec<(String, String)>,
    pub num_rows: usize,
    pub file: Option<String>,
    #[serde(skip)]
    pub data: Option<RecordBatch>,
}

impl PhysicalPartition {
    pub fn new(label: String, partition_keys: Vec<(String, String)>, data: RecordBatch) -> Self {
        Self {
            label,
            partition_keys,
            num_rows: data.num_rows(),
            file: None,
            data: Some(data),
        }
    }

    pub fn is_stored(&self) -> bool {
        self.file.is_some()
    }
}

/// Metadata of a stored partition: the physical files written for one
/// logical group plus the secondary index fragments covering them.
#[derive(Debug, Clone, Serialize)]
pub struct MetaPartition {
    pub table_name: String,
    pub partitions: Vec<PhysicalPartition>,
    pub indices: BTreeMap<String, SecondaryIndex>,
}

impl MetaPartition {
    pub fn empty(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            partitions: Vec::new(),
            indices: BTreeMap::new(),
        }
    }

    pub fn from_batch(table_name: impl Into<String>, label: Option<String>, data: RecordBatch) -> Self {
        let partition = PhysicalPartition::new(label.unwrap_or_else(gen_label), Vec::new(), data);
        Self {
            table_name: table_name.into(),
            partitions: vec![partition],
            indices: BTreeMap::new(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.partitions.iter().map(|p| p.num_rows).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.partitions.iter().filter_map(|p| p.file.as_deref())
    }

    /// Replace the data of every physical partition with `f(data)`.
    pub fn apply<F>(mut self, f: F) -> Result<Self, StrataError>
    where
        F: Fn(&RecordBatch) -> Result<RecordBatch, StrataError>,
    {
        for partition in &mut self.partitions {
            if let Some(data) = partition.data.take() {
                let data = f(&data)?;
                partition.num_rows = data.num_rows();
                partition.data = Some(data);
            }
        }
        Ok(self)
    }

    /// Split every physical partition into one sub-partition per distinct
    /// value combination of `columns`. The columns move from the data into
    /// `partition_keys`; the unsplit tables are released here.
    pub fn partition_on(self, columns: &[String]) -> Result<Self, StrataError> {
        if columns.is_empty() {
            return Ok(self);
        }
        let mut partitions = Vec::new();
        for partition in self.partitions {
            let PhysicalPartition {
                partition_keys,
                data,
                ..
            } = partition;
            let Some(data) = data else {
                continue;
            };
            key_columns(&data, columns)?;

            for indices in group_rows(&data, columns)? {
                let rows = take_rows(&data, &indices)?;
                let mut keys = partition_keys.clone();
                for (name, array) in columns.iter().zip(key_columns(&rows, columns)?) {
                    let value = value_strings(array.slice(0, 1).as_ref())?
                        .pop()
                        .flatten()
                        .ok_or_else(|| {
                            StrataError::SchemaError(format!(
                                "null value in partition column '{}'",
                                name
                            ))
                        })?;
                    keys.push((name.clone(), value));
                }
                let rows = drop_columns(rows, columns)?;
                partitions.push(PhysicalPartition::new(gen_label(), keys, rows));
            }
        }
        debug!(
            "table '{}': partition_on {:?} produced {} partitions",
            self.table_name,
            columns,
            partitions.len()
        );
        Ok(Self {
            table_name: self.table_name,
            partitions,
            indices: self.indices,
        })
    }

    /// Build secondary index fragments for `columns` over all unstored
    /// partitions. Partition columns are indexed by their key value.
    pub fn build_indices(mut self, columns: &[String]) -> Result<Self, StrataError> {
        for column in columns {
            let mut index = SecondaryIndex::new(column.clone());
            for partition in &self.partitions {
                let Some(data) = &partition.data else {
                    continue;
                };
                if let Some((_, value)) = partition.partition_keys.iter().find(|(k, _)| k == column) {
                    if partition.num_rows > 0 {
                        index.add(value.clone(), &partition.label);
                    }
                    continue;
                }
                let array = data.column_by_name(column).ok_or_else(|| {
                    StrataError::SchemaError(format!(
                        "cannot index missing column '{}'",
                        column
                    ))
                })?;
                index.add_array(array.as_ref(), &partition.label)?;
            }
            match self.indices.get_mut(column) {
                Some(existing) => existing.merge(index)?,
                None => {
                    self.indices.insert(column.clone(), index);
                }
            }
        }
        Ok(self)
    }

    /// Write every non-empty physical partition to `store` and release its
    /// data. Empty partitions are dropped, they never reach storage.
    pub async fn store_dataframes(
        mut self,
        store: &dyn ObjectStore,
        dataset_uuid: &str,
        serializer: &dyn TableSerializer,
    ) -> Result<Self, StrataError> {
        let mut stored = Vec::with_capacity(self.partitions.len());
        for mut partition in self.partitions {
            let Some(data) = partition.data.take() else {
                stored.push(partition);
                continue;
            };
            if data.num_rows() == 0 {
                continue;
            }
            let key = object_key(
                dataset_uuid,
                &self.table_name,
                &partition.partition_keys,
                &partition.label,
                serializer.extension(),
            );
            let payload = serializer.serialize(&data)?;
            drop(data);
            store.put(&key, payload.into()).await.map_err(|e| {
                StrataError::StoreError(format!("writing {}: {}", key, e))
            })?;
            debug!("stored {} rows at {}", partition.num_rows, key);
            partition.file = Some(key.to_string());
            stored.push(partition);
        }

        // index entries may only point at files that exist
        let labels: Vec<&str> = stored.iter().map(|p| p.label.as_str()).collect();
        for index in self.indices.values_mut() {
            for entry in index.entries.values_mut() {
                entry.retain(|label| labels.contains(&label.as_str()));
            }
            index.entries.retain(|_, entry| !entry.is_empty());
        }

        self.partitions = stored;
        Ok(self)
    }

    /// Read back all stored files, in partition order.
    pub async fn load(
        &self,
        store: &dyn ObjectStore,
        serializer: &dyn TableSerializer,
    ) -> Result<Vec<RecordBatch>, StrataError> {
        let mut batches = Vec::with_capacity(self.partitions.len());
        for file in self.files() {
            let key = ObjectPath::from(file);
            let data = store.get(&key).await?.bytes().await?;
            batches.push(serializer.restore(data)?);
        }
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{IpcSerializer, ParquetSerializer};
    use crate::table::sort_values_categorical;
    use arrow::array::{AsArray, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Int64Type, Schema};
    use object_store::memory::InMemory;
    use std::sync::Arc;

    fn batch(regions: Vec<Option<&str>>, values: Vec<i64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("region", DataType::Utf8, true),
            Field::new("value", DataType::Int64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(regions)),
                Arc::new(Int64Array::from(values)),
            ],
        )
        .unwrap()
    }

    fn values(batch: &RecordBatch) -> Vec<i64> {
        batch
            .column_by_name("value")
            .unwrap()
            .as_primitive::<Int64Type>()
            .values()
            .to_vec()
    }

    #[test]
    fn test_object_key() {
        let key = object_key(
            "ds",
            "orders",
            &[("region".into(), "A".into()), ("day".into(), "2024-01-14".into())],
            "abc",
            "parquet",
        );
        assert_eq!(key.as_ref(), "ds/orders/region=A/day=2024-01-14/abc.parquet");

        let odd = object_key("ds", "t", &[("p".into(), "a/b".into())], "l", "arrow");
        assert_eq!(odd.parts().count(), 4);
    }

    #[test]
    fn test_from_batch_and_apply() {
        let mp = MetaPartition::from_batch("t", Some("lbl".into()), batch(vec![Some("A"); 3], vec![3, 1, 2]));
        assert_eq!(mp.partitions[0].label, "lbl");
        assert_eq!(mp.num_rows(), 3);

        let mp = mp
            .apply(|b| sort_values_categorical(b, &["value".to_string()]))
            .unwrap();
        assert_eq!(values(mp.partitions[0].data.as_ref().unwrap()), vec![1, 2, 3]);
    }

    #[test]
    fn test_partition_on_splits_and_drops_columns() {
        let mp = MetaPartition::from_batch(
            "t",
            None,
            batch(vec![Some("A"), Some("B"), Some("A")], vec![1, 2, 3]),
        );
        let mp = mp.partition_on(&["region".to_string()]).unwrap();
        assert_eq!(mp.partitions.len(), 2);

        let a = &mp.partitions[0];
        assert_eq!(a.partition_keys, vec![("region".to_string(), "A".to_string())]);
        let data = a.data.as_ref().unwrap();
        assert_eq!(data.num_columns(), 1);
        assert_eq!(values(data), vec![1, 3]);
        assert_ne!(mp.partitions[0].label, mp.partitions[1].label);
    }

    #[test]
    fn test_partition_on_empty_and_null() {
        let empty = MetaPartition::from_batch("t", None, batch(vec![], vec![]));
        assert!(empty.partition_on(&["region".to_string()]).unwrap().is_empty());

        let nulls = MetaPartition::from_batch("t", None, batch(vec![None], vec![1]));
        let err = nulls.partition_on(&["region".to_string()]).unwrap_err();
        assert!(matches!(err, StrataError::SchemaError(_)));

        let missing = MetaPartition::from_batch("t", None, batch(vec![Some("A")], vec![1]));
        assert!(missing.partition_on(&["nope".to_string()]).is_err());
    }

    #[test]
    fn test_build_indices() {
        let mp = MetaPartition::from_batch(
            "t",
            None,
            batch(vec![Some("A"), Some("B"), Some("A")], vec![1, 2, 1]),
        )
        .partition_on(&["region".to_string()])
        .unwrap()
        .build_indices(&["value".to_string(), "region".to_string()])
        .unwrap();

        let a_label = mp.partitions[0].label.clone();
        let b_label = mp.partitions[1].label.clone();
        let value_index = &mp.indices["value"];
        assert_eq!(value_index.labels("1").unwrap().iter().collect::<Vec<_>>(), vec![&a_label]);
        assert_eq!(value_index.labels("2").unwrap().iter().collect::<Vec<_>>(), vec![&b_label]);
        let region_index = &mp.indices["region"];
        assert!(region_index.labels("A").unwrap().contains(&a_label));
        assert!(region_index.labels("B").unwrap().contains(&b_label));

        let err = MetaPartition::from_batch("t", None, batch(vec![Some("A")], vec![1]))
            .build_indices(&["nope".to_string()])
            .unwrap_err();
        assert!(matches!(err, StrataError::SchemaError(_)));
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let store = InMemory::new();
        let serializer = ParquetSerializer::default();
        let mp = MetaPartition::from_batch(
            "orders",
            None,
            batch(vec![Some("A"), Some("B"), Some("A")], vec![1, 2, 3]),
        )
        .partition_on(&["region".to_string()])
        .unwrap()
        .store_dataframes(&store, "ds", &serializer)
        .await
        .unwrap();

        assert_eq!(mp.files().count(), 2);
        for partition in &mp.partitions {
            assert!(partition.is_stored());
            assert!(partition.data.is_none());
            let file = partition.file.as_ref().unwrap();
            assert!(file.starts_with("ds/orders/region="));
            assert!(file.ends_with(".parquet"));
        }

        let loaded = mp.load(&store, &serializer).await.unwrap();
        assert_eq!(values(&loaded[0]), vec![1, 3]);
        assert_eq!(values(&loaded[1]), vec![2]);
    }

    #[tokio::test]
    async fn test_store_skips_empty_partitions() {
        let store = InMemory::new();
        let mp = MetaPartition::from_batch("t", None, batch(vec![], vec![]))
            .build_indices(&["value".to_string()])
            .unwrap()
            .store_dataframes(&store, "ds", &IpcSerializer)
            .await
            .unwrap();
        assert!(mp.is_empty());
        assert!(mp.indices["value"].is_empty());
        let listed = crate::io::list_files(&store, None).await.unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn test_serialize_metadata() {
        let mp = MetaPartition::from_batch("t", Some("l1".into()), batch(vec![Some("A")], vec![1]));
        let json = serde_json::to_value(&mp).unwrap();
        assert_eq!(json["table_name"], "t");
        assert_eq!(json["partitions"][0]["label"], "l1");
        assert_eq!(json["partitions"][0]["num_rows"], 1);
        assert!(json["partitions"][0].get("data").is_none());
    }
}
