use std::future::Future;
use std::sync::Arc;

use ahash::AHashMap;
use arrow::record_batch::RecordBatch;
use arrow::row::{OwnedRow, RowConverter, SortField};
use async_trait::async_trait;
use log::debug;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::core::StrataError;
use crate::table::concat_tables;
use crate::table::group::{key_columns, take_rows};

/// Parallel task substrate the update pipelines run on.
///
/// Implementations decide how many tasks run at once and where. The first
/// failing task fails the whole call; tasks still running are cancelled.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run `f` on every input. Results come back in input order.
    async fn map<I, T, F, Fut>(&self, inputs: Vec<I>, f: F) -> Result<Vec<T>, StrataError>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, StrataError>> + Send + 'static;

    /// Co-locate the rows of all `parts` by the values of `by` and run `f`
    /// once per distinct key. Group order is unspecified; groups are never
    /// empty.
    async fn group_apply<T, F, Fut>(
        &self,
        parts: Vec<RecordBatch>,
        by: Vec<String>,
        f: F,
    ) -> Result<Vec<T>, StrataError>
    where
        T: Send + 'static,
        F: Fn(RecordBatch) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, StrataError>> + Send + 'static;
}

/// Runs tasks on the current tokio runtime, at most `parallelism` at a time.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    parallelism: usize,
}

impl LocalExecutor {
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: parallelism.max(1),
        }
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new(
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        )
    }
}

#[async_trait]
impl TaskExecutor for LocalExecutor {
    async fn map<I, T, F, Fut>(&self, inputs: Vec<I>, f: F) -> Result<Vec<T>, StrataError>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, StrataError>> + Send + 'static,
    {
        let num_tasks = inputs.len();
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let f = Arc::new(f);
        let mut tasks = JoinSet::new();

        for (pos, input) in inputs.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let f = f.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| StrataError::TaskError(e.to_string()))?;
                (*f)(input).await.map(|out| (pos, out))
            });
        }

        let mut results: Vec<Option<T>> = (0..num_tasks).map(|_| None).collect();
        // returning early drops the JoinSet, which aborts the remaining tasks
        while let Some(joined) = tasks.join_next().await {
            let (pos, out) = joined??;
            results[pos] = Some(out);
        }
        debug!("completed {} tasks", num_tasks);
        Ok(results.into_iter().flatten().collect())
    }

    async fn group_apply<T, F, Fut>(
        &self,
        parts: Vec<RecordBatch>,
        by: Vec<String>,
        f: F,
    ) -> Result<Vec<T>, StrataError>
    where
        T: Send + 'static,
        F: Fn(RecordBatch) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, StrataError>> + Send + 'static,
    {
        let groups = shuffle_groups(&parts, &by)?;
        drop(parts);
        debug!("shuffled into {} groups by {:?}", groups.len(), by);
        self.map(groups, f).await
    }
}

/// Gather rows of all `parts` into one batch per distinct `by` value.
fn shuffle_groups(parts: &[RecordBatch], by: &[String]) -> Result<Vec<RecordBatch>, StrataError> {
    if by.is_empty() {
        return Err(StrataError::InvalidArgument(
            "group_apply needs at least one key column".into(),
        ));
    }
    let Some(first) = parts.iter().find(|p| p.num_rows() > 0) else {
        return Ok(Vec::new());
    };
    let fields = key_columns(first, by)?
        .iter()
        .map(|a| SortField::new(a.data_type().clone()))
        .collect();
    let converter = RowConverter::new(fields)?;

    let mut positions: AHashMap<OwnedRow, usize> = AHashMap::new();
    let mut groups: Vec<Vec<RecordBatch>> = Vec::new();
    for part in parts.iter().filter(|p| p.num_rows() > 0) {
        let rows = converter.convert_columns(&key_columns(part, by)?)?;
        let mut local: Vec<(usize, Vec<u32>)> = Vec::new();
        let mut local_pos: AHashMap<usize, usize> = AHashMap::new();
        for (idx, row) in rows.iter().enumerate() {
            let slot = match positions.get(&row.owned()) {
                Some(slot) => *slot,
                None => {
                    groups.push(Vec::new());
                    positions.insert(row.owned(), groups.len() - 1);
                    groups.len() - 1
                }
            };
            let entry = *local_pos.entry(slot).or_insert_with(|| {
                local.push((slot, Vec::new()));
                local.len() - 1
            });
            local[entry].1.push(idx as u32);
        }
        for (slot, indices) in local {
            groups[slot].push(take_rows(part, &indices)?);
        }
    }

    groups
        .into_iter()
        .map(|batches| concat_tables(&batches))
        .collect()
}
