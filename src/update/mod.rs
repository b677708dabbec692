mod context;
mod executor;
mod finalize;
mod one_to_one;
mod shuffle;

pub use context::UpdateContext;
pub use executor::{LocalExecutor, TaskExecutor};
pub use finalize::store_partition;
pub use one_to_one::update_partitions_one_to_one;
pub use shuffle::update_partitions_shuffle;
