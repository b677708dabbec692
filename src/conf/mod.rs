mod config;
mod storage;
mod update;

pub use config::Config;
pub use storage::{LocalStorageConfig, S3StorageConfig, StorageConfig};
pub use update::{Compression, PayloadCodec, SerializerKind, UpdateConfig};
