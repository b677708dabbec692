pub mod serializer;
pub mod store;

pub use serializer::{IpcSerializer, ParquetSerializer, TableSerializer, serializer_for};
pub use store::{StoreFactory, list_files, shared_store_factory, store_factory};
