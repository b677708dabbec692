pub mod bucket;
pub mod concat;
pub mod group;
pub mod payload;
pub mod sort;

pub use bucket::{BUCKET_COLUMN, bucket_data_type, hash_bucket};
pub use concat::concat_tables;
pub use group::{drop_column, group_rows, take_rows};
pub use payload::{PAYLOAD_COLUMN, is_packed, pack_payload, unpack_payload};
pub use sort::sort_values_categorical;
