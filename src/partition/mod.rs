pub mod index;
pub mod input;
pub mod meta;

pub use index::SecondaryIndex;
pub use input::{
    UpdateInput, check_reserved_columns, parse_input_to_metapartition, read_parquet_input,
};
pub use meta::{MetaPartition, PhysicalPartition, object_key};
