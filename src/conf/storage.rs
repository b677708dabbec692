use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct S3StorageConfig {
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "S3StorageConfig::default_region")]
    pub region: String,
}

impl S3StorageConfig {
    pub fn default_region() -> String {
        String::from("us-east-1")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LocalStorageConfig {
    pub path: String,
}

/// Where stored partitions land. Turned into a store factory by
/// [`crate::io::store::store_factory`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub enum StorageConfig {
    #[serde(rename = "local")]
    Local(LocalStorageConfig),
    #[serde(rename = "s3")]
    S3(S3StorageConfig),
    #[serde(rename = "memory")]
    #[default]
    Memory,
}
