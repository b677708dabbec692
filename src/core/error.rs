use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StrataError {
    #[error("Cannot parse config: {0}")]
    ConfigParsingError(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Arrow error: {0}")]
    ArrowError(String),
    #[error("Parquet error: {0}")]
    ParquetError(String),
    #[error("Store error: {0}")]
    StoreError(String),
    #[error("Schema error: {0}")]
    SchemaError(String),
    #[error("Payload error: {0}")]
    PayloadError(String),
    #[error("Task error: {0}")]
    TaskError(String),
}

impl From<std::io::Error> for StrataError {
    fn from(err: std::io::Error) -> Self {
        StrataError::IoError(err.to_string())
    }
}

impl From<arrow::error::ArrowError> for StrataError {
    fn from(err: arrow::error::ArrowError) -> Self {
        StrataError::ArrowError(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for StrataError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        StrataError::ParquetError(err.to_string())
    }
}

impl From<object_store::Error> for StrataError {
    fn from(err: object_store::Error) -> Self {
        StrataError::StoreError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StrataError {
    fn from(err: tokio::task::JoinError) -> Self {
        StrataError::TaskError(err.to_string())
    }
}
