pub mod conf;
pub mod core;
pub mod io;
pub mod partition;
pub mod service;
pub mod table;
pub mod update;

#[cfg(feature = "testutil")]
pub mod testutil;
