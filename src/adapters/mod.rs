//! Concrete adapter implementations for ports.

pub mod csv_adapter;
#[cfg(feature = "http-feed")]
pub mod exchange_feed;
pub mod file_config_adapter;
pub mod memory_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
