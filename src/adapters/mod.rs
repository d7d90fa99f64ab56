//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_report_adapter;
pub mod file_config_adapter;
pub mod order_sink;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
