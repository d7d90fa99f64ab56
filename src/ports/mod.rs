//! Port traits for every external collaborator of the screening pipeline.

pub mod config_port;
pub mod statement_port;
pub mod market_port;
pub mod universe_port;
pub mod order_port;
pub mod report_port;
