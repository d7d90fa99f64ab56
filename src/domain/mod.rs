//! Core domain types and logic.

pub mod error;
pub mod statement;
pub mod normalizer;
pub mod ratio;
pub mod cache;
pub mod retry;
pub mod universe;
pub mod screener;
pub mod position;
pub mod portfolio;
pub mod allocator;
pub mod config_validation;
