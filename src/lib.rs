//! MDB Estimator: fiscal estimation engine for property dealers
//! (marchands de biens).
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod api;
pub mod config;
pub mod engine;
pub mod rates;
pub mod types;
