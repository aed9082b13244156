//! PADDOCK: horse-racing odds watcher and betting-alert notifier
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod sources;
pub mod jockey;
pub mod strategy;
pub mod format;
pub mod notify;
pub mod summary;
pub mod engine;
pub mod storage;
