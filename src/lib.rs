//! csvherd — incremental consolidation of dropped CSV files.
//!
//! Watches an input folder for CSV arrivals and merges them into one
//! growing master file: change detection via directory snapshots, schema
//! unification across heterogeneous column sets, streaming append/removal
//! against the master, and row-level deduplication.

pub mod changes;
pub mod cmd;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod hash;
pub mod master;
pub mod monitor;
pub mod pidfile;
pub mod row;
pub mod schema;
pub mod snapshot;
pub mod stability;

pub use error::{Error, Result};
