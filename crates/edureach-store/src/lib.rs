//! # edureach-store
//!
//! Durable, indexed local storage for the EduReach offline client.
//!
//! Structured records live in named collections inside a single SQLite file.
//! Each collection is a table of JSON documents keyed by an auto-assigned
//! integer identifier; secondary indexes are expression indexes over JSON
//! fields. The schema is produced by an ordered, additive migration list.
//!
//! The pending-action queue, used to defer side effects while offline, is a
//! thin layer over the `offline_queue` collection.

pub mod database;
pub mod kv;
pub mod migrations;
pub mod models;
pub mod queue;
pub mod records;
pub mod schema;
pub mod usage;

mod error;

pub use database::{Database, LocalStore, StoreLocation, StoreOptions};
pub use error::{Result, StoreError};
pub use models::*;
pub use queue::UndecodableEntry;
pub use records::RecordId;
pub use usage::StorageEstimate;
