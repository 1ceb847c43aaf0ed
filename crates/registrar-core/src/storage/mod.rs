//! # Storage Backends
//!
//! - `MemoryStore`: volatile `BTreeMap` tables (tests, throwaway servers)
//! - `RedbStore`: disk-backed ACID storage

pub mod memory;
pub mod redb_store;

pub use memory::{MemorySnapshot, MemoryStore, MemoryTxn};
pub use redb_store::{RedbSnapshot, RedbStore, RedbTxn};
