//! # storage-adapters
//!
//! Implementations of the `domains` storage ports.
//! `MemoryStore` is always compiled; `SqliteStore` sits behind `db-sqlite`.

pub mod memory;
#[cfg(feature = "db-sqlite")]
pub mod sqlite;

pub use memory::{CascadeStep, MemoryStore};
#[cfg(feature = "db-sqlite")]
pub use sqlite::SqliteStore;
