//! photogram/crates/domains/src/lib.rs
//!
//! The entities, error taxonomy and storage ports of Photogram.
//! Nothing in this crate performs I/O; adapters implement the ports.

pub mod error;
pub mod ids;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use error::*;
pub use ids::*;
pub use models::*;
pub use ports::*;
