//! Configuration types
//!
//! Board-agnostic configuration structures. Boards build these once at
//! start-up; nothing here is read back from storage.

pub mod types;

pub use types::*;
