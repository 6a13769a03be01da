//! brakepmu Hardware Abstraction Layer
//!
//! This crate defines the seams between the fault manager and the board:
//! byte-addressable non-volatile storage and a CAN controller with
//! interrupt-driven transmit completion. Chip-specific code implements
//! these traits; the core crates only ever see the traits.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ brakepmu-drivers (EEPROM, PMIC, monitor) │
//! └──────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌──────────────────────────────────────────┐
//! │ brakepmu-core (DTC store, service)       │
//! └──────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌──────────────────────────────────────────┐
//! │ brakepmu-protocol (CAN transport)        │
//! └──────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌──────────────────────────────────────────┐
//! │ brakepmu-hal (this crate - traits)       │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`storage::NvStorage`] - Durable byte-range storage
//! - [`can::CanController`] - CAN filter setup and non-blocking enqueue
//!
//! With the `mock` feature, [`mock`] provides in-memory doubles of both
//! traits for host-side tests.

#![no_std]
#![deny(unsafe_code)]

pub mod can;
pub mod storage;

#[cfg(feature = "mock")]
pub mod mock;

// Re-export key traits at crate root for convenience
pub use can::{CanController, IdFilter};
pub use storage::{NvStorage, StorageError};
