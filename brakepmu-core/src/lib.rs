//! Board-agnostic fault management for the brake PMU
//!
//! This crate contains the logic that does not depend on a specific chip:
//!
//! - DTC identifiers and the persisted DTC registry
//! - The diagnostic service that answers tester commands
//! - Configuration type definitions

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

mod fmt;

pub mod config;
pub mod dtc;
pub mod service;

pub use config::{DtcStoreConfig, FaultManagerConfig};
pub use dtc::{DtcCode, DtcError, DtcStore, Transition};
pub use service::{DiagnosticService, ServiceAction, ServiceError};
