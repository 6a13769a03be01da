//! Diagnostic CAN Protocol
//!
//! This crate defines the CAN-side of the fault manager: the command a
//! diagnostic tester sends, the identities both directions use, and the
//! transport that chunks a DTC report into 8-byte bursts.
//!
//! # Protocol Overview
//!
//! Two fixed 29-bit identities are used:
//! ```text
//! tester ──▶ ECU   0x18DB33F1   [opcode, ...]      0x31 clear, 0x19 read
//! ECU ──▶ tester   0x18FF50E5   [report bytes 0..8] repeated per burst
//! ```
//!
//! There is no acknowledgement frame. A report longer than one frame is
//! sent as consecutive bursts on the same identity, each queued only after
//! the previous one has left the controller.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

mod fmt;

pub mod command;
pub mod config;
pub mod frame;
pub mod mailbox;
pub mod transport;

pub use command::{DiagCommand, OPCODE_CLEAR_DTC, OPCODE_READ_DTC};
pub use config::TransportConfig;
pub use frame::{burst_count, MAX_BURST_LEN};
pub use mailbox::CommandMailbox;
pub use transport::{DiagTransport, TransmitError, TxOutcome, TxProgress};
