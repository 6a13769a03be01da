//! Diagnostic Trouble Codes
//!
//! One bit per code in a 32-bit mask. The mask is the single source of
//! truth for "is this fault active" and is mirrored to non-volatile storage
//! whenever a bit actually changes.

pub mod code;
pub mod store;

pub use code::{DtcCode, VALID_MASK};
pub use store::{DtcError, DtcStore, Transition, SNAPSHOT_LEN};
