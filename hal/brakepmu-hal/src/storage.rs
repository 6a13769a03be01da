//! Non-volatile storage abstractions
//!
//! Provides the byte-addressable storage trait that the DTC store persists
//! through. Implementations own the device protocol (page splitting,
//! write-enable latches, busy polling); callers only move bytes.

/// Errors from non-volatile storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Address range outside the device
    InvalidArgument,
    /// Device is already servicing another request
    Busy,
    /// Bus transfer or chip select failed
    Device,
    /// Device did not signal completion in time
    Timeout,
}

/// Durable byte-range storage
///
/// Both operations suspend the calling task until the device has finished.
/// They must only be awaited from task context, never from an interrupt
/// handler.
pub trait NvStorage {
    /// Read `buffer.len()` bytes starting at `address`
    fn read(
        &mut self,
        address: u16,
        buffer: &mut [u8],
    ) -> impl core::future::Future<Output = Result<(), StorageError>>;

    /// Write `data` starting at `address`
    ///
    /// Returns once the device has committed every byte.
    fn write(
        &mut self,
        address: u16,
        data: &[u8],
    ) -> impl core::future::Future<Output = Result<(), StorageError>>;

    /// Total device capacity in bytes
    fn capacity(&self) -> usize;
}
