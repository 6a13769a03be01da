//! In-memory doubles for host-side tests
//!
//! [`RamStorage`] behaves like a perfect EEPROM with optional failure
//! injection. [`MockCan`] records every enqueued frame and can be told to
//! reject enqueues, so transports can be driven one completion at a time.

use embedded_can::{Frame, Id};
use heapless::Vec;

use crate::can::{CanController, IdFilter};
use crate::storage::{NvStorage, StorageError};

/// Size of the simulated storage array
pub const RAM_STORAGE_SIZE: usize = 256;

/// Byte storage backed by a RAM array
#[derive(Debug, Clone)]
pub struct RamStorage {
    /// Raw contents, erased to 0xFF
    pub memory: [u8; RAM_STORAGE_SIZE],
    /// Number of successful writes
    pub writes: usize,
    /// When set, every write fails with this error
    pub fail_writes: Option<StorageError>,
    /// When set, every read fails with this error
    pub fail_reads: Option<StorageError>,
}

impl Default for RamStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl RamStorage {
    /// Create an erased storage
    pub fn new() -> Self {
        Self {
            memory: [0xFF; RAM_STORAGE_SIZE],
            writes: 0,
            fail_writes: None,
            fail_reads: None,
        }
    }

    /// Create a storage holding `data` at `address`
    pub fn with_contents(address: u16, data: &[u8]) -> Self {
        let mut storage = Self::new();
        let start = address as usize;
        storage.memory[start..start + data.len()].copy_from_slice(data);
        storage
    }

    fn range(&self, address: u16, len: usize) -> Result<core::ops::Range<usize>, StorageError> {
        let start = address as usize;
        let end = start + len;
        if end > RAM_STORAGE_SIZE {
            return Err(StorageError::InvalidArgument);
        }
        Ok(start..end)
    }
}

impl NvStorage for RamStorage {
    async fn read(&mut self, address: u16, buffer: &mut [u8]) -> Result<(), StorageError> {
        if let Some(err) = self.fail_reads {
            return Err(err);
        }
        let range = self.range(address, buffer.len())?;
        buffer.copy_from_slice(&self.memory[range]);
        Ok(())
    }

    async fn write(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError> {
        if let Some(err) = self.fail_writes {
            return Err(err);
        }
        let range = self.range(address, data.len())?;
        self.memory[range].copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }

    fn capacity(&self) -> usize {
        RAM_STORAGE_SIZE
    }
}

/// Classic CAN frame with up to 8 data bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockFrame {
    id: Id,
    data: [u8; 8],
    dlc: u8,
    remote: bool,
}

impl Frame for MockFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..data.len()].copy_from_slice(data);
        Some(Self {
            id: id.into(),
            data: buf,
            dlc: data.len() as u8,
            remote: false,
        })
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > 8 {
            return None;
        }
        Some(Self {
            id: id.into(),
            data: [0u8; 8],
            dlc: dlc as u8,
            remote: true,
        })
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        if self.remote {
            &[]
        } else {
            &self.data[..self.dlc as usize]
        }
    }
}

/// Errors reported by [`MockCan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCanError {
    /// Controller has not been started
    NotStarted,
    /// Every transmit slot is full
    SlotsFull,
}

/// CAN controller that records frames instead of sending them
#[derive(Debug, Default)]
pub struct MockCan {
    /// Every frame accepted by `try_enqueue`, in order
    pub sent: Vec<MockFrame, 64>,
    /// Filter installed by `set_filter`
    pub filter: Option<IdFilter>,
    /// Set by `start`
    pub started: bool,
    /// Number of further enqueues that succeed before `SlotsFull`
    pub accept_limit: Option<usize>,
}

impl MockCan {
    /// Create a stopped controller with no filter
    pub fn new() -> Self {
        Self::default()
    }
}

impl CanController for MockCan {
    type Frame = MockFrame;
    type Error = MockCanError;

    fn set_filter(&mut self, filter: IdFilter) -> Result<(), Self::Error> {
        self.filter = Some(filter);
        Ok(())
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        self.started = true;
        Ok(())
    }

    fn try_enqueue(&mut self, frame: &Self::Frame) -> Result<(), Self::Error> {
        if !self.started {
            return Err(MockCanError::NotStarted);
        }
        match self.accept_limit {
            Some(0) => return Err(MockCanError::SlotsFull),
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        self.sent.push(*frame).map_err(|_| MockCanError::SlotsFull)
    }
}
