//! CAN controller abstractions
//!
//! Provides the controller trait used by the diagnostic transport. Frame
//! types come from `embedded-can`; the controller adds acceptance filtering
//! and a non-blocking enqueue into a free hardware transmit slot.
//!
//! Transmit completion is not part of the trait: the board's interrupt
//! handler forwards each transmit-complete event to the transport, which
//! then enqueues the next burst from interrupt context.

use embedded_can::{ExtendedId, Id};

/// Mask selecting every bit of a 29-bit extended identifier
pub const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;

/// Acceptance filter in id/mask form
///
/// A frame is accepted when `frame_id & mask == id & mask` and its
/// identifier width matches the filter's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdFilter {
    /// Identifier to match
    pub id: Id,
    /// Bits of the identifier that must match
    pub mask: u32,
}

impl IdFilter {
    /// Accept exactly one extended identifier
    pub fn exact_extended(id: ExtendedId) -> Self {
        Self {
            id: Id::Extended(id),
            mask: EXTENDED_ID_MASK,
        }
    }

    /// Check whether a received identifier passes this filter
    pub fn accepts(&self, id: Id) -> bool {
        match (self.id, id) {
            (Id::Extended(want), Id::Extended(got)) => {
                want.as_raw() & self.mask == got.as_raw() & self.mask
            }
            (Id::Standard(want), Id::Standard(got)) => {
                let mask = self.mask & 0x7FF;
                u32::from(want.as_raw()) & mask == u32::from(got.as_raw()) & mask
            }
            _ => false,
        }
    }
}

/// CAN controller
///
/// Implementations wrap a chip's CAN peripheral. Every method returns
/// immediately; none of them wait for bus activity, so all of them are safe
/// to call from interrupt context.
pub trait CanController {
    /// Frame type exchanged with the peripheral
    type Frame: embedded_can::Frame;

    /// Error type for controller operations
    type Error: core::fmt::Debug;

    /// Replace the acceptance filters with a single filter
    fn set_filter(&mut self, filter: IdFilter) -> Result<(), Self::Error>;

    /// Leave initialization mode and join the bus
    fn start(&mut self) -> Result<(), Self::Error>;

    /// Queue a frame into a free transmit slot
    ///
    /// Fails if every slot is occupied or the controller is not running.
    /// A successful enqueue is later followed by one transmit-complete
    /// event for that slot.
    fn try_enqueue(&mut self, frame: &Self::Frame) -> Result<(), Self::Error>;
}
