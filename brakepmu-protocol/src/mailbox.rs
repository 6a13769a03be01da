//! Single-slot command mailbox
//!
//! Written from the CAN receive interrupt, polled and cleared from task
//! context. There is no queue: a command posted before the previous one was
//! consumed replaces it.

use portable_atomic::{AtomicU8, Ordering};

use crate::command::DiagCommand;

const SLOT_EMPTY: u8 = 0;
const SLOT_CLEAR_DTC: u8 = 1;
const SLOT_READ_DTC: u8 = 2;

fn encode(command: Option<DiagCommand>) -> u8 {
    match command {
        None => SLOT_EMPTY,
        Some(DiagCommand::ClearDtc) => SLOT_CLEAR_DTC,
        Some(DiagCommand::ReadDtc) => SLOT_READ_DTC,
    }
}

fn decode(slot: u8) -> Option<DiagCommand> {
    match slot {
        SLOT_CLEAR_DTC => Some(DiagCommand::ClearDtc),
        SLOT_READ_DTC => Some(DiagCommand::ReadDtc),
        _ => None,
    }
}

/// Last-write-wins holder for the most recent decoded command
#[derive(Debug, Default)]
pub struct CommandMailbox {
    slot: AtomicU8,
}

impl CommandMailbox {
    /// Create an empty mailbox
    pub const fn new() -> Self {
        Self {
            slot: AtomicU8::new(SLOT_EMPTY),
        }
    }

    /// Store a command, replacing any unconsumed one
    pub fn post(&self, command: DiagCommand) {
        let previous = decode(self.slot.swap(encode(Some(command)), Ordering::AcqRel));
        if let Some(lost) = previous {
            if lost != command {
                debug!("Unconsumed command {:?} replaced", lost);
            }
        }
    }

    /// Current command, without consuming it
    pub fn peek(&self) -> Option<DiagCommand> {
        decode(self.slot.load(Ordering::Acquire))
    }

    /// Empty the mailbox unconditionally
    pub fn clear(&self) {
        self.slot.store(SLOT_EMPTY, Ordering::Release);
    }

    /// Empty the mailbox only if it still holds `command`
    ///
    /// Returns false when a newer command arrived after `command` was read;
    /// the newer command is left in place.
    pub fn acknowledge(&self, command: DiagCommand) -> bool {
        self.slot
            .compare_exchange(
                encode(Some(command)),
                SLOT_EMPTY,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}
