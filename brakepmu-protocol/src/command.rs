//! Diagnostic commands received from the tester

/// Commands decoded from diagnostic request frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiagCommand {
    /// Clear every stored DTC
    ClearDtc,
    /// Report the current DTC mask
    ReadDtc,
}

// Wire format values (first payload byte)
pub const OPCODE_CLEAR_DTC: u8 = 0x31;
pub const OPCODE_READ_DTC: u8 = 0x19;

impl DiagCommand {
    /// Parse a command from its opcode byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            OPCODE_CLEAR_DTC => Some(DiagCommand::ClearDtc),
            OPCODE_READ_DTC => Some(DiagCommand::ReadDtc),
            _ => None,
        }
    }

    /// Convert to opcode byte
    pub fn to_byte(self) -> u8 {
        match self {
            DiagCommand::ClearDtc => OPCODE_CLEAR_DTC,
            DiagCommand::ReadDtc => OPCODE_READ_DTC,
        }
    }

    /// Decode a request payload
    ///
    /// Only the first byte is significant; trailing bytes are ignored.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        payload.first().copied().and_then(Self::from_byte)
    }
}
