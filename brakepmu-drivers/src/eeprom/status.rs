//! 25LC256 status register

/// WIP: internal write cycle running
const WIP: u8 = 0x01;
/// WEL: write enable latch set
const WEL: u8 = 0x02;
/// BP0: block protect bit 0
const BP0: u8 = 0x04;
/// BP1: block protect bit 1
const BP1: u8 = 0x08;
/// WPEN: hardware write-protect enable
const WPEN: u8 = 0x80;

/// Bits the WRSR command can change
const WRITABLE: u8 = BP0 | BP1 | WPEN;

/// Decoded status register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(u8);

impl Status {
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    pub const fn to_byte(self) -> u8 {
        self.0
    }

    /// An internal write cycle is still running
    pub const fn write_in_progress(self) -> bool {
        self.0 & WIP != 0
    }

    /// The next WRITE or WRSR will be accepted
    pub const fn write_enabled(self) -> bool {
        self.0 & WEL != 0
    }

    /// Block protection level, 0 (none) to 3 (whole array)
    pub const fn block_protect(self) -> u8 {
        (self.0 & (BP0 | BP1)) >> 2
    }

    pub const fn write_protect_enabled(self) -> bool {
        self.0 & WPEN != 0
    }

    /// Value for WRSR: protection level and WPEN, other bits dropped
    pub const fn protection(level: u8, wpen: bool) -> Self {
        let mut byte = (level << 2) & (BP0 | BP1);
        if wpen {
            byte |= WPEN;
        }
        Self(byte)
    }

    /// Only the bits WRSR is able to change
    pub const fn writable_bits(self) -> u8 {
        self.0 & WRITABLE
    }
}
