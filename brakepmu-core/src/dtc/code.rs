//! DTC identifiers for the brake system PMIC

/// Fault codes, dense from zero
///
/// The discriminant is the bit position in the DTC mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DtcCode {
    /// Buck A rail under-voltage
    BuckAUndervoltage = 0,
    /// Buck B rail under-voltage
    BuckBUndervoltage = 1,
    /// Buck C rail under-voltage
    BuckCUndervoltage = 2,
    /// Buck D rail under-voltage
    BuckDUndervoltage = 3,
}

impl DtcCode {
    /// Number of defined codes
    pub const COUNT: u8 = 4;

    /// Every code in index order
    pub const ALL: [DtcCode; Self::COUNT as usize] = [
        DtcCode::BuckAUndervoltage,
        DtcCode::BuckBUndervoltage,
        DtcCode::BuckCUndervoltage,
        DtcCode::BuckDUndervoltage,
    ];

    /// Look up a code by its index
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Bit position in the DTC mask
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Single-bit mask for this code
    pub fn bit(self) -> u32 {
        1 << self.index()
    }
}

impl From<DtcCode> for u8 {
    fn from(code: DtcCode) -> Self {
        code.index()
    }
}

/// Mask with one bit set for every defined code
pub const VALID_MASK: u32 = if DtcCode::COUNT >= 32 {
    u32::MAX
} else {
    (1u32 << DtcCode::COUNT) - 1
};

/// Bit for a raw index, or `None` when the index is out of range
pub(crate) fn bit_for(index: u8) -> Option<u32> {
    (index < DtcCode::COUNT).then(|| 1u32 << index)
}
