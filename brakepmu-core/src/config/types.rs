//! Configuration type definitions

use brakepmu_protocol::TransportConfig;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default EEPROM address of the DTC snapshot
pub const DEFAULT_SNAPSHOT_ADDRESS: u16 = 0x0000;

/// DTC registry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DtcStoreConfig {
    /// Non-volatile address holding the 4-byte mask snapshot
    pub snapshot_address: u16,
}

impl Default for DtcStoreConfig {
    fn default() -> Self {
        Self {
            snapshot_address: DEFAULT_SNAPSHOT_ADDRESS,
        }
    }
}

/// Complete fault manager configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FaultManagerConfig {
    /// DTC registry settings
    pub store: DtcStoreConfig,
    /// CAN identities
    pub transport: TransportConfig,
}
