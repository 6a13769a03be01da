//! Device drivers for the brakepmu fault manager
//!
//! Concrete implementations of the brakepmu-hal traits and the fault
//! sources that feed the DTC registry:
//!
//! - 25LC256 SPI EEPROM persistence engine (`NvStorage`)
//! - MP5475GU four-rail PMIC over I2C
//! - Rail monitor mapping PMIC under-voltage flags onto DTCs

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

mod fmt;

pub mod eeprom;
pub mod pmic;

#[cfg(test)]
pub(crate) mod sim;

pub use eeprom::{Eeprom25lc256, EepromConfig, EepromError, Status, WriteState};
pub use pmic::{BuckChannel, MonitorError, Mp5475gu, PmicError, RailMonitor, StatusUv};
