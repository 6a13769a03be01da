//! 25LC256 SPI EEPROM

mod m25lc256;
mod status;

pub use m25lc256::{cmd, page_chunk_len, Eeprom25lc256, EepromConfig, EepromError, WriteState};
pub use status::Status;
