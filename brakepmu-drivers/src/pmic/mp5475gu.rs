//! MP5475GU quad buck regulator (I2C)
//!
//! Four buck rails (A-D), each with a 10-bit reference split across a
//! high/low register pair, and a shared under-voltage status register.
//!
//! ```text
//! VOUT_x_HIGH  [ - - - - - - b9 b8 ]
//! VOUT_x_LOW   [ b7 ........... b0 ]   Vout = 300 mV + code * 2 mV
//! STATUS_UV    [ - - - - A B C D   ]
//! ```

use core::future::Future;

use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

/// 7-bit bus address
pub const I2C_ADDRESS: u8 = 0x60;

/// Register map
pub mod reg {
    pub const STATUS_UV: u8 = 0x07;
    pub const VOUT_A_HIGH: u8 = 0x13;
    pub const VOUT_A_LOW: u8 = 0x14;
    pub const VOUT_B_HIGH: u8 = 0x1B;
    pub const VOUT_B_LOW: u8 = 0x1C;
    pub const VOUT_C_HIGH: u8 = 0x23;
    pub const VOUT_C_LOW: u8 = 0x24;
    pub const VOUT_D_HIGH: u8 = 0x2B;
    pub const VOUT_D_LOW: u8 = 0x2C;
}

const VOUT_MIN_MV: u16 = 300;
const VOUT_MAX_MV: u16 = 2048;
const VOUT_STEP_MV: u16 = 2;

/// Bound on one bus transaction
const TRANSFER_TIMEOUT_MS: u32 = 100;

/// Buck converter output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BuckChannel {
    A,
    B,
    C,
    D,
}

impl BuckChannel {
    pub const ALL: [BuckChannel; 4] = [Self::A, Self::B, Self::C, Self::D];

    /// High byte register; the low byte follows it
    pub const fn vout_register(self) -> u8 {
        match self {
            Self::A => reg::VOUT_A_HIGH,
            Self::B => reg::VOUT_B_HIGH,
            Self::C => reg::VOUT_C_HIGH,
            Self::D => reg::VOUT_D_HIGH,
        }
    }

    /// Bit in STATUS_UV; the rails are listed in reverse
    const fn uv_bit(self) -> u8 {
        match self {
            Self::A => 0x08,
            Self::B => 0x04,
            Self::C => 0x02,
            Self::D => 0x01,
        }
    }
}

/// STATUS_UV register (0x07)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusUv(u8);

impl StatusUv {
    const RAIL_BITS: u8 = 0x0F;

    /// Decode a raw register value; the reserved upper nibble is dropped
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte & Self::RAIL_BITS)
    }

    pub const fn to_byte(self) -> u8 {
        self.0
    }

    pub const fn is_undervoltage(self, channel: BuckChannel) -> bool {
        self.0 & channel.uv_bit() != 0
    }

    pub const fn buck_a(self) -> bool {
        self.is_undervoltage(BuckChannel::A)
    }

    pub const fn buck_b(self) -> bool {
        self.is_undervoltage(BuckChannel::B)
    }

    pub const fn buck_c(self) -> bool {
        self.is_undervoltage(BuckChannel::C)
    }

    pub const fn buck_d(self) -> bool {
        self.is_undervoltage(BuckChannel::D)
    }

    /// No rail reports under-voltage
    pub const fn all_good(self) -> bool {
        self.0 == 0
    }
}

/// PMIC driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PmicError {
    /// Requested voltage outside 300..=2048 mV
    VoltageOutOfRange,
    /// I2C transaction failed
    Bus,
    /// Transaction did not finish within 100 ms
    Timeout,
}

/// 10-bit reference code for `millivolts`
///
/// Odd millivolt values round down to the 2 mV step below.
pub fn vout_code(millivolts: u16) -> Result<u16, PmicError> {
    if !(VOUT_MIN_MV..=VOUT_MAX_MV).contains(&millivolts) {
        return Err(PmicError::VoltageOutOfRange);
    }
    Ok((millivolts - VOUT_MIN_MV) / VOUT_STEP_MV)
}

/// MP5475GU driver
pub struct Mp5475gu<I2C, D> {
    i2c: I2C,
    delay: D,
}

impl<I2C: I2c, D: DelayNs> Mp5475gu<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self { i2c, delay }
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Program the output voltage of one rail
    pub async fn set_vout(&mut self, channel: BuckChannel, millivolts: u16) -> Result<(), PmicError> {
        let code = vout_code(millivolts)?;
        let frame = [
            channel.vout_register(),
            ((code >> 8) & 0x03) as u8,
            (code & 0xFF) as u8,
        ];
        bounded(&mut self.delay, self.i2c.write(I2C_ADDRESS, &frame)).await?;
        debug!("buck {:?} set to {=u16} mV", channel, millivolts);
        Ok(())
    }

    pub async fn read_uv_status(&mut self) -> Result<StatusUv, PmicError> {
        let mut byte = [0u8; 1];
        bounded(
            &mut self.delay,
            self.i2c.write_read(I2C_ADDRESS, &[reg::STATUS_UV], &mut byte),
        )
        .await?;
        Ok(StatusUv::from_byte(byte[0]))
    }
}

async fn bounded<D, E, F>(delay: &mut D, transfer: F) -> Result<(), PmicError>
where
    D: DelayNs,
    F: Future<Output = Result<(), E>>,
{
    match select(transfer, delay.delay_ms(TRANSFER_TIMEOUT_MS)).await {
        Either::First(Ok(())) => Ok(()),
        Either::First(Err(_)) => Err(PmicError::Bus),
        Either::Second(()) => Err(PmicError::Timeout),
    }
}
