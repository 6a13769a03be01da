//! 25LC256 persistence engine
//!
//! The 25LC256 is a 32 KiB SPI EEPROM organised in 64-byte pages. A WRITE
//! command may only program bytes within one page; bytes beyond the page
//! end wrap to the start of the same page. Every WRITE (and WRSR) must be
//! preceded by WREN, and the device ignores further writes until its
//! internal cycle (WIP) finishes.
//!
//! # Frame layout
//!
//! ```text
//! READ   CS↓ [0x03][addr_hi][addr_lo] <- data...                CS↑
//! WRITE  CS↓ [0x02][addr_hi][addr_lo] -> data (≤ page end)      CS↑
//! WREN   CS↓ [0x06]                                             CS↑
//! RDSR   CS↓ [0x05] <- status                                   CS↑
//! ```
//!
//! # Write sequence (per page chunk)
//!
//! ```text
//! Idle ─► WriteEnableSent ─► BurstTransmitting ─► AwaitingWriteCompletion
//!   ▲                                                      │
//!   └──────────── last chunk committed ◄───────────────────┘
//! ```
//!
//! Each bus transfer is raced against `transfer_timeout_us`; WIP polling is
//! bounded by `status_poll_limit`. Chip select is released on every exit
//! path, including errors.

use core::future::Future;

use brakepmu_hal::storage::{NvStorage, StorageError};
use embassy_futures::select::{select, Either};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiBus;

use super::status::Status;

/// 25LC256 instruction set
pub mod cmd {
    /// Read data from memory
    pub const READ: u8 = 0x03;
    /// Write data to memory
    pub const WRITE: u8 = 0x02;
    /// Set the write enable latch
    pub const WREN: u8 = 0x06;
    /// Reset the write enable latch
    pub const WRDI: u8 = 0x04;
    /// Read status register
    pub const RDSR: u8 = 0x05;
    /// Write status register
    pub const WRSR: u8 = 0x01;
}

/// Bytes reachable through the 16-bit address header
const ADDRESS_SPACE: usize = 0x1_0000;

/// Device geometry and timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EepromConfig {
    /// Write page size in bytes
    pub page_size: u16,
    /// Array size in bytes
    pub capacity: usize,
    /// Upper bound for a single SPI transfer
    pub transfer_timeout_us: u32,
    /// Delay between WIP polls
    pub status_poll_interval_us: u32,
    /// WIP polls before giving up on a write cycle
    pub status_poll_limit: u16,
}

impl EepromConfig {
    /// Microchip 25LC256: 64-byte pages, 32 KiB, 5 ms max write cycle
    pub const M25LC256: Self = Self {
        page_size: 64,
        capacity: 32 * 1024,
        transfer_timeout_us: 10_000,
        status_poll_interval_us: 500,
        status_poll_limit: 20,
    };
}

impl Default for EepromConfig {
    fn default() -> Self {
        Self::M25LC256
    }
}

/// EEPROM driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EepromError {
    /// Address range exceeds the array
    OutOfRange,
    /// Zero page size, or a capacity beyond the 16-bit address space
    InvalidConfig,
    /// SPI transfer failed
    Bus,
    /// Chip select pin could not be driven
    ChipSelect,
    /// Transfer or write cycle did not finish in time
    Timeout,
}

impl From<EepromError> for StorageError {
    fn from(e: EepromError) -> Self {
        match e {
            EepromError::OutOfRange | EepromError::InvalidConfig => {
                StorageError::InvalidArgument
            }
            EepromError::Bus | EepromError::ChipSelect => StorageError::Device,
            EepromError::Timeout => StorageError::Timeout,
        }
    }
}

/// Progress of a paged write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteState {
    Idle,
    /// WREN sent for the current chunk
    WriteEnableSent,
    /// WRITE frame with the chunk data on the bus
    BurstTransmitting,
    /// Polling WIP until the device commits the chunk
    AwaitingWriteCompletion,
}

/// Length of the chunk starting at `address` that stays within one page
///
/// `page_size` must be non-zero.
pub fn page_chunk_len(address: usize, remaining: usize, page_size: usize) -> usize {
    let room = page_size - address % page_size;
    remaining.min(room)
}

/// Data phase following the instruction header
enum Phase<'d> {
    None,
    Read(&'d mut [u8]),
    Write(&'d [u8]),
}

/// 25LC256 driver over an exclusively owned SPI bus and chip select
pub struct Eeprom25lc256<SPI, CS, D> {
    spi: SPI,
    cs: CS,
    delay: D,
    config: EepromConfig,
    state: WriteState,
}

impl<SPI, CS, D> Eeprom25lc256<SPI, CS, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    /// Create a driver and park chip select high
    pub fn new(spi: SPI, mut cs: CS, delay: D, config: EepromConfig) -> Result<Self, EepromError> {
        if config.page_size == 0 || config.capacity > ADDRESS_SPACE {
            return Err(EepromError::InvalidConfig);
        }
        cs.set_high().map_err(|_| EepromError::ChipSelect)?;
        Ok(Self {
            spi,
            cs,
            delay,
            config,
            state: WriteState::Idle,
        })
    }

    pub fn config(&self) -> &EepromConfig {
        &self.config
    }

    /// Current step of the write sequence
    pub fn state(&self) -> WriteState {
        self.state
    }

    /// Release the bus, chip select and delay
    pub fn release(self) -> (SPI, CS, D) {
        (self.spi, self.cs, self.delay)
    }

    /// Read `buffer.len()` bytes starting at `address`
    pub async fn read(&mut self, address: u16, buffer: &mut [u8]) -> Result<(), EepromError> {
        self.check_range(address, buffer.len())?;
        if buffer.is_empty() {
            return Ok(());
        }
        let [hi, lo] = address.to_be_bytes();
        self.frame(&[cmd::READ, hi, lo], Phase::Read(buffer)).await
    }

    /// Write `data` starting at `address`, split at page boundaries
    ///
    /// Returns once the device has committed the final chunk.
    pub async fn write(&mut self, address: u16, data: &[u8]) -> Result<(), EepromError> {
        self.check_range(address, data.len())?;
        let result = self.write_pages(address, data).await;
        self.state = WriteState::Idle;
        if let Err(e) = result {
            warn!("EEPROM write at {=u16} failed: {:?}", address, e);
        }
        result
    }

    pub async fn read_status(&mut self) -> Result<Status, EepromError> {
        let mut byte = [0u8; 1];
        self.frame(&[cmd::RDSR], Phase::Read(&mut byte)).await?;
        Ok(Status::from_byte(byte[0]))
    }

    /// Reset the write enable latch
    pub async fn write_disable(&mut self) -> Result<(), EepromError> {
        self.frame(&[cmd::WRDI], Phase::None).await
    }

    /// Program the block-protect and WPEN bits
    pub async fn write_status(&mut self, status: Status) -> Result<(), EepromError> {
        self.frame(&[cmd::WREN], Phase::None).await?;
        self.frame(&[cmd::WRSR], Phase::Write(&[status.writable_bits()]))
            .await?;
        self.wait_write_complete().await
    }

    fn check_range(&self, address: u16, len: usize) -> Result<(), EepromError> {
        let end = address as usize + len;
        if end > self.config.capacity || end > ADDRESS_SPACE {
            return Err(EepromError::OutOfRange);
        }
        Ok(())
    }

    async fn write_pages(&mut self, address: u16, data: &[u8]) -> Result<(), EepromError> {
        let page_size = self.config.page_size as usize;
        let mut address = address as usize;
        let mut remaining = data;

        while !remaining.is_empty() {
            let len = page_chunk_len(address, remaining.len(), page_size);
            let (chunk, rest) = remaining.split_at(len);

            self.frame(&[cmd::WREN], Phase::None).await?;
            self.state = WriteState::WriteEnableSent;

            // check_range keeps every chunk below ADDRESS_SPACE
            let [hi, lo] = (address as u16).to_be_bytes();
            self.state = WriteState::BurstTransmitting;
            self.frame(&[cmd::WRITE, hi, lo], Phase::Write(chunk)).await?;

            self.state = WriteState::AwaitingWriteCompletion;
            self.wait_write_complete().await?;
            trace!("EEPROM chunk {=usize}+{=usize} committed", address, len);

            address += len;
            remaining = rest;
        }
        Ok(())
    }

    async fn wait_write_complete(&mut self) -> Result<(), EepromError> {
        for _ in 0..self.config.status_poll_limit {
            if !self.read_status().await?.write_in_progress() {
                return Ok(());
            }
            self.delay
                .delay_us(self.config.status_poll_interval_us)
                .await;
        }
        Err(EepromError::Timeout)
    }

    /// One chip-select frame: header, optional data phase, flush
    async fn frame(&mut self, header: &[u8], phase: Phase<'_>) -> Result<(), EepromError> {
        self.cs.set_low().map_err(|_| EepromError::ChipSelect)?;
        let result = self.exchange(header, phase).await;
        let released = self.cs.set_high().map_err(|_| EepromError::ChipSelect);
        result.and(released)
    }

    async fn exchange(&mut self, header: &[u8], phase: Phase<'_>) -> Result<(), EepromError> {
        let timeout = self.config.transfer_timeout_us;
        bounded(&mut self.delay, timeout, self.spi.write(header)).await?;
        match phase {
            Phase::None => {}
            Phase::Read(buffer) => {
                bounded(&mut self.delay, timeout, self.spi.read(buffer)).await?
            }
            Phase::Write(data) => bounded(&mut self.delay, timeout, self.spi.write(data)).await?,
        }
        // Chip select may only rise once the last byte has left the shifter
        bounded(&mut self.delay, timeout, self.spi.flush()).await
    }
}

/// Race a bus transfer against the timeout
async fn bounded<D, E, F>(delay: &mut D, timeout_us: u32, transfer: F) -> Result<(), EepromError>
where
    D: DelayNs,
    F: Future<Output = Result<(), E>>,
{
    match select(transfer, delay.delay_us(timeout_us)).await {
        Either::First(Ok(())) => Ok(()),
        Either::First(Err(_)) => Err(EepromError::Bus),
        Either::Second(()) => Err(EepromError::Timeout),
    }
}

impl<SPI, CS, D> NvStorage for Eeprom25lc256<SPI, CS, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    async fn read(&mut self, address: u16, buffer: &mut [u8]) -> Result<(), StorageError> {
        Eeprom25lc256::read(self, address, buffer)
            .await
            .map_err(StorageError::from)
    }

    async fn write(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError> {
        Eeprom25lc256::write(self, address, data)
            .await
            .map_err(StorageError::from)
    }

    fn capacity(&self) -> usize {
        self.config.capacity
    }
}
