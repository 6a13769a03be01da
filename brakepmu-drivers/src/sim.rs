//! Host-side device simulations for driver tests

use core::cell::RefCell;
use core::convert::Infallible;

use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::i2c::{ErrorKind as I2cErrorKind, NoAcknowledgeSource, Operation};
use embedded_hal::spi::ErrorKind as SpiErrorKind;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{ErrorType as I2cErrorType, I2c};
use embedded_hal_async::spi::{ErrorType as SpiErrorType, SpiBus};
use heapless::Vec;

use crate::eeprom::cmd;

pub const SIM_CAPACITY: usize = 32 * 1024;
const SIM_PAGE: usize = 64;

/// Delay that completes on first poll
pub struct NoDelay;

impl DelayNs for NoDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

/// A committed WRITE command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub address: u16,
    pub len: usize,
}

/// 25LC256 model: page wrap, write enable latch, WIP
pub struct SimEeprom {
    pub memory: [u8; SIM_CAPACITY],
    pub selected: bool,
    /// Chip-select frames completed
    pub frames: usize,
    pub write_log: Vec<WriteRecord, 64>,
    /// RDSR polls reporting WIP after each write
    pub busy_polls: u8,
    pub stuck_busy: bool,
    pub fail_bus: bool,
    pub hang: bool,
    rx: Vec<u8, 128>,
    read_offset: usize,
    wel: bool,
    protect: u8,
    wip_remaining: u8,
}

impl SimEeprom {
    pub fn new() -> Self {
        Self {
            memory: [0xFF; SIM_CAPACITY],
            selected: false,
            frames: 0,
            write_log: Vec::new(),
            busy_polls: 0,
            stuck_busy: false,
            fail_bus: false,
            hang: false,
            rx: Vec::new(),
            read_offset: 0,
            wel: false,
            protect: 0,
            wip_remaining: 0,
        }
    }

    fn busy(&self) -> bool {
        self.stuck_busy || self.wip_remaining > 0
    }

    fn status(&mut self) -> u8 {
        let mut status = self.protect;
        if self.busy() {
            status |= 0x01;
            self.wip_remaining = self.wip_remaining.saturating_sub(1);
        }
        if self.wel {
            status |= 0x02;
        }
        status
    }

    fn header_address(&self) -> usize {
        u16::from_be_bytes([self.rx[1], self.rx[2]]) as usize
    }

    fn clock_out(&mut self, words: &mut [u8]) {
        match self.rx.first().copied() {
            Some(cmd::READ) if self.rx.len() >= 3 => {
                let start = self.header_address();
                for w in words.iter_mut() {
                    *w = self.memory[(start + self.read_offset) % SIM_CAPACITY];
                    self.read_offset += 1;
                }
            }
            Some(cmd::RDSR) => {
                for w in words.iter_mut() {
                    *w = self.status();
                }
            }
            _ => words.fill(0xFF),
        }
    }

    /// Act on the frame when chip select rises
    fn commit(&mut self) {
        self.frames += 1;
        match self.rx.first().copied() {
            Some(cmd::WREN) if !self.busy() => self.wel = true,
            Some(cmd::WRDI) if !self.busy() => self.wel = false,
            Some(cmd::WRITE) if self.wel && !self.busy() && self.rx.len() > 3 => {
                let address = self.header_address();
                let page_base = address - address % SIM_PAGE;
                let data_len = self.rx.len() - 3;
                for i in 0..data_len {
                    let offset = (address % SIM_PAGE + i) % SIM_PAGE;
                    self.memory[page_base + offset] = self.rx[3 + i];
                }
                let _ = self.write_log.push(WriteRecord {
                    address: address as u16,
                    len: data_len,
                });
                self.wel = false;
                self.wip_remaining = self.busy_polls;
            }
            Some(cmd::WRSR) if self.wel && !self.busy() && self.rx.len() > 1 => {
                self.protect = self.rx[1] & 0x8C;
                self.wel = false;
                self.wip_remaining = self.busy_polls;
            }
            _ => {}
        }
    }
}

/// SPI side of a [`SimEeprom`]
pub struct SimBus<'a>(pub &'a RefCell<SimEeprom>);

/// Chip select side of a [`SimEeprom`]
pub struct SimCs<'a>(pub &'a RefCell<SimEeprom>);

impl SimBus<'_> {
    async fn stall_or_fail(&mut self) -> Result<(), SpiErrorKind> {
        let (hang, fail) = {
            let sim = self.0.borrow();
            (sim.hang, sim.fail_bus)
        };
        if hang {
            core::future::pending::<()>().await;
        }
        if fail {
            return Err(SpiErrorKind::Other);
        }
        Ok(())
    }
}

impl SpiErrorType for SimBus<'_> {
    type Error = SpiErrorKind;
}

impl SpiBus for SimBus<'_> {
    async fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.stall_or_fail().await?;
        self.0.borrow_mut().clock_out(words);
        Ok(())
    }

    async fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        self.stall_or_fail().await?;
        let mut sim = self.0.borrow_mut();
        for &w in words {
            let _ = sim.rx.push(w);
        }
        Ok(())
    }

    async fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.write(write).await?;
        self.read(read).await
    }

    async fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.read(words).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl PinErrorType for SimCs<'_> {
    type Error = Infallible;
}

impl OutputPin for SimCs<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut sim = self.0.borrow_mut();
        sim.selected = true;
        sim.rx.clear();
        sim.read_offset = 0;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut sim = self.0.borrow_mut();
        if sim.selected {
            sim.selected = false;
            sim.commit();
        }
        Ok(())
    }
}

/// MP5475GU register file behind an I2C target
pub struct SimPmic {
    pub address: u8,
    pub registers: [u8; 0x40],
    pub hang: bool,
    pub nack: bool,
    pointer: usize,
}

impl SimPmic {
    pub fn new() -> Self {
        Self {
            address: 0x60,
            registers: [0; 0x40],
            hang: false,
            nack: false,
            pointer: 0,
        }
    }
}

impl I2cErrorType for SimPmic {
    type Error = I2cErrorKind;
}

impl I2c for SimPmic {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.hang {
            core::future::pending::<()>().await;
        }
        if self.nack || address != self.address {
            return Err(I2cErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    if let Some((&reg, data)) = bytes.split_first() {
                        self.pointer = reg as usize;
                        for &b in data {
                            self.registers[self.pointer % 0x40] = b;
                            self.pointer += 1;
                        }
                    }
                }
                Operation::Read(buffer) => {
                    for b in buffer.iter_mut() {
                        *b = self.registers[self.pointer % 0x40];
                        self.pointer += 1;
                    }
                }
            }
        }
        Ok(())
    }
}
