//! Stub SPI controller.
//!
//! The firmware probes a flash controller at boot; nothing needs to answer
//! meaningfully for it to proceed. Every access succeeds: reads return 0,
//! writes are discarded, and known register offsets are logged by name so
//! the traffic can be followed in the debug log.

use crate::bus::{AccessError, Bus, MapError};

/// Size of the register window, in bytes.
const WINDOW: u32 = 256;

const CSR: u32 = 0x00;
const RF: u32 = 0x0C;
const MODE: u32 = 0x40;
const QSPI_PARAMS: u32 = 0x74;

/// A do-nothing SPI controller that logs the register traffic.
#[derive(Debug, Default)]
pub struct Spi;

impl Spi {
    pub fn new() -> Self {
        Self
    }

    fn read(offset: u32) -> Result<u32, AccessError> {
        match offset {
            CSR => log::debug!("spi: read csr"),
            RF => log::debug!("spi: read rf"),
            MODE => log::debug!("spi: read mode"),
            QSPI_PARAMS => log::debug!("spi: read qspi parameters"),
            _ => log::debug!("spi: read {:08x}", offset),
        }
        Ok(0)
    }

    fn write(offset: u32, value: u32, write_mask: u8) -> Result<(), AccessError> {
        match offset {
            CSR => log::debug!("spi: write csr = {:08x}", value),
            RF => log::debug!("spi: write rf = {:08x}", value),
            MODE => log::debug!("spi: set mode {:08x}", value),
            QSPI_PARAMS => log::debug!("spi: set qspi parameters {:08x}", value),
            _ => log::debug!("spi: write {:08x} {:08x} {:02x}", offset, value, write_mask),
        }
        Ok(())
    }

    /// Map the register window onto `bus` at `base_address`.
    pub fn map(&self, base_address: u32, bus: &mut Bus) -> Result<(), MapError> {
        let read = move |address: u32| Self::read(address - base_address);
        let write = move |address: u32, value: u32, write_mask: u8| {
            Self::write(address - base_address, value, write_mask)
        };
        bus.map(
            "spi",
            base_address,
            base_address + WINDOW,
            Some(Box::new(read)),
            Some(Box::new(write)),
        )
    }
}
