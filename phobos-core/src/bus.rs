//! Address-mapped system bus with named, non-overlapping regions.
//!
//! The bus does not store any device memory itself; it only routes accesses.
//! A region binds a half-open `[start, end)` address window to an optional
//! read handler and an optional write handler, and handlers receive the
//! absolute bus address (devices subtract their base when they register).
//!
//! All data moves as 32-bit words. Writes carry a 4-bit byte-enable mask
//! (see [`crate::mask`]) so that byte and halfword stores can be expressed
//! without the bus knowing anything about the target device's layout.

use crate::mask;
use crate::AddressRange;
use std::fmt::Write as _;
use thiserror::Error;

/// Handler invoked for reads into a region. Receives the absolute address.
pub type ReadHandler = Box<dyn Fn(u32) -> Result<u32, AccessError> + Send + Sync>;

/// Handler invoked for writes into a region. Receives the absolute address,
/// the value, and the byte-enable mask.
pub type WriteHandler = Box<dyn Fn(u32, u32, u8) -> Result<(), AccessError> + Send + Sync>;

struct Region {
    name: String,
    range: AddressRange,
    read: Option<ReadHandler>,
    write: Option<WriteHandler>,
}

/// A 32-bit address bus routing word accesses to mapped regions.
#[derive(Default)]
pub struct Bus {
    /// Regions, kept sorted by start address and pairwise non-overlapping.
    regions: Vec<Region>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `[start, end)` to the given handlers under `name`.
    ///
    /// Fails if the range is empty, if it intersects an already mapped
    /// region, or if neither a read nor a write handler is supplied.
    pub fn map(
        &mut self,
        name: impl Into<String>,
        start: u32,
        end: u32,
        read: Option<ReadHandler>,
        write: Option<WriteHandler>,
    ) -> Result<(), MapError> {
        let name = name.into();
        let range = AddressRange::try_from(start..end)
            .map_err(|_| MapError::BadRange { start, end })?;
        if read.is_none() && write.is_none() {
            return Err(MapError::NoHandlers(name));
        }
        if let Some(mapped) = self.regions.iter().find(|r| r.range.overlaps(range)) {
            return Err(MapError::Overlap {
                start,
                end,
                mapped: mapped.name.clone(),
            });
        }
        let index = self
            .regions
            .partition_point(|r| r.range.start() < range.start());
        self.regions.insert(
            index,
            Region {
                name,
                range,
                read,
                write,
            },
        );
        Ok(())
    }

    /// Remove the region mapped under `name`. No-op if there is none.
    pub fn unmap(&mut self, name: &str) {
        self.regions.retain(|r| r.name != name);
    }

    /// Read the word the region containing `address` exposes there.
    pub fn read(&self, address: u32) -> Result<u32, AccessError> {
        let region = self.region(address).ok_or(AccessError::Unmapped(address))?;
        let read = region.read.as_ref().ok_or(AccessError::NoReader(address))?;
        read(address)
    }

    /// Write a word through the region containing `address`.
    ///
    /// `write_mask` selects the participating bytes; see [`crate::mask`].
    pub fn write(&self, address: u32, value: u32, write_mask: u8) -> Result<(), AccessError> {
        let region = self.region(address).ok_or(AccessError::Unmapped(address))?;
        let write = region.write.as_ref().ok_or(AccessError::NoWriter(address))?;
        write(address, value, write_mask)
    }

    /// Read a single byte (the low 8 bits of the word at `address`).
    pub fn read_byte(&self, address: u32) -> Result<u8, AccessError> {
        self.read(address).map(|v| (v & 0xFF) as u8)
    }

    /// Read a halfword (the low 16 bits of the word at `address`).
    pub fn read_halfword(&self, address: u32) -> Result<u16, AccessError> {
        self.read(address).map(|v| (v & 0xFFFF) as u16)
    }

    /// Read a full word.
    pub fn read_word(&self, address: u32) -> Result<u32, AccessError> {
        self.read(address)
    }

    /// Write a single byte.
    pub fn write_byte(&self, address: u32, value: u8) -> Result<(), AccessError> {
        self.write(address, value as u32, mask::BYTE)
    }

    /// Write a halfword.
    pub fn write_halfword(&self, address: u32, value: u16) -> Result<(), AccessError> {
        self.write(address, value as u32, mask::HALFWORD)
    }

    /// Write a full word.
    pub fn write_word(&self, address: u32, value: u32) -> Result<(), AccessError> {
        self.write(address, value, mask::WORD)
    }

    /// Render all current mappings as a human-readable table, sorted by
    /// start address. The `End` column shows the last mapped address.
    pub fn describe(&self) -> String {
        let mut out = format!("{:>20} {:>8} {:>8} {:>2}\n", "Name", "Start", "End", "RW");
        for region in &self.regions {
            let rw = match (region.read.is_some(), region.write.is_some()) {
                (true, true) => "RW",
                (true, false) => "R-",
                (false, true) => "-W",
                // Rejected at mapping time.
                (false, false) => "--",
            };
            let _ = writeln!(
                out,
                "{:>20} {:08x} {:08x} {:>2}",
                region.name,
                region.range.start(),
                region.range.end(),
                rw
            );
        }
        out
    }

    fn region(&self, address: u32) -> Option<&Region> {
        let index = self
            .regions
            .partition_point(|r| r.range.start() <= address)
            .checked_sub(1)?;
        let region = &self.regions[index];
        region.range.contains(address).then_some(region)
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("regions", &self.regions.iter().map(|r| &r.name).collect::<Vec<_>>())
            .finish()
    }
}

/// Errors produced while routing or performing a bus access.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum AccessError {
    #[error("unmapped space at {0:#010x}")]
    Unmapped(u32),
    #[error("no read handler for {0:#010x}")]
    NoReader(u32),
    #[error("no write handler for {0:#010x}")]
    NoWriter(u32),
    /// The target region does not support the requested byte-enable mask.
    #[error("({region}) unsupported write mask {mask:#06b} at {address:#010x}")]
    BadMask {
        region: String,
        mask: u8,
        address: u32,
    },
    /// The access went past the end of the device behind the region.
    #[error("({region}) access beyond end of device at {address:#010x}")]
    OutOfBounds { region: String, address: u32 },
    /// The device requires aligned access.
    #[error("({region}) misaligned access at {address:#010x}")]
    Misaligned { region: String, address: u32 },
}

/// Errors rejected at mapping time.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum MapError {
    #[error("range {start:#010x}..{end:#010x} is already mapped to {mapped:?}")]
    Overlap {
        start: u32,
        end: u32,
        mapped: String,
    },
    #[error("range {start:#010x}..{end:#010x} is empty")]
    BadRange { start: u32, end: u32 },
    #[error("region {0:?} has neither a read nor a write handler")]
    NoHandlers(String),
}
