//! Bus-facing peripherals: memories, console, video adapter, SPI stub.
//!
//! Every device owns its internal buffers and synchronizes access to them
//! itself, so handlers installed on the bus can be called from the CPU
//! worker while the host inspects the device from another thread. The bus
//! never copies device memory; it only routes addresses.

pub mod ram;
pub mod rom;
pub mod spi;
pub mod uart;
pub mod vga;

use crate::bus::AccessError;

/// Reads the little-endian word at byte `offset` of `data`.
///
/// Unaligned offsets are allowed; devices that require alignment check
/// before calling this.
pub(crate) fn read_le_word(region: &str, data: &[u8], offset: u32) -> Result<u32, AccessError> {
    const_assert!(usize::BITS >= 32);
    let start = offset as usize;
    let bytes = start
        .checked_add(4)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| AccessError::OutOfBounds {
            region: region.to_string(),
            address: offset,
        })?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
