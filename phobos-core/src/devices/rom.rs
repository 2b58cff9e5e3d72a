//! Read-only memory holding a firmware or asset image.

use super::read_le_word;
use crate::bus::{AccessError, Bus, MapError};
use std::sync::{Arc, RwLock};

/// A read-only region of bytes, mapped on the bus without a write handler.
///
/// Reads may be unaligned; the word is assembled from the bytes at
/// `offset..offset + 4` in little-endian order. Reads past the end of the
/// image fail. The host fills the image through [`Rom::load`] before
/// execution starts.
#[derive(Debug)]
pub struct Rom {
    name: String,
    data: RwLock<Vec<u8>>,
}

impl Rom {
    /// Create a zero-filled ROM. The size is rounded up to a whole number of
    /// words.
    pub fn new(name: impl Into<String>, size: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            data: RwLock::new(vec![0; pad_to_word(size)]),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes. Always a multiple of 4.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    /// Copy `image` into the ROM starting at `offset`.
    pub fn load(&self, offset: u32, image: &[u8]) -> Result<(), AccessError> {
        let mut data = self.data.write().unwrap();
        let start = offset as usize;
        let region = start
            .checked_add(image.len())
            .and_then(|end| data.get_mut(start..end))
            .ok_or(AccessError::OutOfBounds {
                region: self.name.clone(),
                address: offset,
            })?;
        region.copy_from_slice(image);
        Ok(())
    }

    fn read(&self, offset: u32) -> Result<u32, AccessError> {
        read_le_word(&self.name, &self.data.read().unwrap(), offset)
    }

    /// Map the ROM read-only onto `bus` at `base_address`.
    pub fn map(self: &Arc<Self>, base_address: u32, bus: &mut Bus) -> Result<(), MapError> {
        let rom = Arc::clone(self);
        let read = move |address: u32| rom.read(address - base_address);
        bus.map(
            &self.name,
            base_address,
            base_address + self.len() as u32,
            Some(Box::new(read)),
            None,
        )
    }
}

fn pad_to_word(size: usize) -> usize {
    match size % 4 {
        0 => size,
        r => size + (4 - r),
    }
}
