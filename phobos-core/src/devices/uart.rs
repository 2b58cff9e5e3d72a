//! Byte-oriented console device.
//!
//! The guest sees an 8-byte window; only offset 0 is active. Byte writes
//! append to an output buffer the host drains with [`Uart::take_output`],
//! byte reads consume from an input buffer the host fills with
//! [`Uart::put_char`]. Reading with no input pending returns `0xFFFF_FFFF`
//! so the guest can poll without blocking.

use crate::bus::{AccessError, Bus, MapError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// The size of the guest-visible register window, in bytes.
const WINDOW: u32 = 8;

/// Value returned when the input buffer is empty.
const NO_DATA: u32 = 0xFFFF_FFFF;

#[derive(Debug, Default)]
struct State {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

/// A UART-style console with host-side input and output buffers.
#[derive(Debug, Default)]
pub struct Uart {
    state: Mutex<State>,
}

impl Uart {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a character for the guest to read.
    pub fn put_char(&self, byte: u8) {
        self.state.lock().unwrap().input.push_back(byte);
    }

    /// Drain everything the guest has written so far.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.lock().unwrap().output)
    }

    fn read(&self, offset: u32) -> Result<u32, AccessError> {
        if offset != 0 {
            return Ok(NO_DATA);
        }
        let mut state = self.state.lock().unwrap();
        Ok(state.input.pop_front().map_or(NO_DATA, u32::from))
    }

    fn write(&self, offset: u32, value: u32, _write_mask: u8) -> Result<(), AccessError> {
        if offset == 0 {
            self.state.lock().unwrap().output.push((value & 0xFF) as u8);
        }
        Ok(())
    }

    /// Map the register window onto `bus` at `base_address`.
    pub fn map(self: &Arc<Self>, base_address: u32, bus: &mut Bus) -> Result<(), MapError> {
        let uart = Arc::clone(self);
        let read = move |address: u32| uart.read(address - base_address);
        let uart = Arc::clone(self);
        let write = move |address: u32, value: u32, write_mask: u8| {
            uart.write(address - base_address, value, write_mask)
        };
        bus.map(
            "uart",
            base_address,
            base_address + WINDOW,
            Some(Box::new(read)),
            Some(Box::new(write)),
        )
    }
}
