//! Emulator core for a 32-bit RISC-V (RV32I) machine.
//!
//! The crate is organised around three pieces:
//!
//! - [`bus::Bus`], an address-mapped system bus routing reads and writes to
//!   named, non-overlapping regions backed by pluggable handlers.
//! - [`cpu::Cpu`], the fetch/decode/execute engine owning the program
//!   counter, the register bank, and the breakpoint set.
//! - [`engine::Engine`], a worker-thread control layer providing the
//!   start/stop/pause/step surface expected by a debugger front-end.
//!
//! The peripheral set needed to run bare-metal firmware (RAM, ROM, UART,
//! a palette-indexed video adapter, and an SPI stub) lives in [`devices`],
//! and [`board::Board`] wires everything together on the default memory map.

#[macro_use]
extern crate static_assertions;

pub mod address_range;
pub mod alu;
pub mod board;
pub mod bus;
pub mod cpu;
pub mod devices;
pub mod engine;
pub mod instruction;
pub mod registers;

pub use address_range::AddressRange;
pub use bus::Bus;
pub use cpu::Cpu;
pub use engine::Engine;

/// Byte-enable masks for 32-bit bus writes.
///
/// Bit *i* of a mask selects byte *i* of the word being written. The core
/// only ever produces the three masks below (byte, aligned halfword, full
/// word); peripherals are free to reject anything else.
pub mod mask {
    /// Low byte only (bits 7:0).
    pub const BYTE: u8 = 0b0001;

    /// Low halfword (bits 15:0).
    pub const HALFWORD: u8 = 0b0011;

    /// Full word.
    pub const WORD: u8 = 0b1111;
}
