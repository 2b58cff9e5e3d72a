//! Standard machine assembly: a core plus the peripheral set on the default
//! memory map.

use crate::bus::{Bus, MapError};
use crate::cpu::Cpu;
use crate::devices::ram::Ram;
use crate::devices::rom::Rom;
use crate::devices::spi::Spi;
use crate::devices::uart::Uart;
use crate::devices::vga::Vga;
use std::sync::Arc;

/// Geometry of the machine. The defaults follow the memory map the firmware
/// is linked against; everything is relocatable for tests.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base address of the small writable boot RAM.
    pub boot_ram_base: u32,
    pub boot_ram_size: usize,
    /// Base address of the read-only program image.
    pub program_rom_base: u32,
    pub program_rom_size: usize,
    /// Base address of the read-only asset blob.
    pub data_rom_base: u32,
    pub data_rom_size: usize,
    /// Base address of main RAM.
    pub main_ram_base: u32,
    pub main_ram_size: usize,
    pub spi_base: u32,
    pub vga_base: u32,
    pub vga_width: usize,
    pub vga_height: usize,
    pub uart_base: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            boot_ram_base: 0x0000_0000,
            boot_ram_size: 0x1_0000,
            program_rom_base: 0x4010_0000,
            program_rom_size: 0x10_0000,
            data_rom_base: 0x4020_0000,
            data_rom_size: 0x80_0000,
            main_ram_base: 0x4100_0000,
            main_ram_size: 0x100_0000,
            spi_base: 0x8000_0000,
            vga_base: 0x8100_0000,
            vga_width: 320,
            vga_height: 200,
            uart_base: 0x8200_0000,
        }
    }
}

/// Host-side handles to the devices attached to a [`Board`]'s bus.
///
/// The handles stay valid after the core is moved into a worker thread; the
/// devices synchronize internally.
#[derive(Debug, Clone)]
pub struct Peripherals {
    pub boot_ram: Arc<Ram>,
    pub program_rom: Arc<Rom>,
    pub data_rom: Arc<Rom>,
    pub main_ram: Arc<Ram>,
    pub uart: Arc<Uart>,
    pub vga: Arc<Vga>,
}

/// A complete machine: one core wired to the full peripheral set.
#[derive(Debug)]
pub struct Board {
    cpu: Cpu,
    peripherals: Peripherals,
}

impl Board {
    /// Build the machine described by `config`.
    ///
    /// Fails only if the configured regions overlap.
    pub fn new(config: &Config) -> Result<Self, MapError> {
        let mut bus = Bus::new();

        let boot_ram = Ram::new("boot_ram", config.boot_ram_size);
        boot_ram.map(config.boot_ram_base, &mut bus)?;

        let program_rom = Rom::new("program_rom", config.program_rom_size);
        program_rom.map(config.program_rom_base, &mut bus)?;

        let data_rom = Rom::new("data_rom", config.data_rom_size);
        data_rom.map(config.data_rom_base, &mut bus)?;

        let main_ram = Ram::new("main_ram", config.main_ram_size);
        main_ram.map(config.main_ram_base, &mut bus)?;

        Spi::new().map(config.spi_base, &mut bus)?;

        let vga = Vga::new(config.vga_width, config.vga_height);
        vga.map(config.vga_base, &mut bus)?;

        let uart = Uart::new();
        uart.map(config.uart_base, &mut bus)?;

        log::debug!("memory map:\n{}", bus.describe());

        Ok(Self {
            cpu: Cpu::new(bus),
            peripherals: Peripherals {
                boot_ram,
                program_rom,
                data_rom,
                main_ram,
                uart,
                vga,
            },
        })
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn peripherals(&self) -> &Peripherals {
        &self.peripherals
    }

    /// Split the board into the core and the device handles, e.g. to hand
    /// the core to an [`crate::engine::Engine`].
    pub fn split(self) -> (Cpu, Peripherals) {
        (self.cpu, self.peripherals)
    }
}
