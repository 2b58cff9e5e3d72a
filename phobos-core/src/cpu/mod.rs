//! Fetch/decode/execute engine for the RV32I core.

mod execute;

use crate::bus::{AccessError, Bus};
use crate::instruction::Instruction;
use crate::registers::RegisterBank;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How many instructions are retired between deadline checks in
/// [`Cpu::run_until_with_timeout`].
const DEADLINE_CHECK_INTERVAL: u64 = 16;

/// A single RV32I hart attached to a system bus.
///
/// The `Cpu` owns the architectural state: program counter, register bank,
/// retired-instruction counter, and the breakpoint set. It executes
/// synchronously; the worker-thread control layer lives in
/// [`crate::engine::Engine`].
///
/// The program counter always points at the *next* instruction to fetch. It
/// is advanced by 4 before an instruction is dispatched, so control-flow
/// instructions compute their targets relative to `pc - 4`.
#[derive(Debug)]
pub struct Cpu {
    registers: RegisterBank,
    bus: Bus,
    pc: u32,
    cycle_count: u64,
    breakpoints: HashSet<u32>,
}

impl Cpu {
    /// Create a core with zeroed registers and `pc = 0`, attached to `bus`.
    pub fn new(bus: Bus) -> Self {
        Self {
            registers: RegisterBank::new(),
            bus,
            pc: 0,
            cycle_count: 0,
            breakpoints: HashSet::new(),
        }
    }

    pub fn registers(&self) -> &RegisterBank {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterBank {
        &mut self.registers
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Mutable access to the bus, for mapping regions.
    ///
    /// The region table must not change while another thread is executing on
    /// this core, which `&mut self` already guarantees.
    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    /// Number of instructions retired since creation or the last reset.
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Add a breakpoint. Hitting it pauses the run loop and makes
    /// [`Cpu::run_until`] return a [`ExecError::Breakpoint`].
    pub fn add_breakpoint(&mut self, address: u32) {
        self.breakpoints.insert(address);
    }

    pub fn remove_breakpoint(&mut self, address: u32) {
        self.breakpoints.remove(&address);
    }

    pub fn breakpoints(&self) -> &HashSet<u32> {
        &self.breakpoints
    }

    /// Clear all registers and set the PC back to 0.
    ///
    /// Breakpoints and the attached bus are left untouched.
    pub fn reset(&mut self) {
        log::info!("cpu reset");
        self.registers.reset();
        self.pc = 0;
        self.cycle_count = 0;
    }

    /// Fetch, decode, and execute a single instruction.
    ///
    /// On success the PC has advanced to the next instruction (sequentially,
    /// or to a branch/jump target) and the cycle counter has been bumped. On
    /// failure the error describes the fault; a failed fetch leaves the PC on
    /// the faulting instruction.
    pub fn step(&mut self) -> Result<(), ExecError> {
        let raw = self.bus.read(self.pc).map_err(|source| ExecError::Fetch {
            pc: self.pc,
            source,
        })?;
        self.pc = self.pc.wrapping_add(4);
        let instruction =
            Instruction::decode(raw).map_err(|_| ExecError::IllegalInstruction {
                instruction: raw,
                pc: self.pc.wrapping_sub(4),
            })?;
        self.execute(instruction)?;
        self.cycle_count += 1;
        Ok(())
    }

    /// Run until the PC reaches `address`.
    ///
    /// Surfaces breakpoints as [`ExecError::Breakpoint`] so callers blocked
    /// on this are woken up. Does not time out; combine with
    /// [`Cpu::run_until_with_timeout`] when the program may never arrive.
    pub fn run_until(&mut self, address: u32) -> Result<(), ExecError> {
        while self.pc != address {
            self.step()?;
            if self.breakpoints.contains(&self.pc) {
                return Err(ExecError::Breakpoint { pc: self.pc });
            }
        }
        Ok(())
    }

    /// Run until the PC reaches `address` or `timeout` has elapsed.
    ///
    /// The deadline is checked every 16 retired instructions; on expiry an
    /// [`ExecError::Timeout`] carrying the current PC is returned.
    pub fn run_until_with_timeout(
        &mut self,
        address: u32,
        timeout: Duration,
    ) -> Result<(), ExecError> {
        let deadline = Instant::now() + timeout;
        let mut retired: u64 = 0;
        while self.pc != address {
            self.step()?;
            if self.breakpoints.contains(&self.pc) {
                return Err(ExecError::Breakpoint { pc: self.pc });
            }
            retired += 1;
            if retired % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() > deadline {
                return Err(ExecError::Timeout { pc: self.pc });
            }
        }
        Ok(())
    }
}

/// Errors surfaced while executing instructions.
///
/// `pc` always refers to the address of the instruction that caused the
/// fault, except for [`ExecError::Timeout`] and [`ExecError::Breakpoint`]
/// which carry the address execution stopped at.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The instruction fetch itself faulted on the bus.
    #[error("error reading program at {pc:08x}: {source}")]
    Fetch { pc: u32, source: AccessError },
    /// The fetched word does not encode a supported instruction.
    #[error("invalid instruction {instruction:08x} at pc = {pc:08x}")]
    IllegalInstruction { instruction: u32, pc: u32 },
    /// A load or store faulted on the bus.
    #[error("bus error at {pc:08x}: {source}")]
    Bus { pc: u32, source: AccessError },
    /// A deadline given to [`Cpu::run_until_with_timeout`] expired.
    #[error("timeout at pc = {pc:08x}")]
    Timeout { pc: u32 },
    /// A breakpoint was reached while running synchronously.
    #[error("breakpoint reached at {pc:08x}")]
    Breakpoint { pc: u32 },
}
