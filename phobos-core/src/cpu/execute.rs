//! Executes decoded instructions against the architectural state.

use super::{Cpu, ExecError};
use crate::alu::{self, sign_extend};
use crate::instruction::{Instruction, LoadWidth, StoreWidth};

impl Cpu {
    /// Execute one decoded instruction.
    ///
    /// Called with the PC already advanced past the instruction, so
    /// PC-relative targets are computed from `self.pc - 4` and the link
    /// registers of JAL/JALR receive `self.pc` as-is.
    pub(super) fn execute(&mut self, instruction: Instruction) -> Result<(), ExecError> {
        match instruction {
            Instruction::OpImm {
                op,
                dest,
                src,
                immediate,
            } => {
                let result = alu::compute(op, self.registers.x(src), immediate as u32);
                self.registers.set_x(dest, result);
            }
            Instruction::OpShiftImm {
                op,
                dest,
                src,
                shift_amount_u5,
            } => {
                let result = alu::compute(op, self.registers.x(src), shift_amount_u5);
                self.registers.set_x(dest, result);
            }
            Instruction::Op {
                op,
                dest,
                src1,
                src2,
            } => {
                let result = alu::compute(op, self.registers.x(src1), self.registers.x(src2));
                self.registers.set_x(dest, result);
            }
            Instruction::Auipc { dest, immediate } => {
                let result = self.pc.wrapping_sub(4).wrapping_add(immediate as u32);
                self.registers.set_x(dest, result);
            }
            Instruction::Lui { dest, immediate } => {
                self.registers.set_x(dest, immediate as u32);
            }
            Instruction::Jal { dest, offset } => {
                self.registers.set_x(dest, self.pc);
                self.pc = self.pc.wrapping_sub(4).wrapping_add_signed(offset);
            }
            Instruction::Jalr { dest, base, offset } => {
                // Read the base before writing the link register; they may be
                // the same register.
                let target = self.registers.x(base).wrapping_add_signed(offset) & !1;
                self.registers.set_x(dest, self.pc);
                self.pc = target;
            }
            Instruction::Branch {
                condition,
                src1,
                src2,
                offset,
            } => {
                let taken =
                    alu::compute(condition, self.registers.x(src1), self.registers.x(src2)) == 1;
                if taken {
                    self.pc = self.pc.wrapping_sub(4).wrapping_add_signed(offset);
                }
            }
            Instruction::Load {
                width,
                dest,
                base,
                offset,
            } => {
                let pc = self.pc.wrapping_sub(4);
                let address = self.registers.x(base).wrapping_add_signed(offset);
                let value = match width {
                    LoadWidth::Lb => {
                        let byte = self.bus.read_byte(address).map_err(bus_error(pc))?;
                        sign_extend(byte as u32, 8) as u32
                    }
                    LoadWidth::Lbu => self.bus.read_byte(address).map_err(bus_error(pc))? as u32,
                    LoadWidth::Lh => {
                        let half = self.bus.read_halfword(address).map_err(bus_error(pc))?;
                        sign_extend(half as u32, 16) as u32
                    }
                    LoadWidth::Lhu => {
                        self.bus.read_halfword(address).map_err(bus_error(pc))? as u32
                    }
                    LoadWidth::Lw => self.bus.read_word(address).map_err(bus_error(pc))?,
                };
                self.registers.set_x(dest, value);
            }
            Instruction::Store {
                width,
                src,
                base,
                offset,
            } => {
                let pc = self.pc.wrapping_sub(4);
                let address = self.registers.x(base).wrapping_add_signed(offset);
                let value = self.registers.x(src);
                match width {
                    StoreWidth::Sb => self
                        .bus
                        .write_byte(address, (value & 0xFF) as u8)
                        .map_err(bus_error(pc))?,
                    StoreWidth::Sh => self
                        .bus
                        .write_halfword(address, (value & 0xFFFF) as u16)
                        .map_err(bus_error(pc))?,
                    StoreWidth::Sw => self.bus.write_word(address, value).map_err(bus_error(pc))?,
                }
            }
            Instruction::System { funct3 } => {
                // Neither environment calls nor CSRs are implemented in this
                // machine; the firmware does not rely on their effects.
                if funct3 == 0 {
                    log::info!("ecall/ebreak ignored at pc = {:08x}", self.pc.wrapping_sub(4));
                } else {
                    log::info!("csr access ignored at pc = {:08x}", self.pc.wrapping_sub(4));
                }
            }
        }
        Ok(())
    }
}

fn bus_error(pc: u32) -> impl FnOnce(crate::bus::AccessError) -> ExecError {
    move |source| ExecError::Bus { pc, source }
}
