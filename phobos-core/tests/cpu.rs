//! End-to-end scenarios: small programs executed against RAM-backed buses.

use phobos_core::bus::Bus;
use phobos_core::cpu::{Cpu, ExecError};
use phobos_core::devices::ram::Ram;
use phobos_core::registers::Specifier;
use rand::Rng;
use std::time::Duration;

/// Minimal RV32I encoders, enough to assemble the test programs.
mod rv {
    fn i_type(opcode: u32, funct3: u32, rd: u32, rs1: u32, imm: i32) -> u32 {
        ((imm as u32 & 0xFFF) << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
    }

    fn s_type(funct3: u32, rs1: u32, rs2: u32, imm: i32) -> u32 {
        let imm = imm as u32;
        (((imm >> 5) & 0x7F) << 25)
            | (rs2 << 20)
            | (rs1 << 15)
            | (funct3 << 12)
            | ((imm & 0x1F) << 7)
            | 0b0100011
    }

    fn b_type(funct3: u32, rs1: u32, rs2: u32, offset: i32) -> u32 {
        let imm = offset as u32;
        (((imm >> 12) & 0x1) << 31)
            | (((imm >> 5) & 0x3F) << 25)
            | (rs2 << 20)
            | (rs1 << 15)
            | (funct3 << 12)
            | (((imm >> 1) & 0xF) << 8)
            | (((imm >> 11) & 0x1) << 7)
            | 0b1100011
    }

    pub fn addi(rd: u32, rs1: u32, imm: i32) -> u32 {
        i_type(0b0010011, 0b000, rd, rs1, imm)
    }

    pub fn nop() -> u32 {
        addi(0, 0, 0)
    }

    pub fn lui(rd: u32, imm20: u32) -> u32 {
        (imm20 << 12) | (rd << 7) | 0b0110111
    }

    pub fn auipc(rd: u32, imm20: u32) -> u32 {
        (imm20 << 12) | (rd << 7) | 0b0010111
    }

    pub fn jal(rd: u32, offset: i32) -> u32 {
        let imm = offset as u32;
        (((imm >> 20) & 0x1) << 31)
            | (((imm >> 1) & 0x3FF) << 21)
            | (((imm >> 11) & 0x1) << 20)
            | (((imm >> 12) & 0xFF) << 12)
            | (rd << 7)
            | 0b1101111
    }

    pub fn jalr(rd: u32, rs1: u32, imm: i32) -> u32 {
        i_type(0b1100111, 0b000, rd, rs1, imm)
    }

    pub fn beq(rs1: u32, rs2: u32, offset: i32) -> u32 {
        b_type(0b000, rs1, rs2, offset)
    }

    pub fn bne(rs1: u32, rs2: u32, offset: i32) -> u32 {
        b_type(0b001, rs1, rs2, offset)
    }

    pub fn blt(rs1: u32, rs2: u32, offset: i32) -> u32 {
        b_type(0b100, rs1, rs2, offset)
    }

    pub fn bge(rs1: u32, rs2: u32, offset: i32) -> u32 {
        b_type(0b101, rs1, rs2, offset)
    }

    pub fn bltu(rs1: u32, rs2: u32, offset: i32) -> u32 {
        b_type(0b110, rs1, rs2, offset)
    }

    pub fn bgeu(rs1: u32, rs2: u32, offset: i32) -> u32 {
        b_type(0b111, rs1, rs2, offset)
    }

    pub fn lb(rd: u32, rs1: u32, imm: i32) -> u32 {
        i_type(0b0000011, 0b000, rd, rs1, imm)
    }

    pub fn lh(rd: u32, rs1: u32, imm: i32) -> u32 {
        i_type(0b0000011, 0b001, rd, rs1, imm)
    }

    pub fn lw(rd: u32, rs1: u32, imm: i32) -> u32 {
        i_type(0b0000011, 0b010, rd, rs1, imm)
    }

    pub fn lbu(rd: u32, rs1: u32, imm: i32) -> u32 {
        i_type(0b0000011, 0b100, rd, rs1, imm)
    }

    pub fn lhu(rd: u32, rs1: u32, imm: i32) -> u32 {
        i_type(0b0000011, 0b101, rd, rs1, imm)
    }

    pub fn sb(rs2: u32, rs1: u32, imm: i32) -> u32 {
        s_type(0b000, rs1, rs2, imm)
    }

    pub fn sh(rs2: u32, rs1: u32, imm: i32) -> u32 {
        s_type(0b001, rs1, rs2, imm)
    }

    pub fn sw(rs2: u32, rs1: u32, imm: i32) -> u32 {
        s_type(0b010, rs1, rs2, imm)
    }
}

/// A core with the program in RAM at 0 and `data` placed in a second RAM
/// region at 0x10000.
fn machine(program: &[u32], data: &[u8]) -> Cpu {
    let mut bus = Bus::new();
    let program_ram = Ram::new("program", 4096);
    program_ram.map(0, &mut bus).unwrap();
    let image: Vec<u8> = program.iter().flat_map(|w| w.to_le_bytes()).collect();
    program_ram.load(0, &image).unwrap();
    let memory = Ram::new("memory", 1024);
    memory.map(0x10000, &mut bus).unwrap();
    memory.load(0, data).unwrap();
    Cpu::new(bus)
}

fn x(cpu: &Cpu, n: u8) -> u32 {
    cpu.registers().x(Specifier::from_u5(n))
}

#[test]
fn test_loads() {
    // The word at 0x10000 is 0xDEADBEEF; pick its bytes and halfwords apart.
    let program = [
        rv::lui(1, 0x10),
        rv::lbu(8, 1, 3),
        rv::lbu(9, 1, 2),
        rv::lbu(10, 1, 1),
        rv::lbu(11, 1, 0),
        rv::lhu(12, 1, 2),
        rv::lhu(13, 1, 1),
        rv::lhu(14, 1, 0),
        rv::lw(15, 1, 0),
        rv::nop(),
        rv::nop(),
    ];
    let mut cpu = machine(&program, &[0xEF, 0xBE, 0xAD, 0xDE]);
    cpu.run_until(0x2C).unwrap();
    let expected: [u32; 8] = [
        0x0000_00DE,
        0x0000_00AD,
        0x0000_00BE,
        0x0000_00EF,
        0x0000_DEAD,
        0x0000_ADBE,
        0x0000_BEEF,
        0xDEAD_BEEF,
    ];
    for (i, &value) in expected.iter().enumerate() {
        assert_eq!(value, x(&cpu, 8 + i as u8), "x{}", 8 + i);
    }
}

#[test]
fn test_load_sign_extension() {
    let program = [
        rv::lui(1, 0x10),
        rv::lb(9, 1, 3),
        rv::lb(10, 1, 2),
        rv::lb(11, 1, 1),
        rv::lb(12, 1, 0),
        rv::lh(13, 1, 2),
        rv::lh(14, 1, 1),
        rv::lh(15, 1, 0),
    ];
    let mut cpu = machine(&program, &[0x81, 0x82, 0x83, 0x84]);
    cpu.run_until(0x20).unwrap();
    let expected: [u32; 7] = [
        0xFFFF_FF84,
        0xFFFF_FF83,
        0xFFFF_FF82,
        0xFFFF_FF81,
        0xFFFF_8483,
        0xFFFF_8382,
        0xFFFF_8281,
    ];
    for (i, &value) in expected.iter().enumerate() {
        assert_eq!(value, x(&cpu, 9 + i as u8), "x{}", 9 + i);
    }
}

#[test]
fn test_aligned_stores() {
    let program = [
        rv::lui(1, 0x10),
        rv::lui(2, 0x84838),
        rv::addi(2, 2, 0x281),
        rv::sb(2, 1, 0),
        rv::sh(2, 1, 4),
        rv::sw(2, 1, 8),
    ];
    let mut cpu = machine(&program, &[]);
    cpu.run_until(0x18).unwrap();
    assert_eq!(0x8483_8281, x(&cpu, 2));
    assert_eq!(Ok(0x0000_0081), cpu.bus().read_word(0x10000));
    assert_eq!(Ok(0x0000_8281), cpu.bus().read_word(0x10004));
    assert_eq!(Ok(0x8483_8281), cpu.bus().read_word(0x10008));
}

#[test]
fn test_jal_jalr() {
    let program = [
        rv::nop(),           // 0x00
        rv::nop(),           // 0x04
        rv::nop(),           // 0x08
        rv::nop(),           // 0x0C
        rv::nop(),           // 0x10
        rv::jal(1, 0x14),    // 0x14: call 0x28, x1 = 0x18
        rv::nop(),           // 0x18: return lands here
        rv::nop(),           // 0x1C
        rv::nop(),           // 0x20
        rv::nop(),           // 0x24
        rv::nop(),           // 0x28
        rv::jalr(2, 1, 0),   // 0x2C: return via x1, x2 = 0x30
    ];
    let mut cpu = machine(&program, &[]);
    cpu.run_until_with_timeout(0x1C, Duration::from_secs(2)).unwrap();
    assert_eq!(0x18, x(&cpu, 1));
    assert_eq!(0x30, x(&cpu, 2));
}

#[test]
fn test_lui_auipc() {
    let program = [
        rv::lui(1, 0xFFFFF),   // 0x00
        rv::nop(),             // 0x04
        rv::nop(),             // 0x08
        rv::nop(),             // 0x0C
        rv::nop(),             // 0x10
        rv::nop(),             // 0x14
        rv::auipc(2, 0xFFFFF), // 0x18
        rv::nop(),             // 0x1C
    ];
    let mut cpu = machine(&program, &[]);
    cpu.run_until_with_timeout(0x20, Duration::from_secs(2)).unwrap();
    assert_eq!(0xFFFF_F000, x(&cpu, 1));
    assert_eq!(0xFFFF_F018, x(&cpu, 2));
}

#[test]
fn test_branches() {
    // Every taken branch skips a trap (a tight self-loop); wrongly taken
    // fall-through branches land in a trap too. Reaching the end under the
    // deadline proves every direction.
    let program = [
        rv::addi(1, 0, 1),    // 0x00: x1 = 1
        rv::addi(2, 0, -1),   // 0x04: x2 = 0xFFFFFFFF
        rv::beq(0, 0, 8),     // 0x08
        rv::jal(0, 0),        // 0x0C: trap
        rv::bne(1, 0, 8),     // 0x10
        rv::jal(0, 0),        // 0x14: trap
        rv::blt(2, 1, 8),     // 0x18: signed -1 < 1
        rv::jal(0, 0),        // 0x1C: trap
        rv::bge(1, 2, 8),     // 0x20: signed 1 >= -1
        rv::jal(0, 0),        // 0x24: trap
        rv::bltu(1, 2, 8),    // 0x28: unsigned 1 < 0xFFFFFFFF
        rv::jal(0, 0),        // 0x2C: trap
        rv::bgeu(2, 1, 8),    // 0x30: unsigned 0xFFFFFFFF >= 1
        rv::jal(0, 0),        // 0x34: trap
        rv::beq(1, 0, 8),     // 0x38: not taken
        rv::blt(1, 2, 8),     // 0x3C: not taken (signed 1 < -1 is false)
        rv::bltu(2, 1, 8),    // 0x40: not taken
        rv::nop(),            // 0x44
    ];
    let mut cpu = machine(&program, &[]);
    cpu.run_until_with_timeout(0x48, Duration::from_secs(2)).unwrap();
}

#[test]
fn test_backward_branch() {
    // A three-pass countdown loop: x1 counts 3, 2, 1, 0.
    let program = [
        rv::addi(1, 0, 3),    // 0x00
        rv::addi(1, 1, -1),   // 0x04
        rv::bne(1, 0, -4),    // 0x08: back to 0x04 while x1 != 0
        rv::nop(),            // 0x0C
    ];
    let mut cpu = machine(&program, &[]);
    cpu.run_until_with_timeout(0x10, Duration::from_secs(2)).unwrap();
    assert_eq!(0, x(&cpu, 1));
    // 1 + (3 passes of addi+bne) + nop
    assert_eq!(8, cpu.cycle_count());
}

#[test]
fn test_store_then_load_roundtrip_random() {
    let mut rng = rand::thread_rng();
    for _ in 0..64 {
        let value: u32 = rng.gen();
        let offset = rng.gen_range(0..64) * 4;
        let hi = (value.wrapping_add(0x800) >> 12) & 0xFFFFF;
        let lo = (value & 0xFFF) as i32;
        let program = [
            rv::lui(1, 0x10),
            rv::lui(2, hi),
            rv::addi(2, 2, lo),
            rv::sb(2, 1, offset),
            rv::lb(3, 1, offset),
            rv::sh(2, 1, offset),
            rv::lh(4, 1, offset),
            rv::sw(2, 1, offset),
            rv::lw(5, 1, offset),
            rv::nop(),
        ];
        let mut cpu = machine(&program, &[]);
        cpu.run_until_with_timeout(0x28, Duration::from_secs(2)).unwrap();
        assert_eq!(value, x(&cpu, 2));
        assert_eq!(value as u8 as i8 as i32 as u32, x(&cpu, 3));
        assert_eq!(value as u16 as i16 as i32 as u32, x(&cpu, 4));
        assert_eq!(value, x(&cpu, 5));
    }
}

#[test]
fn test_run_until_reports_timeout_pc() {
    // Branch condition never true: spin between 0x00 and 0x04.
    let program = [
        rv::addi(1, 0, 1),  // 0x00
        rv::bne(1, 0, -4),  // 0x04: always taken, back to 0x00
    ];
    let mut cpu = machine(&program, &[]);
    match cpu.run_until_with_timeout(0x100, Duration::from_millis(50)) {
        Err(ExecError::Timeout { pc }) => assert!(pc <= 0x04),
        other => panic!("expected timeout, got {:?}", other.err()),
    }
}
