//! Ricoh 2A03 CPU emulator.
//!
//! This implements the NMOS 6502 core found in the NES, including the
//! undocumented ("illegal") opcodes that shipped commercial ROMs rely on.
//! The 2A03 differs from a stock 6502 in one architectural respect: the
//! decimal flag can be set and cleared but has no effect on ADC/SBC.
//!
//! # Illegal Opcodes
//!
//! - LAX, SAX, DCP, ISC (essential)
//! - SLO, SRE, RLA, RRA (important)
//! - ANC, ALR, ARR, SBX, SBC-alias $EB (immediate-only)
//! - XAA, LXA, LAS, and the SH* family (SHY/SHX/AHX/TAS) using the
//!   canonical value AND (high-byte + 1) formula
//!
//! Anything not recognized executes as a 2-cycle NOP.
//!
//! # Timing
//!
//! Bus traffic is aggregated per instruction: `step` performs the reads and
//! writes of one instruction and returns its total cycle cost, including
//! page-cross penalties for read instructions and branch timing. A positive
//! stall counter (OAM DMA) is consumed one cycle per `step` before any
//! instruction runs.

use retrocore::{Bus, Cpu};

mod addressing;
mod flags;

use flags::*;

const NMI_VECTOR: u16 = 0xFFFA;
const RESET_VECTOR: u16 = 0xFFFC;
const IRQ_VECTOR: u16 = 0xFFFE;

/// The Ricoh 2A03 CPU state.
pub struct Ricoh2A03 {
    /// Accumulator
    pub(crate) a: u8,
    /// X index register
    pub(crate) x: u8,
    /// Y index register
    pub(crate) y: u8,
    /// Stack pointer (points into $0100-$01FF)
    pub(crate) sp: u8,
    /// Program counter
    pub(crate) pc: u16,
    /// Status register (NV-BDIZC)
    pub(crate) p: u8,

    /// NMI edge latch, consumed on service.
    nmi_pending: bool,
    /// IRQ line level, sampled every step, not consumed on service.
    irq_line: bool,
    /// Total cycles executed (reset preloads the 7-cycle reset sequence).
    cycles: u64,
    /// Pending stall cycles (OAM DMA); consumed one per step.
    stall: u32,
    /// Serviced NMI count, for diagnostics.
    nmi_count: u64,
}

impl Ricoh2A03 {
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD, // After reset, SP is $FD
            pc: 0,
            p: 0x24, // I flag set, bit 5 always 1
            nmi_pending: false,
            irq_line: false,
            cycles: 0,
            stall: 0,
            nmi_count: 0,
        }
    }

    // =========================================================================
    // Public register accessors
    // =========================================================================

    pub fn a(&self) -> u8 {
        self.a
    }

    pub fn x(&self) -> u8 {
        self.x
    }

    pub fn y(&self) -> u8 {
        self.y
    }

    pub fn sp(&self) -> u8 {
        self.sp
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn status(&self) -> u8 {
        self.p
    }

    /// Total cycles executed since reset.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Remaining stall cycles.
    pub fn stall(&self) -> u32 {
        self.stall
    }

    /// How many NMIs have been serviced since reset.
    pub fn nmi_count(&self) -> u64 {
        self.nmi_count
    }

    /// Add stall cycles (the machine calls this on OAM DMA).
    pub fn add_stall(&mut self, cycles: u32) {
        self.stall += cycles;
    }

    pub fn set_pc(&mut self, value: u16) {
        self.pc = value;
    }

    pub fn set_a(&mut self, value: u8) {
        self.a = value;
    }

    pub fn set_x(&mut self, value: u8) {
        self.x = value;
    }

    pub fn set_y(&mut self, value: u8) {
        self.y = value;
    }

    // =========================================================================
    // ALU operations
    // =========================================================================

    /// ADC - Add with Carry. Binary only: the 2A03 has BCD disabled.
    fn adc(&mut self, value: u8) {
        let a = self.a as u16;
        let v = value as u16;
        let c = if self.carry() { 1 } else { 0 };

        let result = a + v + c;
        let result8 = result as u8;

        self.set_flag(FLAG_C, result > 0xFF);
        self.set_flag(FLAG_V, (self.a ^ result8) & (value ^ result8) & 0x80 != 0);
        self.set_zn(result8);
        self.a = result8;
    }

    /// SBC - Subtract with Carry, defined as ADC of the one's complement.
    fn sbc(&mut self, value: u8) {
        self.adc(!value);
    }

    /// CMP/CPX/CPY - carry set iff register >= operand, then N/Z on the
    /// difference.
    fn cmp(&mut self, reg: u8, value: u8) {
        let result = reg.wrapping_sub(value);
        self.set_flag(FLAG_C, reg >= value);
        self.set_zn(result);
    }

    /// ASL - Arithmetic Shift Left
    fn asl(&mut self, value: u8) -> u8 {
        self.set_flag(FLAG_C, value & 0x80 != 0);
        let result = value << 1;
        self.set_zn(result);
        result
    }

    /// LSR - Logical Shift Right
    fn lsr(&mut self, value: u8) -> u8 {
        self.set_flag(FLAG_C, value & 0x01 != 0);
        let result = value >> 1;
        self.set_zn(result);
        result
    }

    /// ROL - Rotate Left
    fn rol(&mut self, value: u8) -> u8 {
        let carry_in = if self.carry() { 1 } else { 0 };
        self.set_flag(FLAG_C, value & 0x80 != 0);
        let result = (value << 1) | carry_in;
        self.set_zn(result);
        result
    }

    /// ROR - Rotate Right
    fn ror(&mut self, value: u8) -> u8 {
        let carry_in = if self.carry() { 0x80 } else { 0 };
        self.set_flag(FLAG_C, value & 0x01 != 0);
        let result = (value >> 1) | carry_in;
        self.set_zn(result);
        result
    }

    /// BIT - Bit Test (operand bits 6/7 into V/N, Z from A AND operand)
    fn bit(&mut self, value: u8) {
        self.set_flag(FLAG_Z, self.a & value == 0);
        self.set_flag(FLAG_N, value & 0x80 != 0);
        self.set_flag(FLAG_V, value & 0x40 != 0);
    }

    /// ANC - AND immediate, then copy N into C.
    fn anc(&mut self, value: u8) {
        self.a &= value;
        self.set_zn(self.a);
        self.set_flag(FLAG_C, self.a & 0x80 != 0);
    }

    /// ALR - AND immediate, then LSR A.
    fn alr(&mut self, value: u8) {
        self.a &= value;
        self.a = self.lsr(self.a);
    }

    /// ARR - AND immediate, then ROR A.
    ///
    /// C and V come from bits 6 and 5 of the result. This is the common
    /// binary-mode behavior; the decimal-mode quirks do not apply on the
    /// 2A03.
    fn arr(&mut self, value: u8) {
        self.a &= value;
        self.a = self.ror(self.a);
        let b5 = (self.a >> 5) & 1;
        let b6 = (self.a >> 6) & 1;
        self.set_flag(FLAG_C, b6 != 0);
        self.set_flag(FLAG_V, b5 ^ b6 != 0);
    }

    /// SBX/AXS - X = (A AND X) - immediate, carry as in CMP.
    fn sbx(&mut self, value: u8) {
        let t = self.a & self.x;
        self.x = t.wrapping_sub(value);
        self.set_flag(FLAG_C, t >= value);
        self.set_zn(self.x);
    }
}

impl Default for Ricoh2A03 {
    fn default() -> Self {
        Self::new()
    }
}

impl Ricoh2A03 {
    /// Advance by one event: a stall cycle, an interrupt service, or one
    /// instruction. Returns cycles consumed.
    pub fn step(&mut self, bus: &mut impl Bus) -> u32 {
        // Stall cycles (OAM DMA): no instruction executes, the PPU keeps
        // running off the returned cycle.
        if self.stall > 0 {
            self.stall -= 1;
            self.cycles += 1;
            return 1;
        }

        if self.nmi_pending {
            self.nmi_pending = false;
            self.nmi_count += 1;
            let cycles = self.service_interrupt(bus, NMI_VECTOR, false);
            self.cycles += u64::from(cycles);
            return cycles;
        }

        if self.irq_line && !self.interrupt_disable() {
            let cycles = self.service_interrupt(bus, IRQ_VECTOR, false);
            self.cycles += u64::from(cycles);
            return cycles;
        }

        let opcode = self.fetch(bus);
        let cycles = self.execute(bus, opcode);
        self.cycles += u64::from(cycles);
        cycles
    }

    /// Reset: SP = $FD, P = I | U, PC from the reset vector, 7 cycles on
    /// the counter, all latches cleared.
    pub fn reset(&mut self, bus: &mut impl Bus) {
        self.pc = self.read_word(bus, RESET_VECTOR);
        self.sp = 0xFD;
        self.p = 0x24; // I flag set, bit 5 always 1
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.nmi_pending = false;
        self.irq_line = false;
        self.stall = 0;
        self.nmi_count = 0;
        // The reset sequence itself takes 7 cycles.
        self.cycles = 7;
    }

    /// Latch a non-maskable interrupt.
    pub fn set_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Drive the maskable interrupt line.
    pub fn set_irq(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }
}

impl<B: Bus> Cpu<B> for Ricoh2A03 {
    fn step(&mut self, bus: &mut B) -> u32 {
        Ricoh2A03::step(self, bus)
    }

    fn reset(&mut self, bus: &mut B) {
        Ricoh2A03::reset(self, bus)
    }

    fn set_nmi(&mut self) {
        Ricoh2A03::set_nmi(self)
    }

    fn set_irq(&mut self, asserted: bool) {
        Ricoh2A03::set_irq(self, asserted)
    }

    fn pc(&self) -> u16 {
        Ricoh2A03::pc(self)
    }
}

impl Ricoh2A03 {
    /// Hardware interrupt / BRK sequence: push PC high, PC low, P (bit 5
    /// forced set; bit 4 set only for BRK), set interrupt-disable, load PC
    /// from the vector.
    fn service_interrupt(&mut self, bus: &mut impl Bus, vector: u16, brk: bool) -> u32 {
        self.push_word(bus, self.pc);
        let p = self.status_for_push(brk);
        self.push(bus, p);
        self.set_flag(FLAG_I, true);
        self.pc = self.read_word(bus, vector);
        7
    }

    fn execute(&mut self, bus: &mut impl Bus, opcode: u8) -> u32 {
        match opcode {
            // =================================================================
            // Load/Store Operations
            // =================================================================

            // LDA
            0xA9 => { let v = self.fetch(bus); self.a = v; self.set_zn(v); 2 }
            0xA5 => { let addr = self.addr_zero_page(bus); self.a = bus.read(addr); self.set_zn(self.a); 3 }
            0xB5 => { let addr = self.addr_zero_page_x(bus); self.a = bus.read(addr); self.set_zn(self.a); 4 }
            0xAD => { let addr = self.addr_absolute(bus); self.a = bus.read(addr); self.set_zn(self.a); 4 }
            0xBD => { let (addr, crossed) = self.addr_absolute_x(bus); self.a = bus.read(addr); self.set_zn(self.a); 4 + crossed }
            0xB9 => { let (addr, crossed) = self.addr_absolute_y(bus); self.a = bus.read(addr); self.set_zn(self.a); 4 + crossed }
            0xA1 => { let addr = self.addr_indexed_indirect(bus); self.a = bus.read(addr); self.set_zn(self.a); 6 }
            0xB1 => { let (addr, crossed) = self.addr_indirect_indexed(bus); self.a = bus.read(addr); self.set_zn(self.a); 5 + crossed }

            // LDX
            0xA2 => { let v = self.fetch(bus); self.x = v; self.set_zn(v); 2 }
            0xA6 => { let addr = self.addr_zero_page(bus); self.x = bus.read(addr); self.set_zn(self.x); 3 }
            0xB6 => { let addr = self.addr_zero_page_y(bus); self.x = bus.read(addr); self.set_zn(self.x); 4 }
            0xAE => { let addr = self.addr_absolute(bus); self.x = bus.read(addr); self.set_zn(self.x); 4 }
            0xBE => { let (addr, crossed) = self.addr_absolute_y(bus); self.x = bus.read(addr); self.set_zn(self.x); 4 + crossed }

            // LDY
            0xA0 => { let v = self.fetch(bus); self.y = v; self.set_zn(v); 2 }
            0xA4 => { let addr = self.addr_zero_page(bus); self.y = bus.read(addr); self.set_zn(self.y); 3 }
            0xB4 => { let addr = self.addr_zero_page_x(bus); self.y = bus.read(addr); self.set_zn(self.y); 4 }
            0xAC => { let addr = self.addr_absolute(bus); self.y = bus.read(addr); self.set_zn(self.y); 4 }
            0xBC => { let (addr, crossed) = self.addr_absolute_x(bus); self.y = bus.read(addr); self.set_zn(self.y); 4 + crossed }

            // STA (writes always pay the un-crossed maximum)
            0x85 => { let addr = self.addr_zero_page(bus); bus.write(addr, self.a); 3 }
            0x95 => { let addr = self.addr_zero_page_x(bus); bus.write(addr, self.a); 4 }
            0x8D => { let addr = self.addr_absolute(bus); bus.write(addr, self.a); 4 }
            0x9D => { let (addr, _) = self.addr_absolute_x(bus); bus.write(addr, self.a); 5 }
            0x99 => { let (addr, _) = self.addr_absolute_y(bus); bus.write(addr, self.a); 5 }
            0x81 => { let addr = self.addr_indexed_indirect(bus); bus.write(addr, self.a); 6 }
            0x91 => { let (addr, _) = self.addr_indirect_indexed(bus); bus.write(addr, self.a); 6 }

            // STX
            0x86 => { let addr = self.addr_zero_page(bus); bus.write(addr, self.x); 3 }
            0x96 => { let addr = self.addr_zero_page_y(bus); bus.write(addr, self.x); 4 }
            0x8E => { let addr = self.addr_absolute(bus); bus.write(addr, self.x); 4 }

            // STY
            0x84 => { let addr = self.addr_zero_page(bus); bus.write(addr, self.y); 3 }
            0x94 => { let addr = self.addr_zero_page_x(bus); bus.write(addr, self.y); 4 }
            0x8C => { let addr = self.addr_absolute(bus); bus.write(addr, self.y); 4 }

            // =================================================================
            // Arithmetic
            // =================================================================

            // ADC
            0x69 => { let v = self.fetch(bus); self.adc(v); 2 }
            0x65 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr); self.adc(v); 3 }
            0x75 => { let addr = self.addr_zero_page_x(bus); let v = bus.read(addr); self.adc(v); 4 }
            0x6D => { let addr = self.addr_absolute(bus); let v = bus.read(addr); self.adc(v); 4 }
            0x7D => { let (addr, crossed) = self.addr_absolute_x(bus); let v = bus.read(addr); self.adc(v); 4 + crossed }
            0x79 => { let (addr, crossed) = self.addr_absolute_y(bus); let v = bus.read(addr); self.adc(v); 4 + crossed }
            0x61 => { let addr = self.addr_indexed_indirect(bus); let v = bus.read(addr); self.adc(v); 6 }
            0x71 => { let (addr, crossed) = self.addr_indirect_indexed(bus); let v = bus.read(addr); self.adc(v); 5 + crossed }

            // SBC ($EB is the undocumented alias)
            0xE9 | 0xEB => { let v = self.fetch(bus); self.sbc(v); 2 }
            0xE5 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr); self.sbc(v); 3 }
            0xF5 => { let addr = self.addr_zero_page_x(bus); let v = bus.read(addr); self.sbc(v); 4 }
            0xED => { let addr = self.addr_absolute(bus); let v = bus.read(addr); self.sbc(v); 4 }
            0xFD => { let (addr, crossed) = self.addr_absolute_x(bus); let v = bus.read(addr); self.sbc(v); 4 + crossed }
            0xF9 => { let (addr, crossed) = self.addr_absolute_y(bus); let v = bus.read(addr); self.sbc(v); 4 + crossed }
            0xE1 => { let addr = self.addr_indexed_indirect(bus); let v = bus.read(addr); self.sbc(v); 6 }
            0xF1 => { let (addr, crossed) = self.addr_indirect_indexed(bus); let v = bus.read(addr); self.sbc(v); 5 + crossed }

            // =================================================================
            // Logical Operations
            // =================================================================

            // AND
            0x29 => { let v = self.fetch(bus); self.a &= v; self.set_zn(self.a); 2 }
            0x25 => { let addr = self.addr_zero_page(bus); self.a &= bus.read(addr); self.set_zn(self.a); 3 }
            0x35 => { let addr = self.addr_zero_page_x(bus); self.a &= bus.read(addr); self.set_zn(self.a); 4 }
            0x2D => { let addr = self.addr_absolute(bus); self.a &= bus.read(addr); self.set_zn(self.a); 4 }
            0x3D => { let (addr, crossed) = self.addr_absolute_x(bus); self.a &= bus.read(addr); self.set_zn(self.a); 4 + crossed }
            0x39 => { let (addr, crossed) = self.addr_absolute_y(bus); self.a &= bus.read(addr); self.set_zn(self.a); 4 + crossed }
            0x21 => { let addr = self.addr_indexed_indirect(bus); self.a &= bus.read(addr); self.set_zn(self.a); 6 }
            0x31 => { let (addr, crossed) = self.addr_indirect_indexed(bus); self.a &= bus.read(addr); self.set_zn(self.a); 5 + crossed }

            // ORA
            0x09 => { let v = self.fetch(bus); self.a |= v; self.set_zn(self.a); 2 }
            0x05 => { let addr = self.addr_zero_page(bus); self.a |= bus.read(addr); self.set_zn(self.a); 3 }
            0x15 => { let addr = self.addr_zero_page_x(bus); self.a |= bus.read(addr); self.set_zn(self.a); 4 }
            0x0D => { let addr = self.addr_absolute(bus); self.a |= bus.read(addr); self.set_zn(self.a); 4 }
            0x1D => { let (addr, crossed) = self.addr_absolute_x(bus); self.a |= bus.read(addr); self.set_zn(self.a); 4 + crossed }
            0x19 => { let (addr, crossed) = self.addr_absolute_y(bus); self.a |= bus.read(addr); self.set_zn(self.a); 4 + crossed }
            0x01 => { let addr = self.addr_indexed_indirect(bus); self.a |= bus.read(addr); self.set_zn(self.a); 6 }
            0x11 => { let (addr, crossed) = self.addr_indirect_indexed(bus); self.a |= bus.read(addr); self.set_zn(self.a); 5 + crossed }

            // EOR
            0x49 => { let v = self.fetch(bus); self.a ^= v; self.set_zn(self.a); 2 }
            0x45 => { let addr = self.addr_zero_page(bus); self.a ^= bus.read(addr); self.set_zn(self.a); 3 }
            0x55 => { let addr = self.addr_zero_page_x(bus); self.a ^= bus.read(addr); self.set_zn(self.a); 4 }
            0x4D => { let addr = self.addr_absolute(bus); self.a ^= bus.read(addr); self.set_zn(self.a); 4 }
            0x5D => { let (addr, crossed) = self.addr_absolute_x(bus); self.a ^= bus.read(addr); self.set_zn(self.a); 4 + crossed }
            0x59 => { let (addr, crossed) = self.addr_absolute_y(bus); self.a ^= bus.read(addr); self.set_zn(self.a); 4 + crossed }
            0x41 => { let addr = self.addr_indexed_indirect(bus); self.a ^= bus.read(addr); self.set_zn(self.a); 6 }
            0x51 => { let (addr, crossed) = self.addr_indirect_indexed(bus); self.a ^= bus.read(addr); self.set_zn(self.a); 5 + crossed }

            // BIT
            0x24 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr); self.bit(v); 3 }
            0x2C => { let addr = self.addr_absolute(bus); let v = bus.read(addr); self.bit(v); 4 }

            // =================================================================
            // Compare Operations
            // =================================================================

            // CMP
            0xC9 => { let v = self.fetch(bus); self.cmp(self.a, v); 2 }
            0xC5 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr); self.cmp(self.a, v); 3 }
            0xD5 => { let addr = self.addr_zero_page_x(bus); let v = bus.read(addr); self.cmp(self.a, v); 4 }
            0xCD => { let addr = self.addr_absolute(bus); let v = bus.read(addr); self.cmp(self.a, v); 4 }
            0xDD => { let (addr, crossed) = self.addr_absolute_x(bus); let v = bus.read(addr); self.cmp(self.a, v); 4 + crossed }
            0xD9 => { let (addr, crossed) = self.addr_absolute_y(bus); let v = bus.read(addr); self.cmp(self.a, v); 4 + crossed }
            0xC1 => { let addr = self.addr_indexed_indirect(bus); let v = bus.read(addr); self.cmp(self.a, v); 6 }
            0xD1 => { let (addr, crossed) = self.addr_indirect_indexed(bus); let v = bus.read(addr); self.cmp(self.a, v); 5 + crossed }

            // CPX
            0xE0 => { let v = self.fetch(bus); self.cmp(self.x, v); 2 }
            0xE4 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr); self.cmp(self.x, v); 3 }
            0xEC => { let addr = self.addr_absolute(bus); let v = bus.read(addr); self.cmp(self.x, v); 4 }

            // CPY
            0xC0 => { let v = self.fetch(bus); self.cmp(self.y, v); 2 }
            0xC4 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr); self.cmp(self.y, v); 3 }
            0xCC => { let addr = self.addr_absolute(bus); let v = bus.read(addr); self.cmp(self.y, v); 4 }

            // =================================================================
            // Increment/Decrement Operations
            // =================================================================

            // INC
            0xE6 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr).wrapping_add(1); bus.write(addr, v); self.set_zn(v); 5 }
            0xF6 => { let addr = self.addr_zero_page_x(bus); let v = bus.read(addr).wrapping_add(1); bus.write(addr, v); self.set_zn(v); 6 }
            0xEE => { let addr = self.addr_absolute(bus); let v = bus.read(addr).wrapping_add(1); bus.write(addr, v); self.set_zn(v); 6 }
            0xFE => { let (addr, _) = self.addr_absolute_x(bus); let v = bus.read(addr).wrapping_add(1); bus.write(addr, v); self.set_zn(v); 7 }

            // DEC
            0xC6 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr).wrapping_sub(1); bus.write(addr, v); self.set_zn(v); 5 }
            0xD6 => { let addr = self.addr_zero_page_x(bus); let v = bus.read(addr).wrapping_sub(1); bus.write(addr, v); self.set_zn(v); 6 }
            0xCE => { let addr = self.addr_absolute(bus); let v = bus.read(addr).wrapping_sub(1); bus.write(addr, v); self.set_zn(v); 6 }
            0xDE => { let (addr, _) = self.addr_absolute_x(bus); let v = bus.read(addr).wrapping_sub(1); bus.write(addr, v); self.set_zn(v); 7 }

            // INX/INY/DEX/DEY
            0xE8 => { self.x = self.x.wrapping_add(1); self.set_zn(self.x); 2 }
            0xC8 => { self.y = self.y.wrapping_add(1); self.set_zn(self.y); 2 }
            0xCA => { self.x = self.x.wrapping_sub(1); self.set_zn(self.x); 2 }
            0x88 => { self.y = self.y.wrapping_sub(1); self.set_zn(self.y); 2 }

            // =================================================================
            // Shift/Rotate Operations
            // =================================================================

            // ASL
            0x0A => { self.a = self.asl(self.a); 2 }
            0x06 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr); let r = self.asl(v); bus.write(addr, r); 5 }
            0x16 => { let addr = self.addr_zero_page_x(bus); let v = bus.read(addr); let r = self.asl(v); bus.write(addr, r); 6 }
            0x0E => { let addr = self.addr_absolute(bus); let v = bus.read(addr); let r = self.asl(v); bus.write(addr, r); 6 }
            0x1E => { let (addr, _) = self.addr_absolute_x(bus); let v = bus.read(addr); let r = self.asl(v); bus.write(addr, r); 7 }

            // LSR
            0x4A => { self.a = self.lsr(self.a); 2 }
            0x46 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr); let r = self.lsr(v); bus.write(addr, r); 5 }
            0x56 => { let addr = self.addr_zero_page_x(bus); let v = bus.read(addr); let r = self.lsr(v); bus.write(addr, r); 6 }
            0x4E => { let addr = self.addr_absolute(bus); let v = bus.read(addr); let r = self.lsr(v); bus.write(addr, r); 6 }
            0x5E => { let (addr, _) = self.addr_absolute_x(bus); let v = bus.read(addr); let r = self.lsr(v); bus.write(addr, r); 7 }

            // ROL
            0x2A => { self.a = self.rol(self.a); 2 }
            0x26 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr); let r = self.rol(v); bus.write(addr, r); 5 }
            0x36 => { let addr = self.addr_zero_page_x(bus); let v = bus.read(addr); let r = self.rol(v); bus.write(addr, r); 6 }
            0x2E => { let addr = self.addr_absolute(bus); let v = bus.read(addr); let r = self.rol(v); bus.write(addr, r); 6 }
            0x3E => { let (addr, _) = self.addr_absolute_x(bus); let v = bus.read(addr); let r = self.rol(v); bus.write(addr, r); 7 }

            // ROR
            0x6A => { self.a = self.ror(self.a); 2 }
            0x66 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr); let r = self.ror(v); bus.write(addr, r); 5 }
            0x76 => { let addr = self.addr_zero_page_x(bus); let v = bus.read(addr); let r = self.ror(v); bus.write(addr, r); 6 }
            0x6E => { let addr = self.addr_absolute(bus); let v = bus.read(addr); let r = self.ror(v); bus.write(addr, r); 6 }
            0x7E => { let (addr, _) = self.addr_absolute_x(bus); let v = bus.read(addr); let r = self.ror(v); bus.write(addr, r); 7 }

            // =================================================================
            // Jump/Call Operations
            // =================================================================

            // JMP
            0x4C => { self.pc = self.fetch_word(bus); 3 }
            0x6C => {
                // Indirect JMP reads the high byte from the same page as the
                // low byte: ($xxFF) takes its high byte from $xx00.
                let ptr = self.fetch_word(bus);
                self.pc = self.read_word_page_bug(bus, ptr);
                5
            }

            // JSR - pushes the address of the last byte of the instruction
            0x20 => {
                let target = self.fetch_word(bus);
                let ret = self.pc.wrapping_sub(1);
                self.push_word(bus, ret);
                self.pc = target;
                6
            }

            // RTS
            0x60 => { self.pc = self.pull_word(bus).wrapping_add(1); 6 }

            // RTI
            0x40 => {
                let status = self.pull(bus);
                self.set_status_from_stack(status);
                self.pc = self.pull_word(bus);
                6
            }

            // =================================================================
            // Branch Operations
            // =================================================================
            0x10 => 2 + self.branch_if(bus, !self.negative()), // BPL
            0x30 => 2 + self.branch_if(bus, self.negative()),  // BMI
            0x50 => 2 + self.branch_if(bus, !self.overflow()), // BVC
            0x70 => 2 + self.branch_if(bus, self.overflow()),  // BVS
            0x90 => 2 + self.branch_if(bus, !self.carry()),    // BCC
            0xB0 => 2 + self.branch_if(bus, self.carry()),     // BCS
            0xD0 => 2 + self.branch_if(bus, !self.zero()),     // BNE
            0xF0 => 2 + self.branch_if(bus, self.zero()),      // BEQ

            // =================================================================
            // Register Transfers
            // =================================================================
            0xAA => { self.x = self.a; self.set_zn(self.x); 2 }  // TAX
            0xA8 => { self.y = self.a; self.set_zn(self.y); 2 }  // TAY
            0x8A => { self.a = self.x; self.set_zn(self.a); 2 }  // TXA
            0x98 => { self.a = self.y; self.set_zn(self.a); 2 }  // TYA
            0xBA => { self.x = self.sp; self.set_zn(self.x); 2 } // TSX
            0x9A => { self.sp = self.x; 2 }                      // TXS

            // =================================================================
            // Stack Operations
            // =================================================================
            0x48 => { self.push(bus, self.a); 3 } // PHA
            0x68 => { self.a = self.pull(bus); self.set_zn(self.a); 4 } // PLA
            0x08 => { let p = self.status_for_push(true); self.push(bus, p); 3 } // PHP
            0x28 => { let p = self.pull(bus); self.set_status_from_stack(p); 4 } // PLP

            // =================================================================
            // Status Flag Operations
            // =================================================================
            0x18 => { self.set_flag(FLAG_C, false); 2 } // CLC
            0x38 => { self.set_flag(FLAG_C, true); 2 }  // SEC
            0x58 => { self.set_flag(FLAG_I, false); 2 } // CLI
            0x78 => { self.set_flag(FLAG_I, true); 2 }  // SEI
            0xB8 => { self.set_flag(FLAG_V, false); 2 } // CLV
            0xD8 => { self.set_flag(FLAG_D, false); 2 } // CLD
            0xF8 => { self.set_flag(FLAG_D, true); 2 }  // SED

            // =================================================================
            // System Operations
            // =================================================================

            // BRK - the padding byte after the opcode is skipped
            0x00 => {
                self.pc = self.pc.wrapping_add(1);
                self.service_interrupt(bus, IRQ_VECTOR, true)
            }

            // NOP (official) and single-byte undocumented NOPs
            0xEA | 0x1A | 0x3A | 0x5A | 0x7A | 0xDA | 0xFA => 2,

            // Two-byte NOPs (immediate operand skipped)
            0x80 | 0x82 | 0x89 | 0xC2 | 0xE2 => { self.fetch(bus); 2 }

            // Two-byte NOPs, zero page timing
            0x04 | 0x44 | 0x64 => { self.fetch(bus); 3 }

            // Two-byte NOPs, zero page,X timing
            0x14 | 0x34 | 0x54 | 0x74 | 0xD4 | 0xF4 => { self.fetch(bus); 4 }

            // Three-byte NOP, absolute
            0x0C => { self.fetch_word(bus); 4 }

            // Three-byte NOPs, absolute,X (page cross still costs a cycle)
            0x1C | 0x3C | 0x5C | 0x7C | 0xDC | 0xFC => {
                let (_, crossed) = self.addr_absolute_x(bus);
                4 + crossed
            }

            // =================================================================
            // Illegal Opcodes (undocumented but used by commercial ROMs)
            // =================================================================

            // LAX - load A and X together
            0xA7 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr); self.a = v; self.x = v; self.set_zn(v); 3 }
            0xB7 => { let addr = self.addr_zero_page_y(bus); let v = bus.read(addr); self.a = v; self.x = v; self.set_zn(v); 4 }
            0xAF => { let addr = self.addr_absolute(bus); let v = bus.read(addr); self.a = v; self.x = v; self.set_zn(v); 4 }
            0xBF => { let (addr, crossed) = self.addr_absolute_y(bus); let v = bus.read(addr); self.a = v; self.x = v; self.set_zn(v); 4 + crossed }
            0xA3 => { let addr = self.addr_indexed_indirect(bus); let v = bus.read(addr); self.a = v; self.x = v; self.set_zn(v); 6 }
            0xB3 => { let (addr, crossed) = self.addr_indirect_indexed(bus); let v = bus.read(addr); self.a = v; self.x = v; self.set_zn(v); 5 + crossed }

            // SAX - store A AND X
            0x87 => { let addr = self.addr_zero_page(bus); bus.write(addr, self.a & self.x); 3 }
            0x97 => { let addr = self.addr_zero_page_y(bus); bus.write(addr, self.a & self.x); 4 }
            0x8F => { let addr = self.addr_absolute(bus); bus.write(addr, self.a & self.x); 4 }
            0x83 => { let addr = self.addr_indexed_indirect(bus); bus.write(addr, self.a & self.x); 6 }

            // SLO - ASL memory, then ORA
            0x07 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr); let r = self.asl(v); bus.write(addr, r); self.a |= r; self.set_zn(self.a); 5 }
            0x17 => { let addr = self.addr_zero_page_x(bus); let v = bus.read(addr); let r = self.asl(v); bus.write(addr, r); self.a |= r; self.set_zn(self.a); 6 }
            0x0F => { let addr = self.addr_absolute(bus); let v = bus.read(addr); let r = self.asl(v); bus.write(addr, r); self.a |= r; self.set_zn(self.a); 6 }
            0x1F => { let (addr, _) = self.addr_absolute_x(bus); let v = bus.read(addr); let r = self.asl(v); bus.write(addr, r); self.a |= r; self.set_zn(self.a); 7 }
            0x1B => { let (addr, _) = self.addr_absolute_y(bus); let v = bus.read(addr); let r = self.asl(v); bus.write(addr, r); self.a |= r; self.set_zn(self.a); 7 }
            0x03 => { let addr = self.addr_indexed_indirect(bus); let v = bus.read(addr); let r = self.asl(v); bus.write(addr, r); self.a |= r; self.set_zn(self.a); 8 }
            0x13 => { let (addr, _) = self.addr_indirect_indexed(bus); let v = bus.read(addr); let r = self.asl(v); bus.write(addr, r); self.a |= r; self.set_zn(self.a); 8 }

            // RLA - ROL memory, then AND
            0x27 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr); let r = self.rol(v); bus.write(addr, r); self.a &= r; self.set_zn(self.a); 5 }
            0x37 => { let addr = self.addr_zero_page_x(bus); let v = bus.read(addr); let r = self.rol(v); bus.write(addr, r); self.a &= r; self.set_zn(self.a); 6 }
            0x2F => { let addr = self.addr_absolute(bus); let v = bus.read(addr); let r = self.rol(v); bus.write(addr, r); self.a &= r; self.set_zn(self.a); 6 }
            0x3F => { let (addr, _) = self.addr_absolute_x(bus); let v = bus.read(addr); let r = self.rol(v); bus.write(addr, r); self.a &= r; self.set_zn(self.a); 7 }
            0x3B => { let (addr, _) = self.addr_absolute_y(bus); let v = bus.read(addr); let r = self.rol(v); bus.write(addr, r); self.a &= r; self.set_zn(self.a); 7 }
            0x23 => { let addr = self.addr_indexed_indirect(bus); let v = bus.read(addr); let r = self.rol(v); bus.write(addr, r); self.a &= r; self.set_zn(self.a); 8 }
            0x33 => { let (addr, _) = self.addr_indirect_indexed(bus); let v = bus.read(addr); let r = self.rol(v); bus.write(addr, r); self.a &= r; self.set_zn(self.a); 8 }

            // SRE - LSR memory, then EOR
            0x47 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr); let r = self.lsr(v); bus.write(addr, r); self.a ^= r; self.set_zn(self.a); 5 }
            0x57 => { let addr = self.addr_zero_page_x(bus); let v = bus.read(addr); let r = self.lsr(v); bus.write(addr, r); self.a ^= r; self.set_zn(self.a); 6 }
            0x4F => { let addr = self.addr_absolute(bus); let v = bus.read(addr); let r = self.lsr(v); bus.write(addr, r); self.a ^= r; self.set_zn(self.a); 6 }
            0x5F => { let (addr, _) = self.addr_absolute_x(bus); let v = bus.read(addr); let r = self.lsr(v); bus.write(addr, r); self.a ^= r; self.set_zn(self.a); 7 }
            0x5B => { let (addr, _) = self.addr_absolute_y(bus); let v = bus.read(addr); let r = self.lsr(v); bus.write(addr, r); self.a ^= r; self.set_zn(self.a); 7 }
            0x43 => { let addr = self.addr_indexed_indirect(bus); let v = bus.read(addr); let r = self.lsr(v); bus.write(addr, r); self.a ^= r; self.set_zn(self.a); 8 }
            0x53 => { let (addr, _) = self.addr_indirect_indexed(bus); let v = bus.read(addr); let r = self.lsr(v); bus.write(addr, r); self.a ^= r; self.set_zn(self.a); 8 }

            // RRA - ROR memory, then ADC
            0x67 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr); let r = self.ror(v); bus.write(addr, r); self.adc(r); 5 }
            0x77 => { let addr = self.addr_zero_page_x(bus); let v = bus.read(addr); let r = self.ror(v); bus.write(addr, r); self.adc(r); 6 }
            0x6F => { let addr = self.addr_absolute(bus); let v = bus.read(addr); let r = self.ror(v); bus.write(addr, r); self.adc(r); 6 }
            0x7F => { let (addr, _) = self.addr_absolute_x(bus); let v = bus.read(addr); let r = self.ror(v); bus.write(addr, r); self.adc(r); 7 }
            0x7B => { let (addr, _) = self.addr_absolute_y(bus); let v = bus.read(addr); let r = self.ror(v); bus.write(addr, r); self.adc(r); 7 }
            0x63 => { let addr = self.addr_indexed_indirect(bus); let v = bus.read(addr); let r = self.ror(v); bus.write(addr, r); self.adc(r); 8 }
            0x73 => { let (addr, _) = self.addr_indirect_indexed(bus); let v = bus.read(addr); let r = self.ror(v); bus.write(addr, r); self.adc(r); 8 }

            // DCP - DEC memory, then CMP
            0xC7 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr).wrapping_sub(1); bus.write(addr, v); self.cmp(self.a, v); 5 }
            0xD7 => { let addr = self.addr_zero_page_x(bus); let v = bus.read(addr).wrapping_sub(1); bus.write(addr, v); self.cmp(self.a, v); 6 }
            0xCF => { let addr = self.addr_absolute(bus); let v = bus.read(addr).wrapping_sub(1); bus.write(addr, v); self.cmp(self.a, v); 6 }
            0xDF => { let (addr, _) = self.addr_absolute_x(bus); let v = bus.read(addr).wrapping_sub(1); bus.write(addr, v); self.cmp(self.a, v); 7 }
            0xDB => { let (addr, _) = self.addr_absolute_y(bus); let v = bus.read(addr).wrapping_sub(1); bus.write(addr, v); self.cmp(self.a, v); 7 }
            0xC3 => { let addr = self.addr_indexed_indirect(bus); let v = bus.read(addr).wrapping_sub(1); bus.write(addr, v); self.cmp(self.a, v); 8 }
            0xD3 => { let (addr, _) = self.addr_indirect_indexed(bus); let v = bus.read(addr).wrapping_sub(1); bus.write(addr, v); self.cmp(self.a, v); 8 }

            // ISC - INC memory, then SBC
            0xE7 => { let addr = self.addr_zero_page(bus); let v = bus.read(addr).wrapping_add(1); bus.write(addr, v); self.sbc(v); 5 }
            0xF7 => { let addr = self.addr_zero_page_x(bus); let v = bus.read(addr).wrapping_add(1); bus.write(addr, v); self.sbc(v); 6 }
            0xEF => { let addr = self.addr_absolute(bus); let v = bus.read(addr).wrapping_add(1); bus.write(addr, v); self.sbc(v); 6 }
            0xFF => { let (addr, _) = self.addr_absolute_x(bus); let v = bus.read(addr).wrapping_add(1); bus.write(addr, v); self.sbc(v); 7 }
            0xFB => { let (addr, _) = self.addr_absolute_y(bus); let v = bus.read(addr).wrapping_add(1); bus.write(addr, v); self.sbc(v); 7 }
            0xE3 => { let addr = self.addr_indexed_indirect(bus); let v = bus.read(addr).wrapping_add(1); bus.write(addr, v); self.sbc(v); 8 }
            0xF3 => { let (addr, _) = self.addr_indirect_indexed(bus); let v = bus.read(addr).wrapping_add(1); bus.write(addr, v); self.sbc(v); 8 }

            // Immediate-only illegals
            0x0B | 0x2B => { let v = self.fetch(bus); self.anc(v); 2 } // ANC
            0x4B => { let v = self.fetch(bus); self.alr(v); 2 }        // ALR/ASR
            0x6B => { let v = self.fetch(bus); self.arr(v); 2 }        // ARR
            0xCB => { let v = self.fetch(bus); self.sbx(v); 2 }        // SBX/AXS

            // XAA/ANE - A = X AND immediate (magic-constant variance not modeled)
            0x8B => { let v = self.fetch(bus); self.a = self.x & v; self.set_zn(self.a); 2 }

            // LXA/OAL - A = X = immediate
            0xAB => { let v = self.fetch(bus); self.a = v; self.x = v; self.set_zn(v); 2 }

            // LAS - A = X = SP = memory AND SP
            0xBB => {
                let (addr, crossed) = self.addr_absolute_y(bus);
                let v = bus.read(addr) & self.sp;
                self.sp = v;
                self.a = v;
                self.x = v;
                self.set_zn(v);
                4 + crossed
            }

            // TAS/SHS - SP = A AND X; store SP AND (high-byte + 1)
            0x9B => {
                let (addr, _) = self.addr_absolute_y(bus);
                self.sp = self.a & self.x;
                let mask = ((addr >> 8) as u8).wrapping_add(1);
                bus.write(addr, self.sp & mask);
                5
            }

            // SHY - store Y AND (high-byte + 1)
            0x9C => {
                let (addr, _) = self.addr_absolute_x(bus);
                let mask = ((addr >> 8) as u8).wrapping_add(1);
                bus.write(addr, self.y & mask);
                5
            }

            // SHX - store X AND (high-byte + 1)
            0x9E => {
                let (addr, _) = self.addr_absolute_y(bus);
                let mask = ((addr >> 8) as u8).wrapping_add(1);
                bus.write(addr, self.x & mask);
                5
            }

            // AHX - store A AND X AND (high-byte + 1)
            0x9F => {
                let (addr, _) = self.addr_absolute_y(bus);
                let mask = ((addr >> 8) as u8).wrapping_add(1);
                bus.write(addr, self.a & self.x & mask);
                5
            }
            0x93 => {
                let (addr, _) = self.addr_indirect_indexed(bus);
                let mask = ((addr >> 8) as u8).wrapping_add(1);
                bus.write(addr, self.a & self.x & mask);
                6
            }

            // Anything else (KIL and friends): treat as a 1-byte, 2-cycle NOP.
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestBus {
        memory: [u8; 65536],
    }

    impl TestBus {
        fn new() -> Self {
            Self { memory: [0; 65536] }
        }
    }

    impl Bus for TestBus {
        fn read(&mut self, address: u16) -> u8 {
            self.memory[address as usize]
        }

        fn write(&mut self, address: u16, value: u8) {
            self.memory[address as usize] = value;
        }
    }

    #[test]
    fn lda_immediate() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();

        bus.memory[0] = 0xA9; // LDA #$42
        bus.memory[1] = 0x42;

        let cycles = cpu.step(&mut bus);

        assert_eq!(cycles, 2);
        assert_eq!(cpu.a, 0x42);
        assert!(!cpu.zero());
        assert!(!cpu.negative());
    }

    #[test]
    fn lda_flags() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();

        bus.memory[0] = 0xA9; // LDA #$00
        bus.memory[1] = 0x00;
        bus.memory[2] = 0xA9; // LDA #$80
        bus.memory[3] = 0x80;

        cpu.step(&mut bus);
        assert!(cpu.zero());
        assert!(!cpu.negative());

        cpu.step(&mut bus);
        assert!(!cpu.zero());
        assert!(cpu.negative());
    }

    #[test]
    fn adc_exhaustive_flags() {
        // For all a, b, carry: result, carry and overflow follow the
        // standard binary formulas.
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();
        bus.memory[0] = 0x69; // ADC #imm

        for a in 0..=255u16 {
            for b in 0..=255u16 {
                for carry in 0..=1u16 {
                    bus.memory[1] = b as u8;
                    cpu.pc = 0;
                    cpu.a = a as u8;
                    cpu.set_flag(FLAG_C, carry == 1);

                    cpu.step(&mut bus);

                    let sum = a + b + carry;
                    let result = sum as u8;
                    assert_eq!(cpu.a, result);
                    assert_eq!(cpu.carry(), sum >= 0x100);
                    let v = (a as u8 ^ result) & (b as u8 ^ result) & 0x80 != 0;
                    assert_eq!(cpu.overflow(), v);
                    assert_eq!(cpu.zero(), result == 0);
                    assert_eq!(cpu.negative(), result & 0x80 != 0);
                }
            }
        }
    }

    #[test]
    fn sbc_is_adc_of_complement() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();

        // SEC; SBC #$10 with A = $50 -> $40, carry set (no borrow)
        cpu.a = 0x50;
        cpu.set_flag(FLAG_C, true);
        bus.memory[0] = 0xE9;
        bus.memory[1] = 0x10;

        cpu.step(&mut bus);
        assert_eq!(cpu.a, 0x40);
        assert!(cpu.carry());
        assert!(!cpu.overflow());
    }

    #[test]
    fn decimal_flag_has_no_effect() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();

        cpu.set_flag(FLAG_D, true);
        cpu.a = 0x09;
        bus.memory[0] = 0x69; // ADC #$01
        bus.memory[1] = 0x01;

        cpu.step(&mut bus);
        // A stock 6502 in decimal mode would produce $10.
        assert_eq!(cpu.a, 0x0A);
    }

    #[test]
    fn branch_timing() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();

        // Not taken: 2 cycles.
        bus.memory[0] = 0xF0; // BEQ +5
        bus.memory[1] = 0x05;
        let cycles = cpu.step(&mut bus);
        assert_eq!(cycles, 2);
        assert_eq!(cpu.pc, 0x0002);

        // Taken, same page: 3 cycles.
        cpu.pc = 0;
        cpu.set_flag(FLAG_Z, true);
        let cycles = cpu.step(&mut bus);
        assert_eq!(cycles, 3);
        assert_eq!(cpu.pc, 0x0007);

        // Taken, crossing a page: 4 cycles.
        cpu.pc = 0x00F0;
        bus.memory[0x00F0] = 0xF0; // BEQ +$20 -> $0112
        bus.memory[0x00F1] = 0x20;
        let cycles = cpu.step(&mut bus);
        assert_eq!(cycles, 4);
        assert_eq!(cpu.pc, 0x0112);
    }

    #[test]
    fn page_cross_penalty_reads_only() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();

        // LDA $10FF,X with X = 1 crosses into $1100: 5 cycles.
        cpu.x = 1;
        bus.memory[0] = 0xBD;
        bus.memory[1] = 0xFF;
        bus.memory[2] = 0x10;
        bus.memory[0x1100] = 0x7E;
        let cycles = cpu.step(&mut bus);
        assert_eq!(cycles, 5);
        assert_eq!(cpu.a, 0x7E);

        // Same access without a crossing: 4 cycles.
        cpu.pc = 0;
        bus.memory[1] = 0x00;
        bus.memory[0x1001] = 0x11;
        let cycles = cpu.step(&mut bus);
        assert_eq!(cycles, 4);
        assert_eq!(cpu.a, 0x11);

        // STA $10FF,X always takes 5 cycles, crossed or not.
        cpu.pc = 0;
        bus.memory[0] = 0x9D;
        bus.memory[1] = 0x00;
        bus.memory[2] = 0x10;
        cpu.x = 0;
        assert_eq!(cpu.step(&mut bus), 5);
    }

    #[test]
    fn jmp_indirect_page_bug() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();

        // JMP ($10FF): low from $10FF, high from $1000 (not $1100).
        bus.memory[0] = 0x6C;
        bus.memory[1] = 0xFF;
        bus.memory[2] = 0x10;
        bus.memory[0x10FF] = 0x34;
        bus.memory[0x1000] = 0x12;
        bus.memory[0x1100] = 0x99;

        let cycles = cpu.step(&mut bus);
        assert_eq!(cycles, 5);
        assert_eq!(cpu.pc, 0x1234);
    }

    #[test]
    fn indexed_indirect_pointer_wraps_in_zero_page() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();

        // LDA ($FF,X) with X = 0: pointer low at $FF, high wraps to $00.
        cpu.x = 0;
        bus.memory[0] = 0xA1;
        bus.memory[1] = 0xFF;
        bus.memory[0x00FF] = 0x00;
        bus.memory[0x0000] = 0xA1; // high byte = $A1 (the opcode byte itself)
        bus.memory[0xA100] = 0x5A;

        cpu.step(&mut bus);
        assert_eq!(cpu.a, 0x5A);
    }

    #[test]
    fn jsr_rts_round_trip() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();

        // JSR $1000
        bus.memory[0x0000] = 0x20;
        bus.memory[0x0001] = 0x00;
        bus.memory[0x0002] = 0x10;

        // At $1000: LDA #$42, RTS
        bus.memory[0x1000] = 0xA9;
        bus.memory[0x1001] = 0x42;
        bus.memory[0x1002] = 0x60;

        assert_eq!(cpu.step(&mut bus), 6); // JSR
        assert_eq!(cpu.pc, 0x1000);

        cpu.step(&mut bus); // LDA #$42
        assert_eq!(cpu.a, 0x42);

        assert_eq!(cpu.step(&mut bus), 6); // RTS
        assert_eq!(cpu.pc, 0x0003);
    }

    #[test]
    fn php_sets_break_and_unused_plp_clears_break() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();

        cpu.p = 0x01; // carry only
        bus.memory[0] = 0x08; // PHP
        bus.memory[1] = 0x28; // PLP

        cpu.step(&mut bus);
        // Pushed with B (bit 4) and U (bit 5) forced set.
        assert_eq!(bus.memory[0x01FD], 0x31);

        bus.memory[0x01FD] = 0xFF;
        cpu.step(&mut bus);
        // Pulled with bit 5 forced set and bit 4 forced clear.
        assert_eq!(cpu.p, 0xEF);
    }

    #[test]
    fn nmi_service_sequence() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();

        bus.memory[0xFFFA] = 0x00;
        bus.memory[0xFFFB] = 0x90;
        cpu.pc = 0x1234;
        cpu.p = 0x21; // carry + unused

        cpu.set_nmi();
        let cycles = cpu.step(&mut bus);

        assert_eq!(cycles, 7);
        assert_eq!(cpu.pc, 0x9000);
        assert_eq!(cpu.nmi_count(), 1);
        assert!(cpu.interrupt_disable());
        // Stack: PC high, PC low, then P with B clear and U set.
        assert_eq!(bus.memory[0x01FD], 0x12);
        assert_eq!(bus.memory[0x01FC], 0x34);
        assert_eq!(bus.memory[0x01FB], 0x21);

        // Edge latch consumed: next step runs an instruction.
        bus.memory[0x9000] = 0xEA;
        assert_eq!(cpu.step(&mut bus), 2);
    }

    #[test]
    fn irq_is_level_sensitive_and_maskable() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();

        bus.memory[0xFFFE] = 0x00;
        bus.memory[0xFFFF] = 0x80;
        bus.memory[0x0000] = 0xEA; // NOP
        bus.memory[0x8000] = 0xEA;

        cpu.set_irq(true);

        // I flag is set after reset: instruction runs, no service.
        assert_eq!(cpu.step(&mut bus), 2);

        // Clear I: the line is still asserted and gets serviced.
        cpu.set_flag(FLAG_I, false);
        assert_eq!(cpu.step(&mut bus), 7);
        assert_eq!(cpu.pc, 0x8000);

        // Level not consumed: clearing I again re-services immediately.
        cpu.set_flag(FLAG_I, false);
        assert_eq!(cpu.step(&mut bus), 7);
    }

    #[test]
    fn brk_pushes_b_flag_and_skips_padding_byte() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();

        bus.memory[0xFFFE] = 0x00;
        bus.memory[0xFFFF] = 0x80;
        bus.memory[0x0000] = 0x00; // BRK

        let cycles = cpu.step(&mut bus);
        assert_eq!(cycles, 7);
        assert_eq!(cpu.pc, 0x8000);
        // Return address is BRK + 2.
        assert_eq!(bus.memory[0x01FD], 0x00);
        assert_eq!(bus.memory[0x01FC], 0x02);
        // B flag set in the pushed copy.
        assert_ne!(bus.memory[0x01FB] & 0x10, 0);
    }

    #[test]
    fn stall_consumes_one_cycle_per_step() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();
        bus.memory[0] = 0xA9;
        bus.memory[1] = 0x01;

        cpu.add_stall(2);
        let before = cpu.cycles();
        assert_eq!(cpu.step(&mut bus), 1);
        assert_eq!(cpu.step(&mut bus), 1);
        assert_eq!(cpu.cycles(), before + 2);

        // Stall drained: the instruction finally executes.
        assert_eq!(cpu.step(&mut bus), 2);
        assert_eq!(cpu.a, 0x01);
    }

    #[test]
    fn reset_state() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();
        bus.memory[0xFFFC] = 0x00;
        bus.memory[0xFFFD] = 0x80;

        cpu.a = 0xFF;
        cpu.add_stall(10);
        cpu.reset(&mut bus);

        assert_eq!(cpu.pc, 0x8000);
        assert_eq!(cpu.sp, 0xFD);
        assert_eq!(cpu.p, 0x24);
        assert_eq!(cpu.cycles(), 7);
        assert_eq!(cpu.stall(), 0);
    }

    #[test]
    fn unknown_opcode_is_two_cycle_nop() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();
        bus.memory[0] = 0x02; // KIL on real silicon

        assert_eq!(cpu.step(&mut bus), 2);
        assert_eq!(cpu.pc, 0x0001);
    }

    #[test]
    fn lax_loads_a_and_x() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();
        bus.memory[0] = 0xA7; // LAX $10
        bus.memory[1] = 0x10;
        bus.memory[0x10] = 0x8F;

        assert_eq!(cpu.step(&mut bus), 3);
        assert_eq!(cpu.a, 0x8F);
        assert_eq!(cpu.x, 0x8F);
        assert!(cpu.negative());
    }

    #[test]
    fn dcp_decrements_then_compares() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();
        cpu.a = 0x40;
        bus.memory[0] = 0xC7; // DCP $10
        bus.memory[1] = 0x10;
        bus.memory[0x10] = 0x41;

        assert_eq!(cpu.step(&mut bus), 5);
        assert_eq!(bus.memory[0x10], 0x40);
        assert!(cpu.carry());
        assert!(cpu.zero());
    }

    #[test]
    fn sbx_subtracts_from_a_and_x() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();
        cpu.a = 0xF0;
        cpu.x = 0x3F;
        bus.memory[0] = 0xCB; // SBX #$10
        bus.memory[1] = 0x10;

        cpu.step(&mut bus);
        // (A AND X) = $30; $30 - $10 = $20, no borrow.
        assert_eq!(cpu.x, 0x20);
        assert!(cpu.carry());
    }

    #[test]
    fn shx_stores_x_and_high_byte_plus_one() {
        let mut cpu = Ricoh2A03::new();
        let mut bus = TestBus::new();
        cpu.x = 0xFF;
        cpu.y = 0x00;
        bus.memory[0] = 0x9E; // SHX $1000,Y
        bus.memory[1] = 0x00;
        bus.memory[2] = 0x10;

        assert_eq!(cpu.step(&mut bus), 5);
        assert_eq!(bus.memory[0x1000], 0xFF & 0x11);
    }
}
