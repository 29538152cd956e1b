//! NES machine aggregate and driver loop.

use std::fs::File;
use std::io::Read as _;
use std::path::Path;

use cpu_2a03::Ricoh2A03;
use tracing::debug;

use crate::bus::CpuBus;
use crate::cartridge::{Cartridge, RomError};

/// Default per-frame instruction budget for `run_until_frame`: several
/// frames' worth of headroom above the ~29,780 CPU cycles a frame takes.
pub const FRAME_BUDGET: u32 = 200_000;

/// The Nintendo Entertainment System.
///
/// Owns the CPU and the bus (which in turn owns the PPU and cartridge);
/// there are no back-pointers between components. The driver loop here is
/// the only scheduler: one CPU event, then three PPU ticks per CPU cycle.
pub struct Nes {
    cpu: Ricoh2A03,
    pub bus: CpuBus,
}

impl Nes {
    /// Build a machine around a loaded cartridge and reset it.
    pub fn new(cartridge: Cartridge) -> Self {
        let mut nes = Self {
            cpu: Ricoh2A03::new(),
            bus: CpuBus::new(cartridge),
        };
        nes.reset();
        nes
    }

    /// Load a machine from iNES ROM bytes.
    pub fn from_ines(data: &[u8]) -> Result<Self, RomError> {
        Ok(Self::new(Cartridge::from_ines(data)?))
    }

    /// Load a machine from an iNES ROM file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RomError> {
        let mut file = File::open(path.as_ref()).map_err(RomError::Open)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).map_err(RomError::Read)?;
        Self::from_ines(&data)
    }

    /// Reset the machine: RAM, PPU, controller latches and CPU (which
    /// reloads PC from the reset vector).
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
        debug!("machine reset, pc={:04X}", self.cpu.pc());
    }

    /// Set the controller 1 state byte.
    pub fn set_controller(&mut self, state: u8) {
        self.bus.set_controller(state);
    }

    /// Advance one CPU event and the PPU by three times its cycle count.
    ///
    /// Ordering: bus writes of the instruction (including a full OAM DMA)
    /// land before the PPU ticks; an NMI the PPU raises during those ticks
    /// is observed by the next CPU step.
    pub fn step(&mut self) -> u32 {
        // The counter as it stands while the instruction runs: its own cost
        // lands only when `step` returns, and a $4014 write samples stall
        // parity mid-instruction.
        let cycles_before = self.cpu.cycles();
        let cycles = self.cpu.step(&mut self.bus);

        if self.bus.take_dma_stall() {
            // 513 cycles, or 514 on an odd cycle.
            self.cpu.add_stall(513 + (cycles_before & 1) as u32);
        }

        for _ in 0..cycles * 3 {
            self.bus.tick_ppu();
        }

        if self.bus.ppu.take_nmi() {
            self.cpu.set_nmi();
        }

        cycles
    }

    /// Run until the PPU signals a completed frame, or until
    /// `max_instructions` CPU events pass without one.
    pub fn run_until_frame(&mut self, max_instructions: u32) -> bool {
        self.bus.ppu.frame_ready = false;
        for _ in 0..max_instructions {
            self.step();
            if self.bus.ppu.frame_ready {
                return true;
            }
        }
        false
    }

    /// The 256x240 RGBA8888 framebuffer.
    pub fn framebuffer(&self) -> &[u8] {
        self.bus.ppu.framebuffer()
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub fn cpu(&self) -> &Ricoh2A03 {
        &self.cpu
    }

    pub fn pc(&self) -> u16 {
        self.cpu.pc()
    }

    pub fn cycles(&self) -> u64 {
        self.cpu.cycles()
    }

    pub fn stall(&self) -> u32 {
        self.cpu.stall()
    }

    pub fn nmi_count(&self) -> u64 {
        self.cpu.nmi_count()
    }
}
