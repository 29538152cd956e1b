//! Nintendo Entertainment System (NROM) emulator core.
//!
//! This crate provides NES emulation sufficient for mapper 0 cartridges:
//! - Ricoh 2A03 CPU (via the `cpu-2a03` crate)
//! - PPU 2C02 with a simplified per-scanline renderer
//! - CPU memory bus with controller port and OAM DMA
//! - iNES 1.0 cartridge loading (NROM only)
//!
//! The host-facing surface lives on [`Nes`]: load, reset, controller input,
//! `run_until_frame`, and the RGBA framebuffer. There is no windowing or
//! audio here; hosts drive the machine and present the framebuffer
//! themselves.

mod bus;
mod cartridge;
mod controller;
mod mapper;
mod nes;
mod ppu;

pub use bus::CpuBus;
pub use cartridge::{Cartridge, Mirroring, RomError};
pub use controller::{buttons, Controller};
pub use nes::{Nes, FRAME_BUDGET};
pub use ppu::Ppu;
pub use retrocore::Bus;
