//! NES cartridge and iNES ROM format.
//!
//! The loader accepts iNES 1.0 images (NES 2.0 headers are read as iNES
//! 1.0). Only mapper 0 (NROM) boards load; everything else is rejected at
//! this boundary so the core never has to fail at runtime.

use std::io;

use thiserror::Error;
use tracing::info;

use crate::mapper::{self, Mapper};

/// Nametable mirroring mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mirroring {
    /// Horizontal mirroring (vertical scrolling games).
    Horizontal,
    /// Vertical mirroring (horizontal scrolling games).
    Vertical,
    /// Four-screen (cartridge provides extra VRAM).
    FourScreen,
}

/// Errors surfaced by the ROM loader.
///
/// The emulation core cannot fail once a cartridge is loaded; these cover
/// the load boundary only and reduce to plain strings at the host surface.
#[derive(Error, Debug)]
pub enum RomError {
    #[error("failed to open ROM: {0}")]
    Open(io::Error),
    #[error("failed to read ROM: {0}")]
    Read(io::Error),
    #[error("not an iNES ROM (missing NES\\x1A header)")]
    BadHeader,
    #[error("input is an ELF executable, not an iNES .nes ROM")]
    IsElf,
    #[error("ROM file truncated reading {0}")]
    Truncated(&'static str),
    #[error("unsupported mapper {0} (this build supports mapper 0 only)")]
    UnsupportedMapper(u8),
}

/// NES cartridge.
pub struct Cartridge {
    /// PRG ROM data.
    prg_rom: Vec<u8>,
    /// CHR ROM or CHR RAM data.
    chr: Vec<u8>,
    /// CHR is RAM (writable) when the header declares zero CHR chunks.
    chr_is_ram: bool,
    /// PRG RAM at $6000-$7FFF.
    prg_ram: Vec<u8>,
    /// Mapper implementation.
    mapper: Box<dyn Mapper>,
    /// Mapper number from the header.
    mapper_id: u8,
    /// Base mirroring mode (from the iNES header).
    mirroring: Mirroring,
    /// Has battery-backed RAM.
    has_battery: bool,
}

impl Cartridge {
    /// Load a cartridge from iNES ROM data.
    pub fn from_ines(data: &[u8]) -> Result<Self, RomError> {
        if data.len() >= 4 && data[0..4] == *b"\x7FELF" {
            return Err(RomError::IsElf);
        }
        if data.len() < 16 || data[0..4] != *b"NES\x1A" {
            return Err(RomError::BadHeader);
        }

        let prg_chunks = data[4] as usize;
        let chr_chunks = data[5] as usize;
        let flags6 = data[6];
        let flags7 = data[7];
        let prg_ram_chunks = if data[8] == 0 { 1 } else { data[8] as usize };

        // NES 2.0 images are read as iNES 1.0.
        let mirroring = if flags6 & 0x08 != 0 {
            Mirroring::FourScreen
        } else if flags6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };
        let has_battery = flags6 & 0x02 != 0;
        let has_trainer = flags6 & 0x04 != 0;
        let mapper_id = (flags6 >> 4) | (flags7 & 0xF0);

        let prg_size = prg_chunks * 16 * 1024;
        let chr_size = chr_chunks * 8 * 1024;

        let prg_start = 16 + if has_trainer { 512 } else { 0 };
        if data.len() < prg_start {
            return Err(RomError::Truncated("trainer"));
        }
        let chr_start = prg_start + prg_size;
        if data.len() < chr_start {
            return Err(RomError::Truncated("PRG ROM"));
        }
        if data.len() < chr_start + chr_size {
            return Err(RomError::Truncated("CHR ROM"));
        }

        let prg_rom = data[prg_start..chr_start].to_vec();
        let (chr, chr_is_ram) = if chr_size > 0 {
            (data[chr_start..chr_start + chr_size].to_vec(), false)
        } else {
            // No CHR ROM: the board carries 8 KiB of CHR RAM instead.
            (vec![0; 8 * 1024], true)
        };

        let mapper = mapper::create(mapper_id, prg_rom.len())?;

        info!(
            prg = prg_rom.len(),
            chr = chr.len(),
            chr_ram = chr_is_ram,
            mapper = mapper_id,
            mirroring = ?mirroring,
            "cartridge accepted"
        );

        Ok(Self {
            prg_rom,
            chr,
            chr_is_ram,
            prg_ram: vec![0; prg_ram_chunks * 8 * 1024],
            mapper,
            mapper_id,
            mirroring,
            has_battery,
        })
    }

    /// Read from CPU cartridge space ($6000-$FFFF).
    pub fn cpu_read(&self, addr: u16) -> u8 {
        if (0x6000..0x8000).contains(&addr) {
            self.prg_ram[(addr as usize - 0x6000) & 0x1FFF]
        } else if addr >= 0x8000 && !self.prg_rom.is_empty() {
            let mapped = self.mapper.map_prg_read(addr);
            self.prg_rom[mapped % self.prg_rom.len()]
        } else {
            0
        }
    }

    /// Write to CPU cartridge space (PRG RAM and mapper registers).
    pub fn cpu_write(&mut self, addr: u16, value: u8) {
        if (0x6000..0x8000).contains(&addr) {
            self.prg_ram[(addr as usize - 0x6000) & 0x1FFF] = value;
        } else if addr >= 0x8000 {
            self.mapper.write(addr, value);
        }
    }

    /// Read from CHR space ($0000-$1FFF).
    pub fn chr_read(&self, addr: u16) -> u8 {
        let mapped = self.mapper.map_chr_read(addr);
        self.chr[mapped % self.chr.len()]
    }

    /// Write to CHR space. Only CHR RAM boards accept writes.
    pub fn chr_write(&mut self, addr: u16, value: u8) {
        if !self.chr_is_ram {
            return;
        }
        let mapped = self.mapper.map_chr_read(addr) % self.chr.len();
        self.chr[mapped] = value;
    }

    /// Current nametable mirroring (the mapper may override the header).
    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring().unwrap_or(self.mirroring)
    }

    pub fn mapper_id(&self) -> u8 {
        self.mapper_id
    }

    pub fn has_battery(&self) -> bool {
        self.has_battery
    }

    pub fn chr_is_ram(&self) -> bool {
        self.chr_is_ram
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ines_image;

    #[test]
    fn load_nrom() {
        let rom = ines_image(&vec![0; 32 * 1024], &vec![0; 8 * 1024], 0);
        let cart = Cartridge::from_ines(&rom).unwrap();
        assert_eq!(cart.mapper_id(), 0);
        assert!(!cart.has_battery());
        assert!(!cart.chr_is_ram());
        assert_eq!(cart.mirroring(), Mirroring::Horizontal);
    }

    #[test]
    fn missing_magic_is_rejected() {
        assert!(matches!(
            Cartridge::from_ines(&[0u8; 16]),
            Err(RomError::BadHeader)
        ));
        assert!(matches!(Cartridge::from_ines(b"NE"), Err(RomError::BadHeader)));
    }

    #[test]
    fn elf_input_is_rejected() {
        let mut data = vec![0u8; 64];
        data[0..4].copy_from_slice(b"\x7FELF");
        assert!(matches!(Cartridge::from_ines(&data), Err(RomError::IsElf)));
    }

    #[test]
    fn unsupported_mapper_is_rejected() {
        let mut rom = ines_image(&vec![0; 16 * 1024], &[], 0);
        rom[6] = 1 << 4; // mapper 1
        assert!(matches!(
            Cartridge::from_ines(&rom),
            Err(RomError::UnsupportedMapper(1))
        ));
    }

    #[test]
    fn truncated_rom_is_rejected() {
        let mut rom = ines_image(&vec![0; 16 * 1024], &[], 0);
        rom.truncate(1000);
        assert!(matches!(
            Cartridge::from_ines(&rom),
            Err(RomError::Truncated(_))
        ));
    }

    #[test]
    fn zero_chr_chunks_means_chr_ram() {
        let rom = ines_image(&vec![0; 16 * 1024], &[], 0);
        let mut cart = Cartridge::from_ines(&rom).unwrap();
        assert!(cart.chr_is_ram());

        cart.chr_write(0x0123, 0x42);
        assert_eq!(cart.chr_read(0x0123), 0x42);
    }

    #[test]
    fn chr_rom_ignores_writes() {
        let rom = ines_image(&vec![0; 16 * 1024], &vec![0; 8 * 1024], 0);
        let mut cart = Cartridge::from_ines(&rom).unwrap();
        cart.chr_write(0x0123, 0x42);
        assert_eq!(cart.chr_read(0x0123), 0x00);
    }

    #[test]
    fn prg_16k_is_mirrored() {
        let mut prg = vec![0u8; 16 * 1024];
        prg[0x0123] = 0x5A;
        let rom = ines_image(&prg, &[], 0);
        let cart = Cartridge::from_ines(&rom).unwrap();
        assert_eq!(cart.cpu_read(0x8123), 0x5A);
        assert_eq!(cart.cpu_read(0xC123), 0x5A);
    }

    #[test]
    fn trainer_is_skipped() {
        let mut prg = vec![0u8; 16 * 1024];
        prg[0] = 0x77;
        let mut rom = Vec::new();
        rom.extend_from_slice(b"NES\x1A");
        rom.push(1);
        rom.push(0);
        rom.push(0x04); // trainer present
        rom.extend_from_slice(&[0; 9]);
        rom.extend_from_slice(&[0xFF; 512]);
        rom.extend_from_slice(&prg);

        let cart = Cartridge::from_ines(&rom).unwrap();
        assert_eq!(cart.cpu_read(0x8000), 0x77);
    }

    #[test]
    fn prg_ram_round_trips() {
        let rom = ines_image(&vec![0; 16 * 1024], &[], 0);
        let mut cart = Cartridge::from_ines(&rom).unwrap();
        cart.cpu_write(0x6000, 0xA5);
        cart.cpu_write(0x7FFF, 0x5A);
        assert_eq!(cart.cpu_read(0x6000), 0xA5);
        assert_eq!(cart.cpu_read(0x7FFF), 0x5A);
    }

    #[test]
    fn header_mirroring_bits() {
        let mut rom = ines_image(&vec![0; 16 * 1024], &[], 0x01);
        let cart = Cartridge::from_ines(&rom).unwrap();
        assert_eq!(cart.mirroring(), Mirroring::Vertical);

        rom[6] = 0x08;
        let cart = Cartridge::from_ines(&rom).unwrap();
        assert_eq!(cart.mirroring(), Mirroring::FourScreen);
    }
}
