//! Headless NES runner.
//!
//! Runs a ROM without a window and reports a framebuffer hash, which makes
//! scripted runs reproducible: the same ROM and inputs yield the same hash
//! line. `--dump-cpu`/`--dump-ppu` expose the machine's diagnostic counters
//! after the run.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use nes::{buttons, Controller, Nes, FRAME_BUDGET};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nes-cli")]
#[command(about = "Headless NES (NROM) emulator runner", long_about = None)]
struct Args {
    /// Path to the iNES ROM file
    rom: PathBuf,

    /// Number of frames to run
    #[arg(short, long, default_value = "60")]
    frames: u32,

    /// Buttons held for the whole run (comma-separated:
    /// a,b,select,start,up,down,left,right)
    #[arg(long, value_delimiter = ',')]
    hold: Vec<String>,

    /// Hold Start for the first N frames
    #[arg(long, default_value = "0", value_name = "N")]
    tap_start: u32,

    /// Stop early when the framebuffer hash stays unchanged for more than
    /// 180 consecutive frames
    #[arg(long)]
    detect_freeze: bool,

    /// Dump CPU state after the run
    #[arg(long)]
    dump_cpu: bool,

    /// Dump PPU state after the run
    #[arg(long)]
    dump_ppu: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let held = match parse_buttons(&args.hold) {
        Ok(pad) => pad,
        Err(name) => {
            eprintln!("unknown button name: {name}");
            return ExitCode::from(2);
        }
    };

    let mut machine = match Nes::from_path(&args.rom) {
        Ok(machine) => machine,
        Err(e) => {
            eprintln!("ROM load failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut hash = 0u32;
    let mut last_hash = 0u32;
    let mut stable = 0u32;
    let mut frames_done = 0u32;

    for frame in 0..args.frames {
        let mut pad = held;
        if frame < args.tap_start {
            pad.press(buttons::START);
        }
        machine.set_controller(pad.state());

        if !machine.run_until_frame(FRAME_BUDGET) {
            eprintln!("no frame produced within the instruction budget");
            return ExitCode::FAILURE;
        }

        hash = fnv1a32(machine.framebuffer());
        if frame > 0 && hash == last_hash {
            stable += 1;
        } else {
            stable = 0;
        }
        last_hash = hash;
        frames_done = frame + 1;

        if args.detect_freeze && stable > 180 {
            eprintln!("freeze suspected: framebuffer hash stable for {stable} frames");
            break;
        }
    }

    println!("frames={frames_done} framebuffer_fnv1a32={hash:08x}");

    if args.dump_cpu {
        let cpu = machine.cpu();
        println!();
        println!("CPU state:");
        println!("  A:  ${:02X}", cpu.a());
        println!("  X:  ${:02X}", cpu.x());
        println!("  Y:  ${:02X}", cpu.y());
        println!("  SP: ${:02X}", cpu.sp());
        println!("  PC: ${:04X}", machine.pc());
        println!("  P:  ${:02X}", cpu.status());
        println!("  Cycles: {}", machine.cycles());
        println!("  NMIs serviced: {}", machine.nmi_count());
    }

    if args.dump_ppu {
        let ppu = &machine.bus.ppu;
        println!();
        println!("PPU state:");
        println!("  Scanline: {}", ppu.scanline());
        println!("  Dot: {}", ppu.dot());
        println!("  Status: ${:02X}", ppu.status);
        println!("  Mask: ${:02X}", ppu.mask);
        println!("  VRAM address: ${:04X}", ppu.vram_addr());
    }

    ExitCode::SUCCESS
}

fn parse_buttons(names: &[String]) -> Result<Controller, String> {
    let mut pad = Controller::new();
    for name in names {
        let bit = match name.as_str() {
            "a" => buttons::A,
            "b" => buttons::B,
            "select" => buttons::SELECT,
            "start" => buttons::START,
            "up" => buttons::UP,
            "down" => buttons::DOWN,
            "left" => buttons::LEFT,
            "right" => buttons::RIGHT,
            other => return Err(other.to_string()),
        };
        pad.press(bit);
    }
    Ok(pad)
}

/// FNV-1a over the framebuffer bytes, the stable-hash signal for scripted
/// runs.
fn fnv1a32(data: &[u8]) -> u32 {
    let mut hash = 2166136261u32;
    for &byte in data {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(16777619);
    }
    hash
}
