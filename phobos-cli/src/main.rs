//! Headless runner: boots a flat binary image and mirrors the guest's UART
//! output to stdout.

use clap::Parser;
use log::info;
use phobos_core::board::{Board, Config};
use phobos_core::Engine;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Raw little-endian program image, loaded into the program ROM.
    image: PathBuf,
    /// Optional asset blob, loaded into the data ROM.
    #[arg(short, long)]
    data: Option<PathBuf>,
    /// Address execution starts at.
    #[arg(short, long, default_value_t = 0x4010_0000, value_parser = parse_address)]
    entry: u32,
    /// Pause at this address instead of running freely. May be repeated.
    #[arg(short, long, value_parser = parse_address)]
    breakpoint: Vec<u32>,
    /// Print the memory map before starting.
    #[arg(long)]
    map: bool,
}

fn parse_address(text: &str) -> Result<u32, String> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid address {text:?}: {e}"))
}

fn main() -> io::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let board = Board::new(&Config::default())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let image = std::fs::read(&args.image)?;
    info!("loading {} bytes from {}", image.len(), args.image.display());
    board
        .peripherals()
        .program_rom
        .load(0, &image)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    if let Some(path) = &args.data {
        let blob = std::fs::read(path)?;
        info!("loading {} bytes of data from {}", blob.len(), path.display());
        board
            .peripherals()
            .data_rom
            .load(0, &blob)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    }

    if args.map {
        print!("{}", board.cpu().bus().describe());
    }

    let (cpu, peripherals) = board.split();
    let mut engine = Engine::new(cpu);
    engine.start();
    for &address in &args.breakpoint {
        engine.add_breakpoint(address);
    }
    engine.set_pc(args.entry);
    engine.resume();

    // Pump UART output until the core pauses (error, breakpoint, or never).
    let mut stdout = io::stdout();
    loop {
        std::thread::sleep(Duration::from_millis(10));
        let output = peripherals.uart.take_output();
        if !output.is_empty() {
            stdout.write_all(&output)?;
            stdout.flush()?;
        }
        if engine.paused() {
            break;
        }
    }

    let output = peripherals.uart.take_output();
    if !output.is_empty() {
        stdout.write_all(&output)?;
        stdout.flush()?;
    }
    info!("core paused at {:08x} after {} instructions", engine.pc(), engine.cycle_count());
    engine.stop();
    Ok(())
}
