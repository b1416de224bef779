//! Headless Mega Drive emulator binary.
//!
//! Takes one positional argument, the ROM path. Runs until the core
//! surfaces an error, then leaves with the machine state logged. The
//! graphical shell and input polling live in a separate front end; this
//! binary drives the core alone. `RUST_LOG` controls verbosity.

use std::process;

use emu_megadrive::{MegaDrive, MegaDriveConfig, StepResult};

fn main() {
    env_logger::init();

    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "emu-megadrive".into());
    let Some(rom_path) = args.next() else {
        eprintln!("Usage: {program} <rom>");
        process::exit(1);
    };
    if args.next().is_some() {
        eprintln!("Usage: {program} <rom>");
        process::exit(1);
    }

    let rom = match std::fs::read(&rom_path) {
        Ok(rom) => rom,
        Err(err) => {
            eprintln!("Failed to read ROM {rom_path}: {err}");
            process::exit(1);
        }
    };

    let mut megadrive = match MegaDrive::new(MegaDriveConfig::new(rom)) {
        Ok(megadrive) => megadrive,
        Err(err) => {
            eprintln!("Failed to initialize machine: {err}");
            process::exit(1);
        }
    };

    eprintln!(
        "Running {} ({})",
        megadrive.header().metadata.overseas_title,
        megadrive.header().metadata.serial_number
    );

    let mut frames: u64 = 0;
    megadrive.reset_interrupt_time();
    loop {
        match megadrive.step() {
            Ok(StepResult::Executed) => {}
            Ok(StepResult::VblankInterrupt) => {
                frames += 1;
                if frames % 600 == 0 {
                    let regs = megadrive.registers();
                    eprintln!(
                        "Frame {frames}: PC=${:06x} SR=${:04x} D0=${:08x} A7=${:08x}",
                        regs.pc,
                        regs.sr.word(),
                        regs.d[0],
                        regs.stack_ptr(),
                    );
                }
            }
            Err(err) => {
                let regs = megadrive.registers();
                eprintln!("Halted at PC=${:06x}: {err}", regs.pc);
                break;
            }
        }
    }
}
