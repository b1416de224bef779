//! Wall-clock VBlank pacing.
//!
//! The vertical-blank interrupt fires when at least one frame period has
//! elapsed since the last fire; missed frames are not repaid. It is
//! suppressed while the VDP has the interrupt disabled or the CPU mask
//! is at the VBlank level or above.

use std::time::{Duration, Instant};

use crate::bus::MegaDriveBus;
use cpu_m68k::Registers;
use emu_core::{Device, Error};

const VBLANK_INTERRUPT_LEVEL: u8 = 6;

/// NTSC frame period: 60 frames per second.
const NTSC_WAIT_TIME: Duration = Duration::from_nanos(16_666_666);

pub struct InterruptHandler {
    vblank_pc: u32,
    wait_time: Duration,
    prev_fire: Instant,
}

impl InterruptHandler {
    #[must_use]
    pub fn new(vblank_pc: u32) -> Self {
        Self {
            vblank_pc,
            wait_time: NTSC_WAIT_TIME,
            prev_fire: Instant::now(),
        }
    }

    /// Scale the frame period; 2.0 runs the machine at double speed.
    pub fn set_game_speed(&mut self, game_speed: f64) {
        self.wait_time = Duration::from_secs_f64(NTSC_WAIT_TIME.as_secs_f64() / game_speed);
    }

    /// Re-anchor the clock, e.g. when resuming from a debugger pause.
    pub fn reset_time(&mut self) {
        self.prev_fire = Instant::now();
    }

    /// Returns true when a VBlank was injected.
    pub fn check(&mut self, registers: &mut Registers, bus: &mut MegaDriveBus) -> Result<bool, Error> {
        if !bus.vdp.vblank_interrupt_enabled() {
            return Ok(false);
        }
        if registers.sr.interrupt_mask() >= VBLANK_INTERRUPT_LEVEL {
            return Ok(false);
        }

        let now = Instant::now();
        if now.duration_since(self.prev_fire) >= self.wait_time {
            self.prev_fire = now;
            self.call_vblank(registers, bus)?;
            return Ok(true);
        }

        Ok(false)
    }

    /// Build an exception frame like TRAP does: supervisor on, push PC
    /// then SR, raise the mask, jump through the VBlank vector.
    fn call_vblank(&self, registers: &mut Registers, bus: &mut MegaDriveBus) -> Result<(), Error> {
        registers.sr.set_supervisor(true);

        let sp = registers.stack_ptr().wrapping_sub(4);
        bus.write_long(sp, registers.pc)?;
        registers.set_stack_ptr(sp);

        let sp = sp.wrapping_sub(2);
        bus.write_word(sp, registers.sr.word())?;
        registers.set_stack_ptr(sp);

        registers.sr.set_interrupt_mask(VBLANK_INTERRUPT_LEVEL);
        registers.pc = self.vblank_pc;
        Ok(())
    }
}
