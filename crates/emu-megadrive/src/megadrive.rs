//! Machine glue: CPU, bus and VBlank pacer as one steppable system.

use crate::bus::MegaDriveBus;
use crate::config::MegaDriveConfig;
use crate::controller::Button;
use crate::interrupt::InterruptHandler;
use crate::rom::{RomError, RomHeader};
use crate::vdp::Vdp;
use crate::video::Renderer;
use cpu_m68k::{Context, Instruction, Registers};
use emu_core::Error;

/// What one step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Executed,
    VblankInterrupt,
}

pub struct MegaDrive {
    bus: MegaDriveBus,
    registers: Registers,
    interrupts: InterruptHandler,
    renderer: Renderer,
    header: RomHeader,
}

impl MegaDrive {
    /// Build the machine from a cartridge image: parse the header, map
    /// the devices, seed PC and the stack pointer from the vector table.
    pub fn new(config: MegaDriveConfig) -> Result<Self, RomError> {
        let header = RomHeader::parse(&config.rom)?;
        log::info!(
            "loaded ROM: {} ({} bytes)",
            header.metadata.overseas_title,
            config.rom.len()
        );

        let bus = MegaDriveBus::new(config.rom, header.metadata.rom_address);

        let mut registers = Registers::new();
        registers.usp = header.vector_table.reset_sp;
        registers.pc = header.vector_table.reset_pc;

        let mut interrupts = InterruptHandler::new(header.vector_table.vblank_pc);
        interrupts.set_game_speed(config.game_speed);

        Ok(Self {
            bus,
            registers,
            interrupts,
            renderer: Renderer::new(),
            header,
        })
    }

    /// One architectural step: inject a due VBlank, or decode and
    /// execute one instruction. On error the machine state stays as the
    /// failing instruction left it.
    pub fn step(&mut self) -> Result<StepResult, Error> {
        if self.interrupts.check(&mut self.registers, &mut self.bus)? {
            return Ok(StepResult::VblankInterrupt);
        }

        let begin_pc = self.registers.pc;
        let mut ctx = Context::new(&mut self.registers, &mut self.bus);
        let inst = Instruction::decode(&mut ctx)?;
        if let Err(err) = inst.execute(&mut ctx) {
            log::error!("execute error pc: {begin_pc:06x} what: {err}");
            return Err(err);
        }
        Ok(StepResult::Executed)
    }

    /// Decode the instruction at PC without executing it; PC is
    /// restored.
    pub fn current_instruction(&mut self) -> Result<(u32, String), Error> {
        let begin_pc = self.registers.pc;
        let mut ctx = Context::new(&mut self.registers, &mut self.bus);
        let decoded = Instruction::decode(&mut ctx);
        self.registers.pc = begin_pc;
        Ok((begin_pc, decoded?.to_string()))
    }

    /// Composite a frame from current VDP state.
    pub fn render(&mut self) -> &[u8] {
        self.renderer.render(&self.bus.vdp)
    }

    pub fn set_button(&mut self, controller: usize, button: Button, pressed: bool) {
        self.bus.controller.set_button(controller, button, pressed);
    }

    pub fn set_game_speed(&mut self, game_speed: f64) {
        self.interrupts.set_game_speed(game_speed);
    }

    /// Re-anchor the VBlank clock after a pause.
    pub fn reset_interrupt_time(&mut self) {
        self.interrupts.reset_time();
    }

    #[must_use]
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    #[must_use]
    pub fn bus(&self) -> &MegaDriveBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut MegaDriveBus {
        &mut self.bus
    }

    #[must_use]
    pub fn vdp(&self) -> &Vdp {
        &self.bus.vdp
    }

    #[must_use]
    pub fn header(&self) -> &RomHeader {
        &self.header
    }

    /// Flat VDP state for the diagnostic collaborator.
    #[must_use]
    pub fn dump_vdp_state(&self) -> Vec<u8> {
        self.bus.vdp.dump_state()
    }

    pub fn apply_vdp_state(&mut self, state: &[u8]) -> Result<(), Error> {
        self.bus.vdp.apply_state(state)
    }
}
