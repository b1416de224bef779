//! Whole-machine scenarios against a synthetic cartridge.

use emu_core::Device;
use emu_megadrive::{MegaDrive, MegaDriveConfig, StepResult};

const CODE_BASE: usize = 0x200;
const VBLANK_PC: u32 = 0x300;
const RESET_SP: u32 = 0x00FF_FF00;

const VDP_CTRL: u32 = 0xC0_0004;
const VDP_DATA: u32 = 0xC0_0000;

/// A minimal cartridge: vector table, metadata, program at 0x200 and a
/// VBlank handler (NOP loop) at 0x300.
fn build_rom(code: &[u16]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x1000];
    rom[0x000..0x004].copy_from_slice(&RESET_SP.to_be_bytes());
    rom[0x004..0x008].copy_from_slice(&(CODE_BASE as u32).to_be_bytes());
    rom[0x070..0x074].copy_from_slice(&0x0000_0380u32.to_be_bytes());
    rom[0x078..0x07C].copy_from_slice(&VBLANK_PC.to_be_bytes());
    rom[0x100..0x110].copy_from_slice(b"SEGA MEGA DRIVE ");
    rom[0x150..0x160].copy_from_slice(b"SYSTEM TEST ROM ");
    rom[0x1A0..0x1A4].copy_from_slice(&0u32.to_be_bytes());
    rom[0x1A4..0x1A8].copy_from_slice(&0x000F_FFFFu32.to_be_bytes());

    for (i, word) in code.iter().enumerate() {
        let offset = CODE_BASE + 2 * i;
        rom[offset..offset + 2].copy_from_slice(&word.to_be_bytes());
    }
    // VBlank handler: NOP
    rom[VBLANK_PC as usize..VBLANK_PC as usize + 2].copy_from_slice(&0x4E71u16.to_be_bytes());
    rom
}

fn make_machine(code: &[u16]) -> MegaDrive {
    MegaDrive::new(MegaDriveConfig::new(build_rom(code))).expect("valid ROM")
}

#[test]
fn machine_boots_from_vector_table() {
    let machine = make_machine(&[0x4E71]);
    assert_eq!(machine.registers().pc, CODE_BASE as u32);
    assert_eq!(machine.registers().usp, RESET_SP);
    assert_eq!(machine.header().metadata.overseas_title, "SYSTEM TEST ROM");
}

#[test]
fn work_ram_word_round_trip_over_the_bus() {
    let mut machine = make_machine(&[0x4E71]);
    let bus = machine.bus_mut();
    bus.write_word(0xFF_0000, 0x1234).unwrap();
    assert_eq!(bus.read_word(0xFF_0000).unwrap(), 0x1234);
    assert_eq!(bus.read_byte(0xFF_0001).unwrap(), 0x34);
}

#[test]
fn cpu_program_runs_from_rom() {
    // MOVEQ #42, D0; MOVE.l D0, ($FF0000).l
    let mut machine = make_machine(&[0x702A, 0x23C0, 0x00FF, 0x0000]);
    assert_eq!(machine.step().unwrap(), StepResult::Executed);
    assert_eq!(machine.step().unwrap(), StepResult::Executed);
    assert_eq!(machine.registers().d[0], 42);
    assert_eq!(machine.bus_mut().read_long(0xFF_0000).unwrap(), 42);
}

#[test]
fn vdp_cram_write_and_read_back() {
    let mut machine = make_machine(&[0x4E71]);
    let bus = machine.bus_mut();

    bus.write_word(VDP_CTRL, 0x8F02).unwrap(); // autoincrement 2
    bus.write_word(VDP_CTRL, 0xC000).unwrap(); // CRAM write, address 0
    bus.write_word(VDP_CTRL, 0x0000).unwrap();
    bus.write_word(VDP_DATA, 0x0EEE).unwrap();
    bus.write_word(VDP_DATA, 0x0000).unwrap();

    assert_eq!(&bus.vdp.cram()[0..4], &[0x0E, 0xEE, 0x00, 0x00]);

    // read back through the data port
    bus.write_word(VDP_CTRL, 0x0000).unwrap(); // CRAM read, address 0
    bus.write_word(VDP_CTRL, 0x0020).unwrap();
    assert_eq!(bus.read_word(VDP_DATA).unwrap(), 0x0EEE);
}

#[test]
fn dma_from_work_ram_into_vram() {
    let mut machine = make_machine(&[0x4E71]);
    let bus = machine.bus_mut();

    for (i, byte) in [0x10u8, 0x21, 0x32, 0x43, 0x54, 0x65, 0x76, 0x87]
        .iter()
        .enumerate()
    {
        bus.write_byte(0xFF_0000 + i as u32, *byte).unwrap();
    }

    bus.write_word(VDP_CTRL, 0x8114).unwrap(); // display on, DMA allowed
    bus.write_word(VDP_CTRL, 0x8F02).unwrap(); // autoincrement 2
    bus.write_word(VDP_CTRL, 0x9304).unwrap(); // length: 4 words
    bus.write_word(VDP_CTRL, 0x9400).unwrap();
    bus.write_word(VDP_CTRL, 0x9500).unwrap(); // source: 0x7F8000 words
    bus.write_word(VDP_CTRL, 0x9680).unwrap();
    bus.write_word(VDP_CTRL, 0x977F).unwrap();
    bus.write_word(VDP_CTRL, 0x4000).unwrap(); // VRAM address 0, with DMA
    bus.write_word(VDP_CTRL, 0x0080).unwrap();

    let mut ram = [0u8; 8];
    bus.read(0xFF_0000, &mut ram).unwrap();
    assert_eq!(&bus.vdp.vram()[0..8], &ram);
}

#[test]
fn vblank_fires_once_due_and_builds_a_trap_frame() {
    let mut machine = make_machine(&[0x4E71, 0x4E71, 0x4E71]);
    machine.registers_mut().ssp = 0x00FF_FE00;

    // VBlank disabled: steps execute instructions even at huge speed
    machine.set_game_speed(1e9);
    assert_eq!(machine.step().unwrap(), StepResult::Executed);

    // enable the VDP vblank interrupt (register 1, bit 5)
    machine.bus_mut().write_word(VDP_CTRL, 0x8164).unwrap();

    // masked at level 6: still no interrupt
    machine.registers_mut().sr.set_interrupt_mask(6);
    assert_eq!(machine.step().unwrap(), StepResult::Executed);

    machine.registers_mut().sr.set_interrupt_mask(0);
    let pc_before = machine.registers().pc;
    let sr_before = machine.registers().sr;
    assert_eq!(machine.step().unwrap(), StepResult::VblankInterrupt);

    let regs = *machine.registers();
    assert_eq!(regs.pc, VBLANK_PC);
    assert!(regs.sr.supervisor());
    assert_eq!(regs.sr.interrupt_mask(), 6);
    // frame on the supervisor stack: PC long above SR word
    assert_eq!(regs.ssp, 0x00FF_FE00 - 6);
    let bus = machine.bus_mut();
    assert_eq!(bus.read_long(0x00FF_FE00 - 4).unwrap(), pc_before);
    let pushed_sr = bus.read_word(0x00FF_FE00 - 6).unwrap();
    assert_eq!(pushed_sr & 0x2000, 0x2000);
    assert_eq!(pushed_sr & 0x001F, sr_before.word() & 0x001F);

    // the next step resumes at the handler
    assert_eq!(machine.step().unwrap(), StepResult::Executed);
    assert_eq!(machine.registers().pc, VBLANK_PC + 2);
}

#[test]
fn vblank_is_paced_by_the_wall_clock() {
    let mut machine = make_machine(&[0x4E71; 8]);
    machine.registers_mut().ssp = 0x00FF_FE00;
    machine.bus_mut().write_word(VDP_CTRL, 0x8164).unwrap();

    // at normal speed, a freshly anchored clock does not fire
    machine.set_game_speed(1.0);
    machine.reset_interrupt_time();
    assert_eq!(machine.step().unwrap(), StepResult::Executed);
    assert_eq!(machine.step().unwrap(), StepResult::Executed);
}

#[test]
fn vdp_state_dump_apply_is_identity() {
    let mut machine = make_machine(&[0x4E71]);
    let bus = machine.bus_mut();
    bus.write_word(VDP_CTRL, 0x8F02).unwrap();
    bus.write_word(VDP_CTRL, 0x8208).unwrap();
    bus.write_word(VDP_CTRL, 0x4000).unwrap();
    bus.write_word(VDP_CTRL, 0x0000).unwrap();
    bus.write_word(VDP_DATA, 0x1234).unwrap();

    let dump = machine.dump_vdp_state();
    machine.apply_vdp_state(&dump).unwrap();
    assert_eq!(machine.dump_vdp_state(), dump);
}

#[test]
fn trademark_write_over_the_bus() {
    let mut machine = make_machine(&[0x4E71]);
    let bus = machine.bus_mut();
    bus.write_long(0xA1_4000, u32::from_be_bytes(*b"SEGA")).unwrap();
    assert!(bus.write_long(0xA1_4000, 0x1234_5678).is_err());
}

#[test]
fn controller_and_version_over_the_bus() {
    let mut machine = make_machine(&[0x4E71]);
    machine.set_button(0, emu_megadrive::Button::Start, true);
    let bus = machine.bus_mut();
    assert_eq!(bus.read_byte(0xA1_0001).unwrap(), 0xAF);
    bus.write_byte(0xA1_0003, 0x00).unwrap(); // select step 2
    assert_eq!(bus.read_byte(0xA1_0003).unwrap() & 0x20, 0);
}

#[test]
fn disassembly_probe_restores_pc() {
    let mut machine = make_machine(&[0x702A, 0x4E71]);
    let (pc, text) = machine.current_instruction().unwrap();
    assert_eq!(pc, CODE_BASE as u32);
    assert_eq!(text, "MOVEQ #42, D0");
    assert_eq!(machine.registers().pc, CODE_BASE as u32);
    // and the probe did not disturb execution
    machine.step().unwrap();
    assert_eq!(machine.registers().d[0], 42);
}

#[test]
fn halting_error_leaves_state_for_inspection() {
    // JMP to an odd address
    let mut machine = make_machine(&[0x4EF8, 0x0141]);
    let err = machine.step().unwrap_err();
    assert_eq!(err, emu_core::Error::UnalignedProgramCounter { pc: 0x141 });
    assert_eq!(machine.registers().pc, 0x141);
}
