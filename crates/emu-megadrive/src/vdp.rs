//! Video Display Processor.
//!
//! Port map (word ports, mirrored):
//! - `C00000`/`C00002`: data port, targeting VRAM/CRAM/VSRAM at the
//!   latched RAM address, advancing by the autoincrement register.
//! - `C00004`/`C00006`: control port. A word whose top three bits are
//!   `100` programs a register; any other pair of words forms a 32-bit
//!   address/command latch.
//! - `C00008..C0000E`: HV counter, stubbed to zero.
//!
//! The memory→VRAM DMA is carried out by the bus after the triggering
//! control write, so its reads route back through the address decoder.
//!
//! References:
//! - https://plutiedev.com/writing-video
//! - https://plutiedev.com/dma-transfer
//! - https://wiki.megadrive.org/index.php?title=VDP_Ports

use bitflags::bitflags;
use emu_core::{Device, Error};

pub const VRAM_SIZE: usize = 0x1_0000;
pub const VSRAM_SIZE: usize = 80;
pub const CRAM_SIZE: usize = 128;
pub const REGISTER_COUNT: usize = 24;

const DATA1: u32 = 0xC0_0000;
const DATA2: u32 = 0xC0_0002;
const CTRL1: u32 = 0xC0_0004;
const CTRL2: u32 = 0xC0_0006;
const HV_COUNTER1: u32 = 0xC0_0008;
const HV_COUNTER4: u32 = 0xC0_000E;

const SPRITE_ADDRESS_SCALE: u32 = 0x200;
const HSCROLL_ADDRESS_SCALE: u32 = 0x400;
const WINDOW_ADDRESS_SCALE: u32 = 0x800;
const PLANE_ADDRESS_SCALE: u32 = 0x2000;

/// Register numbers as seen in the control-port command byte.
mod reg {
    pub const MODE_SET_1: u8 = 0x80;
    pub const MODE_SET_2: u8 = 0x81;
    pub const PLANE_A_TABLE: u8 = 0x82;
    pub const WINDOW_TABLE: u8 = 0x83;
    pub const PLANE_B_TABLE: u8 = 0x84;
    pub const SPRITE_TABLE: u8 = 0x85;
    pub const UNUSED_86: u8 = 0x86;
    pub const BACKGROUND_COLOR: u8 = 0x87;
    pub const UNUSED_88: u8 = 0x88;
    pub const UNUSED_89: u8 = 0x89;
    pub const HBLANK_RATE: u8 = 0x8A;
    pub const MODE_SET_3: u8 = 0x8B;
    pub const MODE_SET_4: u8 = 0x8C;
    pub const HSCROLL_TABLE: u8 = 0x8D;
    pub const UNUSED_8E: u8 = 0x8E;
    pub const AUTO_INCREMENT: u8 = 0x8F;
    pub const PLANE_SIZE: u8 = 0x90;
    pub const WINDOW_X_DIVISION: u8 = 0x91;
    pub const WINDOW_Y_DIVISION: u8 = 0x92;
    pub const DMA_LENGTH_LOW: u8 = 0x93;
    pub const DMA_LENGTH_HIGH: u8 = 0x94;
    pub const DMA_SOURCE_LOW: u8 = 0x95;
    pub const DMA_SOURCE_MIDDLE: u8 = 0x96;
    pub const DMA_SOURCE_HIGH: u8 = 0x97;
}

bitflags! {
    struct Mode1: u8 {
        const DISABLE_DISPLAY = 1 << 0;
        const FREEZE_HV_COUNTER = 1 << 1;
        const FULL_COLOR_ENTRIES = 1 << 2;
        const ENABLE_HBLANK_INTERRUPT = 1 << 4;
        const BLANK_LEFTMOST_COLUMN = 1 << 5;
    }
}

bitflags! {
    struct Mode2: u8 {
        const MEGA_DRIVE_DISPLAY = 1 << 2;
        const V30_CELL = 1 << 3;
        const ALLOW_DMA = 1 << 4;
        const ENABLE_VBLANK_INTERRUPT = 1 << 5;
        const ENABLE_RENDERING = 1 << 6;
        const VRAM_128K = 1 << 7;
    }
}

bitflags! {
    /// Status word: NTSC, DMA not busy, not in hblank, in vblank, even
    /// frame, no collision, no sprite overflow, no pending interrupt,
    /// FIFO neither full nor empty. Only the vblank bit is set, and it
    /// is a constant placeholder.
    pub struct Status: u16 {
        const PAL_MODE = 1 << 0;
        const DMA_BUSY = 1 << 1;
        const IN_HBLANK = 1 << 2;
        const IN_VBLANK = 1 << 3;
        const ODD_FRAME = 1 << 4;
        const SPRITE_COLLISION = 1 << 5;
        const SPRITE_OVERFLOW = 1 << 6;
        const INTERRUPT_PENDING = 1 << 7;
        const FIFO_FULL = 1 << 8;
        const FIFO_EMPTY = 1 << 9;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaType {
    MemoryToVram,
    VramFill,
    VramCopy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamKind {
    Vram,
    Vsram,
    Cram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalScrollMode {
    FullScroll,
    ScrollEightLinesThenRepeat,
    ScrollEveryTile,
    ScrollEveryLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalScrollMode {
    FullScroll,
    ScrollEveryTwoTiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSplitMode {
    X,
    Y,
}

/// A memory→VRAM transfer armed by the control port, executed by the
/// bus.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DmaRequest {
    pub source_words: u32,
    pub length_words: u32,
    pub auto_increment: u8,
}

pub struct Vdp {
    // derived register state
    vblank_interrupt_enabled: bool,
    allow_dma: bool,
    dma_length_words: u32, // in words, not bytes
    dma_source_words: u32, // in words, not bytes
    dma_type: DmaType,
    auto_increment: u8,
    tile_width: u8,
    tile_height: u8,
    plane_width: u8,
    plane_height: u8,
    plane_a_table_address: u32,
    window_table_address: u32,
    plane_b_table_address: u32,
    sprite_table_address: u32,
    hscroll_table_address: u32,
    horizontal_scroll_mode: HorizontalScrollMode,
    vertical_scroll_mode: VerticalScrollMode,
    window_x_split: usize,
    window_display_to_the_right: bool,
    window_y_split: usize,
    window_display_below: bool,
    window_split_mode: WindowSplitMode,
    background_color_palette: u8,
    background_color_index: u8,

    // address/command latch
    first_half: Option<u16>,
    use_dma: bool,
    ram_kind: RamKind,
    ram_address: u16,
    pending_dma: Option<DmaRequest>,

    registers: [u8; REGISTER_COUNT],

    vram: Vec<u8>,
    vsram: Vec<u8>,
    cram: Vec<u8>,
}

impl Vdp {
    pub const BEGIN: u32 = 0xC0_0000;
    pub const END: u32 = 0xC0_000E;

    #[must_use]
    pub fn new() -> Self {
        Self {
            vblank_interrupt_enabled: false,
            allow_dma: false,
            dma_length_words: 0,
            dma_source_words: 0,
            dma_type: DmaType::MemoryToVram,
            auto_increment: 0,
            tile_width: 0,
            tile_height: 0,
            plane_width: 0,
            plane_height: 0,
            plane_a_table_address: 0,
            window_table_address: 0,
            plane_b_table_address: 0,
            sprite_table_address: 0,
            hscroll_table_address: 0,
            horizontal_scroll_mode: HorizontalScrollMode::FullScroll,
            vertical_scroll_mode: VerticalScrollMode::FullScroll,
            window_x_split: 0,
            window_display_to_the_right: false,
            window_y_split: 0,
            window_display_below: false,
            window_split_mode: WindowSplitMode::X,
            background_color_palette: 0,
            background_color_index: 0,
            first_half: None,
            use_dma: false,
            ram_kind: RamKind::Vram,
            ram_address: 0,
            pending_dma: None,
            registers: [0; REGISTER_COUNT],
            vram: vec![0; VRAM_SIZE],
            vsram: vec![0; VSRAM_SIZE],
            cram: vec![0; CRAM_SIZE],
        }
    }

    // === Register-derived state for the pacer and the renderer ===

    #[must_use]
    pub fn vblank_interrupt_enabled(&self) -> bool {
        self.vblank_interrupt_enabled
    }

    /// Display width in tiles (32 or 40).
    #[must_use]
    pub fn tile_width(&self) -> u8 {
        self.tile_width
    }

    /// Display height in tiles (28 or 30).
    #[must_use]
    pub fn tile_height(&self) -> u8 {
        self.tile_height
    }

    /// Plane (name table) width in tiles.
    #[must_use]
    pub fn plane_width(&self) -> u8 {
        self.plane_width
    }

    /// Plane (name table) height in tiles.
    #[must_use]
    pub fn plane_height(&self) -> u8 {
        self.plane_height
    }

    #[must_use]
    pub fn plane_a_table_address(&self) -> u32 {
        self.plane_a_table_address
    }

    #[must_use]
    pub fn window_table_address(&self) -> u32 {
        self.window_table_address
    }

    #[must_use]
    pub fn plane_b_table_address(&self) -> u32 {
        self.plane_b_table_address
    }

    #[must_use]
    pub fn sprite_table_address(&self) -> u32 {
        self.sprite_table_address
    }

    #[must_use]
    pub fn hscroll_table_address(&self) -> u32 {
        self.hscroll_table_address
    }

    #[must_use]
    pub fn horizontal_scroll_mode(&self) -> HorizontalScrollMode {
        self.horizontal_scroll_mode
    }

    #[must_use]
    pub fn vertical_scroll_mode(&self) -> VerticalScrollMode {
        self.vertical_scroll_mode
    }

    #[must_use]
    pub fn window_split_mode(&self) -> WindowSplitMode {
        self.window_split_mode
    }

    #[must_use]
    pub fn window_x_split(&self) -> usize {
        self.window_x_split
    }

    #[must_use]
    pub fn window_display_to_the_right(&self) -> bool {
        self.window_display_to_the_right
    }

    #[must_use]
    pub fn window_y_split(&self) -> usize {
        self.window_y_split
    }

    #[must_use]
    pub fn window_display_below(&self) -> bool {
        self.window_display_below
    }

    #[must_use]
    pub fn background_color_palette(&self) -> u8 {
        self.background_color_palette
    }

    #[must_use]
    pub fn background_color_index(&self) -> u8 {
        self.background_color_index
    }

    #[must_use]
    pub fn vram(&self) -> &[u8] {
        &self.vram
    }

    #[must_use]
    pub fn vsram(&self) -> &[u8] {
        &self.vsram
    }

    #[must_use]
    pub fn cram(&self) -> &[u8] {
        &self.cram
    }

    // === State dump ===

    /// Serialise registers + VRAM + VSRAM + CRAM as one flat byte array.
    #[must_use]
    pub fn dump_state(&self) -> Vec<u8> {
        let mut state = Vec::with_capacity(REGISTER_COUNT + VRAM_SIZE + VSRAM_SIZE + CRAM_SIZE);
        state.extend_from_slice(&self.registers);
        state.extend_from_slice(&self.vram);
        state.extend_from_slice(&self.vsram);
        state.extend_from_slice(&self.cram);
        state
    }

    /// Apply a state dump: register bytes are replayed through the
    /// register-write path so the derived fields rebuild.
    pub fn apply_state(&mut self, state: &[u8]) -> Result<(), Error> {
        let expected = REGISTER_COUNT + VRAM_SIZE + VSRAM_SIZE + CRAM_SIZE;
        if state.len() != expected {
            return Err(Error::InvalidWrite {
                addr: Self::BEGIN,
                value: state.len() as u32,
            });
        }
        for (i, value) in state[..REGISTER_COUNT].iter().enumerate() {
            let command = (u16::from(reg::MODE_SET_1) + i as u16) << 8 | u16::from(*value);
            let _ = self.process_register(command);
        }
        let mut state = state;
        self.registers.copy_from_slice(&state[..REGISTER_COUNT]);
        state = &state[REGISTER_COUNT..];
        self.vram.copy_from_slice(&state[..VRAM_SIZE]);
        state = &state[VRAM_SIZE..];
        self.vsram.copy_from_slice(&state[..VSRAM_SIZE]);
        state = &state[VSRAM_SIZE..];
        self.cram.copy_from_slice(state);
        Ok(())
    }

    // === DMA plumbing for the bus ===

    pub(crate) fn take_dma_request(&mut self) -> Option<DmaRequest> {
        self.pending_dma.take()
    }

    /// Remaining room in the current RAM from the latched address.
    pub(crate) fn dma_capacity(&self) -> u32 {
        let ram = self.ram();
        (ram.len() as u32).saturating_sub(u32::from(self.ram_address))
    }

    /// Block form: copy bytes at the latched address, then advance it by
    /// the full transfer length.
    pub(crate) fn dma_block_write(&mut self, bytes: &[u8], advance: u32) {
        let addr = usize::from(self.ram_address);
        let ram = self.ram_mut();
        ram[addr..addr + bytes.len()].copy_from_slice(bytes);
        self.ram_address = self.ram_address.wrapping_add(advance as u16);
    }

    /// Word-by-word form: two bytes at the latched address, stepping by
    /// the autoincrement.
    pub(crate) fn dma_word_write(&mut self, bytes: [u8; 2]) {
        let addr = usize::from(self.ram_address);
        let step = self.auto_increment;
        let ram = self.ram_mut();
        let len = ram.len();
        ram[addr % len] = bytes[0];
        ram[(addr + 1) % len] = bytes[1];
        self.ram_address = self.ram_address.wrapping_add(u16::from(step));
    }

    // === Port protocol ===

    fn process_control(&mut self, command: u16) -> Result<(), Error> {
        // registers are when the three higher bits are '100'
        if command & 0b1110_0000_0000_0000 == 0b1000_0000_0000_0000 {
            return self.process_register(command);
        }
        let Some(first_half) = self.first_half else {
            self.first_half = Some(command);
            return Ok(());
        };

        let value = u32::from(first_half) << 16 | u32::from(command);
        self.ram_address = (((value & 0x3FFF_0000) >> 16) | ((value & 0x3) << 14)) as u16;
        let cd0 = (value >> 30) & 1;
        let cd1 = (value >> 31) & 1;
        let cd2 = (value >> 4) & 1;
        let cd3 = (value >> 5) & 1;
        let cd5 = (value >> 7) & 1;

        self.use_dma = cd5 != 0 && self.allow_dma;

        let mask = cd3 << 3 | cd2 << 2 | cd1 << 1 | cd0;
        self.ram_kind = match mask {
            0b0001 | 0b0000 => RamKind::Vram,  // write | read
            0b0011 | 0b1000 => RamKind::Cram,  // write | read
            0b0101 | 0b0100 => RamKind::Vsram, // write | read
            _ => {
                return Err(Error::InvalidWrite {
                    addr: CTRL1,
                    value,
                });
            }
        };
        let is_write = matches!(mask, 0b0001 | 0b0011 | 0b0101);

        log::debug!(
            "set RAM address: {:04x} ram_kind: {:?} use_dma: {} is_write: {}",
            self.ram_address,
            self.ram_kind,
            self.use_dma,
            is_write
        );

        if self.use_dma && self.dma_type == DmaType::VramCopy {
            return Err(Error::InvalidWrite {
                addr: CTRL1,
                value,
            });
        }

        if self.use_dma && self.dma_type == DmaType::MemoryToVram {
            log::debug!(
                "perform memory to vram DMA kind: {:?} source_start: {:06x} len: {:04x} dest: {:04x} auto_increment: {:x}",
                self.ram_kind,
                self.dma_source_words << 1,
                self.dma_length_words << 1,
                self.ram_address,
                self.auto_increment
            );
            self.pending_dma = Some(DmaRequest {
                source_words: self.dma_source_words,
                length_words: self.dma_length_words,
                auto_increment: self.auto_increment,
            });
            self.use_dma = false;
        }

        self.first_half = None;
        Ok(())
    }

    fn process_data(&mut self, data: u16) -> Result<(), Error> {
        if self.use_dma && self.dma_type != DmaType::VramFill {
            return Err(Error::InvalidWrite {
                addr: DATA1,
                value: u32::from(data),
            });
        }

        if self.use_dma {
            // VRAM fill: this data word supplies the fill byte
            let len = self.dma_length_words << 1;
            log::debug!(
                "fill ram_kind: {:?} data: {:04x} begin: {:06x} len: {:06x} auto_increment: {}",
                self.ram_kind,
                data,
                self.ram_address,
                len,
                self.auto_increment
            );

            // address parity swap observed on hardware ("Contra Hard
            // Corps" relies on it)
            if self.auto_increment > 1 {
                if self.ram_address % 2 == 0 {
                    self.ram_address += 1;
                } else {
                    self.ram_address -= 1;
                }
            }

            let step = self.auto_increment;
            for _ in 0..len {
                let addr = usize::from(self.ram_address);
                let ram = self.ram_mut();
                let len = ram.len();
                ram[addr % len] = data as u8;
                self.ram_address = self.ram_address.wrapping_add(u16::from(step));
            }
            self.use_dma = false;
            return Ok(());
        }

        let addr = usize::from(self.ram_address);
        let step = self.auto_increment;
        let ram = self.ram_mut();
        if addr + 1 < ram.len() {
            ram[addr] = (data >> 8) as u8;
            ram[addr + 1] = data as u8;
        }
        self.ram_address = self.ram_address.wrapping_add(u16::from(step));
        Ok(())
    }

    fn process_register(&mut self, command: u16) -> Result<(), Error> {
        let kind = (command >> 8) as u8;
        let value = command as u8;
        match kind {
            reg::MODE_SET_1 => self.set_mode1(value),
            reg::MODE_SET_2 => self.set_mode2(value),
            reg::PLANE_A_TABLE => {
                self.plane_a_table_address = PLANE_ADDRESS_SCALE * (u32::from(value) >> 3 & 0x0F);
                log::debug!("plane A table address: {:04x}", self.plane_a_table_address);
            }
            reg::WINDOW_TABLE => {
                self.window_table_address = WINDOW_ADDRESS_SCALE * (u32::from(value) >> 1 & 0x3F);
                log::debug!("window table address: {:04x}", self.window_table_address);
            }
            reg::PLANE_B_TABLE => {
                self.plane_b_table_address = PLANE_ADDRESS_SCALE * (u32::from(value) & 0x0F);
                log::debug!("plane B table address: {:04x}", self.plane_b_table_address);
            }
            reg::SPRITE_TABLE => {
                self.sprite_table_address = SPRITE_ADDRESS_SCALE * u32::from(value);
                log::debug!("sprite table address: {:04x}", self.sprite_table_address);
            }
            reg::BACKGROUND_COLOR => {
                self.background_color_index = value & 0x0F;
                self.background_color_palette = (value >> 4) & 0x3;
                log::debug!(
                    "background color palette: {} index: {}",
                    self.background_color_palette,
                    self.background_color_index
                );
            }
            reg::HBLANK_RATE => {
                log::debug!("hblank interrupt rate: {value}");
            }
            reg::MODE_SET_3 => self.set_mode3(value),
            reg::MODE_SET_4 => self.set_mode4(value),
            reg::HSCROLL_TABLE => {
                self.hscroll_table_address = HSCROLL_ADDRESS_SCALE * (u32::from(value) & 0x7F);
                log::debug!("hscroll table address: {:04x}", self.hscroll_table_address);
            }
            reg::AUTO_INCREMENT => {
                self.auto_increment = value;
                log::debug!("auto increment amount: {value}");
            }
            reg::PLANE_SIZE => {
                self.plane_width = plane_dimension(value & 0x3);
                self.plane_height = plane_dimension((value >> 4) & 0x3);
                log::debug!(
                    "plane size width: {} height: {}",
                    self.plane_width,
                    self.plane_height
                );
            }
            reg::WINDOW_X_DIVISION => {
                self.window_x_split = usize::from(value & 0x1F) * 16;
                self.window_display_to_the_right = value & 0x80 != 0;
                self.window_split_mode = WindowSplitMode::X;
                log::debug!(
                    "window X division x_split_coordinate: {} display_to_the_right: {}",
                    self.window_x_split,
                    self.window_display_to_the_right
                );
            }
            reg::WINDOW_Y_DIVISION => {
                self.window_y_split = usize::from(value & 0x1F) * 8;
                self.window_display_below = value & 0x80 != 0;
                self.window_split_mode = WindowSplitMode::Y;
                log::debug!(
                    "window Y division y_split_coordinate: {} display_below: {}",
                    self.window_y_split,
                    self.window_display_below
                );
            }
            reg::DMA_LENGTH_LOW => {
                self.dma_length_words = (self.dma_length_words & 0xFF00) | u32::from(value);
                log::debug!(
                    "DMA length low: {value:02x} current DMA length: {:04x}",
                    self.dma_length_words
                );
            }
            reg::DMA_LENGTH_HIGH => {
                self.dma_length_words = (self.dma_length_words & 0x00FF) | u32::from(value) << 8;
                log::debug!(
                    "DMA length high: {value:02x} current DMA length: {:04x}",
                    self.dma_length_words
                );
            }
            reg::DMA_SOURCE_LOW => {
                self.dma_source_words = (self.dma_source_words & 0xFF_FF00) | u32::from(value);
                log::debug!(
                    "DMA source low: {value:02x} current DMA source: {:06x}",
                    self.dma_source_words
                );
            }
            reg::DMA_SOURCE_MIDDLE => {
                self.dma_source_words = (self.dma_source_words & 0xFF_00FF) | u32::from(value) << 8;
                log::debug!(
                    "DMA source middle: {value:02x} current DMA source: {:06x}",
                    self.dma_source_words
                );
            }
            reg::DMA_SOURCE_HIGH => self.set_dma_source_high(value),
            reg::UNUSED_86 | reg::UNUSED_88 | reg::UNUSED_89 | reg::UNUSED_8E => {}
            _ => {
                return Err(Error::InvalidWrite {
                    addr: CTRL1,
                    value: u32::from(command),
                });
            }
        }
        self.registers[usize::from(kind - reg::MODE_SET_1)] = value;
        Ok(())
    }

    fn set_mode1(&mut self, value: u8) {
        let mode1 = Mode1::from_bits_truncate(value);
        log::debug!(
            "mode1 set disable_display: {} freeze_hv_counter: {} full_color_entries: {} \
             enable_hblank_interrupt: {} blank_leftmost_column: {}",
            mode1.contains(Mode1::DISABLE_DISPLAY),
            mode1.contains(Mode1::FREEZE_HV_COUNTER),
            mode1.contains(Mode1::FULL_COLOR_ENTRIES),
            mode1.contains(Mode1::ENABLE_HBLANK_INTERRUPT),
            mode1.contains(Mode1::BLANK_LEFTMOST_COLUMN)
        );
    }

    fn set_mode2(&mut self, value: u8) {
        let mode2 = Mode2::from_bits_truncate(value);
        self.allow_dma = mode2.contains(Mode2::ALLOW_DMA);
        self.vblank_interrupt_enabled = mode2.contains(Mode2::ENABLE_VBLANK_INTERRUPT);
        self.tile_height = if mode2.contains(Mode2::V30_CELL) { 30 } else { 28 };
        log::debug!(
            "mode2 set mega_drive_display: {} allow_dma: {} enable_vblank_interrupt: {} \
             enable_rendering: {} use_128kb_vram: {}",
            mode2.contains(Mode2::MEGA_DRIVE_DISPLAY),
            self.allow_dma,
            self.vblank_interrupt_enabled,
            mode2.contains(Mode2::ENABLE_RENDERING),
            mode2.contains(Mode2::VRAM_128K)
        );
    }

    fn set_mode3(&mut self, value: u8) {
        self.horizontal_scroll_mode = match value & 0x3 {
            0b00 => HorizontalScrollMode::FullScroll,
            0b01 => HorizontalScrollMode::ScrollEightLinesThenRepeat,
            0b10 => HorizontalScrollMode::ScrollEveryTile,
            _ => HorizontalScrollMode::ScrollEveryLine,
        };
        self.vertical_scroll_mode = if value & 0x4 != 0 {
            VerticalScrollMode::ScrollEveryTwoTiles
        } else {
            VerticalScrollMode::FullScroll
        };
        log::debug!(
            "mode3 set horizontal_scroll_mode: {:?} vertical_scroll_mode: {:?} \
             enable_external_interrupt: {}",
            self.horizontal_scroll_mode,
            self.vertical_scroll_mode,
            value & 0x8 != 0
        );
    }

    fn set_mode4(&mut self, value: u8) {
        self.tile_width = if value & 0x1 != 0 { 40 } else { 32 };
        log::debug!(
            "mode4 set horizontal_resolution: {} enable_shadow_highlight: {}",
            self.tile_width,
            value & 0x8 != 0
        );
    }

    fn set_dma_source_high(&mut self, value: u8) {
        self.dma_source_words =
            (self.dma_source_words & 0x00_FFFF) | u32::from(value & 0x3F) << 16;
        let operation = value >> 6;
        if operation == 0b01 {
            self.dma_source_words |= 1 << 22;
        }
        self.dma_type = match operation {
            0b00 | 0b01 => DmaType::MemoryToVram,
            0b10 => DmaType::VramFill,
            _ => DmaType::VramCopy,
        };
        log::debug!(
            "DMA source high value: {:02x} current DMA source: {:06x} operation_type: {:?}",
            value & 0x3F,
            self.dma_source_words,
            self.dma_type
        );
    }

    fn status_register(&self) -> u16 {
        Status::IN_VBLANK.bits()
    }

    fn ram(&self) -> &[u8] {
        match self.ram_kind {
            RamKind::Vram => &self.vram,
            RamKind::Vsram => &self.vsram,
            RamKind::Cram => &self.cram,
        }
    }

    fn ram_mut(&mut self) -> &mut [u8] {
        match self.ram_kind {
            RamKind::Vram => &mut self.vram,
            RamKind::Vsram => &mut self.vsram,
            RamKind::Cram => &mut self.cram,
        }
    }
}

impl Default for Vdp {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for Vdp {
    fn read(&mut self, addr: u32, data: &mut [u8]) -> Result<(), Error> {
        if data.len() > 1 && addr & 1 != 0 {
            return Err(Error::UnalignedMemoryRead {
                addr,
                size: data.len(),
            });
        }
        let addr = if data.len() == 1 {
            // byte reads hit the low half of the word port
            addr.wrapping_sub(1)
        } else {
            addr
        };

        let mut i = 0;
        while i < data.len() {
            match addr + i as u32 {
                DATA1 | DATA2 => {
                    let ram_len = self.ram().len();
                    let a = usize::from(self.ram_address);
                    data[i] = self.ram()[a % ram_len];
                    self.ram_address = self.ram_address.wrapping_add(1);
                    if i + 1 < data.len() {
                        let a = usize::from(self.ram_address);
                        data[i + 1] = self.ram()[a % ram_len];
                        self.ram_address = self.ram_address.wrapping_add(1);
                    }
                }
                CTRL1 | CTRL2 => {
                    let status = self.status_register();
                    if data.len() == 1 {
                        data[i] = status as u8;
                    } else {
                        data[i] = (status >> 8) as u8;
                        if i + 1 < data.len() {
                            data[i + 1] = status as u8;
                        }
                    }
                }
                a if (HV_COUNTER1 - 1..=HV_COUNTER4).contains(&a) => {
                    // HV counter is stubbed to zero
                    data[i] = 0;
                    if i + 1 < data.len() {
                        data[i + 1] = 0;
                    }
                }
                _ => {
                    return Err(Error::InvalidRead {
                        addr,
                        size: data.len(),
                    });
                }
            }
            i += 2;
        }
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        if data.len() > 1 && addr & 1 != 0 {
            return Err(Error::UnalignedMemoryWrite {
                addr,
                size: data.len(),
            });
        }
        let mut i = 0;
        while i < data.len() {
            let word = if i + 1 < data.len() {
                u16::from_be_bytes([data[i], data[i + 1]])
            } else {
                u16::from(data[i])
            };
            match addr + i as u32 {
                DATA1 | DATA2 => self.process_data(word)?,
                CTRL1 | CTRL2 => self.process_control(word)?,
                _ => {
                    return Err(Error::InvalidWrite {
                        addr: addr + i as u32,
                        value: u32::from(word),
                    });
                }
            }
            i += 2;
        }
        Ok(())
    }
}

fn plane_dimension(bits: u8) -> u8 {
    match bits {
        0b01 => 64,
        0b11 => 128,
        _ => 32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_write_sets_autoincrement() {
        let mut vdp = Vdp::new();
        vdp.write_word(CTRL1, 0x8F02).unwrap();
        assert_eq!(vdp.auto_increment, 2);
        assert_eq!(vdp.registers[0x0F], 2);
    }

    #[test]
    fn control_latch_selects_cram_write() {
        let mut vdp = Vdp::new();
        vdp.write_word(CTRL1, 0xC000).unwrap();
        assert!(vdp.first_half.is_some());
        vdp.write_word(CTRL1, 0x0000).unwrap();
        assert!(vdp.first_half.is_none());
        assert_eq!(vdp.ram_kind, RamKind::Cram);
        assert_eq!(vdp.ram_address, 0);
    }

    #[test]
    fn address_bits_are_rescued_from_both_words() {
        let mut vdp = Vdp::new();
        // VRAM write at 0xC123: low 14 bits in the first word, the top
        // two in the second word's low bits
        vdp.write_word(CTRL1, 0x4123).unwrap();
        vdp.write_word(CTRL1, 0x0003).unwrap();
        assert_eq!(vdp.ram_kind, RamKind::Vram);
        assert_eq!(vdp.ram_address, 0xC123);
    }

    #[test]
    fn data_port_writes_step_by_autoincrement() {
        let mut vdp = Vdp::new();
        vdp.write_word(CTRL1, 0x8F02).unwrap();
        vdp.write_word(CTRL1, 0x4000).unwrap();
        vdp.write_word(CTRL1, 0x0000).unwrap();
        vdp.write_word(DATA1, 0x1122).unwrap();
        vdp.write_word(DATA1, 0x3344).unwrap();
        assert_eq!(&vdp.vram[0..4], &[0x11, 0x22, 0x33, 0x44]);
        assert_eq!(vdp.ram_address, 4);
    }

    #[test]
    fn long_write_to_data_port_is_two_words() {
        let mut vdp = Vdp::new();
        vdp.write_word(CTRL1, 0x8F02).unwrap();
        vdp.write_word(CTRL1, 0x4000).unwrap();
        vdp.write_word(CTRL1, 0x0000).unwrap();
        vdp.write_long(DATA1, 0x1122_3344).unwrap();
        assert_eq!(&vdp.vram[0..4], &[0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn status_register_placeholder() {
        let mut vdp = Vdp::new();
        assert_eq!(vdp.read_word(CTRL1).unwrap(), 0x0008);
        // byte read returns the low half
        assert_eq!(vdp.read_byte(CTRL1 + 1).unwrap(), 0x08);
    }

    #[test]
    fn vram_copy_is_rejected() {
        let mut vdp = Vdp::new();
        vdp.write_word(CTRL1, 0x8114).unwrap(); // allow DMA
        vdp.write_word(CTRL1, 0x97C0).unwrap(); // operation: VRAM copy
        vdp.write_word(CTRL1, 0x4000).unwrap();
        let err = vdp.write_word(CTRL1, 0x0080).unwrap_err();
        assert!(matches!(err, Error::InvalidWrite { .. }));
    }

    #[test]
    fn vram_fill_with_autoincrement_one() {
        let mut vdp = Vdp::new();
        vdp.write_word(CTRL1, 0x8114).unwrap(); // allow DMA
        vdp.write_word(CTRL1, 0x8F01).unwrap(); // autoincrement 1
        vdp.write_word(CTRL1, 0x9304).unwrap(); // length 4 words
        vdp.write_word(CTRL1, 0x9400).unwrap();
        vdp.write_word(CTRL1, 0x9780).unwrap(); // operation: VRAM fill
        vdp.write_word(CTRL1, 0x4010).unwrap(); // VRAM address 0x10
        vdp.write_word(CTRL1, 0x0080).unwrap(); // ... with DMA
        vdp.write_word(DATA1, 0x00AB).unwrap();
        assert_eq!(&vdp.vram[0x10..0x18], &[0xAB; 8]);
    }

    #[test]
    fn vram_fill_parity_swap_with_wide_step() {
        let mut vdp = Vdp::new();
        vdp.write_word(CTRL1, 0x8114).unwrap();
        vdp.write_word(CTRL1, 0x8F02).unwrap(); // autoincrement 2
        vdp.write_word(CTRL1, 0x9302).unwrap(); // length 2 words
        vdp.write_word(CTRL1, 0x9400).unwrap();
        vdp.write_word(CTRL1, 0x9780).unwrap();
        vdp.write_word(CTRL1, 0x4010).unwrap();
        vdp.write_word(CTRL1, 0x0080).unwrap();
        vdp.write_word(DATA1, 0x00CD).unwrap();
        // the even start address swaps to odd before filling
        assert_eq!(vdp.vram[0x11], 0xCD);
        assert_eq!(vdp.vram[0x13], 0xCD);
        assert_eq!(vdp.vram[0x15], 0xCD);
        assert_eq!(vdp.vram[0x17], 0xCD);
        assert_eq!(vdp.vram[0x10], 0x00);
    }

    #[test]
    fn dump_apply_round_trips() {
        let mut vdp = Vdp::new();
        vdp.write_word(CTRL1, 0x8F02).unwrap();
        vdp.write_word(CTRL1, 0x8234).unwrap(); // plane A table
        vdp.write_word(CTRL1, 0x4000).unwrap();
        vdp.write_word(CTRL1, 0x0000).unwrap();
        vdp.write_word(DATA1, 0xBEEF).unwrap();

        let dump = vdp.dump_state();
        let mut other = Vdp::new();
        other.apply_state(&dump).unwrap();
        assert_eq!(other.dump_state(), dump);
        assert_eq!(other.auto_increment, 2);
        assert_eq!(other.plane_a_table_address, vdp.plane_a_table_address);
        assert_eq!(&other.vram[0..2], &[0xBE, 0xEF]);
    }

    #[test]
    fn odd_word_write_is_unaligned() {
        let mut vdp = Vdp::new();
        let err = vdp.write_word(CTRL1 + 1, 0x8F02).unwrap_err();
        assert!(matches!(err, Error::UnalignedMemoryWrite { .. }));
    }
}
