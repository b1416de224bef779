//! The 68000 memory bus.
//!
//! Addresses are masked to 24 bits, then matched against the device
//! table in insertion order; the first inclusive range containing the
//! address serves the access. Misses are unmapped errors.
//!
//! The VDP's memory→VRAM DMA runs here, right after the control write
//! that armed it, so its reads are routed through this same decoder.

use crate::controller::Controller;
use crate::devices::{Psg, Rom, Trademark, WorkRam, Ym2612, Z80Control, Z80Ram};
use crate::vdp::Vdp;
use emu_core::{AddressRange, Device, Error};

/// Only the low 24 address bits reach the bus.
const ADDRESS_MASK: u32 = 0x00FF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceKind {
    Rom,
    Z80Ram,
    Sound,
    Controller,
    Z80Control,
    Trademark,
    Vdp,
    Psg,
    WorkRam,
}

pub struct MegaDriveBus {
    pub rom: Rom,
    pub z80_ram: Z80Ram,
    pub sound: Ym2612,
    pub controller: Controller,
    pub z80_control: Z80Control,
    pub trademark: Trademark,
    pub vdp: Vdp,
    pub psg: Psg,
    pub work_ram: WorkRam,
    table: Vec<(AddressRange, DeviceKind)>,
}

impl MegaDriveBus {
    /// Build the bus; the ROM window comes from the cartridge metadata.
    #[must_use]
    pub fn new(rom_data: Vec<u8>, rom_range: AddressRange) -> Self {
        let table = vec![
            (rom_range, DeviceKind::Rom),
            (
                AddressRange::new(Z80Ram::BEGIN, Z80Ram::END),
                DeviceKind::Z80Ram,
            ),
            (
                AddressRange::new(Ym2612::BEGIN, Ym2612::END),
                DeviceKind::Sound,
            ),
            (
                AddressRange::new(Controller::BEGIN, Controller::END),
                DeviceKind::Controller,
            ),
            (
                AddressRange::new(Z80Control::BEGIN, Z80Control::END),
                DeviceKind::Z80Control,
            ),
            (
                AddressRange::new(Trademark::BEGIN, Trademark::END),
                DeviceKind::Trademark,
            ),
            (AddressRange::new(Vdp::BEGIN, Vdp::END), DeviceKind::Vdp),
            (AddressRange::new(Psg::BEGIN, Psg::END), DeviceKind::Psg),
            (
                AddressRange::new(WorkRam::BEGIN, WorkRam::END),
                DeviceKind::WorkRam,
            ),
        ];
        Self {
            rom: Rom::new(rom_data),
            z80_ram: Z80Ram::new(),
            sound: Ym2612,
            controller: Controller::new(),
            z80_control: Z80Control::new(),
            trademark: Trademark,
            vdp: Vdp::new(),
            psg: Psg,
            work_ram: WorkRam::new(),
            table,
        }
    }

    fn find(&self, addr: u32) -> Option<DeviceKind> {
        self.table
            .iter()
            .find(|(range, _)| range.contains(addr))
            .map(|(_, kind)| *kind)
    }

    /// Run a memory→VRAM transfer armed by a VDP control write. With an
    /// autoincrement of 2 the whole block copies at once; otherwise one
    /// word at a time, stepping the VDP address by the autoincrement.
    fn run_vdp_dma(&mut self) -> Result<(), Error> {
        let Some(request) = self.vdp.take_dma_request() else {
            return Ok(());
        };

        let source_start = request.source_words << 1;
        let length = request.length_words << 1;
        if request.auto_increment == 2 {
            let safe_length = length.min(self.vdp.dma_capacity());
            let mut block = vec![0u8; safe_length as usize];
            self.read(source_start, &mut block)?;
            self.vdp.dma_block_write(&block, length);
        } else {
            for i in 0..request.length_words {
                let mut word = [0u8; 2];
                self.read(source_start + i * 2, &mut word)?;
                self.vdp.dma_word_write(word);
            }
        }
        Ok(())
    }
}

impl Device for MegaDriveBus {
    fn read(&mut self, addr: u32, data: &mut [u8]) -> Result<(), Error> {
        let addr = addr & ADDRESS_MASK;
        match self.find(addr) {
            Some(DeviceKind::Rom) => self.rom.read(addr, data),
            Some(DeviceKind::Z80Ram) => self.z80_ram.read(addr, data),
            Some(DeviceKind::Sound) => self.sound.read(addr, data),
            Some(DeviceKind::Controller) => self.controller.read(addr, data),
            Some(DeviceKind::Z80Control) => self.z80_control.read(addr, data),
            Some(DeviceKind::Trademark) => self.trademark.read(addr, data),
            Some(DeviceKind::Vdp) => self.vdp.read(addr, data),
            Some(DeviceKind::Psg) => self.psg.read(addr, data),
            Some(DeviceKind::WorkRam) => self.work_ram.read(addr, data),
            None => Err(Error::UnmappedRead {
                addr,
                size: data.len(),
            }),
        }
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        let addr = addr & ADDRESS_MASK;
        match self.find(addr) {
            Some(DeviceKind::Rom) => self.rom.write(addr, data),
            Some(DeviceKind::Z80Ram) => self.z80_ram.write(addr, data),
            Some(DeviceKind::Sound) => self.sound.write(addr, data),
            Some(DeviceKind::Controller) => self.controller.write(addr, data),
            Some(DeviceKind::Z80Control) => self.z80_control.write(addr, data),
            Some(DeviceKind::Trademark) => self.trademark.write(addr, data),
            Some(DeviceKind::Vdp) => {
                self.vdp.write(addr, data)?;
                self.run_vdp_dma()
            }
            Some(DeviceKind::Psg) => self.psg.write(addr, data),
            Some(DeviceKind::WorkRam) => self.work_ram.write(addr, data),
            None => Err(Error::UnmappedWrite {
                addr,
                size: data.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bus() -> MegaDriveBus {
        MegaDriveBus::new(vec![0x4E, 0x71, 0x12, 0x34], AddressRange::new(0, 0x3F_FFFF))
    }

    #[test]
    fn address_is_masked_to_24_bits() {
        let mut bus = make_bus();
        assert_eq!(bus.read_word(0xFF00_0000).unwrap(), 0x4E71);
    }

    #[test]
    fn work_ram_round_trip() {
        let mut bus = make_bus();
        bus.write_word(0xFF_0000, 0x1234).unwrap();
        assert_eq!(bus.read_word(0xFF_0000).unwrap(), 0x1234);
        assert_eq!(bus.read_byte(0xFF_0001).unwrap(), 0x34);
    }

    #[test]
    fn first_matching_device_wins() {
        // the ROM window ends at 0x3FFFFF; below that, reads hit ROM
        // even though nothing else is mapped there
        let mut bus = make_bus();
        assert_eq!(bus.read_word(0x10_0000).unwrap(), 0);
    }

    #[test]
    fn unmapped_access_is_an_error() {
        let mut bus = make_bus();
        let err = bus.read_word(0x40_0000).unwrap_err();
        assert_eq!(
            err,
            Error::UnmappedRead {
                addr: 0x40_0000,
                size: 2
            }
        );
        let err = bus.write_word(0x40_0000, 0).unwrap_err();
        assert_eq!(
            err,
            Error::UnmappedWrite {
                addr: 0x40_0000,
                size: 2
            }
        );
    }

    #[test]
    fn rom_write_is_swallowed_by_the_rom_device() {
        let mut bus = make_bus();
        bus.write_word(0x0000, 0xFFFF).unwrap();
        assert_eq!(bus.read_word(0x0000).unwrap(), 0x4E71);
    }

    #[test]
    fn memory_to_vram_dma_block_copy() {
        let mut bus = make_bus();
        for (i, byte) in [0xDEu8, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03, 0x04]
            .iter()
            .enumerate()
        {
            bus.write_byte(0xFF_0000 + i as u32, *byte).unwrap();
        }

        bus.write_word(0xC0_0004, 0x8114).unwrap(); // allow DMA
        bus.write_word(0xC0_0004, 0x8F02).unwrap(); // autoincrement 2
        bus.write_word(0xC0_0004, 0x9304).unwrap(); // length: 4 words
        bus.write_word(0xC0_0004, 0x9400).unwrap();
        bus.write_word(0xC0_0004, 0x9500).unwrap(); // source: 0x7F8000 words
        bus.write_word(0xC0_0004, 0x9680).unwrap();
        bus.write_word(0xC0_0004, 0x977F).unwrap();
        bus.write_word(0xC0_0004, 0x4000).unwrap(); // VRAM address 0, DMA
        bus.write_word(0xC0_0004, 0x0080).unwrap();

        assert_eq!(
            &bus.vdp.vram()[0..8],
            &[0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03, 0x04]
        );
    }

    #[test]
    fn memory_to_vram_dma_word_by_word() {
        let mut bus = make_bus();
        bus.write_word(0xFF_0000, 0x1122).unwrap();
        bus.write_word(0xFF_0002, 0x3344).unwrap();

        bus.write_word(0xC0_0004, 0x8114).unwrap();
        bus.write_word(0xC0_0004, 0x8F04).unwrap(); // autoincrement 4
        bus.write_word(0xC0_0004, 0x9302).unwrap(); // length: 2 words
        bus.write_word(0xC0_0004, 0x9400).unwrap();
        bus.write_word(0xC0_0004, 0x9500).unwrap();
        bus.write_word(0xC0_0004, 0x9680).unwrap();
        bus.write_word(0xC0_0004, 0x977F).unwrap();
        bus.write_word(0xC0_0004, 0x4000).unwrap();
        bus.write_word(0xC0_0004, 0x0080).unwrap();

        let vram = bus.vdp.vram();
        assert_eq!(&vram[0..2], &[0x11, 0x22]);
        assert_eq!(&vram[4..6], &[0x33, 0x44]);
        assert_eq!(&vram[2..4], &[0, 0]);
    }
}
