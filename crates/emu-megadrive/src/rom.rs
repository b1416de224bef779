//! Cartridge ROM header.
//!
//! The first 512 bytes of a cartridge are the 68000 vector table (256
//! bytes) followed by the metadata block (256 bytes). The core consumes
//! the reset and VBlank vectors and the ROM address range; everything
//! else is surfaced for the diagnostic views.

use emu_core::AddressRange;
use thiserror::Error;

/// Size of the combined vector table and metadata block.
pub const HEADER_SIZE: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RomError {
    #[error("ROM image too short: {len} bytes, need at least {HEADER_SIZE}")]
    TooShort { len: usize },
}

/// The entry points the emulator consumes from the vector table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorTable {
    pub reset_sp: u32,
    pub reset_pc: u32,
    pub hblank_pc: u32,
    pub vblank_pc: u32,
}

/// Cartridge metadata: fixed-width ASCII fields plus the ROM and RAM
/// address ranges and the checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub system_type: String,
    pub copyright: String,
    pub domestic_title: String,
    pub overseas_title: String,
    pub serial_number: String,
    pub checksum: u16,
    pub device_support: String,
    pub rom_address: AddressRange,
    pub ram_address: AddressRange,
    pub region_support: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomHeader {
    pub vector_table: VectorTable,
    pub metadata: Metadata,
}

impl RomHeader {
    pub fn parse(rom: &[u8]) -> Result<Self, RomError> {
        if rom.len() < HEADER_SIZE {
            return Err(RomError::TooShort { len: rom.len() });
        }

        let long = |offset: usize| {
            u32::from_be_bytes([rom[offset], rom[offset + 1], rom[offset + 2], rom[offset + 3]])
        };
        let word = |offset: usize| u16::from_be_bytes([rom[offset], rom[offset + 1]]);
        let text = |offset: usize, len: usize| {
            String::from_utf8_lossy(&rom[offset..offset + len])
                .trim_end_matches(|c: char| c == ' ' || c == '\0')
                .to_string()
        };

        let vector_table = VectorTable {
            reset_sp: long(0x000),
            reset_pc: long(0x004),
            hblank_pc: long(0x070),
            vblank_pc: long(0x078),
        };

        let metadata = Metadata {
            system_type: text(0x100, 16),
            copyright: text(0x110, 16),
            domestic_title: text(0x120, 48),
            overseas_title: text(0x150, 48),
            serial_number: text(0x180, 14),
            checksum: word(0x18E),
            device_support: text(0x190, 16),
            rom_address: AddressRange::new(long(0x1A0), long(0x1A4)),
            ram_address: AddressRange::new(long(0x1A8), long(0x1AC)),
            region_support: text(0x1F0, 3),
        };

        Ok(Self {
            vector_table,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_rom_is_rejected() {
        let err = RomHeader::parse(&[0u8; 100]).unwrap_err();
        assert_eq!(err, RomError::TooShort { len: 100 });
    }

    #[test]
    fn header_fields_parse_from_fixed_offsets() {
        let mut rom = vec![0u8; HEADER_SIZE];
        rom[0x000..0x004].copy_from_slice(&0x00FF_FE00u32.to_be_bytes());
        rom[0x004..0x008].copy_from_slice(&0x0000_0200u32.to_be_bytes());
        rom[0x070..0x074].copy_from_slice(&0x0000_0400u32.to_be_bytes());
        rom[0x078..0x07C].copy_from_slice(&0x0000_0300u32.to_be_bytes());
        rom[0x100..0x110].copy_from_slice(b"SEGA MEGA DRIVE ");
        rom[0x180..0x18E].copy_from_slice(b"GM 00000000-00");
        rom[0x18E..0x190].copy_from_slice(&0xBEEFu16.to_be_bytes());
        rom[0x1A0..0x1A4].copy_from_slice(&0u32.to_be_bytes());
        rom[0x1A4..0x1A8].copy_from_slice(&0x000F_FFFFu32.to_be_bytes());
        rom[0x1F0..0x1F3].copy_from_slice(b"JUE");

        let header = RomHeader::parse(&rom).unwrap();
        assert_eq!(header.vector_table.reset_sp, 0x00FF_FE00);
        assert_eq!(header.vector_table.reset_pc, 0x0000_0200);
        assert_eq!(header.vector_table.hblank_pc, 0x0000_0400);
        assert_eq!(header.vector_table.vblank_pc, 0x0000_0300);
        assert_eq!(header.metadata.system_type, "SEGA MEGA DRIVE");
        assert_eq!(header.metadata.serial_number, "GM 00000000-00");
        assert_eq!(header.metadata.checksum, 0xBEEF);
        assert_eq!(header.metadata.rom_address, AddressRange::new(0, 0x000F_FFFF));
        assert_eq!(header.metadata.region_support, "JUE");
    }
}
