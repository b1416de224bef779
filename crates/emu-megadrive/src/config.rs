//! Machine configuration.

/// Configuration for a Mega Drive system.
pub struct MegaDriveConfig {
    /// Cartridge ROM image, header included.
    pub rom: Vec<u8>,
    /// Wall-clock speed factor for the VBlank pacer; 1.0 is NTSC time.
    pub game_speed: f64,
}

impl MegaDriveConfig {
    #[must_use]
    pub fn new(rom: Vec<u8>) -> Self {
        Self {
            rom,
            game_speed: 1.0,
        }
    }
}
