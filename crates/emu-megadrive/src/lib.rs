//! Sega Mega Drive (Genesis) emulator core.
//!
//! The 68000 sees a 24-bit address space routed by [`bus::MegaDriveBus`]
//! to the cartridge ROM, two RAM regions, the controller ports, the
//! Z80-bus handshake, the trademark register, the sound stubs and the
//! VDP. [`megadrive::MegaDrive`] glues the CPU, the bus and the
//! wall-clock VBlank pacer into a steppable machine.

pub mod bus;
pub mod colors;
pub mod config;
pub mod controller;
pub mod devices;
pub mod interrupt;
pub mod megadrive;
pub mod rom;
pub mod vdp;
pub mod video;

pub use bus::MegaDriveBus;
pub use config::MegaDriveConfig;
pub use controller::Button;
pub use megadrive::{MegaDrive, StepResult};
pub use rom::{RomError, RomHeader};
pub use vdp::Vdp;
pub use video::Renderer;
