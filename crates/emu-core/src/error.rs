//! Error taxonomy for decode, execute and bus traffic.
//!
//! Every failure mode is a value that propagates out of `decode`,
//! `execute`, `Device::read` and `Device::write`. The machine halts on the
//! first surfaced error and leaves all state intact for inspection.

use thiserror::Error;

/// Emulation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Multi-byte read from an odd address on a device that requires
    /// word alignment.
    #[error("unaligned read address: {addr:06x} size: {size:x}")]
    UnalignedMemoryRead { addr: u32, size: usize },

    /// Multi-byte write to an odd address on a device that requires
    /// word alignment.
    #[error("unaligned write address: {addr:06x} size: {size:x}")]
    UnalignedMemoryWrite { addr: u32, size: usize },

    /// A fetch, branch, jump, return or exception landed on an odd PC.
    #[error("program counter set at {pc:06x}")]
    UnalignedProgramCounter { pc: u32 },

    /// Invalid mode 7 sub-field in an effective-address encoding.
    #[error("unknown addressing mode in word {word:04x}")]
    UnknownAddressingMode { word: u16 },

    /// No instruction family matched the opcode word.
    #[error("unknown opcode {word:04x}")]
    UnknownOpcode { word: u16 },

    /// Read from a write-only device.
    #[error("protected read address: {addr:06x} size: {size:x}")]
    ProtectedRead { addr: u32, size: usize },

    /// Write to a read-only device.
    #[error("protected write address: {addr:06x} size: {size:x}")]
    ProtectedWrite { addr: u32, size: usize },

    /// No mapped device covers the address.
    #[error("unmapped read address: {addr:06x} size: {size:x}")]
    UnmappedRead { addr: u32, size: usize },

    /// No mapped device covers the address.
    #[error("unmapped write address: {addr:06x} size: {size:x}")]
    UnmappedWrite { addr: u32, size: usize },

    /// Device-specific read contract violation (wrong size or port).
    #[error("invalid read address: {addr:06x} size: {size:x}")]
    InvalidRead { addr: u32, size: usize },

    /// Device-specific write contract violation (wrong size or value).
    #[error("invalid write address: {addr:06x} value: {value:08x}")]
    InvalidWrite { addr: u32, value: u32 },
}
