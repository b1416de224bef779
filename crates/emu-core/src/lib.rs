//! Core types shared by the CPU and machine crates.
//!
//! Everything on the external bus is big-endian; values are swapped at the
//! device boundary and held host-native in registers and internal state.

mod device;
mod error;

pub use device::{AddressRange, Device};
pub use error::Error;
