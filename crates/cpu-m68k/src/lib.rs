//! Motorola 68000 instruction-level interpreter.
//!
//! One architectural step is `Instruction::decode` (reads opcode and
//! extension words through the bus, advancing PC) followed by
//! `Instruction::execute` (operand fetch, operation, flag update, side
//! effects). Every failure mode is a value from [`emu_core::Error`]; the
//! caller halts on the first error with all state intact.

mod arith;
mod decode;
mod execute;
mod instruction;
mod logic;
mod moves;
mod registers;
mod target;

pub use instruction::{Condition, Instruction, Kind, Size};
pub use registers::{Registers, SR_WRITE_MASK, Status};
pub use target::{Target, TargetKind};

use emu_core::Device;

/// Borrowed CPU state for the duration of one decode or execute step.
pub struct Context<'a> {
    pub registers: &'a mut Registers,
    pub bus: &'a mut (dyn Device + 'a),
}

impl<'a> Context<'a> {
    pub fn new(registers: &'a mut Registers, bus: &'a mut (dyn Device + 'a)) -> Self {
        Self { registers, bus }
    }
}
