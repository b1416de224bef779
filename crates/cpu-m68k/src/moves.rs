//! The move family.

use crate::execute::{Executor, is_zero, msb};
use crate::instruction::Size;
use crate::registers::{Registers, SR_WRITE_MASK};
use crate::target::TargetKind;
use emu_core::{Device, Error};

impl Executor<'_, '_> {
    /// MOVE: the source reads with PC rolled back to the point just past
    /// its own extension words, so PC-relative sources resolve the same
    /// address the hardware would.
    pub(crate) fn exec_move(&mut self) -> Result<(), Error> {
        let size = self.size;

        let saved_pc = self.ctx.registers.pc;
        self.ctx.registers.pc = self.data;
        let src_val = self.read_src(size)?;
        self.inc_src();
        self.ctx.registers.pc = saved_pc;

        self.write_dst(src_val, size)?;

        let sr = &mut self.ctx.registers.sr;
        sr.set_negative(msb(src_val, size));
        sr.set_zero(is_zero(src_val, size));
        sr.set_overflow(false);
        sr.set_carry(false);
        Ok(())
    }

    /// MOVEA: word sources sign-extend; the full register is replaced
    /// and no flag changes.
    pub(crate) fn exec_movea(&mut self) -> Result<(), Error> {
        let saved_pc = self.ctx.registers.pc;
        self.ctx.registers.pc = self.data;

        let src_val = if self.size == Size::Word {
            self.read_src(Size::Word)? as u16 as i16 as i64 as u64
        } else {
            self.read_src(Size::Long)?
        };

        self.inc_src();
        self.ctx.registers.pc = saved_pc;

        self.write_dst(src_val, Size::Long)
    }

    pub(crate) fn exec_moveq(&mut self) -> Result<(), Error> {
        let value = self.data as u8 as i8 as i64 as u64;
        self.write_dst(value, Size::Long)?;

        let sr = &mut self.ctx.registers.sr;
        sr.set_negative(msb(value, Size::Long));
        sr.set_zero(is_zero(value, Size::Long));
        sr.set_overflow(false);
        sr.set_carry(false);
        Ok(())
    }

    pub(crate) fn exec_move_to_ccr(&mut self) -> Result<(), Error> {
        let value = self.read_src(Size::Word)? as u16;
        self.ctx.registers.sr.set_ccr(value as u8);
        Ok(())
    }

    pub(crate) fn exec_move_to_sr(&mut self) -> Result<(), Error> {
        let value = self.read_src(Size::Word)? as u16;
        self.inc_src();
        self.ctx.registers.sr.set_word(value & SR_WRITE_MASK);
        Ok(())
    }

    pub(crate) fn exec_move_from_sr(&mut self) -> Result<(), Error> {
        let sr = self.ctx.registers.sr.word();
        self.write_dst(u64::from(sr), Size::Word)
    }

    pub(crate) fn exec_move_to_usp(&mut self) -> Result<(), Error> {
        let value = self.read_src(Size::Long)? as u32;
        self.ctx.registers.usp = value;
        Ok(())
    }

    pub(crate) fn exec_move_from_usp(&mut self) -> Result<(), Error> {
        let usp = self.ctx.registers.usp;
        self.write_dst(u64::from(usp), Size::Long)
    }

    pub(crate) fn exec_exg(&mut self) -> Result<(), Error> {
        let src_val = self.read_src(Size::Long)?;
        let dst_val = self.read_dst(Size::Long)?;
        self.write_dst(src_val, Size::Long)?;
        self.write_src(dst_val, Size::Long)
    }

    /// MOVEP: alternating bytes between a data register and memory; the
    /// address parity selects the high or low byte of each word.
    pub(crate) fn exec_movep(&mut self) -> Result<(), Error> {
        let to_register = matches!(self.dst_target().kind(), TargetKind::DataRegister { .. });

        if to_register {
            let mut addr = self.src_ea();
            let is_odd = addr & 1 != 0;
            if is_odd {
                addr -= 1;
            }

            let count = self.size.bytes();
            let mut result: u32 = 0;
            for i in 0..count {
                let word = self.ctx.bus.read_word(addr + 2 * i)?;
                let byte = if is_odd { word & 0xFF } else { word >> 8 };
                result = (result << 8) | u32::from(byte);
            }
            self.write_dst(u64::from(result), self.size)
        } else {
            let mut addr = self.dst_ea();
            let is_odd = addr & 1 != 0;
            if is_odd {
                addr -= 1;
            }

            let value = self.read_src(self.size)? as u32;
            let count = self.size.bytes();
            for i in 0..count {
                let byte = (value >> (8 * (count - 1 - i))) & 0xFF;
                let word = if is_odd { byte as u16 } else { (byte as u16) << 8 };
                self.ctx.bus.write_word(addr + 2 * i, word)?;
            }
            Ok(())
        }
    }

    /// MOVEM: transfer the registers selected by the mask in one bus
    /// access. Word loads sign-extend; the slot order reverses for
    /// `-(An)` stores; a post-increment base register in the mask is not
    /// overwritten by the load.
    pub(crate) fn exec_movem(&mut self) -> Result<(), Error> {
        let size = self.size;
        let mask = self.data;
        let has_bit = |i: u32| mask & (1 << i) != 0;
        let reg_count = mask.count_ones();

        if self.src.is_some() {
            // memory to registers
            let mut target = self.src_target();
            target.set_step(reg_count);
            let mut buf = [0u8; 16 * 4];
            let len = (reg_count * size.bytes()) as usize;
            target.read(self.ctx, &mut buf[..len])?;
            self.src = Some(target);

            let mut pos = 0usize;
            for i in 0..16 {
                if has_bit(i) {
                    // corner case: the post-increment base register is
                    // not overwritten
                    let is_base = matches!(
                        target.kind(),
                        TargetKind::AddressIncrement { reg } if i >= 8 && u32::from(reg) == i - 8
                    );
                    if !is_base {
                        let value = if size == Size::Word {
                            i16::from_be_bytes([buf[pos], buf[pos + 1]]) as i32 as u32
                        } else {
                            u32::from_be_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
                        };
                        movem_set(self.ctx.registers, i, value);
                    }
                    pos += size.bytes() as usize;
                }
            }
        } else {
            // registers to memory
            let dst_kind = self.dst_target().kind();
            let mut buf = [0u8; 16 * 4];
            let mut len = 0usize;
            for i in 0..16 {
                let selected = if matches!(dst_kind, TargetKind::AddressDecrement { .. }) {
                    has_bit(15 - i)
                } else {
                    has_bit(i)
                };
                if selected {
                    let reg = movem_get(self.ctx.registers, i);
                    if size == Size::Long {
                        buf[len] = (reg >> 24) as u8;
                        buf[len + 1] = (reg >> 16) as u8;
                        len += 2;
                    }
                    buf[len] = (reg >> 8) as u8;
                    buf[len + 1] = reg as u8;
                    len += 2;
                }
            }
            let mut target = self.dst_target();
            target.set_step(reg_count);
            target.write(self.ctx, &buf[..len])?;
            self.dst = Some(target);
        }
        Ok(())
    }
}

/// MOVEM register slots: D0-D7, then A0-A6, then the active stack
/// pointer.
fn movem_get(regs: &Registers, i: u32) -> u32 {
    match i {
        0..=7 => regs.d[i as usize],
        8..=14 => regs.a[i as usize - 8],
        _ => regs.stack_ptr(),
    }
}

fn movem_set(regs: &mut Registers, i: u32, value: u32) {
    match i {
        0..=7 => regs.d[i as usize] = value,
        8..=14 => regs.a[i as usize - 8] = value,
        _ => regs.set_stack_ptr(value),
    }
}
