//! Status-register logic, bit manipulation, shifts and rotates.

use crate::execute::{BinaryOp, Executor, is_zero, msb};
use crate::instruction::{Kind, Size};
use crate::registers::SR_WRITE_MASK;
use crate::target::TargetKind;
use emu_core::Error;

impl Executor<'_, '_> {
    /// ANDI/EORI/ORI to CCR: operate on the low byte only.
    pub(crate) fn exec_logical_to_ccr(&mut self) -> Result<(), Error> {
        let op = BinaryOp::from_kind(self.kind);
        let src_val = self.read_src(Size::Byte)?;
        let sr = &mut self.ctx.registers.sr;
        let result = op.apply(u64::from(sr.ccr()), src_val);
        sr.set_ccr(result as u8);
        Ok(())
    }

    /// ANDI/EORI/ORI to SR: the source is masked so bits 12 and 14 can
    /// never be set.
    pub(crate) fn exec_logical_to_sr(&mut self) -> Result<(), Error> {
        let op = BinaryOp::from_kind(self.kind);
        let src_val = self.read_src(Size::Word)? as u16;
        let sr = &mut self.ctx.registers.sr;
        let result = op.apply(u64::from(sr.word()), u64::from(src_val & SR_WRITE_MASK));
        sr.set_word(result as u16);
        Ok(())
    }

    /// BTST/BCHG/BCLR/BSET. Bit numbers wrap at 32 on data registers and
    /// at 8 in memory; the write is skipped when nothing changed.
    pub(crate) fn exec_bit(&mut self) -> Result<(), Error> {
        let bit_num = self.read_src(Size::Byte)? as u32;

        let on_register = matches!(self.dst_target().kind(), TargetKind::DataRegister { .. });
        let bit_num = bit_num % if on_register { 32 } else { 8 };
        let size = if on_register { Size::Long } else { Size::Byte };

        let value = self.read_dst(size)?;

        let mask = 1u64 << bit_num;
        let new_value = match self.kind {
            Kind::Bchg => value ^ mask,
            Kind::Bclr => value & (value ^ mask),
            Kind::Bset => value | mask,
            _ => value,
        };

        self.ctx.registers.sr.set_zero(value & mask == 0);
        if new_value != value {
            self.write_dst(new_value, size)?;
        }
        Ok(())
    }

    /// ASL/ASR/LSL/LSR/ROL/ROR/ROXL/ROXR, stepped one bit at a time so V
    /// catches every sign change and X/C track the last bit shifted out.
    pub(crate) fn exec_shift(&mut self) -> Result<(), Error> {
        let is_arithmetic = matches!(self.kind, Kind::Asl | Kind::Asr);
        let is_rotate = matches!(self.kind, Kind::Rol | Kind::Ror);
        let is_extend_rotate = matches!(self.kind, Kind::Roxl | Kind::Roxr);
        let is_left = matches!(self.kind, Kind::Asl | Kind::Lsl | Kind::Rol | Kind::Roxl);
        let size = self.size;
        let bits = size.bits();

        let dst_val = self.read_dst(size)?;

        let rotation = if self.src.is_some() {
            (self.read_src(size)? % 64) as u32
        } else if self.data != 0 {
            self.data
        } else {
            8
        };

        let mut result = dst_val;
        let mut has_overflow = false;
        let mut cur_msb = msb(result, size);
        let mut last_bit = false;
        for i in 0..rotation {
            if is_left {
                last_bit = msb(result, size);
                result <<= 1;
                if is_rotate {
                    result |= u64::from(last_bit);
                } else if is_extend_rotate {
                    let sr = &mut self.ctx.registers.sr;
                    result |= u64::from(sr.extend());
                    sr.set_extend(last_bit);
                    sr.set_carry(last_bit);
                }
            } else {
                last_bit = if i >= bits && is_arithmetic {
                    false
                } else {
                    result & 1 != 0
                };
                if is_arithmetic {
                    // preserve the sign bit
                    result = (result >> 1) | (result & (1u64 << (bits - 1)));
                } else {
                    result >>= 1;
                    if is_rotate {
                        result |= u64::from(last_bit) << (bits - 1);
                    }
                    if is_extend_rotate {
                        let sr = &mut self.ctx.registers.sr;
                        result |= u64::from(sr.extend()) << (bits - 1);
                        sr.set_extend(last_bit);
                    }
                }
            }
            let new_msb = msb(result, size);
            if cur_msb != new_msb {
                has_overflow = true;
            }
            cur_msb = new_msb;
        }

        self.write_dst(result, size)?;

        let sr = &mut self.ctx.registers.sr;
        sr.set_negative(msb(result, size));
        sr.set_zero(is_zero(result, size));
        sr.set_overflow(is_arithmetic && has_overflow);
        if rotation == 0 {
            sr.set_carry(false);
            if is_extend_rotate {
                let extend = sr.extend();
                sr.set_carry(extend);
            }
        } else {
            if !is_rotate && !is_extend_rotate {
                sr.set_extend(last_bit);
            }
            sr.set_carry(last_bit);
        }
        Ok(())
    }

    /// SWAP: exchange the register halves.
    pub(crate) fn exec_swap(&mut self) -> Result<(), Error> {
        let value = self.read_dst(Size::Long)? as u32;
        let value = value.rotate_left(16);
        self.write_dst(u64::from(value), Size::Long)?;

        let sr = &mut self.ctx.registers.sr;
        sr.set_negative(msb(u64::from(value), Size::Long));
        sr.set_zero(value == 0);
        sr.set_overflow(false);
        sr.set_carry(false);
        Ok(())
    }

    /// TAS: flags come from the value before the high bit is set.
    pub(crate) fn exec_tas(&mut self) -> Result<(), Error> {
        let value = self.read_dst(Size::Byte)?;
        self.write_dst(value | 0x80, Size::Byte)?;

        let sr = &mut self.ctx.registers.sr;
        sr.set_negative(msb(value, Size::Byte));
        sr.set_zero(is_zero(value, Size::Byte));
        sr.set_overflow(false);
        sr.set_carry(false);
        Ok(())
    }

    /// EXT: sign-extend byte to word or word to long.
    pub(crate) fn exec_ext(&mut self) -> Result<(), Error> {
        let size = self.size;
        let value = if size == Size::Word {
            let value = self.read_dst(Size::Word)? as u16;
            let value = value as u8 as i8 as i16 as u16;
            self.write_dst(u64::from(value), Size::Word)?;
            u64::from(value)
        } else {
            let value = self.read_dst(Size::Long)? as u32;
            let value = value as u16 as i16 as i32 as u32;
            self.write_dst(u64::from(value), Size::Long)?;
            u64::from(value)
        };

        let sr = &mut self.ctx.registers.sr;
        sr.set_negative(msb(value, size));
        sr.set_zero(is_zero(value, size));
        sr.set_overflow(false);
        sr.set_carry(false);
        Ok(())
    }
}
