//! Integer and BCD arithmetic.

use crate::execute::{BinaryOp, DIVISION_BY_ZERO_VECTOR, Executor, is_carry, is_overflow, is_zero, msb};
use crate::instruction::{Kind, Size};
use crate::target::TargetKind;
use emu_core::Error;

impl Executor<'_, '_> {
    /// ADD/AND/CMP/EOR/OR/SUB and their immediate forms, plus CMPM.
    /// Source is fetched (and post-incremented) before the destination.
    pub(crate) fn exec_binary(&mut self) -> Result<(), Error> {
        let op = BinaryOp::from_kind(self.kind);
        let size = self.size;

        let src_val = self.read_src(size)?;
        self.inc_src();
        let dst_val = self.read_dst(size)?;

        let result = op.apply(src_val, dst_val);
        if op != BinaryOp::Cmp {
            self.write_dst(result, size)?;
        }

        let carry = is_carry(result, size);
        let sr = &mut self.ctx.registers.sr;
        if matches!(op, BinaryOp::Add | BinaryOp::Sub) {
            sr.set_extend(carry);
        }
        sr.set_negative(msb(result, size));
        sr.set_zero(is_zero(result, size));
        if op.is_arithmetic() {
            sr.set_overflow(is_overflow(src_val, dst_val, result, size, op.is_subtract()));
            sr.set_carry(carry);
        } else {
            sr.set_overflow(false);
            sr.set_carry(false);
        }
        Ok(())
    }

    /// ADDA/CMPA/SUBA: word sources sign-extend to long; ADDA/SUBA leave
    /// the flags alone.
    pub(crate) fn exec_binary_address(&mut self) -> Result<(), Error> {
        let op = BinaryOp::from_kind(self.kind);

        let src_val = if self.size == Size::Word {
            self.read_src(Size::Word)? as u16 as i16 as i64 as u64
        } else {
            self.read_src(Size::Long)?
        };
        let dst_val = self.read_dst(Size::Long)?;
        let result = op.apply(src_val, dst_val);

        if op == BinaryOp::Cmp {
            let carry = is_carry(result ^ src_val, Size::Long);
            let sr = &mut self.ctx.registers.sr;
            sr.set_negative(msb(result, Size::Long));
            sr.set_zero(is_zero(result, Size::Long));
            sr.set_overflow(is_overflow(src_val, dst_val, result, Size::Long, true));
            sr.set_carry(carry);
        } else {
            self.write_dst(result, Size::Long)?;
        }
        Ok(())
    }

    /// ADDQ/SUBQ: a 0 quick value means 8; address-register destinations
    /// leave the flags alone.
    pub(crate) fn exec_quick(&mut self) -> Result<(), Error> {
        let op = BinaryOp::from_kind(self.kind);
        let size = self.size;
        let src_val = if self.data != 0 { u64::from(self.data) } else { 8 };

        let dst_val = self.read_dst(size)?;
        let result = op.apply(src_val, dst_val);
        self.write_dst(result, size)?;

        if !matches!(self.dst_target().kind(), TargetKind::AddressRegister { .. }) {
            let carry = is_carry(result, size);
            let sr = &mut self.ctx.registers.sr;
            sr.set_negative(msb(result, size));
            sr.set_carry(carry);
            sr.set_extend(carry);
            sr.set_overflow(is_overflow(src_val, dst_val, result, size, op.is_subtract()));
            sr.set_zero(is_zero(result, size));
        }
        Ok(())
    }

    /// ADDX/SUBX: fold the X flag into the source; Z only latches toward
    /// zero, preserving multi-precision chains.
    pub(crate) fn exec_extended(&mut self) -> Result<(), Error> {
        let op = BinaryOp::from_kind(self.kind);
        let size = self.size;

        let src_val = self.read_src(size)?;
        let dst_val = self.read_dst(size)?;
        let extend = u64::from(self.ctx.registers.sr.extend());
        let result = op.apply(src_val.wrapping_add(extend), dst_val);
        self.write_dst(result, size)?;

        let carry = is_carry(result, size);
        let sr = &mut self.ctx.registers.sr;
        sr.set_negative(msb(result, size));
        sr.set_carry(carry);
        sr.set_extend(carry);
        sr.set_overflow(is_overflow(src_val, dst_val, result, size, op.is_subtract()));
        if !is_zero(result, size) {
            sr.set_zero(false);
        }
        Ok(())
    }

    /// ABCD: base-10 nibble correction; Z latches.
    pub(crate) fn exec_abcd(&mut self) -> Result<(), Error> {
        let src_val = self.read_src(Size::Byte)? as u8;
        let dst_val = self.read_dst(Size::Byte)? as u8;
        let extend = u16::from(self.ctx.registers.sr.extend());

        let binary_result = u16::from(src_val) + u16::from(dst_val) + extend;

        let mut carry = false;
        let mut lval = i32::from(src_val & 0x0F) + i32::from(dst_val & 0x0F) + i32::from(extend);
        if lval > 9 {
            carry = true;
            lval -= 10;
        }

        let mut hval = i32::from((src_val >> 4) & 0x0F) + i32::from((dst_val >> 4) & 0x0F) + i32::from(carry);
        carry = false;

        if lval >= 16 {
            lval -= 16;
            hval += 1;
        }

        if hval > 9 {
            carry = true;
            hval -= 10;
        }

        let result = (((hval << 4) + lval) & 0xFF) as u16;

        self.write_dst(u64::from(result), Size::Byte)?;
        let sr = &mut self.ctx.registers.sr;
        sr.set_negative(msb(u64::from(result), Size::Byte));
        sr.set_carry(carry);
        sr.set_extend(carry);
        sr.set_overflow(!binary_result & result & 0x80 != 0);
        if result != 0 {
            sr.set_zero(false);
        }
        Ok(())
    }

    /// SBCD and NBCD (NBCD is SBCD from zero).
    pub(crate) fn exec_sbcd_nbcd(&mut self) -> Result<(), Error> {
        let (byte0, byte1) = if self.kind == Kind::Sbcd {
            let src_val = self.read_src(Size::Byte)? as u8;
            let dst_val = self.read_dst(Size::Byte)? as u8;
            (dst_val, src_val)
        } else {
            let dst_val = self.read_dst(Size::Byte)? as u8;
            (0, dst_val)
        };

        let extend = u16::from(self.ctx.registers.sr.extend());
        let binary_result = u16::from(byte0).wrapping_sub(u16::from(byte1)).wrapping_sub(extend);

        let mut carry = false;
        let mut lval = i32::from(byte0 & 0x0F) - i32::from(byte1 & 0x0F) - i32::from(extend);
        if lval < 0 {
            carry = true;
            lval += 10;
        }

        let mut hval = i32::from((byte0 >> 4) & 0x0F) - i32::from((byte1 >> 4) & 0x0F) - i32::from(carry);
        carry = false;

        if hval < 0 {
            carry = true;
            hval += 10;
        }

        if hval == 0 && lval < 0 {
            carry = true;
        }

        let result = (((hval << 4) + lval) & 0xFF) as u16;

        self.write_dst(u64::from(result), Size::Byte)?;
        let sr = &mut self.ctx.registers.sr;
        sr.set_negative(msb(u64::from(result), Size::Byte));
        sr.set_carry(carry);
        sr.set_extend(carry);
        sr.set_overflow(binary_result & !result & 0x80 != 0);
        if result != 0 {
            sr.set_zero(false);
        }
        Ok(())
    }

    /// CLR/NEG/NEGX/NOT. NEGX only adds the one's-complement increment
    /// when X is clear, and its Z flag latches.
    pub(crate) fn exec_unary(&mut self) -> Result<(), Error> {
        let size = self.size;
        let dst_val = self.read_dst(size)?;
        let mut result = dst_val;
        let mut has_overflow = false;

        match self.kind {
            Kind::Clr => result = 0,
            Kind::Not => result = !result,
            Kind::Neg | Kind::Negx => {
                result = !result;
                if self.kind != Kind::Negx || !self.ctx.registers.sr.extend() {
                    let mask0 = (1u64 << (size.bits() - 1)) - 1;
                    let mask1 = size.mask();
                    if result & mask1 == mask0 {
                        has_overflow = true;
                    }
                    result = result.wrapping_add(1);
                }
            }
            _ => unreachable!("not a unary kind"),
        }

        self.write_dst(result, size)?;

        let zero = is_zero(result, size);
        let negx = self.kind == Kind::Negx;
        let negate = matches!(self.kind, Kind::Neg | Kind::Negx);
        let carry = is_carry(result, size);
        let sr = &mut self.ctx.registers.sr;
        sr.set_negative(msb(result, size));
        if !negx || !zero {
            sr.set_zero(zero);
        }
        if negate {
            sr.set_overflow(has_overflow);
            sr.set_carry(carry);
            sr.set_extend(carry);
        } else {
            sr.set_overflow(false);
            sr.set_carry(false);
        }
        Ok(())
    }

    pub(crate) fn exec_tst(&mut self) -> Result<(), Error> {
        let size = self.size;
        let value = self.read_src(size)?;
        let sr = &mut self.ctx.registers.sr;
        sr.set_negative(msb(value, size));
        sr.set_zero(is_zero(value, size));
        sr.set_overflow(false);
        sr.set_carry(false);
        Ok(())
    }

    /// MULU/MULS: 16×16→32, the full result replaces the destination.
    pub(crate) fn exec_mul(&mut self) -> Result<(), Error> {
        let src_val = self.read_src(Size::Word)? as u16;
        let dst_val = self.read_dst(Size::Word)? as u16;

        let result = if self.kind == Kind::Mulu {
            u32::from(src_val) * u32::from(dst_val)
        } else {
            (i32::from(src_val as i16) * i32::from(dst_val as i16)) as u32
        };

        self.write_dst(u64::from(result), Size::Long)?;

        let sr = &mut self.ctx.registers.sr;
        sr.set_negative(msb(u64::from(result), Size::Long));
        sr.set_carry(false);
        sr.set_overflow(false);
        sr.set_zero(result == 0);
        Ok(())
    }

    /// DIVU/DIVS: division by zero goes through vector 5 and zeroes the
    /// flags; overflow sets V and suppresses the writeback; otherwise the
    /// remainder and quotient pack into the destination.
    pub(crate) fn exec_div(&mut self) -> Result<(), Error> {
        let src_val = self.read_src(Size::Word)? as u16;
        let dst_val = self.read_dst(Size::Long)? as u32;

        if src_val == 0 {
            self.enter_exception(DIVISION_BY_ZERO_VECTOR)?;
            let sr = &mut self.ctx.registers.sr;
            sr.set_negative(false);
            sr.set_zero(false);
            sr.set_overflow(false);
            sr.set_carry(false);
            return Ok(());
        }

        let (quotient, remainder, overflow) = if self.kind == Kind::Divu {
            let quotient = dst_val / u32::from(src_val);
            let remainder = dst_val % u32::from(src_val);
            (quotient, remainder, quotient > 0xFFFF)
        } else {
            let dst_val = dst_val as i32;
            let src_val = i32::from(src_val as i16);
            let quotient = dst_val.wrapping_div(src_val);
            let remainder = dst_val.wrapping_rem(src_val);
            let overflow = quotient != i32::from(quotient as i16);
            (quotient as u32, remainder as u32, overflow)
        };

        if overflow {
            self.ctx.registers.sr.set_overflow(true);
        } else {
            let result = (remainder & 0xFFFF) << 16 | (quotient & 0xFFFF);
            self.write_dst(u64::from(result), Size::Long)?;
            let sr = &mut self.ctx.registers.sr;
            sr.set_overflow(false);
            sr.set_negative(msb(u64::from(quotient), Size::Word));
            sr.set_zero(quotient == 0);
        }
        self.ctx.registers.sr.set_carry(false);
        Ok(())
    }
}
