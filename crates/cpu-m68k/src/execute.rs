//! Instruction execution: dispatch, operand plumbing and control flow.
//!
//! Results are computed in a 64-bit accumulator so carry and overflow
//! survive the operation. Each operand's pre-decrement and post-increment
//! fire exactly once per instruction; the two `*_done` booleans arbitrate
//! between the mid-instruction increment (needed for source-then-
//! destination memory ordering) and the tail increment.

use crate::Context;
use crate::instruction::{Condition, Instruction, Kind, Size};
use crate::target::Target;
use emu_core::{Device, Error};

/// CHK exception vector.
pub(crate) const CHK_VECTOR: u32 = 6;
/// Integer divide-by-zero exception vector.
pub(crate) const DIVISION_BY_ZERO_VECTOR: u32 = 5;

pub(crate) struct Executor<'c, 'a> {
    pub(crate) kind: Kind,
    pub(crate) size: Size,
    pub(crate) condition: Option<Condition>,
    pub(crate) data: u32,
    pub(crate) src: Option<Target>,
    pub(crate) dst: Option<Target>,
    src_done: bool,
    dst_done: bool,
    pub(crate) ctx: &'c mut Context<'a>,
}

impl<'c, 'a> Executor<'c, 'a> {
    pub(crate) fn new(inst: Instruction, ctx: &'c mut Context<'a>) -> Self {
        Self {
            kind: inst.kind,
            size: inst.size,
            condition: inst.condition,
            data: inst.data,
            src: inst.src,
            dst: inst.dst,
            src_done: false,
            dst_done: false,
            ctx,
        }
    }

    pub(crate) fn run(mut self) -> Result<(), Error> {
        self.dispatch()?;
        self.inc_src();
        self.inc_dst();
        Ok(())
    }

    fn dispatch(&mut self) -> Result<(), Error> {
        match self.kind {
            Kind::Abcd => self.exec_abcd(),
            Kind::Sbcd | Kind::Nbcd => self.exec_sbcd_nbcd(),
            Kind::Add
            | Kind::Addi
            | Kind::And
            | Kind::Andi
            | Kind::Cmp
            | Kind::Cmpi
            | Kind::Cmpm
            | Kind::Eor
            | Kind::Eori
            | Kind::Or
            | Kind::Ori
            | Kind::Sub
            | Kind::Subi => self.exec_binary(),
            Kind::Adda | Kind::Cmpa | Kind::Suba => self.exec_binary_address(),
            Kind::Addq | Kind::Subq => self.exec_quick(),
            Kind::Addx | Kind::Subx => self.exec_extended(),
            Kind::AndiToCcr | Kind::EoriToCcr | Kind::OriToCcr => self.exec_logical_to_ccr(),
            Kind::AndiToSr | Kind::EoriToSr | Kind::OriToSr => self.exec_logical_to_sr(),
            Kind::MoveToCcr => self.exec_move_to_ccr(),
            Kind::MoveToSr => self.exec_move_to_sr(),
            Kind::MoveFromSr => self.exec_move_from_sr(),
            Kind::MoveToUsp => self.exec_move_to_usp(),
            Kind::MoveFromUsp => self.exec_move_from_usp(),
            Kind::Asl
            | Kind::Asr
            | Kind::Lsl
            | Kind::Lsr
            | Kind::Rol
            | Kind::Ror
            | Kind::Roxl
            | Kind::Roxr => self.exec_shift(),
            Kind::Bcc => self.exec_bcc(),
            Kind::Dbcc => self.exec_dbcc(),
            Kind::Scc => self.exec_scc(),
            Kind::Bsr => self.exec_bsr(),
            Kind::Jmp | Kind::Jsr => self.exec_jump(),
            Kind::Lea => self.exec_lea(),
            Kind::Pea => self.exec_pea(),
            Kind::Bchg | Kind::Bclr | Kind::Bset | Kind::Btst => self.exec_bit(),
            Kind::Clr | Kind::Neg | Kind::Negx | Kind::Not => self.exec_unary(),
            Kind::Move => self.exec_move(),
            Kind::Movea => self.exec_movea(),
            Kind::Movep => self.exec_movep(),
            Kind::Movem => self.exec_movem(),
            Kind::Moveq => self.exec_moveq(),
            Kind::Swap => self.exec_swap(),
            Kind::Tas => self.exec_tas(),
            Kind::Exg => self.exec_exg(),
            Kind::Ext => self.exec_ext(),
            Kind::Link => self.exec_link(),
            Kind::Unlk => self.exec_unlk(),
            Kind::Trap | Kind::Trapv => self.exec_trap(),
            Kind::Rte | Kind::Rtr | Kind::Rts => self.exec_return(),
            Kind::Tst => self.exec_tst(),
            Kind::Chk => self.exec_chk(),
            Kind::Mulu | Kind::Muls => self.exec_mul(),
            Kind::Divu | Kind::Divs => self.exec_div(),
            Kind::Nop | Kind::Reset => Ok(()),
        }
    }

    // === Operand plumbing ===
    //
    // Targets are copied out, used and stored back so the one-shot
    // pre-decrement flag survives repeated fetches.

    pub(crate) fn src_target(&self) -> Target {
        self.src.expect("source operand set at decode")
    }

    pub(crate) fn dst_target(&self) -> Target {
        self.dst.expect("destination operand set at decode")
    }

    pub(crate) fn read_src(&mut self, size: Size) -> Result<u64, Error> {
        let mut target = self.src_target();
        let value = target.read_value(self.ctx, size);
        self.src = Some(target);
        value
    }

    pub(crate) fn read_dst(&mut self, size: Size) -> Result<u64, Error> {
        let mut target = self.dst_target();
        let value = target.read_value(self.ctx, size);
        self.dst = Some(target);
        value
    }

    pub(crate) fn write_src(&mut self, value: u64, size: Size) -> Result<(), Error> {
        let mut target = self.src_target();
        let result = target.write_value(self.ctx, value, size);
        self.src = Some(target);
        result
    }

    pub(crate) fn write_dst(&mut self, value: u64, size: Size) -> Result<(), Error> {
        let mut target = self.dst_target();
        let result = target.write_value(self.ctx, value, size);
        self.dst = Some(target);
        result
    }

    pub(crate) fn src_ea(&self) -> u32 {
        self.src_target().effective_address(self.ctx.registers)
    }

    pub(crate) fn dst_ea(&self) -> u32 {
        self.dst_target().effective_address(self.ctx.registers)
    }

    /// Post-increment the source once; later calls are no-ops.
    pub(crate) fn inc_src(&mut self) {
        if !self.src_done
            && let Some(target) = self.src.as_mut()
        {
            target.post_increment(self.ctx.registers);
        }
        self.src_done = true;
    }

    /// Post-increment the destination once; later calls are no-ops.
    pub(crate) fn inc_dst(&mut self) {
        if !self.dst_done
            && let Some(target) = self.dst.as_mut()
        {
            target.post_increment(self.ctx.registers);
        }
        self.dst_done = true;
    }

    // === Stack ===

    pub(crate) fn push_word(&mut self, value: u16) -> Result<(), Error> {
        let sp = self.ctx.registers.stack_ptr().wrapping_sub(2);
        self.ctx.registers.set_stack_ptr(sp);
        self.ctx.bus.write_word(sp, value)
    }

    pub(crate) fn push_long(&mut self, value: u32) -> Result<(), Error> {
        let sp = self.ctx.registers.stack_ptr().wrapping_sub(4);
        self.ctx.registers.set_stack_ptr(sp);
        self.ctx.bus.write_long(sp, value)
    }

    pub(crate) fn pop_word(&mut self) -> Result<u16, Error> {
        let sp = self.ctx.registers.stack_ptr();
        let value = self.ctx.bus.read_word(sp)?;
        self.ctx.registers.set_stack_ptr(sp.wrapping_add(2));
        Ok(value)
    }

    pub(crate) fn pop_long(&mut self) -> Result<u32, Error> {
        let sp = self.ctx.registers.stack_ptr();
        let value = self.ctx.bus.read_long(sp)?;
        self.ctx.registers.set_stack_ptr(sp.wrapping_add(4));
        Ok(value)
    }

    /// Exception dispatch: supervisor on, push PC then SR, load the
    /// vector.
    pub(crate) fn enter_exception(&mut self, vector: u32) -> Result<(), Error> {
        self.ctx.registers.sr.set_supervisor(true);
        let pc = self.ctx.registers.pc;
        self.push_long(pc)?;
        let sr = self.ctx.registers.sr.word();
        self.push_word(sr)?;
        let new_pc = self.ctx.bus.read_long(vector * 4)?;
        self.ctx.registers.pc = new_pc;
        Ok(())
    }

    // === Control flow ===

    fn condition_holds(&self) -> bool {
        self.condition
            .unwrap_or(Condition::True)
            .holds(self.ctx.registers.sr)
    }

    /// Add the branch displacement to PC. The 16-bit displacement word
    /// was already consumed by decode, so the word form compensates by
    /// two bytes (always for Bcc/BSR, only for backward displacements in
    /// the DBcc path).
    fn displace_pc(&mut self, ignore_parsed_word_always: bool) -> Result<(), Error> {
        let pc = &mut self.ctx.registers.pc;
        if self.size == Size::Byte {
            let offset = self.data as u8 as i8;
            *pc = pc.wrapping_add(offset as u32);
        } else {
            let offset = self.data as u16 as i16;
            *pc = pc.wrapping_add(offset as u32);
            if offset < 0 || ignore_parsed_word_always {
                *pc = pc.wrapping_sub(2);
            }
        }
        if *pc & 1 != 0 {
            return Err(Error::UnalignedProgramCounter { pc: *pc });
        }
        Ok(())
    }

    fn exec_bcc(&mut self) -> Result<(), Error> {
        if self.condition_holds() {
            self.displace_pc(true)?;
        }
        Ok(())
    }

    fn exec_dbcc(&mut self) -> Result<(), Error> {
        if !self.condition_holds() {
            let counter = self.read_dst(Size::Word)? as u16 as i16;
            let counter = counter.wrapping_sub(1);
            self.write_dst(counter as u16 as u64, Size::Word)?;
            if counter != -1 {
                // the displacement word is only compensated for forward
                // displacements here
                if (self.data as u16 as i16) >= 0 {
                    self.ctx.registers.pc = self.ctx.registers.pc.wrapping_sub(2);
                }
                self.displace_pc(false)?;
            }
        }
        Ok(())
    }

    fn exec_scc(&mut self) -> Result<(), Error> {
        let value = if self.condition_holds() { 0xFF } else { 0x00 };
        self.write_dst(value, Size::Byte)
    }

    fn exec_bsr(&mut self) -> Result<(), Error> {
        let pc = self.ctx.registers.pc;
        self.push_long(pc)?;
        self.displace_pc(true)
    }

    fn exec_jump(&mut self) -> Result<(), Error> {
        let old_pc = self.ctx.registers.pc;
        let new_pc = self.dst_ea();
        self.ctx.registers.pc = new_pc;
        if self.kind == Kind::Jsr {
            self.push_long(old_pc)?;
        }
        if new_pc & 1 != 0 {
            return Err(Error::UnalignedProgramCounter { pc: new_pc });
        }
        Ok(())
    }

    fn exec_lea(&mut self) -> Result<(), Error> {
        let ea = self.src_ea();
        self.write_dst(u64::from(ea), Size::Long)
    }

    fn exec_pea(&mut self) -> Result<(), Error> {
        let ea = self.src_ea();
        self.push_long(ea)
    }

    fn exec_link(&mut self) -> Result<(), Error> {
        let an = self.read_dst(Size::Long)? as u32;
        if self.dst_target().index() == 7 {
            // LINK A7 pushes the already-decremented stack pointer
            self.push_long(an.wrapping_sub(4))?;
        } else {
            self.push_long(an)?;
        }
        let sp = self.ctx.registers.stack_ptr();
        self.write_dst(u64::from(sp), Size::Long)?;
        let offset = self.data as u16 as i16;
        let sp = self.ctx.registers.stack_ptr();
        self.ctx.registers.set_stack_ptr(sp.wrapping_add(offset as u32));
        Ok(())
    }

    fn exec_unlk(&mut self) -> Result<(), Error> {
        let frame = self.read_dst(Size::Long)? as u32;
        self.ctx.registers.set_stack_ptr(frame);
        let value = self.pop_long()?;
        self.write_dst(u64::from(value), Size::Long)
    }

    fn exec_trap(&mut self) -> Result<(), Error> {
        if self.kind == Kind::Trapv && !self.ctx.registers.sr.overflow() {
            return Ok(());
        }
        self.enter_exception(self.data)
    }

    fn exec_return(&mut self) -> Result<(), Error> {
        let mut new_sr = 0u16;
        if self.kind != Kind::Rts {
            new_sr = self.pop_word()?;
        }
        let pc = self.pop_long()?;
        self.ctx.registers.pc = pc;

        if self.kind == Kind::Rte {
            self.ctx.registers.sr.set_word(new_sr);
        } else if self.kind == Kind::Rtr {
            self.ctx.registers.sr.set_ccr(new_sr as u8);
        }

        if pc & 1 != 0 {
            return Err(Error::UnalignedProgramCounter { pc });
        }
        Ok(())
    }

    fn exec_chk(&mut self) -> Result<(), Error> {
        let bound = self.read_src(Size::Word)? as u16 as i16;
        let value = self.read_dst(Size::Word)? as u16 as i16;
        if value < 0 || value > bound {
            self.enter_exception(CHK_VECTOR)?;
            self.ctx.registers.sr.set_negative(value < 0);
        }
        let sr = &mut self.ctx.registers.sr;
        sr.set_zero(false);
        sr.set_overflow(false);
        sr.set_carry(false);
        Ok(())
    }
}

// === Flag arithmetic ===

pub(crate) fn msb(value: u64, size: Size) -> bool {
    (value >> (size.bits() - 1)) & 1 != 0
}

pub(crate) fn is_zero(value: u64, size: Size) -> bool {
    value & size.mask() == 0
}

/// Carry or borrow out of the sized result: any bit set above the
/// operation width.
pub(crate) fn is_carry(value: u64, size: Size) -> bool {
    value & (value ^ size.mask()) != 0
}

pub(crate) fn is_overflow(lhs: u64, rhs: u64, result: u64, size: Size, subtract: bool) -> bool {
    let lhs_msb = msb(lhs, size) ^ subtract;
    let rhs_msb = msb(rhs, size);
    let result_msb = msb(result, size);
    (lhs_msb && rhs_msb && !result_msb) || (!lhs_msb && !rhs_msb && result_msb)
}

/// Shared ALU core for the binary families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    And,
    Cmp,
    Eor,
    Or,
    Sub,
}

impl BinaryOp {
    pub(crate) fn from_kind(kind: Kind) -> Self {
        match kind {
            Kind::Add | Kind::Adda | Kind::Addi | Kind::Addq | Kind::Addx => Self::Add,
            Kind::And | Kind::Andi | Kind::AndiToCcr | Kind::AndiToSr => Self::And,
            Kind::Cmp | Kind::Cmpa | Kind::Cmpi | Kind::Cmpm => Self::Cmp,
            Kind::Eor | Kind::Eori | Kind::EoriToCcr | Kind::EoriToSr => Self::Eor,
            Kind::Or | Kind::Ori | Kind::OriToCcr | Kind::OriToSr => Self::Or,
            Kind::Sub | Kind::Suba | Kind::Subi | Kind::Subq | Kind::Subx => Self::Sub,
            _ => unreachable!("not a binary ALU kind"),
        }
    }

    /// Subtraction computes `dst - src`, hence the operand order.
    pub(crate) fn apply(self, lhs: u64, rhs: u64) -> u64 {
        match self {
            Self::Add => lhs.wrapping_add(rhs),
            Self::And => lhs & rhs,
            Self::Eor => lhs ^ rhs,
            Self::Or => lhs | rhs,
            Self::Sub | Self::Cmp => rhs.wrapping_sub(lhs),
        }
    }

    pub(crate) fn is_subtract(self) -> bool {
        matches!(self, Self::Sub | Self::Cmp)
    }

    pub(crate) fn is_arithmetic(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Cmp)
    }
}
