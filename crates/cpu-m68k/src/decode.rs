//! Opcode decode.
//!
//! Families are matched against fixed-width bit patterns written as
//! `"0100 ...1 11.. ...."` — `0`/`1` are literal bits, `.` is a
//! wildcard. The check order matters: several encodings only make sense
//! because a more specific family claimed them first (ABCD before AND,
//! CMPM before EOR, TAS before TST, DBcc before Scc before ADDQ).

use crate::Context;
use crate::instruction::{Condition, Instruction, Kind, Size};
use crate::target::{Target, TargetKind};
use emu_core::{Device, Error};

/// Compile a pattern literal into a (mask, value) pair.
const fn pattern(p: &str) -> (u16, u16) {
    let bytes = p.as_bytes();
    let mut mask = 0u16;
    let mut value = 0u16;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c != b' ' {
            mask <<= 1;
            value <<= 1;
            if c == b'0' || c == b'1' {
                mask |= 1;
            }
            if c == b'1' {
                value |= 1;
            }
        }
        i += 1;
    }
    (mask, value)
}

macro_rules! has_pattern {
    ($word:expr, $p:literal) => {{
        const MV: (u16, u16) = pattern($p);
        $word & MV.0 == MV.1
    }};
}

pub(crate) fn decode(ctx: &mut Context) -> Result<Instruction, Error> {
    if ctx.registers.pc & 1 != 0 {
        return Err(Error::UnalignedProgramCounter {
            pc: ctx.registers.pc,
        });
    }
    let mut decoder = Decoder { ctx, word: 0 };
    decoder.word = decoder.read_word()?;
    decoder.decode()
}

struct Decoder<'a, 'b> {
    ctx: &'a mut Context<'b>,
    word: u16,
}

impl Decoder<'_, '_> {
    fn read_word(&mut self) -> Result<u16, Error> {
        let pc = self.ctx.registers.pc;
        let word = self.ctx.bus.read_word(pc)?;
        self.ctx.registers.pc = pc.wrapping_add(2);
        Ok(word)
    }

    fn bits(&self, begin: u32, len: u32) -> u16 {
        (self.word >> begin) & ((1 << len) - 1)
    }

    fn bit(&self, bit: u32) -> bool {
        self.bits(bit, 1) != 0
    }

    /// Generic size field at bits 6-7: 00 byte, 01 word, 10 long.
    fn size0(&self) -> Result<Size, Error> {
        match self.bits(6, 2) {
            0 => Ok(Size::Byte),
            1 => Ok(Size::Word),
            2 => Ok(Size::Long),
            _ => Err(Error::UnknownOpcode { word: self.word }),
        }
    }

    fn condition(&self) -> Condition {
        Condition::from_bits(self.bits(8, 4))
    }

    /// Parse a 6-bit effective-address field into a target, consuming
    /// extension words as needed.
    fn parse_target(&mut self, size: Size, mode_begin: u32, index_begin: u32) -> Result<Target, Error> {
        let mode = self.bits(mode_begin, 3);
        let xn = self.bits(index_begin, 3) as u8;

        let kind = match mode {
            0 => TargetKind::DataRegister { reg: xn },
            1 => TargetKind::AddressRegister { reg: xn },
            2 => TargetKind::Address { reg: xn },
            3 => TargetKind::AddressIncrement { reg: xn },
            4 => TargetKind::AddressDecrement { reg: xn },
            5 => {
                let word = self.read_word()?;
                TargetKind::AddressDisplacement {
                    reg: xn,
                    disp: word as i16,
                }
            }
            6 => {
                let word = self.read_word()?;
                TargetKind::AddressIndex { reg: xn, ext: word }
            }
            7 => match xn {
                0 => {
                    let word = self.read_word()?;
                    TargetKind::AbsoluteShort { addr: word as i16 }
                }
                1 => {
                    let hi = self.read_word()?;
                    let lo = self.read_word()?;
                    TargetKind::AbsoluteLong {
                        addr: (u32::from(hi) << 16) | u32::from(lo),
                    }
                }
                2 => {
                    let word = self.read_word()?;
                    TargetKind::PcDisplacement { disp: word as i16 }
                }
                3 => {
                    let word = self.read_word()?;
                    TargetKind::PcIndex { ext: word }
                }
                4 => self.immediate_kind(size),
                _ => return Err(Error::UnknownAddressingMode { word: self.word }),
            },
            _ => unreachable!("3-bit mode field"),
        };

        Ok(Target::new(kind, size))
    }

    /// Immediate operand: byte immediates live in the low byte of their
    /// extension word, so the stream address is `pc + 1`.
    fn immediate_kind(&mut self, size: Size) -> TargetKind {
        let pc = self.ctx.registers.pc;
        let addr = if size == Size::Byte { pc + 1 } else { pc };
        self.ctx.registers.pc = pc + if size == Size::Long { 4 } else { 2 };
        TargetKind::Immediate { addr }
    }

    fn data_register(&self, index_begin: u32) -> Target {
        Target::new(
            TargetKind::DataRegister {
                reg: self.bits(index_begin, 3) as u8,
            },
            Size::Word,
        )
    }

    fn address_register(&self, index_begin: u32) -> Target {
        Target::new(
            TargetKind::AddressRegister {
                reg: self.bits(index_begin, 3) as u8,
            },
            Size::Word,
        )
    }

    fn decode(&mut self) -> Result<Instruction, Error> {
        let word = self.word;

        if has_pattern!(word, "0100 1110 0111 0000") {
            return Ok(Instruction::new(Kind::Reset));
        }
        if has_pattern!(word, "0100 1110 0111 0001") {
            return Ok(Instruction::new(Kind::Nop));
        }
        if has_pattern!(word, "0101 .... 1100 1...") {
            let mut inst = Instruction::new(Kind::Dbcc);
            inst.condition = Some(self.condition());
            inst.dst = Some(self.data_register(0));
            inst.data = u32::from(self.read_word()?);
            inst.size = Size::Word;
            return Ok(inst);
        }
        if has_pattern!(word, "0101 .... 11.. ....") {
            let mut inst = Instruction::new(Kind::Scc);
            inst.condition = Some(self.condition());
            inst.dst = Some(self.parse_target(Size::Byte, 3, 0)?);
            return Ok(inst);
        }
        if has_pattern!(word, "0101 .... .... ....") {
            let size = self.size0()?;
            let mut inst = Instruction::new(if self.bit(8) { Kind::Subq } else { Kind::Addq });
            inst.data = u32::from(self.bits(9, 3));
            inst.dst = Some(self.parse_target(size, 3, 0)?);
            inst.size = size;
            return Ok(inst);
        }
        if has_pattern!(word, "1.00 ...1 0000 ....") {
            let kind = if self.bit(3) {
                TargetKind::AddressDecrement {
                    reg: self.bits(0, 3) as u8,
                }
            } else {
                TargetKind::DataRegister {
                    reg: self.bits(0, 3) as u8,
                }
            };
            let dst_kind = if self.bit(3) {
                TargetKind::AddressDecrement {
                    reg: self.bits(9, 3) as u8,
                }
            } else {
                TargetKind::DataRegister {
                    reg: self.bits(9, 3) as u8,
                }
            };
            let mut inst = Instruction::new(if self.bit(14) { Kind::Abcd } else { Kind::Sbcd });
            inst.src = Some(Target::new(kind, Size::Byte));
            inst.dst = Some(Target::new(dst_kind, Size::Byte));
            inst.size = Size::Byte;
            return Ok(inst);
        }
        if has_pattern!(word, "1.01 ...1 ..00 ....") && self.bits(6, 2) != 3 {
            let size = self.size0()?;
            let make = |reg: u8| {
                if self.bit(3) {
                    TargetKind::AddressDecrement { reg }
                } else {
                    TargetKind::DataRegister { reg }
                }
            };
            let mut inst = Instruction::new(if self.bit(14) { Kind::Addx } else { Kind::Subx });
            inst.src = Some(Target::new(make(self.bits(0, 3) as u8), size));
            inst.dst = Some(Target::new(make(self.bits(9, 3) as u8), size));
            inst.size = size;
            return Ok(inst);
        }
        if has_pattern!(word, "0110 .... .... ....") {
            let cond = self.condition();
            let mut displacement = u32::from(self.bits(0, 8));
            let mut size = Size::Byte;
            if displacement == 0 {
                displacement = u32::from(self.read_word()?);
                size = Size::Word;
            }

            // the False condition is actually BSR
            let mut inst = if cond == Condition::False {
                Instruction::new(Kind::Bsr)
            } else {
                let mut inst = Instruction::new(Kind::Bcc);
                inst.condition = Some(cond);
                inst
            };
            inst.data = displacement;
            inst.size = size;
            return Ok(inst);
        }
        if has_pattern!(word, "0100 1110 1... ....") {
            let mut inst = Instruction::new(if self.bit(6) { Kind::Jmp } else { Kind::Jsr });
            inst.dst = Some(self.parse_target(Size::Long, 3, 0)?);
            return Ok(inst);
        }
        if has_pattern!(word, "0100 ...1 11.. ....") {
            let mut inst = Instruction::new(Kind::Lea);
            inst.src = Some(self.parse_target(Size::Long, 3, 0)?);
            inst.dst = Some(self.address_register(9));
            return Ok(inst);
        }
        if has_pattern!(word, "1011 ...1 ..00 1...") && self.bits(6, 2) != 3 {
            let size = self.size0()?;
            let mut inst = Instruction::new(Kind::Cmpm);
            inst.src = Some(Target::new(
                TargetKind::AddressIncrement {
                    reg: self.bits(0, 3) as u8,
                },
                size,
            ));
            inst.dst = Some(Target::new(
                TargetKind::AddressIncrement {
                    reg: self.bits(9, 3) as u8,
                },
                size,
            ));
            inst.size = size;
            return Ok(inst);
        }
        if has_pattern!(word, "0100 1000 0100 0...") {
            let mut inst = Instruction::new(Kind::Swap);
            inst.dst = Some(self.data_register(0));
            return Ok(inst);
        }
        if has_pattern!(word, "0100 1000 01.. ....") {
            let mut inst = Instruction::new(Kind::Pea);
            inst.src = Some(self.parse_target(Size::Long, 3, 0)?);
            return Ok(inst);
        }
        if has_pattern!(word, "0100 1010 11.. ....") {
            let mut inst = Instruction::new(Kind::Tas);
            inst.dst = Some(self.parse_target(Size::Byte, 3, 0)?);
            return Ok(inst);
        }
        if has_pattern!(word, "1100 ...1 ..00 ....") && self.bits(6, 2) != 3 {
            let (src_kind, dst_kind) = match self.bits(3, 5) {
                0b01000 => (
                    TargetKind::DataRegister {
                        reg: self.bits(9, 3) as u8,
                    },
                    TargetKind::DataRegister {
                        reg: self.bits(0, 3) as u8,
                    },
                ),
                0b01001 => (
                    TargetKind::AddressRegister {
                        reg: self.bits(9, 3) as u8,
                    },
                    TargetKind::AddressRegister {
                        reg: self.bits(0, 3) as u8,
                    },
                ),
                _ => (
                    TargetKind::DataRegister {
                        reg: self.bits(9, 3) as u8,
                    },
                    TargetKind::AddressRegister {
                        reg: self.bits(0, 3) as u8,
                    },
                ),
            };
            let mut inst = Instruction::new(Kind::Exg);
            inst.src = Some(Target::new(src_kind, Size::Long));
            inst.dst = Some(Target::new(dst_kind, Size::Long));
            return Ok(inst);
        }
        if has_pattern!(word, "0100 1000 1.00 0...") {
            let mut inst = Instruction::new(Kind::Ext);
            inst.dst = Some(self.data_register(0));
            inst.size = if self.bit(6) { Size::Long } else { Size::Word };
            return Ok(inst);
        }
        if has_pattern!(word, "0100 1110 0101 0...") {
            let mut inst = Instruction::new(Kind::Link);
            inst.dst = Some(self.address_register(0));
            inst.data = u32::from(self.read_word()?);
            return Ok(inst);
        }
        if has_pattern!(word, "0100 1110 0101 1...") {
            let mut inst = Instruction::new(Kind::Unlk);
            inst.dst = Some(self.address_register(0));
            return Ok(inst);
        }
        if has_pattern!(word, "0100 1110 0100 ....") {
            const TRAP_VECTOR_OFFSET: u32 = 32;
            let mut inst = Instruction::new(Kind::Trap);
            inst.data = TRAP_VECTOR_OFFSET + u32::from(self.bits(0, 4));
            return Ok(inst);
        }
        if has_pattern!(word, "0100 1110 0111 0110") {
            const TRAPV_VECTOR: u32 = 7;
            let mut inst = Instruction::new(Kind::Trapv);
            inst.data = TRAPV_VECTOR;
            return Ok(inst);
        }
        if has_pattern!(word, "0100 1110 0111 0011") {
            return Ok(Instruction::new(Kind::Rte));
        }
        if has_pattern!(word, "0100 1110 0111 0101") {
            return Ok(Instruction::new(Kind::Rts));
        }
        if has_pattern!(word, "0100 1110 0111 0111") {
            return Ok(Instruction::new(Kind::Rtr));
        }
        if has_pattern!(word, "0100 1010 .... ....") {
            let size = self.size0()?;
            let mut inst = Instruction::new(Kind::Tst);
            inst.src = Some(self.parse_target(size, 3, 0)?);
            inst.size = size;
            return Ok(inst);
        }
        if has_pattern!(word, "0100 ...1 10.. ....") {
            // note - the bound is the source, the checked register the
            // destination
            let mut inst = Instruction::new(Kind::Chk);
            inst.src = Some(self.parse_target(Size::Word, 3, 0)?);
            inst.dst = Some(self.data_register(9));
            inst.size = Size::Word;
            return Ok(inst);
        }
        if has_pattern!(word, "0100 1000 00.. ....") {
            let mut inst = Instruction::new(Kind::Nbcd);
            inst.dst = Some(self.parse_target(Size::Byte, 3, 0)?);
            inst.size = Size::Byte;
            return Ok(inst);
        }
        if has_pattern!(word, "1100 .... 11.. ....") {
            let mut inst = Instruction::new(if self.bit(8) { Kind::Muls } else { Kind::Mulu });
            inst.src = Some(self.parse_target(Size::Word, 3, 0)?);
            inst.dst = Some(self.data_register(9));
            return Ok(inst);
        }
        if has_pattern!(word, "1000 .... 11.. ....") {
            let mut inst = Instruction::new(if self.bit(8) { Kind::Divs } else { Kind::Divu });
            inst.src = Some(self.parse_target(Size::Word, 3, 0)?);
            inst.dst = Some(self.data_register(9));
            return Ok(inst);
        }

        if let Some(inst) = self.try_status_register()? {
            return Ok(inst);
        }
        if let Some(inst) = self.try_bit_manipulation()? {
            return Ok(inst);
        }
        if let Some(inst) = self.try_unary()? {
            return Ok(inst);
        }
        if let Some(inst) = self.try_shift()? {
            return Ok(inst);
        }
        if let Some(inst) = self.try_binary_on_address()? {
            return Ok(inst);
        }
        if let Some(inst) = self.try_binary_on_immediate()? {
            return Ok(inst);
        }
        if let Some(inst) = self.try_binary()? {
            return Ok(inst);
        }
        if let Some(inst) = self.try_move()? {
            return Ok(inst);
        }

        Err(Error::UnknownOpcode { word })
    }

    /// ANDI/EORI/ORI to CCR or SR.
    fn try_status_register(&mut self) -> Result<Option<Instruction>, Error> {
        const CASES: [(Kind, Kind, u16); 3] = [
            (Kind::OriToCcr, Kind::OriToSr, 0),
            (Kind::AndiToCcr, Kind::AndiToSr, 1),
            (Kind::EoriToCcr, Kind::EoriToSr, 5),
        ];
        for (ccr_kind, sr_kind, index) in CASES {
            if has_pattern!(self.word, "0000 ...0 0.11 1100") && self.bits(9, 3) == index {
                let is_word = self.bit(6);

                let pc = self.ctx.registers.pc;
                let src = Target::new(
                    TargetKind::Immediate {
                        addr: pc + if is_word { 0 } else { 1 },
                    },
                    if is_word { Size::Word } else { Size::Byte },
                );
                self.ctx.registers.pc = pc + 2;

                let mut inst = Instruction::new(if is_word { sr_kind } else { ccr_kind });
                inst.src = Some(src);
                return Ok(Some(inst));
            }
        }
        Ok(None)
    }

    /// BTST, BCHG, BCLR, BSET with register or immediate bit number.
    fn try_bit_manipulation(&mut self) -> Result<Option<Instruction>, Error> {
        let register_patterns = [
            (Kind::Btst, "0000 ...1 00.. ....", "0000 1000 00.. ...."),
            (Kind::Bchg, "0000 ...1 01.. ....", "0000 1000 01.. ...."),
            (Kind::Bclr, "0000 ...1 10.. ....", "0000 1000 10.. ...."),
            (Kind::Bset, "0000 ...1 11.. ....", "0000 1000 11.. ...."),
        ];
        for (kind, register_pattern, immediate_pattern) in register_patterns {
            let (rmask, rvalue) = pattern(register_pattern);
            if self.word & rmask == rvalue && self.bits(3, 3) != 1 {
                let src = self.data_register(9);
                let dst = self.parse_target(Size::Byte, 3, 0)?;
                let mut inst = Instruction::new(kind);
                inst.src = Some(src);
                inst.dst = Some(dst);
                inst.size = Size::Byte;
                return Ok(Some(inst));
            }
            let (imask, ivalue) = pattern(immediate_pattern);
            if self.word & imask == ivalue {
                let pc = self.ctx.registers.pc;
                let src = Target::new(TargetKind::Immediate { addr: pc + 1 }, Size::Byte);
                self.ctx.registers.pc = pc + 2;
                let dst = self.parse_target(Size::Byte, 3, 0)?;
                let mut inst = Instruction::new(kind);
                inst.src = Some(src);
                inst.dst = Some(dst);
                inst.size = Size::Byte;
                return Ok(Some(inst));
            }
        }
        Ok(None)
    }

    /// NEG, NEGX, CLR, NOT.
    fn try_unary(&mut self) -> Result<Option<Instruction>, Error> {
        let cases = [
            (Kind::Negx, "0100 0000 .... ...."),
            (Kind::Clr, "0100 0010 .... ...."),
            (Kind::Neg, "0100 0100 .... ...."),
            (Kind::Not, "0100 0110 .... ...."),
        ];
        for (kind, p) in cases {
            let (mask, value) = pattern(p);
            if self.word & mask == value && self.bits(6, 2) != 3 {
                let size = self.size0()?;
                let mut inst = Instruction::new(kind);
                inst.dst = Some(self.parse_target(size, 3, 0)?);
                inst.size = size;
                return Ok(Some(inst));
            }
        }
        Ok(None)
    }

    /// ASL/ASR, LSL/LSR, ROXL/ROXR, ROL/ROR.
    fn try_shift(&mut self) -> Result<Option<Instruction>, Error> {
        const CASES: [(Kind, Kind, u16); 4] = [
            (Kind::Asl, Kind::Asr, 0),
            (Kind::Lsl, Kind::Lsr, 1),
            (Kind::Roxl, Kind::Roxr, 2),
            (Kind::Rol, Kind::Ror, 3),
        ];

        for (left_kind, right_kind, index) in CASES {
            if has_pattern!(self.word, "1110 0... 11.. ....") && self.bits(9, 2) == index {
                // memory form: any alterable address, shift by one
                let kind = if self.bit(8) { left_kind } else { right_kind };
                let mut inst = Instruction::new(kind);
                inst.dst = Some(self.parse_target(Size::Word, 3, 0)?);
                inst.size = Size::Word;
                inst.data = 1;
                return Ok(Some(inst));
            }
            if has_pattern!(self.word, "1110 .... .... ....")
                && self.bits(3, 2) == index
                && self.bits(6, 2) != 3
            {
                // register form
                let kind = if self.bit(8) { left_kind } else { right_kind };
                let size = self.size0()?;
                let rotation = self.bits(9, 3);
                let mut inst = Instruction::new(kind);
                inst.dst = Some(self.data_register(0));
                inst.size = size;
                if self.bit(5) {
                    // shift count is in a data register
                    inst.src = Some(Target::new(
                        TargetKind::DataRegister { reg: rotation as u8 },
                        size,
                    ));
                } else {
                    // immediate shift count
                    inst.data = u32::from(rotation);
                }
                return Ok(Some(inst));
            }
        }
        Ok(None)
    }

    /// SUBA, CMPA, ADDA: word sources are sign-extended to long.
    fn try_binary_on_address(&mut self) -> Result<Option<Instruction>, Error> {
        const CASES: [(Kind, u16); 3] = [(Kind::Suba, 0), (Kind::Cmpa, 1), (Kind::Adda, 2)];

        for (kind, index) in CASES {
            if has_pattern!(self.word, "1..1 .... 11.. ....") && self.bits(13, 2) == index {
                let size = if self.bit(8) { Size::Long } else { Size::Word };
                let mut inst = Instruction::new(kind);
                inst.src = Some(self.parse_target(size, 3, 0)?);
                inst.dst = Some(self.address_register(9));
                inst.size = size;
                return Ok(Some(inst));
            }
        }
        Ok(None)
    }

    /// ORI, ANDI, SUBI, ADDI, EORI, CMPI.
    fn try_binary_on_immediate(&mut self) -> Result<Option<Instruction>, Error> {
        const CASES: [(Kind, u16); 6] = [
            (Kind::Ori, 0),
            (Kind::Andi, 1),
            (Kind::Subi, 2),
            (Kind::Addi, 3),
            (Kind::Eori, 5),
            (Kind::Cmpi, 6),
        ];

        for (kind, index) in CASES {
            if has_pattern!(self.word, "0000 ...0 .... ....") && self.bits(9, 3) == index {
                let size = self.size0()?;

                let pc = self.ctx.registers.pc;
                let src = Target::new(
                    TargetKind::Immediate {
                        addr: if size == Size::Byte { pc + 1 } else { pc },
                    },
                    size,
                );
                self.ctx.registers.pc = pc + if size == Size::Long { 4 } else { 2 };

                let mut inst = Instruction::new(kind);
                inst.src = Some(src);
                inst.dst = Some(self.parse_target(size, 3, 0)?);
                inst.size = size;
                return Ok(Some(inst));
            }
        }
        Ok(None)
    }

    /// OR, SUB, EOR, AND, ADD between a data register and an address.
    /// With the direction bit clear, EOR is actually CMP — a corner of
    /// the encoding.
    fn try_binary(&mut self) -> Result<Option<Instruction>, Error> {
        const CASES: [(Kind, u16); 5] = [
            (Kind::Or, 0),
            (Kind::Sub, 1),
            (Kind::Eor, 3),
            (Kind::And, 4),
            (Kind::Add, 5),
        ];

        for (kind, index) in CASES {
            if has_pattern!(self.word, "1... .... .... ....") && self.bits(12, 3) == index {
                let size = self.size0()?;
                let mut kind = kind;
                let mut src = self.data_register(9);
                let mut dst = self.parse_target(size, 3, 0)?;
                if !self.bit(8) {
                    if kind == Kind::Eor {
                        kind = Kind::Cmp;
                    }
                    std::mem::swap(&mut src, &mut dst);
                }
                let mut inst = Instruction::new(kind);
                inst.src = Some(src);
                inst.dst = Some(dst);
                inst.size = size;
                return Ok(Some(inst));
            }
        }
        Ok(None)
    }

    /// MOVE, MOVEA, MOVEP, MOVEM, MOVEQ and the SR/CCR/USP moves.
    fn try_move(&mut self) -> Result<Option<Instruction>, Error> {
        // MOVE/MOVEA: their own two-bit size code
        if has_pattern!(self.word, "00.. .... .... ....") {
            let size = match self.bits(12, 2) {
                0b01 => Some(Size::Byte),
                0b11 => Some(Size::Word),
                0b10 => Some(Size::Long),
                _ => None,
            };
            if let Some(size) = size {
                let src = self.parse_target(size, 3, 0)?;
                // the PC at this point resolves the destination's
                // PC-relative addressing on execute
                let pc = self.ctx.registers.pc;
                let dst = self.parse_target(size, 6, 9)?;
                let kind = if self.bits(6, 3) == 1 {
                    Kind::Movea
                } else {
                    Kind::Move
                };
                let mut inst = Instruction::new(kind);
                inst.src = Some(src);
                inst.dst = Some(dst);
                inst.size = size;
                inst.data = pc;
                return Ok(Some(inst));
            }
        }
        // MOVEP
        if has_pattern!(self.word, "0000 ...1 ..00 1...") {
            let size = if self.bit(6) { Size::Long } else { Size::Word };

            let mut src = Target::new(
                TargetKind::DataRegister {
                    reg: self.bits(9, 3) as u8,
                },
                size,
            );
            let word = self.read_word()?;
            let mut dst = Target::new(
                TargetKind::AddressDisplacement {
                    reg: self.bits(0, 3) as u8,
                    disp: word as i16,
                },
                size,
            );

            if !self.bit(7) {
                std::mem::swap(&mut src, &mut dst);
            }
            let mut inst = Instruction::new(Kind::Movep);
            inst.src = Some(src);
            inst.dst = Some(dst);
            inst.size = size;
            return Ok(Some(inst));
        }
        // MOVEM
        if has_pattern!(self.word, "0100 1.00 1... ....") {
            let mask = self.read_word()?;
            let size = if self.bit(6) { Size::Long } else { Size::Word };
            let target = self.parse_target(size, 3, 0)?;
            let mut inst = Instruction::new(Kind::Movem);
            inst.data = u32::from(mask);
            inst.size = size;
            if self.bit(10) {
                inst.src = Some(target);
            } else {
                inst.dst = Some(target);
            }
            return Ok(Some(inst));
        }
        // MOVEQ
        if has_pattern!(self.word, "0111 ...0 .... ....") {
            let mut inst = Instruction::new(Kind::Moveq);
            inst.data = u32::from(self.bits(0, 8));
            inst.dst = Some(self.data_register(9));
            return Ok(Some(inst));
        }
        // MOVE to CCR / MOVE to SR
        if has_pattern!(self.word, "0100 01.0 11.. ....") {
            let mut inst = Instruction::new(if self.bit(9) {
                Kind::MoveToSr
            } else {
                Kind::MoveToCcr
            });
            inst.src = Some(self.parse_target(Size::Word, 3, 0)?);
            return Ok(Some(inst));
        }
        // MOVE from SR
        if has_pattern!(self.word, "0100 0000 11.. ....") {
            let mut inst = Instruction::new(Kind::MoveFromSr);
            inst.dst = Some(self.parse_target(Size::Word, 3, 0)?);
            return Ok(Some(inst));
        }
        // MOVE to USP
        if has_pattern!(self.word, "0100 1110 0110 0...") {
            let mut inst = Instruction::new(Kind::MoveToUsp);
            inst.src = Some(self.address_register(0));
            return Ok(Some(inst));
        }
        // MOVE from USP
        if has_pattern!(self.word, "0100 1110 0110 1...") {
            let mut inst = Instruction::new(Kind::MoveFromUsp);
            inst.dst = Some(self.address_register(0));
            return Ok(Some(inst));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Registers;

    struct Rom(Vec<u8>);

    impl Device for Rom {
        fn read(&mut self, addr: u32, data: &mut [u8]) -> Result<(), Error> {
            for (i, byte) in data.iter_mut().enumerate() {
                *byte = self.0.get(addr as usize + i).copied().unwrap_or(0);
            }
            Ok(())
        }

        fn write(&mut self, _addr: u32, _data: &[u8]) -> Result<(), Error> {
            Ok(())
        }
    }

    fn decode_words(words: &[u16]) -> (Instruction, u32) {
        let mut rom = Vec::new();
        for word in words {
            rom.extend_from_slice(&word.to_be_bytes());
        }
        let mut rom = Rom(rom);
        let mut regs = Registers::new();
        let mut ctx = Context::new(&mut regs, &mut rom);
        let inst = Instruction::decode(&mut ctx).expect("decodes");
        (inst, regs.pc)
    }

    #[test]
    fn exact_opcodes() {
        assert_eq!(decode_words(&[0x4E70]).0.kind, Kind::Reset);
        assert_eq!(decode_words(&[0x4E71]).0.kind, Kind::Nop);
        assert_eq!(decode_words(&[0x4E73]).0.kind, Kind::Rte);
        assert_eq!(decode_words(&[0x4E75]).0.kind, Kind::Rts);
        assert_eq!(decode_words(&[0x4E77]).0.kind, Kind::Rtr);
        assert_eq!(decode_words(&[0x4E76]).0.kind, Kind::Trapv);
    }

    #[test]
    fn moveq_carries_signed_byte() {
        let (inst, pc) = decode_words(&[0x7001]);
        assert_eq!(inst.kind, Kind::Moveq);
        assert_eq!(inst.data, 1);
        assert_eq!(pc, 2);
    }

    #[test]
    fn move_records_post_source_pc() {
        // MOVE.w $1234(A0), $5678(A1) — src extension word then dst
        let (inst, pc) = decode_words(&[0x3368, 0x1234, 0x5678]);
        assert_eq!(inst.kind, Kind::Move);
        assert_eq!(inst.size, Size::Word);
        assert_eq!(inst.data, 4); // PC after the source extension word
        assert_eq!(pc, 6);
    }

    #[test]
    fn movea_from_word_size_code() {
        let (inst, _) = decode_words(&[0x3040]); // MOVEA.w D0, A0
        assert_eq!(inst.kind, Kind::Movea);
        assert_eq!(inst.size, Size::Word);
    }

    #[test]
    fn branch_displacement_zero_reads_word() {
        let (inst, pc) = decode_words(&[0x6000, 0x00FE]);
        assert_eq!(inst.kind, Kind::Bcc);
        assert_eq!(inst.size, Size::Word);
        assert_eq!(inst.data, 0x00FE);
        assert_eq!(pc, 4);

        let (inst, pc) = decode_words(&[0x60FE]);
        assert_eq!(inst.size, Size::Byte);
        assert_eq!(inst.data, 0xFE);
        assert_eq!(pc, 2);
    }

    #[test]
    fn false_condition_is_bsr() {
        let (inst, _) = decode_words(&[0x6102]);
        assert_eq!(inst.kind, Kind::Bsr);
    }

    #[test]
    fn eor_with_clear_direction_is_cmp() {
        let (inst, _) = decode_words(&[0xB041]); // CMP.w D1, D0
        assert_eq!(inst.kind, Kind::Cmp);
        let (inst, _) = decode_words(&[0xB141]); // EOR.w D0, D1
        assert_eq!(inst.kind, Kind::Eor);
    }

    #[test]
    fn cmpm_wins_over_eor() {
        let (inst, _) = decode_words(&[0xB348]); // CMPM.w (A0)+, (A1)+
        assert_eq!(inst.kind, Kind::Cmpm);
    }

    #[test]
    fn abcd_wins_over_and() {
        let (inst, _) = decode_words(&[0xC100]); // ABCD D0, D0
        assert_eq!(inst.kind, Kind::Abcd);
        let (inst, _) = decode_words(&[0x8100]); // SBCD D0, D0
        assert_eq!(inst.kind, Kind::Sbcd);
    }

    #[test]
    fn dbcc_before_scc_before_addq() {
        let (inst, _) = decode_words(&[0x51C8, 0xFFFE]); // DBF D0, -2
        assert_eq!(inst.kind, Kind::Dbcc);
        let (inst, _) = decode_words(&[0x50C0]); // ST D0
        assert_eq!(inst.kind, Kind::Scc);
        let (inst, _) = decode_words(&[0x5240]); // ADDQ.w #1, D0
        assert_eq!(inst.kind, Kind::Addq);
    }

    #[test]
    fn tas_wins_over_tst() {
        let (inst, _) = decode_words(&[0x4AC0]);
        assert_eq!(inst.kind, Kind::Tas);
        let (inst, _) = decode_words(&[0x4A40]);
        assert_eq!(inst.kind, Kind::Tst);
    }

    #[test]
    fn muldiv_claim_opmode_three() {
        assert_eq!(decode_words(&[0xC0C0]).0.kind, Kind::Mulu);
        assert_eq!(decode_words(&[0xC1C0]).0.kind, Kind::Muls);
        assert_eq!(decode_words(&[0x80C0]).0.kind, Kind::Divu);
        assert_eq!(decode_words(&[0x81C0]).0.kind, Kind::Divs);
    }

    #[test]
    fn movem_mask_and_direction() {
        // MOVEM.l D0-D1/A0, -(A7)
        let (inst, _) = decode_words(&[0x48E7, 0xC080]);
        assert_eq!(inst.kind, Kind::Movem);
        assert!(inst.src.is_none());
        assert_eq!(inst.data, 0xC080);

        // MOVEM.w (A0)+, D0-D1
        let (inst, _) = decode_words(&[0x4C98, 0x0003]);
        assert!(inst.src.is_some());
        assert_eq!(inst.data, 0x0003);
    }

    #[test]
    fn immediate_operand_stream_addresses() {
        // ADDI.b #$12, D0 — immediate byte lives at pc + 1
        let (inst, pc) = decode_words(&[0x0600, 0x0012]);
        assert_eq!(inst.kind, Kind::Addi);
        let src = inst.src.expect("has immediate source");
        assert_eq!(src.kind(), TargetKind::Immediate { addr: 3 });
        assert_eq!(pc, 4);

        // ADDI.l #$11223344, D0
        let (inst, pc) = decode_words(&[0x0680, 0x1122, 0x3344]);
        let src = inst.src.expect("has immediate source");
        assert_eq!(src.kind(), TargetKind::Immediate { addr: 2 });
        assert_eq!(pc, 6);
    }

    #[test]
    fn mode_seven_subfield_rejects_invalid() {
        let mut rom = Rom(vec![0x4A, 0x7D]); // TST.w with mode 7, xn 5
        let mut regs = Registers::new();
        let mut ctx = Context::new(&mut regs, &mut rom);
        let err = Instruction::decode(&mut ctx).unwrap_err();
        assert!(matches!(err, Error::UnknownAddressingMode { .. }));
    }

    #[test]
    fn odd_pc_is_rejected() {
        let mut rom = Rom(vec![0; 8]);
        let mut regs = Registers::new();
        regs.pc = 1;
        let mut ctx = Context::new(&mut regs, &mut rom);
        let err = Instruction::decode(&mut ctx).unwrap_err();
        assert_eq!(err, Error::UnalignedProgramCounter { pc: 1 });
    }

    #[test]
    fn unknown_opcode_is_an_error() {
        let mut rom = Rom(vec![0xFF, 0xFF]);
        let mut regs = Registers::new();
        let mut ctx = Context::new(&mut regs, &mut rom);
        let err = Instruction::decode(&mut ctx).unwrap_err();
        assert_eq!(err, Error::UnknownOpcode { word: 0xFFFF });
    }

    #[test]
    fn status_register_group() {
        assert_eq!(decode_words(&[0x003C, 0x0001]).0.kind, Kind::OriToCcr);
        assert_eq!(decode_words(&[0x007C, 0x0700]).0.kind, Kind::OriToSr);
        assert_eq!(decode_words(&[0x023C, 0x00FE]).0.kind, Kind::AndiToCcr);
        assert_eq!(decode_words(&[0x027C, 0xF8FF]).0.kind, Kind::AndiToSr);
        assert_eq!(decode_words(&[0x0A3C, 0x0010]).0.kind, Kind::EoriToCcr);
        assert_eq!(decode_words(&[0x0A7C, 0x2000]).0.kind, Kind::EoriToSr);
    }

    #[test]
    fn shift_forms() {
        // LSR.w #2, D0
        let (inst, _) = decode_words(&[0xE448]);
        assert_eq!(inst.kind, Kind::Lsr);
        assert_eq!(inst.data, 2);
        assert!(inst.src.is_none());

        // ASL.l D1, D0
        let (inst, _) = decode_words(&[0xE3A0]);
        assert_eq!(inst.kind, Kind::Asl);
        assert!(inst.src.is_some());

        // memory ROR.w (A0)
        let (inst, _) = decode_words(&[0xE6D0]);
        assert_eq!(inst.kind, Kind::Ror);
        assert_eq!(inst.data, 1);
        assert_eq!(inst.size, Size::Word);
    }
}
