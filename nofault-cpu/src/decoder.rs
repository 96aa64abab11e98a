// SPDX-FileCopyrightText: 2025 nofault contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! AArch64 instruction model for code-shape matching.
//!
//! Only the handful of A64 families that show up in the prologue and bounds
//! check of `copy_from_user_nofault` get a structured [`Instruction`]. Every
//! other word becomes [`Instruction::Unknown`]; decoding never fails.

use std::fmt;
use std::ops::Deref;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Addressing mode for load/store instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    /// Base + offset, base register untouched.
    Offset,
    /// Pre-index: base is updated before access.
    PreIndex,
    /// Post-index: base is updated after access.
    PostIndex,
}

/// A64 condition code, as encoded in the low nibble of `B.cond`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    Eq = 0,
    Ne = 1,
    Hs = 2,
    Lo = 3,
    Mi = 4,
    Pl = 5,
    Vs = 6,
    Vc = 7,
    Hi = 8,
    Ls = 9,
    Ge = 10,
    Lt = 11,
    Gt = 12,
    Le = 13,
    Al = 14,
    Nv = 15,
}

impl Condition {
    pub fn from_u32(val: u32) -> Self {
        match val & 0xF {
            0 => Self::Eq,
            1 => Self::Ne,
            2 => Self::Hs,
            3 => Self::Lo,
            4 => Self::Mi,
            5 => Self::Pl,
            6 => Self::Vs,
            7 => Self::Vc,
            8 => Self::Hi,
            9 => Self::Ls,
            10 => Self::Ge,
            11 => Self::Lt,
            12 => Self::Gt,
            13 => Self::Le,
            14 => Self::Al,
            _ => Self::Nv,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Hs => "hs",
            Self::Lo => "lo",
            Self::Mi => "mi",
            Self::Pl => "pl",
            Self::Vs => "vs",
            Self::Vc => "vc",
            Self::Hi => "hi",
            Self::Ls => "ls",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Gt => "gt",
            Self::Le => "le",
            Self::Al => "al",
            Self::Nv => "nv",
        }
    }
}

/// Operation family, the unit signatures are written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Nop,
    /// HINT space other than NOP: PAC and BTI markers, YIELD, CSDB, ...
    Hint,
    StorePair,
    LoadPair,
    MovImm,
    MovReg,
    Sub,
    Cmp,
    BCond,
    Mrs,
    Tbz,
    Tbnz,
    AddImm,
    Load,
    Store,
    Tst,
    Unknown,
}

/// `MRS` encoding of SP_EL0, which the kernel uses to hold `current`.
pub const SYSREG_SP_EL0: u32 = sys_reg(3, 0, 4, 1, 0);

/// Pack the MRS/MSR system register fields into one value.
pub const fn sys_reg(op0: u32, op1: u32, crn: u32, crm: u32, op2: u32) -> u32 {
    (op0 << 14) | (op1 << 11) | (crn << 7) | (crm << 3) | op2
}

// ---------------------------------------------------------------------------
// Instruction enum
// ---------------------------------------------------------------------------

/// Decoded A64 instruction.
///
/// Register fields hold the raw 5-bit number; 31 is SP or XZR depending on
/// the operand slot, as in the architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    /// HINT #imm (CRm:op2), e.g. 25 = PACIASP, 34 = BTI c.
    Hint { imm: u8 },

    Stp { sf: bool, rt: u8, rt2: u8, rn: u8, imm: i64, mode: AddrMode },
    Ldp { sf: bool, rt: u8, rt2: u8, rn: u8, imm: i64, mode: AddrMode },

    /// MOVZ / MOVN with the immediate already expanded to its register value.
    MovImm { sf: bool, rd: u8, imm: u64 },
    /// ORR Rd, ZR, Rm.
    MovReg { sf: bool, rd: u8, rm: u8 },
    /// SUB (shifted register) with no shift applied.
    SubReg { sf: bool, rd: u8, rn: u8, rm: u8 },
    /// SUBS ZR, Rn, Rm with no shift applied.
    Cmp { sf: bool, rn: u8, rm: u8 },
    AddImm { sf: bool, rd: u8, rn: u8, imm: u64 },
    /// ANDS ZR, Rn, #imm.
    Tst { sf: bool, rn: u8, imm: u64 },

    BCond { cond: Condition, imm: i64 },
    Tbz { rt: u8, bit: u8, imm: i64 },
    Tbnz { rt: u8, bit: u8, imm: i64 },

    Mrs { rt: u8, sys_reg: u32 },

    /// LDR/LDRB/LDRH (immediate). `size` is log2 of the access width.
    LdrImm { size: u8, rt: u8, rn: u8, imm: i64, mode: AddrMode },
    /// STR/STRB/STRH (immediate). `size` is log2 of the access width.
    StrImm { size: u8, rt: u8, rn: u8, imm: i64, mode: AddrMode },

    Unknown { raw: u32 },
}

/// Register operands of an instruction, in assembly order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    buf: [u8; 3],
    len: usize,
}

impl Registers {
    fn new(regs: &[u8]) -> Self {
        let mut buf = [0u8; 3];
        let len = regs.len().min(buf.len());
        buf[..len].copy_from_slice(&regs[..len]);
        Self { buf, len }
    }
}

impl Deref for Registers {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Instruction {
    pub fn family(&self) -> Family {
        match self {
            Self::Nop => Family::Nop,
            Self::Hint { .. } => Family::Hint,
            Self::Stp { .. } => Family::StorePair,
            Self::Ldp { .. } => Family::LoadPair,
            Self::MovImm { .. } => Family::MovImm,
            Self::MovReg { .. } => Family::MovReg,
            Self::SubReg { .. } => Family::Sub,
            Self::Cmp { .. } => Family::Cmp,
            Self::AddImm { .. } => Family::AddImm,
            Self::Tst { .. } => Family::Tst,
            Self::BCond { .. } => Family::BCond,
            Self::Tbz { .. } => Family::Tbz,
            Self::Tbnz { .. } => Family::Tbnz,
            Self::Mrs { .. } => Family::Mrs,
            Self::LdrImm { .. } => Family::Load,
            Self::StrImm { .. } => Family::Store,
            Self::Unknown { .. } => Family::Unknown,
        }
    }

    /// Register operands in assembly order (destination first).
    pub fn registers(&self) -> Registers {
        match *self {
            Self::Stp { rt, rt2, rn, .. } | Self::Ldp { rt, rt2, rn, .. } => {
                Registers::new(&[rt, rt2, rn])
            }
            Self::MovImm { rd, .. } => Registers::new(&[rd]),
            Self::MovReg { rd, rm, .. } => Registers::new(&[rd, rm]),
            Self::SubReg { rd, rn, rm, .. } => Registers::new(&[rd, rn, rm]),
            Self::Cmp { rn, rm, .. } => Registers::new(&[rn, rm]),
            Self::AddImm { rd, rn, .. } => Registers::new(&[rd, rn]),
            Self::Tst { rn, .. } => Registers::new(&[rn]),
            Self::Tbz { rt, .. } | Self::Tbnz { rt, .. } | Self::Mrs { rt, .. } => {
                Registers::new(&[rt])
            }
            Self::LdrImm { rt, rn, .. } | Self::StrImm { rt, rn, .. } => Registers::new(&[rt, rn]),
            Self::Nop | Self::Hint { .. } | Self::BCond { .. } | Self::Unknown { .. } => {
                Registers::new(&[])
            }
        }
    }

    /// The immediate operand. Signed offsets are returned as their 64-bit
    /// two's complement; branch displacements are included but are
    /// position-dependent.
    pub fn immediate(&self) -> Option<u64> {
        match *self {
            Self::Hint { imm } => Some(imm as u64),
            Self::Stp { imm, .. } | Self::Ldp { imm, .. } => Some(imm as u64),
            Self::MovImm { imm, .. } | Self::AddImm { imm, .. } | Self::Tst { imm, .. } => Some(imm),
            Self::BCond { imm, .. } => Some(imm as u64),
            Self::Tbz { bit, .. } | Self::Tbnz { bit, .. } => Some(bit as u64),
            Self::Mrs { sys_reg, .. } => Some(sys_reg as u64),
            Self::LdrImm { imm, .. } | Self::StrImm { imm, .. } => Some(imm as u64),
            Self::Nop
            | Self::MovReg { .. }
            | Self::SubReg { .. }
            | Self::Cmp { .. }
            | Self::Unknown { .. } => None,
        }
    }

    /// True for X-register (64-bit) operations, false for W-register ones.
    /// `None` where operand width does not apply.
    pub fn is_64bit(&self) -> Option<bool> {
        match *self {
            Self::Stp { sf, .. }
            | Self::Ldp { sf, .. }
            | Self::MovImm { sf, .. }
            | Self::MovReg { sf, .. }
            | Self::SubReg { sf, .. }
            | Self::Cmp { sf, .. }
            | Self::AddImm { sf, .. }
            | Self::Tst { sf, .. } => Some(sf),
            Self::LdrImm { size, .. } | Self::StrImm { size, .. } => Some(size == 3),
            Self::Tbz { bit, .. } | Self::Tbnz { bit, .. } => Some(bit >= 32),
            Self::Mrs { .. } => Some(true),
            Self::Nop | Self::Hint { .. } | Self::BCond { .. } | Self::Unknown { .. } => None,
        }
    }

    pub fn condition(&self) -> Option<Condition> {
        match *self {
            Self::BCond { cond, .. } => Some(cond),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Bitmask immediate decoder
// ---------------------------------------------------------------------------

/// Decode an A64 logical immediate from (N, immr, imms) fields.
///
/// Returns `None` if the encoding is reserved.
pub fn decode_bitmask_imm(sf: bool, n: u8, immr: u8, imms: u8) -> Option<u64> {
    let imms = imms as u32;
    let immr = immr as u32;

    // For 32-bit, N must be 0.
    if !sf && n != 0 {
        return None;
    }

    // Concatenate N and NOT(imms) to determine element size.
    let nimms = ((n as u32) << 6) | ((imms ^ 0x3F) & 0x3F);
    if nimms == 0 {
        return None;
    }

    let len = 31 - nimms.leading_zeros();
    let esize = 1u32 << len;
    let levels = esize - 1;

    let s = imms & levels;
    let r = immr & levels;

    // All-ones element is reserved.
    if s == levels {
        return None;
    }

    let welem: u64 = (1u64 << (s + 1)) - 1;
    let mask = if esize == 64 { u64::MAX } else { (1u64 << esize) - 1 };
    let rotated = if r == 0 {
        welem
    } else {
        ((welem >> r) | (welem << (esize - r))) & mask
    };

    let mut result = rotated;
    let mut size = esize;
    while size < 64 {
        result |= result << size;
        size *= 2;
    }

    if !sf {
        result &= 0xFFFF_FFFF;
    }

    Some(result)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Sign-extend `value` from `bits` width to i64.
#[inline]
pub(crate) fn sign_extend(value: u32, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value as i64) << shift) >> shift
}

/// Extract a bit field from an instruction word.
#[inline]
pub(crate) fn bits(raw: u32, hi: u32, lo: u32) -> u32 {
    (raw >> lo) & ((1 << (hi - lo + 1)) - 1)
}

/// Extract a single bit.
#[inline]
pub(crate) fn bit(raw: u32, pos: u32) -> u32 {
    (raw >> pos) & 1
}

// ---------------------------------------------------------------------------
// Disassembly
// ---------------------------------------------------------------------------

/// General-purpose register name. `sp` selects SP over ZR for number 31.
fn reg(n: u8, sf: bool, sp: bool) -> String {
    match (n, sf, sp) {
        (31, true, true) => "sp".to_string(),
        (31, false, true) => "wsp".to_string(),
        (31, true, false) => "xzr".to_string(),
        (31, false, false) => "wzr".to_string(),
        (n, true, _) => format!("x{n}"),
        (n, false, _) => format!("w{n}"),
    }
}

fn hint_name(imm: u8) -> Option<&'static str> {
    Some(match imm {
        1 => "yield",
        2 => "wfe",
        3 => "wfi",
        4 => "sev",
        5 => "sevl",
        20 => "csdb",
        24 => "paciaz",
        25 => "paciasp",
        26 => "pacibz",
        27 => "pacibsp",
        28 => "autiaz",
        29 => "autiasp",
        30 => "autibz",
        31 => "autibsp",
        32 => "bti",
        34 => "bti c",
        36 => "bti j",
        38 => "bti jc",
        _ => return None,
    })
}

fn sys_reg_name(sys_reg: u32) -> String {
    if sys_reg == SYSREG_SP_EL0 {
        return "sp_el0".to_string();
    }
    format!(
        "s{}_{}_c{}_c{}_{}",
        (sys_reg >> 14) & 3,
        (sys_reg >> 11) & 7,
        (sys_reg >> 7) & 0xF,
        (sys_reg >> 3) & 0xF,
        sys_reg & 7
    )
}

fn signed_hex(v: i64) -> String {
    if v < 0 {
        format!("-0x{:x}", v.unsigned_abs())
    } else {
        format!("0x{v:x}")
    }
}

/// `[base, #imm]`, `[base, #imm]!` or `[base], #imm`.
fn mem_operand(rn: u8, imm: i64, mode: AddrMode) -> String {
    let base = reg(rn, true, true);
    match mode {
        AddrMode::Offset if imm == 0 => format!("[{base}]"),
        AddrMode::Offset => format!("[{base}, #{imm}]"),
        AddrMode::PreIndex => format!("[{base}, #{imm}]!"),
        AddrMode::PostIndex => format!("[{base}], #{imm}"),
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Nop => f.write_str("nop"),
            Self::Hint { imm } => match hint_name(imm) {
                Some(name) => f.write_str(name),
                None => write!(f, "hint #{imm}"),
            },
            Self::Stp { sf, rt, rt2, rn, imm, mode } => write!(
                f,
                "stp {}, {}, {}",
                reg(rt, sf, false),
                reg(rt2, sf, false),
                mem_operand(rn, imm, mode)
            ),
            Self::Ldp { sf, rt, rt2, rn, imm, mode } => write!(
                f,
                "ldp {}, {}, {}",
                reg(rt, sf, false),
                reg(rt2, sf, false),
                mem_operand(rn, imm, mode)
            ),
            Self::MovImm { sf, rd, imm } => write!(f, "mov {}, #0x{imm:x}", reg(rd, sf, false)),
            Self::MovReg { sf, rd, rm } => {
                write!(f, "mov {}, {}", reg(rd, sf, false), reg(rm, sf, false))
            }
            Self::SubReg { sf, rd, rn, rm } => write!(
                f,
                "sub {}, {}, {}",
                reg(rd, sf, false),
                reg(rn, sf, false),
                reg(rm, sf, false)
            ),
            Self::Cmp { sf, rn, rm } => {
                write!(f, "cmp {}, {}", reg(rn, sf, false), reg(rm, sf, false))
            }
            Self::AddImm { sf, rd, rn, imm } if imm == 0 && (rd == 31 || rn == 31) => {
                write!(f, "mov {}, {}", reg(rd, sf, true), reg(rn, sf, true))
            }
            Self::AddImm { sf, rd, rn, imm } => {
                write!(f, "add {}, {}, #0x{imm:x}", reg(rd, sf, true), reg(rn, sf, true))
            }
            Self::Tst { sf, rn, imm } => write!(f, "tst {}, #0x{imm:x}", reg(rn, sf, false)),
            Self::BCond { cond, imm } => write!(f, "b.{} .{:+}", cond.mnemonic(), Rel(imm)),
            Self::Tbz { rt, bit, imm } => {
                write!(f, "tbz {}, #{bit}, .{:+}", reg(rt, bit >= 32, false), Rel(imm))
            }
            Self::Tbnz { rt, bit, imm } => {
                write!(f, "tbnz {}, #{bit}, .{:+}", reg(rt, bit >= 32, false), Rel(imm))
            }
            Self::Mrs { rt, sys_reg } => {
                write!(f, "mrs {}, {}", reg(rt, true, false), sys_reg_name(sys_reg))
            }
            Self::LdrImm { size, rt, rn, imm, mode } => {
                let op = ["ldrb", "ldrh", "ldr", "ldr"][size as usize & 3];
                write!(f, "{op} {}, {}", reg(rt, size == 3, false), mem_operand(rn, imm, mode))
            }
            Self::StrImm { size, rt, rn, imm, mode } => {
                let op = ["strb", "strh", "str", "str"][size as usize & 3];
                write!(f, "{op} {}, {}", reg(rt, size == 3, false), mem_operand(rn, imm, mode))
            }
            Self::Unknown { raw } => write!(f, ".inst 0x{raw:08x}"),
        }
    }
}

/// PC-relative displacement, printed as `+0x14` / `-0x8`.
struct Rel(i64);

impl fmt::Display for Rel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = signed_hex(self.0);
        if self.0 >= 0 && f.sign_plus() {
            write!(f, "+{s}")
        } else {
            f.write_str(&s)
        }
    }
}
