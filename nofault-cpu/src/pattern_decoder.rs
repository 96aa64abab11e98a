// SPDX-FileCopyrightText: 2025 nofault contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Pattern-based A64 instruction decoder.
//!
//! Each supported encoding is described by a 32-character pattern string
//! where `0`/`1` are fixed bits and any other character is a wildcard. Words
//! that match no pattern, or that match one but use a reserved field value,
//! decode to [`Instruction::Unknown`].

use std::sync::OnceLock;

use crate::decoder::{
    bit, bits, decode_bitmask_imm, sign_extend, AddrMode, Condition, Instruction,
};

// ---------------------------------------------------------------------------
// Pattern infrastructure
// ---------------------------------------------------------------------------

/// Parse a 32-character pattern string into (mask, expected) at compile time.
/// '0' → mask bit set, expected bit clear.
/// '1' → mask bit set, expected bit set.
/// Any other char → mask bit clear (wildcard).
const fn parse_pattern(pat: &[u8; 32]) -> (u32, u32) {
    let mut mask: u32 = 0;
    let mut expected: u32 = 0;
    let mut i: usize = 0;
    while i < 32 {
        let bit_pos = 31 - i;
        match pat[i] {
            b'0' => {
                mask |= 1 << bit_pos;
            }
            b'1' => {
                mask |= 1 << bit_pos;
                expected |= 1 << bit_pos;
            }
            _ => {}
        }
        i += 1;
    }
    (mask, expected)
}

struct Encoding {
    mask: u32,
    expected: u32,
    handler: fn(u32) -> Instruction,
}

macro_rules! inst {
    ($pat:expr, $handler:expr) => {{
        const P: (u32, u32) = parse_pattern($pat);
        Encoding {
            mask: P.0,
            expected: P.1,
            handler: $handler,
        }
    }};
}

// ---------------------------------------------------------------------------
// Handler functions
// ---------------------------------------------------------------------------

// -- DP Immediate -----------------------------------------------------------

fn h_add_imm(raw: u32) -> Instruction {
    let imm12 = bits(raw, 21, 10) as u64;
    Instruction::AddImm {
        sf: bit(raw, 31) != 0,
        rd: bits(raw, 4, 0) as u8,
        rn: bits(raw, 9, 5) as u8,
        imm: imm12 << (12 * bit(raw, 22)),
    }
}

/// MOVZ / MOVN. `invert` selects MOVN.
fn move_wide(raw: u32, invert: bool) -> Instruction {
    let sf = bit(raw, 31) != 0;
    let hw = bits(raw, 22, 21);
    // hw 2 and 3 address bits that a W register does not have
    if !sf && hw >= 2 {
        return Instruction::Unknown { raw };
    }
    let shifted = (bits(raw, 20, 5) as u64) << (hw * 16);
    let mut imm = if invert { !shifted } else { shifted };
    if !sf {
        imm &= 0xFFFF_FFFF;
    }
    Instruction::MovImm { sf, rd: bits(raw, 4, 0) as u8, imm }
}

fn h_movz(raw: u32) -> Instruction {
    move_wide(raw, false)
}

fn h_movn(raw: u32) -> Instruction {
    move_wide(raw, true)
}

fn h_tst_imm(raw: u32) -> Instruction {
    let sf = bit(raw, 31) != 0;
    let n = bit(raw, 22) as u8;
    let immr = bits(raw, 21, 16) as u8;
    let imms = bits(raw, 15, 10) as u8;
    match decode_bitmask_imm(sf, n, immr, imms) {
        Some(imm) => Instruction::Tst { sf, rn: bits(raw, 9, 5) as u8, imm },
        None => Instruction::Unknown { raw },
    }
}

// -- DP Register ------------------------------------------------------------

fn h_mov_reg(raw: u32) -> Instruction {
    Instruction::MovReg {
        sf: bit(raw, 31) != 0,
        rd: bits(raw, 4, 0) as u8,
        rm: bits(raw, 20, 16) as u8,
    }
}

fn h_sub_reg(raw: u32) -> Instruction {
    Instruction::SubReg {
        sf: bit(raw, 31) != 0,
        rd: bits(raw, 4, 0) as u8,
        rn: bits(raw, 9, 5) as u8,
        rm: bits(raw, 20, 16) as u8,
    }
}

fn h_cmp_reg(raw: u32) -> Instruction {
    Instruction::Cmp {
        sf: bit(raw, 31) != 0,
        rn: bits(raw, 9, 5) as u8,
        rm: bits(raw, 20, 16) as u8,
    }
}

// -- Branch -----------------------------------------------------------------

fn h_bcond(raw: u32) -> Instruction {
    Instruction::BCond {
        cond: Condition::from_u32(bits(raw, 3, 0)),
        imm: sign_extend(bits(raw, 23, 5), 19) << 2,
    }
}

fn test_bit(raw: u32) -> u8 {
    ((bit(raw, 31) << 5) | bits(raw, 23, 19)) as u8
}

fn h_tbz(raw: u32) -> Instruction {
    Instruction::Tbz {
        rt: bits(raw, 4, 0) as u8,
        bit: test_bit(raw),
        imm: sign_extend(bits(raw, 18, 5), 14) << 2,
    }
}

fn h_tbnz(raw: u32) -> Instruction {
    Instruction::Tbnz {
        rt: bits(raw, 4, 0) as u8,
        bit: test_bit(raw),
        imm: sign_extend(bits(raw, 18, 5), 14) << 2,
    }
}

// -- System -----------------------------------------------------------------

fn h_nop(_raw: u32) -> Instruction {
    Instruction::Nop
}

fn h_hint(raw: u32) -> Instruction {
    Instruction::Hint { imm: bits(raw, 11, 5) as u8 }
}

fn h_mrs(raw: u32) -> Instruction {
    Instruction::Mrs {
        rt: bits(raw, 4, 0) as u8,
        sys_reg: bits(raw, 20, 5),
    }
}

// -- Load/Store -------------------------------------------------------------

fn h_ldst_pair(raw: u32) -> Instruction {
    let opc = bits(raw, 31, 30);
    let mode = match bits(raw, 24, 23) {
        0b01 => AddrMode::PostIndex,
        0b10 => AddrMode::Offset,
        0b11 => AddrMode::PreIndex,
        // 0b00 is the non-temporal STNP/LDNP form
        _ => return Instruction::Unknown { raw },
    };
    let sf = opc == 0b10;
    let scale = if sf { 3 } else { 2 };
    let imm = sign_extend(bits(raw, 21, 15), 7) << scale;
    let rt = bits(raw, 4, 0) as u8;
    let rt2 = bits(raw, 14, 10) as u8;
    let rn = bits(raw, 9, 5) as u8;
    if bit(raw, 22) == 1 {
        Instruction::Ldp { sf, rt, rt2, rn, imm, mode }
    } else {
        Instruction::Stp { sf, rt, rt2, rn, imm, mode }
    }
}

fn h_ldst_uimm(raw: u32) -> Instruction {
    let size = bits(raw, 31, 30) as u8;
    let imm = (bits(raw, 21, 10) as i64) << size;
    let rt = bits(raw, 4, 0) as u8;
    let rn = bits(raw, 9, 5) as u8;
    let mode = AddrMode::Offset;
    if bit(raw, 22) == 1 {
        Instruction::LdrImm { size, rt, rn, imm, mode }
    } else {
        Instruction::StrImm { size, rt, rn, imm, mode }
    }
}

/// Unscaled, post-index and pre-index forms share a 9-bit signed offset.
fn h_ldst_imm9(raw: u32) -> Instruction {
    let mode = match bits(raw, 11, 10) {
        0b00 => AddrMode::Offset,
        0b01 => AddrMode::PostIndex,
        0b11 => AddrMode::PreIndex,
        // 0b10 is the unprivileged LDTR/STTR form
        _ => return Instruction::Unknown { raw },
    };
    let size = bits(raw, 31, 30) as u8;
    let imm = sign_extend(bits(raw, 20, 12), 9);
    let rt = bits(raw, 4, 0) as u8;
    let rn = bits(raw, 9, 5) as u8;
    if bit(raw, 22) == 1 {
        Instruction::LdrImm { size, rt, rn, imm, mode }
    } else {
        Instruction::StrImm { size, rt, rn, imm, mode }
    }
}

// ---------------------------------------------------------------------------
// Decode table
// ---------------------------------------------------------------------------

fn make_decode_table() -> Vec<Encoding> {
    vec![
        // == DP Immediate ==
        // ADD immediate: sf 0 0 10001 0 sh imm12 Rn Rd
        inst!(b"x00100010xxxxxxxxxxxxxxxxxxxxxxx", h_add_imm),
        // MOVN: sf 00 100101 hw imm16 Rd
        inst!(b"x00100101xxxxxxxxxxxxxxxxxxxxxxx", h_movn),
        // MOVZ: sf 10 100101 hw imm16 Rd
        inst!(b"x10100101xxxxxxxxxxxxxxxxxxxxxxx", h_movz),
        // TST (ANDS immediate, Rd=ZR): sf 11 100100 N immr imms Rn 11111
        inst!(b"x11100100xxxxxxxxxxxxxxxxxx11111", h_tst_imm),

        // == DP Register ==
        // MOV (ORR shifted, Rn=ZR, LSL #0): sf 01 01010 00 0 Rm 000000 11111 Rd
        inst!(b"x0101010000xxxxx00000011111xxxxx", h_mov_reg),
        // SUB shifted, LSL #0: sf 1 0 01011 00 0 Rm 000000 Rn Rd
        inst!(b"x1001011000xxxxx000000xxxxxxxxxx", h_sub_reg),
        // CMP (SUBS shifted, LSL #0, Rd=ZR): sf 1 1 01011 00 0 Rm 000000 Rn 11111
        inst!(b"x1101011000xxxxx000000xxxxx11111", h_cmp_reg),

        // == Branch ==
        // TBZ: b5 0110110 b40 imm14 Rt
        inst!(b"x0110110xxxxxxxxxxxxxxxxxxxxxxxx", h_tbz),
        // TBNZ: b5 0110111 b40 imm14 Rt
        inst!(b"x0110111xxxxxxxxxxxxxxxxxxxxxxxx", h_tbnz),
        // B.cond: 01010100 imm19 0 cond
        inst!(b"01010100xxxxxxxxxxxxxxxxxxx0xxxx", h_bcond),

        // == System ==
        // NOP: exact encoding
        inst!(b"11010101000000110010000000011111", h_nop),
        // HINT: 1101010100 0 00 011 0010 CRm op2 11111
        inst!(b"11010101000000110010xxxxxxx11111", h_hint),
        // MRS: 1101010100 1 1 o0 op1 CRn CRm op2 Rt
        inst!(b"110101010011xxxxxxxxxxxxxxxxxxxx", h_mrs),

        // == Load/Store ==
        // Load/store pair GP, 32/64-bit: x0 101 0 mode(2) L imm7 Rt2 Rn Rt
        inst!(b"x010100xxxxxxxxxxxxxxxxxxxxxxxxx", h_ldst_pair),
        // STR/LDR unsigned offset: size 111 0 01 0 L imm12 Rn Rt
        inst!(b"xx1110010xxxxxxxxxxxxxxxxxxxxxxx", h_ldst_uimm),
        // STR/LDR imm9 (unscaled / post / pre): size 111 0 00 0 L 0 imm9 idx Rn Rt
        inst!(b"xx1110000x0xxxxxxxxxxxxxxxxxxxxx", h_ldst_imm9),
    ]
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

fn get_table() -> &'static [Encoding] {
    static TABLE: OnceLock<Vec<Encoding>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut entries = make_decode_table();
        // Most fixed bits first, so NOP wins over the generic HINT space.
        entries.sort_by(|a, b| b.mask.count_ones().cmp(&a.mask.count_ones()));
        entries
    })
}

// ---------------------------------------------------------------------------
// Public decode function
// ---------------------------------------------------------------------------

/// Decode a 32-bit A64 instruction word. Total: unsupported words come back
/// as [`Instruction::Unknown`].
pub fn decode(raw: u32) -> Instruction {
    for m in get_table() {
        if (raw & m.mask) == m.expected {
            return (m.handler)(raw);
        }
    }
    Instruction::Unknown { raw }
}
