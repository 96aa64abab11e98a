// SPDX-FileCopyrightText: 2025 nofault contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! `copy_from_user_nofault` bodies captured from real kernels, and a few
//! encoders for building variants of them.

use nofault_common::Verdict;

pub struct Capture {
    pub name: &'static str,
    pub verdict: Verdict,
    pub code: &'static [u8],
}

pub const DEBIAN_6_1_GCC: Capture = Capture {
    name: "Debian - 6.1.0-13-arm64",
    verdict: Verdict::Patched,
    code: &[
        0x1f, 0x20, 0x03, 0xd5, // nop
        0x1f, 0x20, 0x03, 0xd5, // nop
        0x3f, 0x23, 0x03, 0xd5, // paciasp
        0xfd, 0x7b, 0xbd, 0xa9, // stp x29, x30, [sp, #-48]!
        0xfd, 0x03, 0x00, 0x91, // mov x29, sp
        0xf3, 0x53, 0x01, 0xa9, // stp x19, x20, [sp, #16]
        0xf4, 0x03, 0x01, 0xaa, // mov x20, x1
        0x21, 0x00, 0xe0, 0xd2, // mov x1, #0x1000000000000
        0x5f, 0x00, 0x01, 0xeb, // cmp x2, x1
        0xa8, 0x00, 0x00, 0x54, // b.hi
        0x21, 0x00, 0x02, 0xcb, // sub x1, x1, x2
        0xf3, 0x03, 0x02, 0xaa, // mov x19, x2
        0x9f, 0x02, 0x01, 0xeb, // cmp x20, x1
        0xc9, 0x00, 0x00, 0x54, // b.ls
        0xf3, 0x53, 0x41, 0xa9, // ldp x19, x20, [sp, #16]
        0xa0, 0x01, 0x80, 0x92, // mov x0, #-14
    ],
};

pub const AMAZON_LINUX_6_1_GCC: Capture = Capture {
    name: "Amazon Linux - 6.1.59-84.139.amzn2023.aarch64",
    verdict: Verdict::Patched,
    code: &[
        0xe9, 0x03, 0x1e, 0xaa, // mov x9, x30
        0x1f, 0x20, 0x03, 0xd5, // nop
        0x3f, 0x23, 0x03, 0xd5, // paciasp
        0xfd, 0x7b, 0xbd, 0xa9, // stp x29, x30, [sp, #-48]!
        0xfd, 0x03, 0x00, 0x91, // mov x29, sp
        0xf3, 0x53, 0x01, 0xa9, // stp x19, x20, [sp, #16]
        0xf3, 0x03, 0x02, 0xaa, // mov x19, x2
        0x22, 0x00, 0xe0, 0xd2, // mov x2, #0x1000000000000
        0x7f, 0x02, 0x02, 0xeb, // cmp x19, x2
        0xa8, 0x00, 0x00, 0x54, // b.hi
        0x42, 0x00, 0x13, 0xcb, // sub x2, x2, x19
        0xf4, 0x03, 0x01, 0xaa, // mov x20, x1
        0x3f, 0x00, 0x02, 0xeb, // cmp x1, x2
        0xc9, 0x00, 0x00, 0x54, // b.ls
        0xa0, 0x01, 0x80, 0x92, // mov x0, #-14
        0xf3, 0x53, 0x41, 0xa9, // ldp x19, x20, [sp, #16]
    ],
};

pub const DEBIAN_5_19_GCC: Capture = Capture {
    name: "Debian - 5.19.0",
    verdict: Verdict::Unpatched,
    code: &[
        0x1f, 0x20, 0x03, 0xd5, // nop
        0x1f, 0x20, 0x03, 0xd5, // nop
        0x3f, 0x23, 0x03, 0xd5, // paciasp
        0xfd, 0x7b, 0xbd, 0xa9, // stp x29, x30, [sp, #-48]!
        0x03, 0x41, 0x38, 0xd5, // mrs x3, sp_el0
        0xfd, 0x03, 0x00, 0x91, // mov x29, sp
        0xf3, 0x53, 0x01, 0xa9, // stp x19, x20, [sp, #16]
        0xf3, 0x03, 0x01, 0xaa, // mov x19, x1
        0xf4, 0x03, 0x02, 0xaa, // mov x20, x2
        0xf5, 0x5b, 0x02, 0xa9, // stp x21, x22, [sp, #32]
        0xf5, 0x03, 0x00, 0xaa, // mov x21, x0
        0x64, 0x2c, 0x40, 0xb9, // ldr w4, [x3, #44]
        0x44, 0x05, 0xa8, 0x37, // tbnz w4, #21
        0x60, 0x00, 0x40, 0xf9, // ldr x0, [x3]
        0x1f, 0x00, 0x06, 0x72, // tst w0, #0x4000000
        0xe1, 0x04, 0x00, 0x54, // b.ne
    ],
};

pub const LINUX_6_5_11_LLVM_17: Capture = Capture {
    name: "Linux 6.5.11 compiled with LLVM-17",
    verdict: Verdict::Patched,
    code: &[
        0x5f, 0x24, 0x03, 0xd5, // bti c
        0x29, 0x00, 0xe0, 0xd2, // mov x9, #0x1000000000000
        0xa8, 0x01, 0x80, 0x92, // mov x8, #-14
        0x5f, 0x00, 0x09, 0xeb, // cmp x2, x9
        0xe8, 0x02, 0x00, 0x54, // b.hi
        0x29, 0x01, 0x02, 0xcb, // sub x9, x9, x2
        0x3f, 0x01, 0x01, 0xeb, // cmp x9, x1
        0x83, 0x02, 0x00, 0x54, // b.lo
        0x3f, 0x23, 0x03, 0xd5, // paciasp
        0xfd, 0x7b, 0xbe, 0xa9, // stp x29, x30, [sp, #-0x20]!
        0xf3, 0x0b, 0x00, 0xf9, // str x19, [sp, #0x10]
        0xfd, 0x03, 0x00, 0x91, // mov x29, sp
        0x13, 0x41, 0x38, 0xd5, // mrs x19, sp_el0
        0x68, 0xae, 0x48, 0xb9, // ldr w8, [x19, #0x8ac]
        0x08, 0x05, 0x00, 0x11, // add w8, w8, #0x1
        0x68, 0xae, 0x08, 0xb9, // str w8, [x19, #0x8ac]
    ],
};

pub const ALL: [&Capture; 4] = [
    &DEBIAN_6_1_GCC,
    &AMAZON_LINUX_6_1_GCC,
    &DEBIAN_5_19_GCC,
    &LINUX_6_5_11_LLVM_17,
];

// ---------------------------------------------------------------------------
// Word helpers
// ---------------------------------------------------------------------------

pub fn to_words(code: &[u8]) -> Vec<u32> {
    code.chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

pub const NOP: u32 = 0xD503_201F;
pub const PACIASP: u32 = 0xD503_233F;

/// MOVZ Xd, #imm16, LSL #(hw * 16)
pub fn movz(rd: u32, imm16: u32, hw: u32) -> u32 {
    0xD280_0000 | (hw << 21) | (imm16 << 5) | rd
}

/// CMP Xn, Xm
pub fn cmp(rn: u32, rm: u32) -> u32 {
    0xEB00_001F | (rm << 16) | (rn << 5)
}

/// SUB Xd, Xn, Xm
pub fn sub(rd: u32, rn: u32, rm: u32) -> u32 {
    0xCB00_0000 | (rm << 16) | (rn << 5) | rd
}

/// MOV Xd, Xm
pub fn mov(rd: u32, rm: u32) -> u32 {
    0xAA00_03E0 | (rm << 16) | rd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoders_match_captures() {
        let w = to_words(DEBIAN_6_1_GCC.code);
        assert_eq!(w[6], mov(20, 1));
        assert_eq!(w[7], movz(1, 1, 3));
        assert_eq!(w[8], cmp(2, 1));
        assert_eq!(w[10], sub(1, 1, 2));
        assert_eq!(w[12], cmp(20, 1));
        assert_eq!(to_bytes(&w), DEBIAN_6_1_GCC.code);
    }

    #[test]
    fn test_captures_are_whole_words() {
        for capture in ALL {
            assert_eq!(capture.code.len() % 4, 0, "{}", capture.name);
            assert_eq!(capture.code.len(), 64, "{}", capture.name);
        }
    }
}
