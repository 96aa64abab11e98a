// SPDX-FileCopyrightText: 2025 nofault contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Borrowed view over a captured function body.
//!
//! The bytes are whatever the caller read out of the kernel; the base
//! address only labels diagnostics and never influences decoding.

use byteorder::{ByteOrder, LittleEndian};

use nofault_common::{VAddr, INSN_SIZE};

use crate::decoder::Instruction;
use crate::pattern_decoder::decode;

/// Immutable captured code plus the address its first byte was loaded at.
#[derive(Debug, Clone, Copy)]
pub struct CodeBuffer<'a> {
    bytes: &'a [u8],
    base: VAddr,
}

impl<'a> CodeBuffer<'a> {
    pub fn new(bytes: &'a [u8], base: VAddr) -> Self {
        Self { bytes, base }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn base(&self) -> VAddr {
        self.base
    }

    /// Runtime address of the byte at `offset`.
    #[inline]
    pub fn address_of(&self, offset: usize) -> VAddr {
        self.base.wrapping_add(offset as u64)
    }

    /// Little-endian instruction word at `offset`, or `None` if fewer than
    /// four bytes remain.
    pub fn word_at(&self, offset: usize) -> Option<u32> {
        let end = offset.checked_add(INSN_SIZE)?;
        self.bytes.get(offset..end).map(LittleEndian::read_u32)
    }

    /// Decoded instruction at `offset`.
    pub fn decode_at(&self, offset: usize) -> Option<Instruction> {
        self.word_at(offset).map(decode)
    }

    /// Walk whole instructions starting at `offset`, yielding
    /// `(offset, raw word, instruction)`.
    pub fn instructions(&self, offset: usize) -> Instructions<'a> {
        Instructions { code: *self, offset }
    }
}

/// Iterator returned by [`CodeBuffer::instructions`].
pub struct Instructions<'a> {
    code: CodeBuffer<'a>,
    offset: usize,
}

impl Iterator for Instructions<'_> {
    type Item = (usize, u32, Instruction);

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.offset;
        let raw = self.code.word_at(offset)?;
        self.offset += INSN_SIZE;
        Some((offset, raw, decode(raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BYTES: [u8; 10] = [0x1f, 0x20, 0x03, 0xd5, 0x3f, 0x23, 0x03, 0xd5, 0xfd, 0x7b];

    #[test]
    fn test_word_at() {
        let code = CodeBuffer::new(&BYTES, 0xffff_8000_082b_14d0);
        assert_eq!(code.word_at(0), Some(0xD503201F));
        assert_eq!(code.word_at(4), Some(0xD503233F));
        // Unaligned reads are allowed; the caller picks the offset.
        assert_eq!(code.word_at(1), Some(0x3FD50320));
        // Partial trailing word
        assert_eq!(code.word_at(8), None);
        assert_eq!(code.word_at(usize::MAX), None);
    }

    #[test]
    fn test_address_of() {
        let code = CodeBuffer::new(&BYTES, 0xffff_8000_082b_14d0);
        assert_eq!(code.address_of(8), 0xffff_8000_082b_14d8);
        let wrap = CodeBuffer::new(&BYTES, u64::MAX);
        assert_eq!(wrap.address_of(1), 0);
    }

    #[test]
    fn test_instructions_stop_at_partial_word() {
        let code = CodeBuffer::new(&BYTES, 0);
        let insns: Vec<_> = code.instructions(0).collect();
        assert_eq!(insns.len(), 2);
        assert!(matches!(insns[0], (0, 0xD503201F, Instruction::Nop)));
        assert!(matches!(insns[1], (4, _, Instruction::Hint { imm: 25 })));
        assert!(code.instructions(100).next().is_none());
    }

    #[test]
    fn test_empty() {
        let code = CodeBuffer::new(&[], 0);
        assert!(code.is_empty());
        assert_eq!(code.decode_at(0), None);
    }
}
