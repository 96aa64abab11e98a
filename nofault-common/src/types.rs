// SPDX-FileCopyrightText: 2025 nofault contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;

/// Kernel virtual address (64-bit). Only used to label diagnostics.
pub type VAddr = u64;

/// Width of one A64 instruction word in bytes.
pub const INSN_SIZE: usize = 4;

/// Whether the captured `copy_from_user_nofault` body carries the
/// clamp-and-recheck bounds fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Patched,
    Unpatched,
}

impl Verdict {
    #[inline]
    pub const fn is_patched(self) -> bool {
        matches!(self, Self::Patched)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patched => f.write_str("patched"),
            Self::Unpatched => f.write_str("unpatched"),
        }
    }
}

/// Outcome of a successful classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub verdict: Verdict,
    /// Name of the catalog signature that matched.
    pub signature: &'static str,
    /// Instructions consumed from the start offset up to and including the
    /// last matched one.
    pub consumed: usize,
}
