// SPDX-FileCopyrightText: 2025 nofault contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Classification failures.
//!
//! Every variant means "no verdict": callers must treat the kernel's
//! `copy_from_user_nofault` as unsafe when they see any of them.

use std::fmt;

use thiserror::Error;

use crate::types::VAddr;

/// The catalog entry that got furthest before failing, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearMiss {
    pub signature: &'static str,
    /// Number of matchers the signature satisfied before stopping.
    pub matched: usize,
    /// Address of the instruction the signature stopped on.
    pub address: VAddr,
    /// Disassembly of that instruction.
    pub instruction: String,
}

impl fmt::Display for NearMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "closest signature `{}` matched {} step(s), stopped at 0x{:016x}: {}",
            self.signature, self.matched, self.address, self.instruction
        )
    }
}

/// Why no verdict could be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectError {
    #[error("no signature matched code at 0x{address:016x}{}", fmt_closest(.closest))]
    Undetermined {
        address: VAddr,
        closest: Option<NearMiss>,
    },

    #[error(
        "code ends at 0x{address:016x} before signature `{signature}` could finish \
         ({matched} step(s) matched)"
    )]
    Truncated {
        address: VAddr,
        signature: &'static str,
        matched: usize,
    },
}

impl DetectError {
    /// All failures are undetermined outcomes; truncation only differs in
    /// the detail it reports.
    #[inline]
    pub const fn is_undetermined(&self) -> bool {
        true
    }

    #[inline]
    pub const fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }

    /// Best partial match, if any signature got past its first step.
    pub fn near_miss(&self) -> Option<&NearMiss> {
        match self {
            Self::Undetermined { closest, .. } => closest.as_ref(),
            Self::Truncated { .. } => None,
        }
    }
}

fn fmt_closest(closest: &Option<NearMiss>) -> String {
    match closest {
        Some(miss) => format!(" ({miss})"),
        None => String::new(),
    }
}
