// SPDX-FileCopyrightText: 2025 nofault contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Decides whether a kernel's `copy_from_user_nofault` carries the
//! user-range clamp by matching its machine code against known compiled
//! shapes.
//!
//! No match is never a verdict: every failure comes back as a
//! [`DetectError`] and callers must treat the kernel as unpatched.

pub mod catalog;
pub mod engine;
pub mod matcher;

#[cfg(test)]
mod fixtures;

use nofault_common::{DetectError, MatchResult, VAddr};
use nofault_cpu::CodeBuffer;

pub use catalog::{all_signatures, Signature, CATALOG_VERSION};
pub use engine::{classify, classify_with, MAX_LOOKAHEAD};

/// Architecture-specific classifier.
///
/// Implementations hold no per-call state and may be shared across threads.
pub trait PatchDetector: Send + Sync {
    /// Short architecture name, e.g. `"arm64"`.
    fn arch(&self) -> &'static str;

    fn classify(&self, code: &CodeBuffer<'_>, start: usize) -> Result<MatchResult, DetectError>;
}

/// The A64 detector backed by the built-in catalog.
#[derive(Debug, Default, Clone, Copy)]
pub struct Arm64Detector;

impl PatchDetector for Arm64Detector {
    fn arch(&self) -> &'static str {
        "arm64"
    }

    fn classify(&self, code: &CodeBuffer<'_>, start: usize) -> Result<MatchResult, DetectError> {
        engine::classify(code, start)
    }
}

/// Three-argument form of [`classify`] starting at offset 0.
///
/// `fault_func_addr` only labels diagnostics. `check_func_addr` has no use
/// on arm64 and is ignored.
pub fn copy_from_user_nofault_is_patched(
    code: &[u8],
    fault_func_addr: VAddr,
    _check_func_addr: VAddr,
) -> Result<bool, DetectError> {
    let code = CodeBuffer::new(code, fault_func_addr);
    classify(&code, 0).map(|result| result.verdict.is_patched())
}
