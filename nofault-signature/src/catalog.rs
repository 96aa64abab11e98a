// SPDX-FileCopyrightText: 2025 nofault contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Known compiled shapes of arm64 `copy_from_user_nofault`.
//!
//! The fixed kernel clamps the user range before touching it:
//!
//! ```text
//! mov  LIMIT, #TASK_SIZE_MAX
//! cmp  SIZE, LIMIT
//! b.hi fail
//! sub  LIMIT, LIMIT, SIZE
//! cmp  SRC, LIMIT        (or cmp LIMIT, SRC)
//! b.ls fail              (or b.lo)
//! ```
//!
//! Older kernels go straight to the per-task uaccess checks instead. Each
//! entry below is one compiler's rendering of one of these shapes.
//!
//! Entries are append-only. A new toolchain output gets a new signature;
//! existing ones are never edited, so verdicts already verified against real
//! captures cannot regress.

use std::sync::OnceLock;

use nofault_common::Verdict;
use nofault_cpu::decoder::SYSREG_SP_EL0;
use nofault_cpu::{Condition, Family};

use crate::matcher::{Imm, InsnPattern, Matcher, Reg};

/// Bumped whenever a signature is appended.
pub const CATALOG_VERSION: u32 = 1;

/// Largest user address + 1 with 48-bit VAs (`TASK_SIZE_MAX`).
pub const USER_ADDR_LIMIT: u64 = 1 << 48;

/// Most prologue instructions a single skip step may pass over.
pub const PROLOGUE_SKIP_MAX: usize = 16;

const SP: u8 = 31;
const FP: u8 = 29;

// Binding names
const LIMIT: &str = "limit";
const SIZE: &str = "size";
const SRC: &str = "src";
const TASK: &str = "task";
const FLAGS: &str = "flags";
const TI_FLAGS: &str = "ti_flags";

/// A named template for one compiled shape, tagged with its verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: &'static str,
    /// Where the shape was observed.
    pub source: &'static str,
    pub verdict: Verdict,
    pub matchers: Vec<Matcher>,
}

impl Signature {
    /// Number of steps that must each consume an instruction.
    pub fn required_len(&self) -> usize {
        self.matchers.iter().filter(|m| !m.is_optional()).count()
    }
}

/// The process-wide catalog, built on first use and read-only afterwards.
pub fn all_signatures() -> &'static [Signature] {
    static CATALOG: OnceLock<Vec<Signature>> = OnceLock::new();
    CATALOG.get_or_init(build_catalog)
}

fn build_catalog() -> Vec<Signature> {
    vec![gcc_clamp_recheck(), llvm_clamp_recheck(), gcc_task_flag_check()]
}

// ---------------------------------------------------------------------------
// Template helpers
// ---------------------------------------------------------------------------

fn insn(p: InsnPattern) -> Matcher {
    Matcher::Insn(p)
}

/// Frame setup, argument shuffling and PAC/BTI markers that vary between
/// toolchains and configs.
fn prologue() -> Matcher {
    Matcher::Skip {
        any_of: vec![
            InsnPattern::new(Family::Nop),
            InsnPattern::new(Family::Hint),
            InsnPattern::new(Family::StorePair).regs([Reg::Any, Reg::Any, Reg::Is(SP)]),
            InsnPattern::new(Family::Store).regs([Reg::Any, Reg::Is(SP)]),
            InsnPattern::new(Family::AddImm).regs([Reg::Is(FP), Reg::Is(SP)]).imm(Imm::Is(0)),
            InsnPattern::new(Family::MovReg),
        ],
        max: PROLOGUE_SKIP_MAX,
    }
}

fn load_limit() -> Matcher {
    insn(InsnPattern::new(Family::MovImm).wide().regs([Reg::Bind(LIMIT)]).imm(Imm::Is(USER_ADDR_LIMIT)))
}

/// X-register compare only.
fn cmp(rn: Reg, rm: Reg) -> Matcher {
    insn(InsnPattern::new(Family::Cmp).wide().regs([rn, rm]))
}

fn b_cond(conds: &'static [Condition]) -> Matcher {
    insn(InsnPattern::new(Family::BCond).cond(conds))
}

fn shrink_limit() -> Matcher {
    insn(InsnPattern::new(Family::Sub).wide().regs([Reg::Bind(LIMIT), Reg::Bind(LIMIT), Reg::Bind(SIZE)]))
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

fn gcc_clamp_recheck() -> Signature {
    Signature {
        name: "gcc-clamp-recheck",
        source: "Debian 6.1.0-13-arm64; Amazon Linux 6.1.59-84.139.amzn2023",
        verdict: Verdict::Patched,
        matchers: vec![
            prologue(),
            load_limit(),
            cmp(Reg::Bind(SIZE), Reg::Bind(LIMIT)),
            b_cond(&[Condition::Hi]),
            shrink_limit(),
            Matcher::Optional(InsnPattern::new(Family::MovReg)),
            cmp(Reg::Bind(SRC), Reg::Bind(LIMIT)),
            b_cond(&[Condition::Ls]),
        ],
    }
}

fn llvm_clamp_recheck() -> Signature {
    Signature {
        name: "llvm-clamp-recheck",
        source: "Linux 6.5.11, LLVM 17",
        verdict: Verdict::Patched,
        matchers: vec![
            prologue(),
            load_limit(),
            // -EFAULT preloaded into the return register
            Matcher::Optional(InsnPattern::new(Family::MovImm)),
            cmp(Reg::Bind(SIZE), Reg::Bind(LIMIT)),
            b_cond(&[Condition::Hi]),
            shrink_limit(),
            cmp(Reg::Bind(LIMIT), Reg::Bind(SRC)),
            b_cond(&[Condition::Lo]),
        ],
    }
}

fn gcc_task_flag_check() -> Signature {
    Signature {
        name: "gcc-task-flag-check",
        source: "Debian 5.19.0-0.deb11.2-cloud-arm64",
        verdict: Verdict::Unpatched,
        matchers: vec![
            prologue(),
            insn(InsnPattern::new(Family::Mrs).regs([Reg::Bind(TASK)]).imm(Imm::Is(SYSREG_SP_EL0 as u64))),
            prologue(),
            insn(InsnPattern::new(Family::Load).regs([Reg::Bind(FLAGS), Reg::Bind(TASK)])),
            insn(InsnPattern::new(Family::Tbnz).regs([Reg::Bind(FLAGS)])),
            insn(InsnPattern::new(Family::Load).regs([Reg::Bind(TI_FLAGS), Reg::Bind(TASK)]).imm(Imm::Is(0))),
            insn(InsnPattern::new(Family::Tst).regs([Reg::Bind(TI_FLAGS)])),
            b_cond(&[Condition::Ne]),
        ],
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_catalog_is_built_once() {
        let a = all_signatures();
        let b = all_signatures();
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<_> = all_signatures().iter().map(|s| s.name).collect();
        assert_eq!(names.len(), all_signatures().len());
    }

    #[test]
    fn test_every_signature_has_required_steps() {
        for sig in all_signatures() {
            assert!(sig.required_len() >= 4, "{} is too loose", sig.name);
            // Never starts with a step that could match anywhere.
            let first_required = sig.matchers.iter().find(|m| !m.is_optional());
            assert!(
                !matches!(first_required, Some(Matcher::Insn(p)) if p.family() == Family::Unknown),
                "{}",
                sig.name
            );
        }
    }

    #[test]
    fn test_both_verdicts_represented() {
        let sigs = all_signatures();
        assert!(sigs.iter().any(|s| s.verdict == Verdict::Patched));
        assert!(sigs.iter().any(|s| s.verdict == Verdict::Unpatched));
    }

    #[test]
    fn test_patched_signatures_load_the_limit() {
        for sig in all_signatures().iter().filter(|s| s.verdict.is_patched()) {
            assert!(sig.matchers.contains(&load_limit()), "{}", sig.name);
            assert!(sig.matchers.contains(&shrink_limit()), "{}", sig.name);
        }
    }

    #[test]
    fn test_required_len() {
        let sigs = all_signatures();
        assert_eq!(sigs[0].required_len(), 6);
        assert_eq!(sigs[1].required_len(), 6);
        assert_eq!(sigs[2].required_len(), 6);
    }
}
