// SPDX-FileCopyrightText: 2025 nofault contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Signature matching.
//!
//! Each signature is tried in catalog order against the instruction stream
//! at the start offset. Steps are consumed strictly left to right with no
//! backtracking; the first signature whose steps are all satisfied decides
//! the verdict. Anything else fails closed.

use log::{debug, info, trace, warn};

use nofault_common::{DetectError, MatchResult, NearMiss, INSN_SIZE};
use nofault_cpu::{CodeBuffer, Instruction};

use crate::catalog::{all_signatures, Signature};
use crate::matcher::{Bindings, Matcher};

/// Most instructions a single signature attempt may look at.
pub const MAX_LOOKAHEAD: usize = 64;

/// Classify `code` at byte offset `start` against the built-in catalog.
pub fn classify(code: &CodeBuffer<'_>, start: usize) -> Result<MatchResult, DetectError> {
    classify_with(code, start, all_signatures())
}

/// Classify against an explicit signature list. Order decides ties.
pub fn classify_with(
    code: &CodeBuffer<'_>,
    start: usize,
    signatures: &[Signature],
) -> Result<MatchResult, DetectError> {
    let mut closest: Option<(&Signature, Failure)> = None;
    let mut truncated: Option<(&Signature, Failure)> = None;

    for sig in signatures {
        match attempt(sig, code, start) {
            Ok(consumed) => {
                info!(
                    "0x{:016x}: matched `{}` ({}) after {} instruction(s)",
                    code.address_of(start),
                    sig.name,
                    sig.verdict,
                    consumed
                );
                return Ok(MatchResult { verdict: sig.verdict, signature: sig.name, consumed });
            }
            Err(failure) => {
                debug!(
                    "`{}` stopped at 0x{:016x} ({:?}) after {} step(s)",
                    sig.name,
                    code.address_of(failure.offset),
                    failure.stop,
                    failure.matched
                );
                let slot = match failure.stop {
                    Stop::Truncated => &mut truncated,
                    Stop::Mismatch | Stop::Lookahead => &mut closest,
                };
                // Strictly greater keeps the earliest signature on ties.
                if slot.as_ref().map_or(true, |(_, best)| failure.matched > best.matched) {
                    *slot = Some((sig, failure));
                }
            }
        }
    }

    let err = match truncated {
        Some((sig, failure)) => DetectError::Truncated {
            address: code.address_of(failure.offset),
            signature: sig.name,
            matched: failure.matched,
        },
        None => DetectError::Undetermined {
            address: code.address_of(start),
            closest: closest
                .filter(|(_, failure)| failure.matched > 0)
                .map(|(sig, failure)| failure.near_miss(sig, code)),
        },
    };
    warn!("{}", err);
    Err(err)
}

/// Why an attempt stopped short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Mismatch,
    Truncated,
    Lookahead,
}

#[derive(Debug, Clone, Copy)]
struct Failure {
    stop: Stop,
    /// Required steps satisfied before stopping.
    matched: usize,
    /// Byte offset of the instruction the attempt stopped on.
    offset: usize,
}

impl Failure {
    fn near_miss(&self, sig: &Signature, code: &CodeBuffer<'_>) -> NearMiss {
        let instruction = match code.decode_at(self.offset) {
            Some(insn) => insn.to_string(),
            None => String::from("<end of code>"),
        };
        NearMiss {
            signature: sig.name,
            matched: self.matched,
            address: code.address_of(self.offset),
            instruction,
        }
    }
}

/// Lazy position in the instruction stream for one attempt.
struct Cursor<'c, 'a> {
    code: &'c CodeBuffer<'a>,
    start: usize,
    consumed: usize,
}

impl<'c, 'a> Cursor<'c, 'a> {
    fn new(code: &'c CodeBuffer<'a>, start: usize) -> Self {
        Self { code, start, consumed: 0 }
    }

    fn offset(&self) -> usize {
        self.start.saturating_add(self.consumed * INSN_SIZE)
    }

    fn peek(&self) -> Result<Instruction, Stop> {
        if self.consumed >= MAX_LOOKAHEAD {
            return Err(Stop::Lookahead);
        }
        self.code.decode_at(self.offset()).ok_or(Stop::Truncated)
    }

    fn advance(&mut self) {
        self.consumed += 1;
    }

    fn fail(&self, stop: Stop, matched: usize) -> Failure {
        Failure { stop, matched, offset: self.offset() }
    }
}

/// Run one signature. Returns the number of instructions consumed on a full
/// match.
fn attempt(sig: &Signature, code: &CodeBuffer<'_>, start: usize) -> Result<usize, Failure> {
    let mut cursor = Cursor::new(code, start);
    let mut bindings = Bindings::default();
    let mut matched = 0;

    for step in &sig.matchers {
        match step {
            Matcher::Insn(pattern) => {
                let insn = cursor.peek().map_err(|stop| cursor.fail(stop, matched))?;
                trace!("{}: 0x{:016x}  {}", sig.name, code.address_of(cursor.offset()), insn);
                bindings = pattern
                    .apply(&insn, &bindings)
                    .ok_or_else(|| cursor.fail(Stop::Mismatch, matched))?;
                cursor.advance();
                matched += 1;
            }
            Matcher::Optional(pattern) => {
                // Running out here is reported by the next required step.
                if let Ok(insn) = cursor.peek() {
                    if let Some(next) = pattern.apply(&insn, &bindings) {
                        trace!("{}: 0x{:016x}  {} (optional)", sig.name, code.address_of(cursor.offset()), insn);
                        bindings = next;
                        cursor.advance();
                    }
                }
            }
            Matcher::Skip { any_of, max } => {
                for _ in 0..*max {
                    let Ok(insn) = cursor.peek() else { break };
                    let Some(next) = any_of.iter().find_map(|p| p.apply(&insn, &bindings)) else {
                        break;
                    };
                    trace!("{}: 0x{:016x}  {} (skipped)", sig.name, code.address_of(cursor.offset()), insn);
                    bindings = next;
                    cursor.advance();
                }
            }
        }
    }

    Ok(cursor.consumed)
}
