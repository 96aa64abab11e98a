// SPDX-FileCopyrightText: 2025 nofault contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Pattern elements that signatures are built from.
//!
//! A [`Matcher`] never holds state. Testing one against a decoded instruction
//! takes the bindings collected so far and returns the extended set, or
//! `None` if the instruction does not fit or would rebind a name to a
//! different value.

use nofault_cpu::{Condition, Family, Instruction};

/// Constraint on one register operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    Any,
    /// A fixed register number (31 is SP or ZR, per operand slot).
    Is(u8),
    /// Whatever register sits here must be the same everywhere `name` is used.
    Bind(&'static str),
}

/// Constraint on the immediate operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Imm {
    Any,
    Is(u64),
    Bind(&'static str),
}

/// Constraint on the condition code of a conditional branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Any,
    OneOf(&'static [Condition]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Value {
    Reg(u8),
    Imm(u64),
}

/// Named values captured during one signature attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    vars: Vec<(&'static str, Value)>,
}

impl Bindings {
    pub fn reg(&self, name: &str) -> Option<u8> {
        match self.get(name)? {
            Value::Reg(r) => Some(r),
            Value::Imm(_) => None,
        }
    }

    pub fn imm(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            Value::Imm(v) => Some(v),
            Value::Reg(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.vars.iter().find(|(n, _)| *n == name).map(|&(_, v)| v)
    }

    /// Record `name = value`; false if `name` already holds something else.
    fn bind(&mut self, name: &'static str, value: Value) -> bool {
        match self.get(name) {
            Some(existing) => existing == value,
            None => {
                self.vars.push((name, value));
                true
            }
        }
    }
}

/// Constraints on a single decoded instruction.
///
/// Register constraints apply to [`Instruction::registers`] in order; an
/// instruction with more operands than constraints leaves the rest free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsnPattern {
    family: Family,
    regs: Vec<Reg>,
    imm: Imm,
    cond: Cond,
    wide: bool,
}

impl InsnPattern {
    pub fn new(family: Family) -> Self {
        Self { family, regs: Vec::new(), imm: Imm::Any, cond: Cond::Any, wide: false }
    }

    /// Only accept the 64-bit (X-register) form.
    pub fn wide(mut self) -> Self {
        self.wide = true;
        self
    }

    pub fn regs<const N: usize>(mut self, regs: [Reg; N]) -> Self {
        self.regs = regs.to_vec();
        self
    }

    pub fn imm(mut self, imm: Imm) -> Self {
        self.imm = imm;
        self
    }

    pub fn cond(mut self, conds: &'static [Condition]) -> Self {
        self.cond = Cond::OneOf(conds);
        self
    }

    pub fn family(&self) -> Family {
        self.family
    }

    /// Test `insn`, returning `bindings` extended with anything this pattern
    /// captures.
    pub fn apply(&self, insn: &Instruction, bindings: &Bindings) -> Option<Bindings> {
        if insn.family() != self.family {
            return None;
        }
        if self.wide && insn.is_64bit() != Some(true) {
            return None;
        }

        let operands = insn.registers();
        if self.regs.len() > operands.len() {
            return None;
        }

        let mut out = bindings.clone();
        for (want, &have) in self.regs.iter().zip(operands.iter()) {
            let ok = match *want {
                Reg::Any => true,
                Reg::Is(r) => r == have,
                Reg::Bind(name) => out.bind(name, Value::Reg(have)),
            };
            if !ok {
                return None;
            }
        }

        let imm_ok = match (self.imm, insn.immediate()) {
            (Imm::Any, _) => true,
            (Imm::Is(v), Some(have)) => v == have,
            (Imm::Bind(name), Some(have)) => out.bind(name, Value::Imm(have)),
            (_, None) => false,
        };
        if !imm_ok {
            return None;
        }

        let cond_ok = match (self.cond, insn.condition()) {
            (Cond::Any, _) => true,
            (Cond::OneOf(set), Some(c)) => set.contains(&c),
            (Cond::OneOf(_), None) => false,
        };
        cond_ok.then_some(out)
    }
}

/// One step of a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// The next instruction must satisfy the pattern.
    Insn(InsnPattern),
    /// Consumes the next instruction if it satisfies the pattern; otherwise
    /// the same instruction is offered to the following step.
    Optional(InsnPattern),
    /// Consumes up to `max` consecutive instructions that each satisfy one of
    /// `any_of`. Covers toolchain-dependent prologue noise.
    Skip { any_of: Vec<InsnPattern>, max: usize },
}

impl Matcher {
    /// True for steps that can be passed without consuming an instruction.
    pub fn is_optional(&self) -> bool {
        !matches!(self, Self::Insn(_))
    }
}
