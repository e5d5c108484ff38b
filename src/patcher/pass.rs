//! This module contains patch passes, pairing a pattern with what replaces it

use crate::code::{Instruction, OpCode};
use crate::matcher::{Captures, Pattern};

/// One element of a replacement template
#[derive(Debug, Clone, PartialEq)]
pub enum Emit {
    /// Emit this instruction verbatim
    Instruction(Instruction),
    /// Emit `opcode` with the operand bound to `capture`
    Captured {
        /// Opcode of the emitted instruction
        opcode: OpCode,
        /// Capture supplying the operand
        capture: String,
    },
}
impl Emit {
    /// Shorthand for [`Emit::Captured`]
    pub fn captured(opcode: OpCode, capture: impl Into<String>) -> Self {
        Self::Captured {
            opcode,
            capture: capture.into(),
        }
    }
}
impl From<Instruction> for Emit {
    fn from(instr: Instruction) -> Self {
        Self::Instruction(instr)
    }
}

/// What a matched region is replaced with
#[derive(Debug, Clone, PartialEq)]
pub enum Replacement {
    /// Leave the region as it is. Used by passes that only exist to capture operands.
    Keep,
    /// Replace the region with the instantiated template
    Template(Vec<Emit>),
}
impl Replacement {
    /// Instantiates the replacement for a match of `matched`.
    ///
    /// Returns `None` if the template names a capture that isn't bound;
    /// [`super::Transpiler::new`] rules that out for passes it accepts.
    pub(crate) fn instantiate(
        &self,
        matched: &[Instruction],
        captures: &Captures,
    ) -> Option<Vec<Instruction>> {
        match self {
            Self::Keep => Some(matched.to_vec()),
            Self::Template(emits) => emits
                .iter()
                .map(|emit| match emit {
                    Emit::Instruction(instr) => Some(instr.clone()),
                    Emit::Captured { opcode, capture } => captures
                        .get(capture)
                        .map(|operand| Instruction::with(*opcode, operand.clone())),
                })
                .collect(),
        }
    }
}

/// A single match-and-replace step
#[derive(Debug, Clone, PartialEq)]
pub struct PatchPass {
    /// Human-readable label used when reporting failures
    pub label: String,
    /// Region to look for
    pub pattern: Pattern,
    /// What the region becomes
    pub replacement: Replacement,
}
impl PatchPass {
    /// Creates a pass replacing the first match of `pattern` with `template`
    pub fn replace(
        label: impl Into<String>,
        pattern: impl Into<Pattern>,
        template: Vec<Emit>,
    ) -> Self {
        Self {
            label: label.into(),
            pattern: pattern.into(),
            replacement: Replacement::Template(template),
        }
    }

    /// Creates a pass that only captures operands from the first match of `pattern`
    pub fn capture(label: impl Into<String>, pattern: impl Into<Pattern>) -> Self {
        Self {
            label: label.into(),
            pattern: pattern.into(),
            replacement: Replacement::Keep,
        }
    }
}
