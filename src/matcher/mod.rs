//! # Matcher
//!
//! This module covers patterns, which locate fixed-shape runs of instructions and capture their operands

use std::collections::HashMap;

use crate::code::{Instruction, OpCode, Operand, OperandKind};

/// Operands captured while matching, keyed by capture name.
///
/// Captures outlive the pass that produced them so later passes can reuse them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Captures(HashMap<String, Operand>);
impl Captures {
    /// Creates an empty capture set
    pub fn new() -> Self {
        Self::default()
    }
    /// Looks up a capture by name
    pub fn get(&self, name: &str) -> Option<&Operand> {
        self.0.get(name)
    }
    /// Binds a capture, replacing any previous binding with the same name
    pub fn insert(&mut self, name: impl Into<String>, operand: Operand) {
        self.0.insert(name.into(), operand);
    }
    /// Merges `other` into this set
    pub fn extend(&mut self, other: Captures) {
        self.0.extend(other.0);
    }
    /// Number of bound captures
    pub fn len(&self) -> usize {
        self.0.len()
    }
    /// Whether nothing has been captured
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Constraint on the operand of a matched instruction
#[derive(Debug, Clone, PartialEq)]
pub enum OperandMatch {
    /// Any operand, or none
    Any,
    /// Exactly this operand
    Exact(Operand),
    /// The operand bound to a capture, either earlier in this pattern or by a previous pass
    Captured(String),
    /// Binds the operand to `name`.
    ///
    /// Matches like [`OperandMatch::Any`] while scanning; `kind` is checked once a match is selected.
    Capture {
        /// Capture name
        name: String,
        /// Required operand kind
        kind: Option<OperandKind>,
    },
}

/// Constraint on one instruction of a pattern
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionMatch {
    /// Required opcode
    pub opcode: OpCode,
    /// Operand constraint
    pub operand: OperandMatch,
}
impl InstructionMatch {
    /// Matches `opcode` with any operand
    pub fn op(opcode: OpCode) -> Self {
        Self {
            opcode,
            operand: OperandMatch::Any,
        }
    }
    /// Matches `opcode` with exactly `operand`
    pub fn exact(opcode: OpCode, operand: Operand) -> Self {
        Self {
            opcode,
            operand: OperandMatch::Exact(operand),
        }
    }
    /// Matches `opcode` whose operand equals the capture `name`
    pub fn captured(opcode: OpCode, name: impl Into<String>) -> Self {
        Self {
            opcode,
            operand: OperandMatch::Captured(name.into()),
        }
    }
    /// Matches `opcode` and binds its operand to `name`, which must be of `kind`
    pub fn capture(opcode: OpCode, name: impl Into<String>, kind: OperandKind) -> Self {
        Self {
            opcode,
            operand: OperandMatch::Capture {
                name: name.into(),
                kind: Some(kind),
            },
        }
    }

    /// Tests a single instruction. `bound` holds captures visible at this point.
    fn matches(&self, instr: &Instruction, bound: &Captures, local: &Captures) -> bool {
        if instr.opcode != self.opcode {
            return false;
        }
        match &self.operand {
            OperandMatch::Any | OperandMatch::Capture { .. } => true,
            OperandMatch::Exact(expected) => instr.operand.as_ref() == Some(expected),
            OperandMatch::Captured(name) => {
                match local.get(name).or_else(|| bound.get(name)) {
                    Some(expected) => instr.operand.as_ref() == Some(expected),
                    None => false,
                }
            }
        }
    }
}

/// A capture whose operand was not of the required kind
#[derive(Debug, Clone, PartialEq)]
pub struct KindMismatch {
    /// Capture name
    pub capture: String,
    /// Kind the pattern demanded, `None` if any operand would have done
    pub expected: Option<OperandKind>,
    /// Kind of the operand actually found, `None` if the instruction had no operand
    pub found: Option<OperandKind>,
}

/// A located match
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Index of the first matched instruction
    pub start: usize,
    /// Number of matched instructions
    pub len: usize,
    /// Captures bound by this match
    pub captures: Captures,
}

/// Ordered run of instruction constraints
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern(Vec<InstructionMatch>);
impl Pattern {
    /// Creates a pattern from its elements
    pub fn new(elements: Vec<InstructionMatch>) -> Self {
        Self(elements)
    }
    /// Pattern elements, in order
    pub fn elements(&self) -> &[InstructionMatch] {
        &self.0
    }
    /// Number of instructions a match spans
    pub fn len(&self) -> usize {
        self.0.len()
    }
    /// Whether the pattern has no elements
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Finds the first match starting at or after `from`.
    ///
    /// The first match wins. Kind requirements of its captures are validated afterwards;
    /// a wrong kind is reported instead of moving on to a later occurrence.
    pub fn find(
        &self,
        instructions: &[Instruction],
        from: usize,
        bound: &Captures,
    ) -> Option<Result<Match, KindMismatch>> {
        if self.0.is_empty() || instructions.len() < self.0.len() {
            return None;
        }
        (from..=instructions.len() - self.0.len())
            .find_map(|start| self.match_at(instructions, start, bound))
            .map(|m| self.validate(instructions, m))
    }

    /// Attempts a match at exactly `start`
    fn match_at(&self, instructions: &[Instruction], start: usize, bound: &Captures) -> Option<Match> {
        let mut local = Captures::new();
        for (element, instr) in self.0.iter().zip(&instructions[start..]) {
            if !element.matches(instr, bound, &local) {
                return None;
            }
            if let OperandMatch::Capture { name, .. } = &element.operand {
                if let Some(operand) = &instr.operand {
                    local.insert(name.clone(), operand.clone());
                }
            }
        }
        Some(Match {
            start,
            len: self.0.len(),
            captures: local,
        })
    }

    /// Checks the kind requirement of every capture in a selected match
    fn validate(&self, instructions: &[Instruction], m: Match) -> Result<Match, KindMismatch> {
        for (element, instr) in self.0.iter().zip(&instructions[m.start..]) {
            if let OperandMatch::Capture { name, kind } = &element.operand {
                let found = instr.operand.as_ref().map(Operand::kind);
                let accepted = match kind {
                    Some(expected) => found == Some(*expected),
                    None => found.is_some(),
                };
                if !accepted {
                    return Err(KindMismatch {
                        capture: name.clone(),
                        expected: *kind,
                        found,
                    });
                }
            }
        }
        Ok(m)
    }
}
impl From<Vec<InstructionMatch>> for Pattern {
    fn from(elements: Vec<InstructionMatch>) -> Self {
        Self::new(elements)
    }
}
