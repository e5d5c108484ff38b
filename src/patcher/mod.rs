//! # Patcher
//!
//! This module covers the transpiler, which rewrites an instruction sequence by applying patch passes in order.
//!
//! Passes never panic on a body that doesn't have the expected shape. The first pass that can't be applied stops the run
//! and is reported as a [`PatchFailure`], leaving the caller to decide between the original and the partially patched body.

pub mod pass;

use log::{debug, warn};
use thiserror::Error;

use crate::code::{net_stack_effect, Instruction, OperandKind};
use crate::matcher::{Captures, KindMismatch, OperandMatch};

pub use self::pass::{Emit, PatchPass, Replacement};

/// Errors in the definition of a transpiler. These are bugs in the pass list, not in the patched body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// A pass with nothing to match
    #[error("stage {stage} ({label}) has an empty pattern")]
    EmptyPattern {
        /// 1-based position of the pass
        stage: usize,
        /// Label of the pass
        label: String,
    },
    /// A capture referenced before any pattern binds it
    #[error("stage {stage} ({label}) uses capture `{capture}` before it is bound")]
    UnboundCapture {
        /// 1-based position of the pass
        stage: usize,
        /// Label of the pass
        label: String,
        /// Name of the capture
        capture: String,
    },
}

/// Describes an optional operand kind for error messages
fn describe(kind: &Option<OperandKind>) -> String {
    match kind {
        Some(kind) => kind.to_string(),
        None => "no operand".into(),
    }
}

/// Describes a required operand kind for error messages
fn expectation(kind: &Option<OperandKind>) -> String {
    match kind {
        Some(kind) => kind.to_string(),
        None => "an operand".into(),
    }
}

/// Why a pass couldn't be applied
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FailureReason {
    /// No region of the body matched the pattern
    #[error("pattern not found")]
    NotFound,
    /// The first match captured an operand of the wrong kind
    #[error("operand captured as `{capture}` was {} instead of {}", describe(.found), expectation(.expected))]
    OperandKind {
        /// Name of the capture
        capture: String,
        /// Kind the pattern required, `None` for any operand
        expected: Option<OperandKind>,
        /// Kind found in the body, `None` if there was no operand
        found: Option<OperandKind>,
    },
}
impl From<KindMismatch> for FailureReason {
    fn from(m: KindMismatch) -> Self {
        Self::OperandKind {
            capture: m.capture,
            expected: m.expected,
            found: m.found,
        }
    }
}

/// A pass that couldn't be applied
#[derive(Debug, Error, Clone, PartialEq)]
#[error("failed to apply transpiler (stage {stage}, {label}): {reason}")]
pub struct PatchFailure {
    /// 1-based position of the failing pass
    pub stage: usize,
    /// Label of the failing pass
    pub label: String,
    /// What went wrong
    pub reason: FailureReason,
}
impl PatchFailure {
    /// Creates a failure report for the pass at `index`
    fn new(index: usize, pass: &PatchPass, reason: FailureReason) -> Self {
        Self {
            stage: index + 1,
            label: pass.label.clone(),
            reason,
        }
    }
}

/// Result of running a transpiler
#[derive(Debug, Clone, PartialEq)]
pub struct Transpiled {
    /// The body after every applied pass. On failure this holds the passes before the failing one, and nothing of it.
    pub instructions: Vec<Instruction>,
    /// Number of passes applied
    pub applied: usize,
    /// Captures bound by the applied passes
    pub captures: Captures,
    /// The pass that stopped the run, if any
    pub failure: Option<PatchFailure>,
}
impl Transpiled {
    /// Whether every pass was applied
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// Returns the rewritten body, or the failure that stopped the run
    pub fn into_result(self) -> Result<Vec<Instruction>, PatchFailure> {
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(self.instructions),
        }
    }
}

/// An ordered list of patch passes applied to one target
#[derive(Debug, Clone, PartialEq)]
pub struct Transpiler {
    /// Name used to prefix log messages
    name: String,
    /// Passes, in application order
    passes: Vec<PatchPass>,
}
impl Transpiler {
    /// Creates a transpiler, checking that every pass has a pattern and that every capture is bound before it's used
    pub fn new(name: impl Into<String>, passes: Vec<PatchPass>) -> Result<Self, DefinitionError> {
        let mut bound: Vec<&str> = Vec::new();
        for (index, pass) in passes.iter().enumerate() {
            let unbound = |capture: &str| DefinitionError::UnboundCapture {
                stage: index + 1,
                label: pass.label.clone(),
                capture: capture.to_string(),
            };
            if pass.pattern.is_empty() {
                return Err(DefinitionError::EmptyPattern {
                    stage: index + 1,
                    label: pass.label.clone(),
                });
            }
            for element in pass.pattern.elements() {
                match &element.operand {
                    OperandMatch::Captured(name) if !bound.contains(&name.as_str()) => {
                        return Err(unbound(name))
                    }
                    OperandMatch::Capture { name, .. } => bound.push(name.as_str()),
                    _ => {}
                }
            }
            if let Replacement::Template(emits) = &pass.replacement {
                for emit in emits {
                    if let Emit::Captured { capture, .. } = emit {
                        if !bound.contains(&capture.as_str()) {
                            return Err(unbound(capture));
                        }
                    }
                }
            }
        }
        Ok(Self {
            name: name.into(),
            passes,
        })
    }

    /// Name of this transpiler
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Passes, in application order
    pub fn passes(&self) -> &[PatchPass] {
        &self.passes
    }

    /// Applies every pass in order, stopping at the first one that can't be applied.
    ///
    /// Each pass takes the first match at or after the end of the region the previous pass produced,
    /// so a pass never matches inside instructions inserted before it.
    pub fn run(&self, original: &[Instruction]) -> Transpiled {
        let mut instructions = original.to_vec();
        let mut captures = Captures::new();
        let mut cursor = 0;

        for (index, pass) in self.passes.iter().enumerate() {
            let stop =
                |instructions: Vec<Instruction>, captures: Captures, reason: FailureReason| {
                    Transpiled {
                        instructions,
                        applied: index,
                        captures,
                        failure: Some(PatchFailure::new(index, pass, reason)),
                    }
                };

            let found = match pass.pattern.find(&instructions, cursor, &captures) {
                Some(Ok(found)) => found,
                Some(Err(mismatch)) => return stop(instructions, captures, mismatch.into()),
                None => return stop(instructions, captures, FailureReason::NotFound),
            };

            let region = found.start..found.start + found.len;
            let mut visible = captures.clone();
            visible.extend(found.captures.clone());
            let matched = &instructions[region.clone()];
            let replacement = match pass.replacement.instantiate(matched, &visible) {
                Some(replacement) => replacement,
                None => unreachable!(
                    "stage {} ({}) references a capture that is not bound",
                    index + 1,
                    pass.label
                ),
            };
            if let (Some(before), Some(after)) =
                (net_stack_effect(matched), net_stack_effect(&replacement))
            {
                debug_assert_eq!(
                    before,
                    after,
                    "stage {} ({}) changes the stack depth",
                    index + 1,
                    pass.label
                );
            }

            debug!(
                "{}: stage {} ({}) replaced {} instructions at {} with {}",
                self.name,
                index + 1,
                pass.label,
                found.len,
                found.start,
                replacement.len()
            );
            cursor = found.start + replacement.len();
            instructions.splice(region, replacement);
            captures = visible;
        }

        Transpiled {
            instructions,
            applied: self.passes.len(),
            captures,
            failure: None,
        }
    }

    /// Applies every pass, returning the rewritten body or the first failure
    pub fn apply(&self, original: &[Instruction]) -> Result<Vec<Instruction>, PatchFailure> {
        self.run(original).into_result()
    }

    /// Applies every pass, falling back to `original` with a warning if any pass fails
    pub fn apply_or_original(&self, original: Vec<Instruction>) -> Vec<Instruction> {
        match self.apply(&original) {
            Ok(patched) => patched,
            Err(failure) => {
                warn!("{}: {}", self.name, failure);
                original
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{CallableRef, LocalSlot, OpCode, Operand};
    use crate::matcher::InstructionMatch;

    /// `String.Concat(string, string)`
    fn concat() -> CallableRef {
        CallableRef::new("System.String", "Concat", 2, true)
    }

    /// Callback taking the label and a slot
    fn callback() -> CallableRef {
        CallableRef::new("Callbacks", "Suffix", 2, true)
    }

    /// A body storing a value to slot 5, then concatenating `" "` twice
    fn body() -> Vec<Instruction> {
        vec![
            Instruction::load_arg(0),
            Instruction::store_local(5),
            Instruction::load_local(0),
            Instruction::load_str(" "),
            Instruction::call(concat()),
            Instruction::store_local(0),
            Instruction::load_local(0),
            Instruction::load_str(" "),
            Instruction::call(concat()),
            Instruction::new(OpCode::Return),
        ]
    }

    /// Captures slot 5, then replaces the first `" "` concat with a call using it
    fn transpiler() -> Transpiler {
        Transpiler::new(
            "test",
            vec![
                PatchPass::capture(
                    "store",
                    vec![
                        InstructionMatch::op(OpCode::LoadArg),
                        InstructionMatch::capture(OpCode::StoreLocal, "slot", OperandKind::Local),
                    ],
                ),
                PatchPass::replace(
                    "space",
                    vec![
                        InstructionMatch::exact(OpCode::LoadLocal, Operand::Local(LocalSlot(0))),
                        InstructionMatch::exact(OpCode::LoadString, Operand::str(" ")),
                        InstructionMatch::exact(OpCode::Call, Operand::Callable(concat())),
                    ],
                    vec![
                        Instruction::load_local(0).into(),
                        Emit::captured(OpCode::LoadLocal, "slot"),
                        Instruction::call(callback()).into(),
                    ],
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    /// All passes apply, and only the first occurrence is replaced
    fn test_apply() {
        let patched = transpiler().apply(&body()).unwrap();

        let mut expected = body();
        expected.splice(
            2..5,
            [
                Instruction::load_local(0),
                Instruction::load_local(5),
                Instruction::call(callback()),
            ],
        );
        assert_eq!(patched, expected);

        // the replacement keeps the stack depth of what it replaced
        assert_eq!(net_stack_effect(&body()[2..5]), net_stack_effect(&patched[2..5]));
    }

    #[test]
    /// The same input always gives the same output
    fn test_deterministic() {
        let transpiler = transpiler();
        let first = transpiler.run(&body());
        let second = transpiler.run(&body());
        assert_eq!(first, second);
        assert!(first.is_complete());
        assert_eq!(first.applied, 2);
        assert_eq!(
            first.captures.get("slot"),
            Some(&Operand::Local(LocalSlot(5)))
        );
    }

    #[test]
    /// A missing third opcode fails the pass that needs it and leaves the body alone
    fn test_not_found() {
        let mut original = body();
        // drop both concat calls
        original.retain(|i| i.opcode != OpCode::Call);

        let result = transpiler().run(&original);
        assert_eq!(result.applied, 1);
        assert_eq!(result.instructions, original);
        let failure = result.failure.unwrap();
        assert_eq!(failure.stage, 2);
        assert_eq!(failure.label, "space");
        assert_eq!(failure.reason, FailureReason::NotFound);
        assert_eq!(
            failure.to_string(),
            "failed to apply transpiler (stage 2, space): pattern not found"
        );

        // fall back to the original
        assert_eq!(transpiler().apply_or_original(original.clone()), original);
    }

    #[test]
    /// A capture of the wrong kind aborts instead of being used
    fn test_wrong_kind() {
        let mut original = body();
        original[1] = Instruction::with(OpCode::StoreLocal, Operand::Argument(1));

        let err = transpiler().apply(&original).unwrap_err();
        assert_eq!(err.stage, 1);
        assert_eq!(
            err.reason,
            FailureReason::OperandKind {
                capture: "slot".into(),
                expected: Some(OperandKind::Local),
                found: Some(OperandKind::Argument),
            }
        );
        assert_eq!(
            err.reason.to_string(),
            "operand captured as `slot` was argument instead of local slot"
        );
    }

    #[test]
    /// Later passes don't match inside instructions an earlier pass inserted
    fn test_cursor_after_insert() {
        let rename = |from: &str, to: &str| {
            PatchPass::replace(
                format!("{} to {}", from, to),
                vec![InstructionMatch::exact(OpCode::LoadString, Operand::str(from))],
                vec![Instruction::load_str(to).into()],
            )
        };
        let transpiler =
            Transpiler::new("test", vec![rename("a", "b"), rename("b", "c")]).unwrap();

        // the only "b" is the one the first pass inserted
        let err = transpiler
            .apply(&[Instruction::load_str("a"), Instruction::new(OpCode::Nop)])
            .unwrap_err();
        assert_eq!(err.stage, 2);

        // a "b" after the insertion is fair game
        let patched = transpiler
            .apply(&[Instruction::load_str("a"), Instruction::load_str("b")])
            .unwrap();
        assert_eq!(
            patched,
            [Instruction::load_str("b"), Instruction::load_str("c")]
        );
    }

    #[test]
    /// Later passes start after a capture-only pass's region
    fn test_cursor_after_keep() {
        let transpiler = Transpiler::new(
            "test",
            vec![
                PatchPass::capture(
                    "first",
                    vec![InstructionMatch::capture(OpCode::LoadLocal, "slot", OperandKind::Local)],
                ),
                PatchPass::replace(
                    "second",
                    vec![InstructionMatch::captured(OpCode::LoadLocal, "slot")],
                    vec![Instruction::load_local(9).into()],
                ),
            ],
        )
        .unwrap();

        let patched = transpiler
            .apply(&[
                Instruction::load_local(1),
                Instruction::load_local(2),
                Instruction::load_local(1),
            ])
            .unwrap();
        assert_eq!(
            patched,
            [
                Instruction::load_local(1),
                Instruction::load_local(2),
                Instruction::load_local(9),
            ]
        );
    }

    #[test]
    /// Definitions using captures before binding them are rejected
    fn test_definition_errors() {
        let err = Transpiler::new(
            "test",
            vec![PatchPass::replace(
                "early",
                vec![InstructionMatch::op(OpCode::Nop)],
                vec![Emit::captured(OpCode::LoadLocal, "slot")],
            )],
        )
        .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::UnboundCapture {
                stage: 1,
                label: "early".into(),
                capture: "slot".into(),
            }
        );

        let err = Transpiler::new(
            "test",
            vec![PatchPass::capture(
                "early",
                vec![InstructionMatch::captured(OpCode::LoadLocal, "slot")],
            )],
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::UnboundCapture { .. }));

        let err = Transpiler::new("test", vec![PatchPass::capture("empty", vec![])]).unwrap_err();
        assert!(matches!(err, DefinitionError::EmptyPattern { stage: 1, .. }));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "changes the stack depth")]
    /// Replacements that leave a different stack depth are caught in debug builds
    fn test_unbalanced_replacement() {
        let transpiler = Transpiler::new(
            "test",
            vec![PatchPass::replace(
                "drop",
                vec![InstructionMatch::op(OpCode::LoadLocal)],
                vec![Instruction::new(OpCode::Nop).into()],
            )],
        )
        .unwrap();
        let _ = transpiler.run(&[Instruction::load_local(1)]);
    }
}
