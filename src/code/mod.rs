//! # Code
//!
//! This module covers the instruction model the transpiler operates on.
//!
//! Hosts translate their native encoding into [`Instruction`]s before patching and back again before installing,
//! so nothing in here knows about any particular runtime.

use std::fmt::{self, Display};

/// Operation vocabulary understood by the transpiler
#[allow(clippy::missing_docs_in_private_items)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Nop,
    LoadArg,
    LoadLocal,
    StoreLocal,
    LoadString,
    LoadInt,
    LoadFloat,
    ConvertFloat,
    ConvertInt,
    Add,
    Sub,
    Mul,
    Div,
    Dup,
    Pop,
    Call,
    CallVirtual,
    Return,
}
impl OpCode {
    /// Mnemonic used when displaying instructions
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Nop => "nop",
            Self::LoadArg => "ldarg",
            Self::LoadLocal => "ldloc",
            Self::StoreLocal => "stloc",
            Self::LoadString => "ldstr",
            Self::LoadInt => "ldc.i",
            Self::LoadFloat => "ldc.r",
            Self::ConvertFloat => "conv.r4",
            Self::ConvertInt => "conv.i4",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Dup => "dup",
            Self::Pop => "pop",
            Self::Call => "call",
            Self::CallVirtual => "callvirt",
            Self::Return => "ret",
        }
    }
}
impl Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A declared local variable slot of the function being patched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalSlot(pub u16);

/// Constant values carried inline by an instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// String constant
    Str(String),
    /// Integer constant
    Int(i64),
    /// Floating point constant
    Float(f64),
}

/// Reference to something callable by the host
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallableRef {
    /// Declaring type or module
    pub owner: String,
    /// Member name
    pub name: String,
    /// Number of stack values consumed by the call, receiver included
    pub arity: u8,
    /// Whether the call leaves a value on the stack
    pub returns: bool,
}
impl CallableRef {
    /// Creates a new callable reference
    pub fn new(owner: impl Into<String>, name: impl Into<String>, arity: u8, returns: bool) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            arity,
            returns,
        }
    }
}

/// The kind of an [`Operand`], used when a capture needs a specific referential type
#[allow(clippy::missing_docs_in_private_items)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Argument,
    Local,
    Literal,
    Callable,
}
impl Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Argument => "argument",
            Self::Local => "local slot",
            Self::Literal => "literal",
            Self::Callable => "callable",
        })
    }
}

/// Operand attached to an instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Argument index
    Argument(u16),
    /// Local variable slot
    Local(LocalSlot),
    /// Inline constant
    Literal(Literal),
    /// Call target
    Callable(CallableRef),
}
impl Operand {
    /// Shorthand for a string literal operand
    pub fn str(value: impl Into<String>) -> Self {
        Self::Literal(Literal::Str(value.into()))
    }

    /// Returns the kind of this operand
    pub fn kind(&self) -> OperandKind {
        match self {
            Self::Argument(_) => OperandKind::Argument,
            Self::Local(_) => OperandKind::Local,
            Self::Literal(_) => OperandKind::Literal,
            Self::Callable(_) => OperandKind::Callable,
        }
    }
}
impl Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argument(i) => write!(f, "arg_{}", i),
            Self::Local(LocalSlot(i)) => write!(f, "V_{}", i),
            Self::Literal(Literal::Str(s)) => write!(f, "{:?}", s),
            Self::Literal(Literal::Int(i)) => write!(f, "{}", i),
            Self::Literal(Literal::Float(v)) => write!(f, "{}", v),
            Self::Callable(c) => write!(f, "{}::{}", c.owner, c.name),
        }
    }
}

/// A single operation within a function body
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Operation to perform
    pub opcode: OpCode,
    /// Optional operand
    pub operand: Option<Operand>,
}
impl Instruction {
    /// Creates an instruction without an operand
    pub fn new(opcode: OpCode) -> Self {
        Self {
            opcode,
            operand: None,
        }
    }

    /// Creates an instruction with an operand
    pub fn with(opcode: OpCode, operand: Operand) -> Self {
        Self {
            opcode,
            operand: Some(operand),
        }
    }

    /// `ldarg <index>`
    pub fn load_arg(index: u16) -> Self {
        Self::with(OpCode::LoadArg, Operand::Argument(index))
    }

    /// `ldloc <slot>`
    pub fn load_local(slot: u16) -> Self {
        Self::with(OpCode::LoadLocal, Operand::Local(LocalSlot(slot)))
    }

    /// `stloc <slot>`
    pub fn store_local(slot: u16) -> Self {
        Self::with(OpCode::StoreLocal, Operand::Local(LocalSlot(slot)))
    }

    /// `ldstr <value>`
    pub fn load_str(value: impl Into<String>) -> Self {
        Self::with(OpCode::LoadString, Operand::str(value))
    }

    /// `call <target>`
    pub fn call(target: CallableRef) -> Self {
        Self::with(OpCode::Call, Operand::Callable(target))
    }

    /// `callvirt <target>`
    pub fn call_virtual(target: CallableRef) -> Self {
        Self::with(OpCode::CallVirtual, Operand::Callable(target))
    }

    /// Returns the number of values popped and pushed by this instruction.
    ///
    /// `None` means the effect depends on context this model doesn't carry.
    pub fn stack_effect(&self) -> Option<(u8, u8)> {
        match self.opcode {
            OpCode::Nop => Some((0, 0)),
            OpCode::LoadArg
            | OpCode::LoadLocal
            | OpCode::LoadString
            | OpCode::LoadInt
            | OpCode::LoadFloat => Some((0, 1)),
            OpCode::StoreLocal | OpCode::Pop => Some((1, 0)),
            OpCode::ConvertFloat | OpCode::ConvertInt => Some((1, 1)),
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => Some((2, 1)),
            OpCode::Dup => Some((1, 2)),
            OpCode::Call | OpCode::CallVirtual => match &self.operand {
                Some(Operand::Callable(c)) => Some((c.arity, c.returns as u8)),
                _ => None,
            },
            OpCode::Return => None,
        }
    }
}
impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(operand) => write!(f, "{} {}", self.opcode, operand),
            None => write!(f, "{}", self.opcode),
        }
    }
}

/// Sums the stack effect of a run of instructions
pub fn net_stack_effect(instructions: &[Instruction]) -> Option<i32> {
    instructions.iter().try_fold(0i32, |depth, i| {
        i.stack_effect()
            .map(|(pops, pushes)| depth - pops as i32 + pushes as i32)
    })
}
