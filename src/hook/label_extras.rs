//! # Label extras
//!
//! Patches for the host function that appends extra details to an object's label.
//!
//! The host function appends `" "` and then the exact condition as a percentage, e.g. `parka 40%`. After patching it
//! calls [`add_separator_if_needed`] and [`add_approximate_condition`] instead, producing `parka, badly damaged`,
//! or nothing at all for objects in near perfect condition.

use thiserror::Error;

use super::{patch_target, Host, PatchReport};
use crate::bucket::labels::{self, LabelCache, Translator};
use crate::code::{CallableRef, Instruction, LocalSlot, OpCode, Operand, OperandKind};
use crate::condition::{add_approximate_condition, add_separator_if_needed, ConditionCallback};
use crate::matcher::InstructionMatch;
use crate::patcher::{DefinitionError, Emit, PatchPass, Transpiler};
use crate::settings::Settings;

/// Capture holding the local slot the maximum condition is stored in
pub const MAX_CONDITION: &str = "max_condition";
/// Local slot holding the label under construction
pub const LABEL_SLOT: u16 = 0;
/// Local slot holding the current condition
pub const CONDITION_SLOT: u16 = 3;
/// Owner of the callbacks spliced into the patched body
pub const CALLBACK_OWNER: &str = "libtranspile::condition";

/// `Thing.get_MaxHitPoints()`
pub fn max_condition_getter() -> CallableRef {
    CallableRef::new("Verse.Thing", "get_MaxHitPoints", 1, true)
}

/// `String.Concat(string, string)`
pub fn string_concat() -> CallableRef {
    CallableRef::new("System.String", "Concat", 2, true)
}

/// `GenText.ToStringPercent(float)`
pub fn to_string_percent() -> CallableRef {
    CallableRef::new("Verse.GenText", "ToStringPercent", 1, true)
}

/// Reference to [`add_separator_if_needed`]
pub fn separator_callback() -> CallableRef {
    CallableRef::new(CALLBACK_OWNER, "add_separator_if_needed", 4, true)
}

/// Reference to [`add_approximate_condition`]
pub fn condition_callback() -> CallableRef {
    CallableRef::new(CALLBACK_OWNER, "add_approximate_condition", 4, true)
}

/// Functions the host must bind the callback references to
pub fn callbacks() -> [(CallableRef, ConditionCallback); 2] {
    [
        (separator_callback(), add_separator_if_needed),
        (condition_callback(), add_approximate_condition),
    ]
}

/// Builds the three passes:
///
/// 1. find where the maximum condition is stored and capture its slot
/// 2. replace the first `label + " "` with the separator callback
/// 3. replace `label + (current / maximum).ToStringPercent()` with the condition callback
///
/// The body concatenates `" "` again further down; only the first one precedes the percentage.
pub fn transpiler() -> Result<Transpiler, DefinitionError> {
    let store_max = PatchPass::capture(
        "store max condition",
        vec![
            InstructionMatch::exact(OpCode::LoadArg, Operand::Argument(0)),
            InstructionMatch::exact(
                OpCode::CallVirtual,
                Operand::Callable(max_condition_getter()),
            ),
            InstructionMatch::capture(OpCode::StoreLocal, MAX_CONDITION, OperandKind::Local),
        ],
    );

    let separator = PatchPass::replace(
        "separator",
        vec![
            InstructionMatch::exact(OpCode::LoadLocal, Operand::Local(LocalSlot(LABEL_SLOT))),
            InstructionMatch::exact(OpCode::LoadString, Operand::str(" ")),
            InstructionMatch::exact(OpCode::Call, Operand::Callable(string_concat())),
        ],
        vec![
            Instruction::load_local(LABEL_SLOT).into(),
            Instruction::load_arg(0).into(),
            Instruction::load_local(CONDITION_SLOT).into(),
            Emit::captured(OpCode::LoadLocal, MAX_CONDITION),
            Instruction::call(separator_callback()).into(),
        ],
    );

    let condition = PatchPass::replace(
        "condition percentage",
        vec![
            InstructionMatch::exact(
                OpCode::LoadLocal,
                Operand::Local(LocalSlot(CONDITION_SLOT)),
            ),
            InstructionMatch::op(OpCode::ConvertFloat),
            InstructionMatch::captured(OpCode::LoadLocal, MAX_CONDITION),
            InstructionMatch::op(OpCode::ConvertFloat),
            InstructionMatch::op(OpCode::Div),
            InstructionMatch::exact(OpCode::Call, Operand::Callable(to_string_percent())),
            InstructionMatch::exact(OpCode::Call, Operand::Callable(string_concat())),
        ],
        vec![
            Instruction::load_arg(0).into(),
            Instruction::load_local(CONDITION_SLOT).into(),
            Emit::captured(OpCode::LoadLocal, MAX_CONDITION),
            Instruction::call(condition_callback()).into(),
        ],
    );

    Transpiler::new("label extras", vec![store_max, separator, condition])
}

/// Errors while bootstrapping
#[derive(Debug, Error)]
pub enum BootstrapError<E> {
    /// The built-in passes are malformed
    #[error("{0}")]
    Definition(#[from] DefinitionError),
    /// Error from the host
    #[error("{0}")]
    Host(E),
}

/// Installs the condition labels and patches the label-extras target.
///
/// The label cache is built from `translator` unless one is already installed. A transpile failure leaves the target
/// unpatched and is reported as [`PatchReport::Skipped`], not as an error.
pub fn bootstrap<H: Host>(
    host: &H,
    translator: &dyn Translator,
    settings: &Settings,
) -> Result<PatchReport, BootstrapError<H::Error>> {
    labels::get_or_install_with(|| LabelCache::build(settings, translator));
    let transpiler = transpiler()?;
    patch_target(host, &settings.target, &transpiler).map_err(BootstrapError::Host)
}
