//! # Hook
//!
//! This module covers host integration: reading a target function's body, transpiling it and installing the result

pub mod label_extras;

use log::{info, warn};

use crate::code::Instruction;
use crate::patcher::{PatchFailure, Transpiler};

/// A runtime whose functions can be read and replaced as instruction sequences.
///
/// The host owns the translation between its native encoding and [`Instruction`].
pub trait Host {
    /// Errors raised by the host itself
    type Error;

    /// Returns the current body of `target`
    fn instructions(&self, target: &str) -> Result<Vec<Instruction>, Self::Error>;

    /// Replaces the body of `target` with `instructions`
    fn install(&self, target: &str, instructions: Vec<Instruction>) -> Result<(), Self::Error>;
}

/// Outcome of patching a target
#[derive(Debug, Clone, PartialEq)]
pub enum PatchReport {
    /// Every pass applied and the new body was installed
    Installed {
        /// Number of instructions installed
        len: usize,
    },
    /// A pass failed; the target was left as it was
    Skipped(PatchFailure),
}

/// Transpiles `target` and installs the result.
///
/// A failing pass isn't an error: it's logged and the target keeps its original body.
/// Only errors from the host itself are returned.
pub fn patch_target<H: Host>(
    host: &H,
    target: &str,
    transpiler: &Transpiler,
) -> Result<PatchReport, H::Error> {
    let original = host.instructions(target)?;
    match transpiler.apply(&original) {
        Ok(patched) => {
            let len = patched.len();
            host.install(target, patched)?;
            info!("{}: patched {}", transpiler.name(), target);
            Ok(PatchReport::Installed { len })
        }
        Err(failure) => {
            warn!("{}: {} ({} left unpatched)", transpiler.name(), failure, target);
            Ok(PatchReport::Skipped(failure))
        }
    }
}
