//! This module contains the label cache, holding one localized label per bucket and subject kind
//!
//! The cache is built once through [`LabelCache::build`] and can then be installed process-wide with [`install`].
//! Installation is first-writer-wins: once a cache is installed it is never replaced, and readers only ever see a complete cache.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use lazy_static::lazy_static;
use log::debug;

use super::{Bucket, Thresholds};
use crate::settings::Settings;

/// Coarse category of the object a label describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    /// Any object
    Generic,
    /// Something that can be worn
    Wearable,
}
impl SubjectKind {
    /// Every kind, in cache order
    pub const ALL: [SubjectKind; 2] = [SubjectKind::Generic, SubjectKind::Wearable];

    /// Segment used for this kind in localization keys
    pub fn key_segment(self) -> &'static str {
        match self {
            Self::Generic => "Thing",
            Self::Wearable => "Apparel",
        }
    }
}

/// Localization backend: turns a key into display text
pub trait Translator {
    /// Returns the text for `key`
    fn translate(&self, key: &str) -> String;
}
impl<F> Translator for F
where
    F: Fn(&str) -> String,
{
    fn translate(&self, key: &str) -> String {
        self(key)
    }
}
/// Keys without an entry translate to themselves
impl Translator for HashMap<String, String> {
    fn translate(&self, key: &str) -> String {
        self.get(key).cloned().unwrap_or_else(|| key.to_string())
    }
}

/// Rounds a fraction to a whole percentage, halves to even.
///
/// The product is taken in `f32`, the precision the shipped localization keys were generated with.
pub fn percent(fraction: f32) -> i64 {
    (fraction * 100.0).round_ties_even() as i64
}

/// Builds the localization key for the bucket between `lower` and `upper`
///
/// `{prefix}_{Thing|Apparel}_{lower%}to{upper%}`, e.g. `InexactExamine_Damage_Thing_30to50`
pub fn label_key(prefix: &str, kind: SubjectKind, lower: f32, upper: f32) -> String {
    format!(
        "{}_{}_{}to{}",
        prefix,
        kind.key_segment(),
        percent(lower),
        percent(upper)
    )
}

/// Localized labels for every bucket of a threshold table
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCache {
    /// Table the labels were built for
    thresholds: Thresholds,
    /// Labels for [`SubjectKind::Generic`], one per threshold
    generic: Vec<String>,
    /// Labels for [`SubjectKind::Wearable`], one per threshold
    wearable: Vec<String>,
    /// Text placed before a label
    separator: String,
}
impl LabelCache {
    /// Looks up every label once through `translator`
    pub fn build(settings: &Settings, translator: &dyn Translator) -> Self {
        let thresholds = settings.thresholds.clone();
        let labels = |kind: SubjectKind| -> Vec<String> {
            thresholds
                .ranges()
                .map(|(lower, upper)| {
                    translator.translate(&label_key(&settings.key_prefix, kind, lower, upper))
                })
                .collect()
        };
        let generic = labels(SubjectKind::Generic);
        let wearable = labels(SubjectKind::Wearable);
        debug!(
            "built {} condition labels for {} thresholds",
            generic.len() + wearable.len(),
            thresholds.len()
        );
        Self {
            thresholds,
            generic,
            wearable,
            separator: settings.separator.clone(),
        }
    }

    /// Thresholds the labels belong to
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Text placed before a label
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Label of bucket `index` for `kind`
    pub fn label(&self, index: usize, kind: SubjectKind) -> Option<&str> {
        let labels = match kind {
            SubjectKind::Generic => &self.generic,
            SubjectKind::Wearable => &self.wearable,
        };
        labels.get(index).map(String::as_str)
    }

    /// Label for a bucketing result, `None` above every threshold
    pub fn for_bucket(&self, bucket: Bucket, kind: SubjectKind) -> Option<&str> {
        match bucket {
            Bucket::Index(index) => self.label(index, kind),
            Bucket::AboveAll => None,
        }
    }
}

/// A slot holding at most one [`LabelCache`].
///
/// The first cache stored wins. Readers get either nothing or a complete cache.
#[derive(Debug, Default)]
pub struct LabelSlot(RwLock<Option<Arc<LabelCache>>>);
impl LabelSlot {
    /// Creates an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored cache, if any
    pub fn get(&self) -> Option<Arc<LabelCache>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the stored cache, building and storing one with `build` if there is none.
    ///
    /// `build` runs under the write lock, so racing callers build at most once between them.
    pub fn get_or_insert_with(&self, build: impl FnOnce() -> LabelCache) -> Arc<LabelCache> {
        if let Some(cache) = self.get() {
            return cache;
        }
        let mut slot = self.0.write().unwrap_or_else(PoisonError::into_inner);
        slot.get_or_insert_with(|| Arc::new(build())).clone()
    }
}

lazy_static! {
    static ref INSTALLED: LabelSlot = LabelSlot::new();
}

/// Installs `cache` for the rest of the process unless one is already installed.
///
/// Returns whichever cache is installed afterwards.
pub fn install(cache: LabelCache) -> Arc<LabelCache> {
    get_or_install_with(|| cache)
}

/// Returns the installed cache, if any
pub fn installed() -> Option<Arc<LabelCache>> {
    INSTALLED.get()
}

/// Returns the installed cache, building and installing one with `build` if there is none.
///
/// `build` runs at most once per installation, and not at all once a cache is installed.
pub fn get_or_install_with(build: impl FnOnce() -> LabelCache) -> Arc<LabelCache> {
    INSTALLED.get_or_insert_with(build)
}
