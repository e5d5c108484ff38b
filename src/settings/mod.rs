//! # Settings
//!
//! Configuration shared by the label cache, the call-site logic and the host bootstrap

use crate::bucket::Thresholds;

/// Library configuration. [`Settings::default`] matches what the host's translations ship with.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Cut points between condition labels
    pub thresholds: Thresholds,
    /// Prefix of every localization key
    pub key_prefix: String,
    /// Text inserted before a condition label
    pub separator: String,
    /// Name of the host function whose label gets patched
    pub target: String,
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            key_prefix: "InexactExamine_Damage".into(),
            separator: ", ".into(),
            target: "Verse.GenLabel::LabelExtras".into(),
        }
    }
}
impl Settings {
    /// Replaces the thresholds
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
    /// Replaces the localization key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
    /// Replaces the separator
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
    /// Replaces the patched target
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }
}
