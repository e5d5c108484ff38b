//! # Condition
//!
//! This module contains the logic behind the calls a patched body makes: replacing an exact condition
//! (`current / maximum` as a percentage) with an approximate label.
//!
//! Both call sites share [`ConditionCallback`]'s signature. They receive the label built so far and return it extended.

use std::sync::Arc;

use log::debug;

use crate::bucket::labels::{self, LabelCache, SubjectKind};
use crate::bucket::Bucket;

/// Object handle passed by the host to the call sites
pub trait Subject {
    /// Category selecting the label variant
    fn kind(&self) -> SubjectKind;
}
impl Subject for SubjectKind {
    fn kind(&self) -> SubjectKind {
        *self
    }
}

/// Signature shared by both call sites: `(label so far, subject, current, maximum) -> label`
pub type ConditionCallback = fn(&str, &dyn Subject, i32, i32) -> String;

/// Returns `current / maximum`, or `None` if `maximum` isn't positive
pub fn fraction(current: i32, maximum: i32) -> Option<f32> {
    if maximum <= 0 {
        return None;
    }
    Some(current as f32 / maximum as f32)
}

/// Chooses and appends condition labels from a [`LabelCache`]
#[derive(Debug, Clone)]
pub struct ConditionLabeler {
    /// Labels and the thresholds they were built for
    cache: Arc<LabelCache>,
}
impl ConditionLabeler {
    /// Creates a labeler reading from `cache`
    pub fn new(cache: Arc<LabelCache>) -> Self {
        Self { cache }
    }

    /// Creates a labeler reading from the installed cache
    pub fn installed() -> Option<Self> {
        labels::installed().map(Self::new)
    }

    /// Buckets `current / maximum`. A degenerate maximum counts as above every threshold.
    pub fn bucket(&self, current: i32, maximum: i32) -> Bucket {
        match fraction(current, maximum) {
            Some(fraction) => self.cache.thresholds().bucket(fraction),
            None => Bucket::AboveAll,
        }
    }

    /// Appends the label of the condition's bucket, or nothing above every threshold
    pub fn append_condition(
        &self,
        label: &str,
        subject: &dyn Subject,
        current: i32,
        maximum: i32,
    ) -> String {
        let bucket = self.bucket(current, maximum);
        match self.cache.for_bucket(bucket, subject.kind()) {
            Some(condition) => format!("{}{}", label, condition),
            None => label.to_string(),
        }
    }

    /// Appends the separator exactly when [`ConditionLabeler::append_condition`] will append a label
    pub fn append_separator(
        &self,
        label: &str,
        subject: &dyn Subject,
        current: i32,
        maximum: i32,
    ) -> String {
        let bucket = self.bucket(current, maximum);
        match self.cache.for_bucket(bucket, subject.kind()) {
            Some(_) => format!("{}{}", label, self.cache.separator()),
            None => label.to_string(),
        }
    }
}

/// Call site replacing the exact percentage. Leaves `label` alone if no label cache is installed.
pub fn add_approximate_condition(
    label: &str,
    subject: &dyn Subject,
    current: i32,
    maximum: i32,
) -> String {
    match ConditionLabeler::installed() {
        Some(labeler) => labeler.append_condition(label, subject, current, maximum),
        None => {
            debug!("no condition labels installed");
            label.to_string()
        }
    }
}

/// Call site replacing the separator in front of the percentage. Leaves `label` alone if no label cache is installed.
pub fn add_separator_if_needed(
    label: &str,
    subject: &dyn Subject,
    current: i32,
    maximum: i32,
) -> String {
    match ConditionLabeler::installed() {
        Some(labeler) => labeler.append_separator(label, subject, current, maximum),
        None => {
            debug!("no condition labels installed");
            label.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::settings::Settings;

    /// Labeler whose labels are the localization keys themselves
    fn labeler() -> ConditionLabeler {
        let cache = LabelCache::build(&Settings::default(), &HashMap::<String, String>::new());
        ConditionLabeler::new(Arc::new(cache))
    }

    #[test]
    /// 40 of 100 is labeled as the 30% to 50% bucket, with a separator
    fn test_partial_condition() {
        let labeler = labeler();
        assert_eq!(labeler.bucket(40, 100), Bucket::Index(2));

        let label = labeler.append_separator("cloth", &SubjectKind::Generic, 40, 100);
        assert_eq!(label, "cloth, ");
        let label = labeler.append_condition(&label, &SubjectKind::Generic, 40, 100);
        assert_eq!(label, "cloth, InexactExamine_Damage_Thing_30to50");
    }

    #[test]
    /// Wearables get their own variant
    fn test_wearable() {
        let label = labeler().append_condition("parka ", &SubjectKind::Wearable, 10, 100);
        assert_eq!(label, "parka InexactExamine_Damage_Apparel_0to15");
    }

    #[test]
    /// Full condition gets neither a label nor a separator
    fn test_full_condition() {
        let labeler = labeler();
        assert_eq!(labeler.bucket(100, 100), Bucket::AboveAll);
        assert_eq!(
            labeler.append_separator("cloth", &SubjectKind::Generic, 100, 100),
            "cloth"
        );
        assert_eq!(
            labeler.append_condition("cloth", &SubjectKind::Generic, 100, 100),
            "cloth"
        );
        // exactly on the highest threshold is above all of them too
        assert_eq!(
            labeler.append_separator("cloth", &SubjectKind::Generic, 95, 100),
            "cloth"
        );
    }

    #[test]
    /// A maximum of zero or less appends nothing
    fn test_degenerate_maximum() {
        assert_eq!(fraction(5, 0), None);
        assert_eq!(fraction(5, -3), None);
        let labeler = labeler();
        assert_eq!(labeler.bucket(5, 0), Bucket::AboveAll);
        assert_eq!(
            labeler.append_separator("cloth", &SubjectKind::Generic, 0, 0),
            "cloth"
        );
        assert_eq!(
            labeler.append_condition("cloth", &SubjectKind::Generic, 0, 0),
            "cloth"
        );
    }

    #[test]
    /// The call sites read the installed cache
    fn test_call_sites() {
        // same contents as every other test installs
        labels::install(LabelCache::build(
            &Settings::default(),
            &HashMap::<String, String>::new(),
        ));
        let callbacks: [ConditionCallback; 2] = [add_separator_if_needed, add_approximate_condition];
        let label = callbacks
            .iter()
            .fold("steel".to_string(), |label, f| f(&label, &SubjectKind::Generic, 1, 2));
        assert_eq!(label, "steel, InexactExamine_Damage_Thing_50to70");
    }
}
