//! PPE presence verdict
//!
//! A single category vocabulary ([`PpeCategory`]) is used for both the
//! detection info built from model labels and the verdict rendered to the
//! user, so a lookup can never miss because of a spelling difference.

use crate::config::CategoryLabels;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// PPE categories checked on every image, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PpeCategory {
    Mask,
    Helmet,
}

impl PpeCategory {
    pub const ALL: [PpeCategory; 2] = [PpeCategory::Mask, PpeCategory::Helmet];

    pub fn as_str(self) -> &'static str {
        match self {
            PpeCategory::Mask => "mask",
            PpeCategory::Helmet => "helmet",
        }
    }
}

impl fmt::Display for PpeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presence of each PPE category in a detection label set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PpeVerdict {
    presence: BTreeMap<PpeCategory, bool>,
}

impl PpeVerdict {
    /// Build the verdict for one label set. A category is present when any
    /// of its configured labels was detected.
    pub fn from_labels(detected: &BTreeSet<String>, labels: &CategoryLabels) -> Self {
        let presence = PpeCategory::ALL
            .into_iter()
            .map(|category| {
                let found = labels
                    .labels_for(category)
                    .iter()
                    .any(|label| detected.contains(label));
                (category, found)
            })
            .collect();
        Self { presence }
    }

    /// Per-category presence, keyed by the same categories the verdict reports
    pub fn detection_info(&self) -> &BTreeMap<PpeCategory, bool> {
        &self.presence
    }

    /// A category absent from the map counts as not detected
    pub fn is_present(&self, category: PpeCategory) -> bool {
        self.presence.get(&category).copied().unwrap_or(false)
    }

    /// Missing categories in reporting order
    pub fn missing(&self) -> Vec<PpeCategory> {
        PpeCategory::ALL
            .into_iter()
            .filter(|category| !self.is_present(*category))
            .collect()
    }

    pub fn is_compliant(&self) -> bool {
        PpeCategory::ALL.into_iter().all(|category| self.is_present(category))
    }

    /// User-facing summary line
    pub fn message(&self) -> String {
        let missing = self.missing();
        if missing.is_empty() {
            "All required PPE detected!".to_string()
        } else {
            let names: Vec<&str> = missing.iter().map(|c| c.as_str()).collect();
            format!("Warning: No {} detected!", names.join(" and "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_all_present() {
        let verdict = PpeVerdict::from_labels(&labels(&["mask", "helmet", "person"]), &CategoryLabels::default());
        assert!(verdict.is_compliant());
        assert!(verdict.missing().is_empty());
        assert_eq!(verdict.message(), "All required PPE detected!");
    }

    #[test]
    fn test_none_present_lists_both_in_order() {
        let verdict = PpeVerdict::from_labels(&labels(&["person"]), &CategoryLabels::default());
        assert_eq!(verdict.missing(), vec![PpeCategory::Mask, PpeCategory::Helmet]);
        assert_eq!(verdict.message(), "Warning: No mask and helmet detected!");
    }

    #[test]
    fn test_empty_label_set() {
        let verdict = PpeVerdict::from_labels(&BTreeSet::new(), &CategoryLabels::default());
        assert_eq!(verdict.missing().len(), 2);
        assert!(!verdict.is_compliant());
    }

    #[test]
    fn test_hardhat_without_mask() {
        let verdict = PpeVerdict::from_labels(&labels(&["helmet", "person"]), &CategoryLabels::default());
        assert_eq!(verdict.missing(), vec![PpeCategory::Mask]);
        assert_eq!(verdict.message(), "Warning: No mask detected!");
        assert!(verdict.is_present(PpeCategory::Helmet));
    }

    #[test]
    fn test_aliases_map_to_one_category() {
        let mut config = CategoryLabels::default();
        config.helmet.push("Hardhat".to_string());
        let verdict = PpeVerdict::from_labels(&labels(&["Hardhat", "mask"]), &config);
        assert!(verdict.is_compliant());
    }

    #[test]
    fn test_labels_are_case_sensitive() {
        let verdict = PpeVerdict::from_labels(&labels(&["Mask"]), &CategoryLabels::default());
        assert!(!verdict.is_present(PpeCategory::Mask));
    }

    #[test]
    fn test_detection_info_keys_match_verdict_keys() {
        let verdict = PpeVerdict::from_labels(&labels(&["mask"]), &CategoryLabels::default());
        let info_keys: Vec<PpeCategory> = verdict.detection_info().keys().copied().collect();
        assert_eq!(info_keys, PpeCategory::ALL.to_vec());
        for category in verdict.missing() {
            assert!(verdict.detection_info().contains_key(&category));
        }
    }

    #[test]
    fn test_partial_presence_map_counts_as_missing() {
        let verdict: PpeVerdict = serde_json::from_str(r#"{"presence": {"mask": true}}"#).unwrap();
        assert!(verdict.is_present(PpeCategory::Mask));
        assert!(!verdict.is_present(PpeCategory::Helmet));
        assert_eq!(verdict.missing(), vec![PpeCategory::Helmet]);
        assert!(!verdict.is_compliant());
        assert_eq!(verdict.message(), "Warning: No helmet detected!");
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&PpeCategory::Helmet).unwrap();
        assert_eq!(json, "\"helmet\"");
    }
}
