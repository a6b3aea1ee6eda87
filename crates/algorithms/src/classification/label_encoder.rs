//! Label encoding: raw label strings to dense class codes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use lcfuse_core::{Error, Result};

/// Sorted unique classes; a class code is its position in `classes`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Learn the class vocabulary
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut classes: Vec<String> = labels.iter().map(|l| l.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// Fit, then encode the same labels
    pub fn fit_transform<S: AsRef<str>>(labels: &[S]) -> (Self, Vec<usize>) {
        let encoder = Self::fit(labels);
        // every label is in the vocabulary just built
        let codes = labels
            .iter()
            .filter_map(|l| encoder.code(l.as_ref()))
            .collect();
        (encoder, codes)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Code of a single label
    pub fn code(&self, label: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(label)).ok()
    }

    /// Encode labels; an unseen label is an error
    pub fn transform<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>> {
        labels
            .iter()
            .map(|l| {
                self.code(l.as_ref()).ok_or_else(|| Error::InvalidParameter {
                    name: "label",
                    value: l.as_ref().to_string(),
                    reason: "not seen when the encoder was fitted".into(),
                })
            })
            .collect()
    }

    /// Decode class codes back to labels
    pub fn inverse_transform(&self, codes: &[usize]) -> Result<Vec<String>> {
        codes
            .iter()
            .map(|&c| {
                self.classes.get(c).cloned().ok_or_else(|| Error::InvalidParameter {
                    name: "class code",
                    value: c.to_string(),
                    reason: format!("encoder has {} classes", self.classes.len()),
                })
            })
            .collect()
    }
}

/// Translate raw labels through `mapping` (e.g. field code to category name).
///
/// A label without a mapping entry is an error.
pub fn map_labels<S: AsRef<str>>(labels: &[S], mapping: &BTreeMap<String, String>) -> Result<Vec<String>> {
    labels
        .iter()
        .map(|l| {
            mapping.get(l.as_ref()).cloned().ok_or_else(|| Error::InvalidParameter {
                name: "label_mapping",
                value: l.as_ref().to_string(),
                reason: "label has no mapping entry".into(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_sorted_classes() {
        let (enc, codes) = LabelEncoder::fit_transform(&["rice", "forest", "rice", "urban"]);
        assert_eq!(enc.classes(), &["forest", "rice", "urban"]);
        assert_eq!(codes, vec![1, 0, 1, 2]);
        assert_eq!(enc.inverse_transform(&codes).unwrap(), vec!["rice", "forest", "rice", "urban"]);
    }

    #[test]
    fn test_unknown_label_and_code() {
        let enc = LabelEncoder::fit(&["a", "b"]);
        assert!(enc.transform(&["c"]).is_err());
        assert!(enc.inverse_transform(&[2]).is_err());
    }

    #[test]
    fn test_map_labels() {
        let mapping: BTreeMap<String, String> =
            [("LUC".to_string(), "rice".to_string()), ("RSX".to_string(), "forest".to_string())]
                .into_iter()
                .collect();
        assert_eq!(map_labels(&["RSX", "LUC"], &mapping).unwrap(), vec!["forest", "rice"]);
        assert!(map_labels(&["ODT"], &mapping).is_err());
    }
}
