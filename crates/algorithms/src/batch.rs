//! Batch results with per-item failures kept alongside the successes

use std::fmt;

/// An item dropped from a batch, with the reason it failed
#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub key: String,
    pub reason: String,
}

impl fmt::Display for Skipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.reason)
    }
}

/// Successful items in input order, plus every skipped item.
///
/// A failing item never aborts the batch and never affects its siblings.
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    pub items: Vec<T>,
    pub skipped: Vec<Skipped>,
}

impl<T> BatchOutcome<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn skip(&mut self, key: impl Into<String>, reason: impl fmt::Display) {
        self.skipped.push(Skipped {
            key: key.into(),
            reason: reason.to_string(),
        });
    }

    /// Number of successful items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self::new()
    }
}
