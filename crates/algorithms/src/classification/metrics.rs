//! Classification accuracy metrics

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fraction of matching predictions; 0 for empty input
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let hits = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    hits as f64 / y_true.len() as f64
}

/// Rows are true classes, columns predicted classes
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Array2<usize> {
    let mut matrix = Array2::<usize>::zeros((n_classes, n_classes));
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t < n_classes && p < n_classes {
            matrix[[t, p]] += 1;
        }
    }
    matrix
}

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class metrics plus overall accuracy and macro averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

pub fn classification_report<S: AsRef<str>>(
    y_true: &[usize],
    y_pred: &[usize],
    labels: &[S],
) -> ClassificationReport {
    let n = labels.len();
    let cm = confusion_matrix(y_true, y_pred, n);

    let classes: Vec<ClassMetrics> = (0..n)
        .map(|c| {
            let tp = cm[[c, c]];
            let predicted = cm.column(c).sum();
            let support = cm.row(c).sum();
            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                label: labels[c].as_ref().to_string(),
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect();

    let mean = |f: fn(&ClassMetrics) -> f64| {
        if classes.is_empty() {
            0.0
        } else {
            classes.iter().map(f).sum::<f64>() / classes.len() as f64
        }
    };

    ClassificationReport {
        accuracy: accuracy(y_true, y_pred),
        macro_precision: mean(|m| m.precision),
        macro_recall: mean(|m| m.recall),
        macro_f1: mean(|m| m.f1),
        classes,
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.classes.iter().map(|c| c.label.len()).max().unwrap_or(0).max(9);
        writeln!(
            f,
            "{:>width$}  {:>9}  {:>9}  {:>9}  {:>7}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>7}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        let total: usize = self.classes.iter().map(|c| c.support).sum();
        writeln!(f)?;
        writeln!(f, "{:>width$}  {:>9}  {:>9}  {:>9.2}  {:>7}", "accuracy", "", "", self.accuracy, total)?;
        write!(
            f,
            "{:>width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>7}",
            "macro avg", self.macro_precision, self.macro_recall, self.macro_f1, total
        )
    }
}
