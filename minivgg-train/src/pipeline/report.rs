//! Per-class classification report
//!
//! Rendered in the fixed column layout orchestrators already parse:
//!
//! ```text
//!               precision    recall  f1-score   support
//!
//!          cat       0.80      0.67      0.73        12
//!          dog       0.67      0.80      0.73        10
//!
//!     accuracy                           0.73        22
//!    macro avg       0.73      0.73      0.73        22
//! weighted avg       0.74      0.73      0.73        22
//! ```
//!
//! Undefined precision/recall/F1 (zero denominators) are reported as 0.00.

use std::fmt;

const HEADERS: [&str; 4] = ["precision", "recall", "f1-score", "support"];
const DIGITS: usize = 2;

/// Precision/recall/F1/support for one row of the report
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SummaryRow {
    /// Every true and predicted label is in the report's label set
    Accuracy { accuracy: f64, support: usize },
    /// Some predictions fall outside the label set
    MicroAverage(ClassMetrics),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    classes: Vec<ClassMetrics>,
    summary: SummaryRow,
    macro_avg: ClassMetrics,
    weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    /// Build the report for `labels`, in the given order
    ///
    /// `truth` and `predicted` must have equal length; the evaluator checks
    /// this before calling.
    pub fn compute(truth: &[String], predicted: &[String], labels: &[String]) -> Self {
        let mut classes = Vec::with_capacity(labels.len());
        let (mut tp_sum, mut pred_sum, mut true_sum) = (0usize, 0usize, 0usize);

        for label in labels {
            let tp = truth
                .iter()
                .zip(predicted)
                .filter(|(t, p)| *t == label && *p == label)
                .count();
            let predicted_count = predicted.iter().filter(|p| *p == label).count();
            let support = truth.iter().filter(|t| *t == label).count();

            tp_sum += tp;
            pred_sum += predicted_count;
            true_sum += support;
            classes.push(metrics(label, tp, predicted_count, support));
        }

        let covers_all = truth
            .iter()
            .chain(predicted)
            .all(|label| labels.contains(label));
        let summary = if covers_all {
            let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
            SummaryRow::Accuracy {
                accuracy: ratio(correct, truth.len()),
                support: true_sum,
            }
        } else {
            SummaryRow::MicroAverage(metrics("micro avg", tp_sum, pred_sum, true_sum))
        };

        let n = classes.len();
        let mean = |f: fn(&ClassMetrics) -> f64| {
            if n == 0 {
                0.0
            } else {
                classes.iter().map(f).sum::<f64>() / n as f64
            }
        };
        let weighted = |f: fn(&ClassMetrics) -> f64| {
            if true_sum == 0 {
                0.0
            } else {
                classes.iter().map(|c| f(c) * c.support as f64).sum::<f64>() / true_sum as f64
            }
        };

        let macro_avg = ClassMetrics {
            label: "macro avg".to_string(),
            precision: mean(|c| c.precision),
            recall: mean(|c| c.recall),
            f1: mean(|c| c.f1),
            support: true_sum,
        };
        let weighted_avg = ClassMetrics {
            label: "weighted avg".to_string(),
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1: weighted(|c| c.f1),
            support: true_sum,
        };

        Self {
            classes,
            summary,
            macro_avg,
            weighted_avg,
        }
    }

    pub fn classes(&self) -> &[ClassMetrics] {
        &self.classes
    }

    pub fn summary(&self) -> &SummaryRow {
        &self.summary
    }

    pub fn macro_avg(&self) -> &ClassMetrics {
        &self.macro_avg
    }

    pub fn weighted_avg(&self) -> &ClassMetrics {
        &self.weighted_avg
    }

    /// Labels of the per-class rows
    pub fn labels(&self) -> Vec<&str> {
        self.classes.iter().map(|c| c.label.as_str()).collect()
    }

    /// Sum of per-class supports
    pub fn total_support(&self) -> usize {
        self.classes.iter().map(|c| c.support).sum()
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn metrics(label: &str, tp: usize, predicted: usize, support: usize) -> ClassMetrics {
    let precision = ratio(tp, predicted);
    let recall = ratio(tp, support);
    // 2tp / (2tp + fp + fn)
    let f1 = ratio(2 * tp, predicted + support);
    ClassMetrics {
        label: label.to_string(),
        precision,
        recall,
        f1,
        support,
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, row: &ClassMetrics, width: usize) -> fmt::Result {
    writeln!(
        f,
        "{:>width$}  {:>9.digits$} {:>9.digits$} {:>9.digits$} {:>9}",
        row.label,
        row.precision,
        row.recall,
        row.f1,
        row.support,
        width = width,
        digits = DIGITS
    )
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.chars().count())
            .chain([self.weighted_avg.label.len(), DIGITS])
            .max()
            .unwrap_or(0);

        write!(f, "{:>width$} ", "", width = width)?;
        for header in HEADERS {
            write!(f, " {:>9}", header)?;
        }
        writeln!(f)?;
        writeln!(f)?;

        for class in &self.classes {
            write_row(f, class, width)?;
        }
        writeln!(f)?;

        match &self.summary {
            SummaryRow::Accuracy { accuracy, support } => writeln!(
                f,
                "{:>width$}  {:>9} {:>9} {:>9.digits$} {:>9}",
                "accuracy",
                "",
                "",
                accuracy,
                support,
                width = width,
                digits = DIGITS
            )?,
            SummaryRow::MicroAverage(row) => write_row(f, row, width)?,
        }
        write_row(f, &self.macro_avg, width)?;
        write_row(f, &self.weighted_avg, width)
    }
}
