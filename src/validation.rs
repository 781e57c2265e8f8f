//! Numeric comparisons between evaluation paths and against published
//! reference values. Disagreements are reported, never raised as errors.

use std::{collections::BTreeSet, fmt};

use tracing::warn;

use crate::types::{Float, Record};

/// `|actual - expected| <= atol + rtol * |expected|`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerance {
    pub rtol: Float,
    pub atol: Float,
}

impl Tolerance {
    pub const fn new(rtol: Float, atol: Float) -> Self {
        Self { rtol, atol }
    }

    pub fn accepts(&self, actual: Float, expected: Float) -> bool {
        (actual - expected).abs() <= self.atol + self.rtol * expected.abs()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArrayComparison {
    pub label: String,
    pub len: usize,
    /// Indices outside tolerance, including any past the shorter array.
    pub mismatched: Vec<usize>,
    pub max_abs_difference: Float,
}

impl ArrayComparison {
    pub fn passed(&self) -> bool {
        self.mismatched.is_empty()
    }
}

impl fmt::Display for ArrayComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            write!(
                f,
                "{}: {} elements agree (max |diff| {:e})",
                self.label, self.len, self.max_abs_difference
            )
        } else {
            write!(
                f,
                "{}: {} of {} elements differ (max |diff| {:e}) at {:?}",
                self.label,
                self.mismatched.len(),
                self.len,
                self.max_abs_difference,
                self.mismatched
            )
        }
    }
}

/// Element-wise comparison of `actual` against `desired`.
pub fn compare_arrays(
    label: &str,
    actual: &[Float],
    desired: &[Float],
    tolerance: Tolerance,
) -> ArrayComparison {
    let len = actual.len().max(desired.len());
    let mut mismatched = vec![];
    let mut max_abs_difference: Float = 0.0;
    for i in 0..len {
        match (actual.get(i), desired.get(i)) {
            (Some(a), Some(d)) => {
                max_abs_difference = max_abs_difference.max((a - d).abs());
                if !tolerance.accepts(*a, *d) {
                    mismatched.push(i);
                }
            }
            _ => mismatched.push(i),
        }
    }
    let comparison = ArrayComparison {
        label: label.to_string(),
        len,
        mismatched,
        max_abs_difference,
    };
    if !comparison.passed() {
        warn!("{}", comparison);
    }
    comparison
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldOutcome {
    Matched { expected: Float, actual: Float },
    Mismatched { expected: Float, actual: Float },
    /// Present on one side only.
    NotChecked {
        expected: Option<Float>,
        actual: Option<Float>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldReport {
    pub name: String,
    pub outcome: FieldOutcome,
}

impl fmt::Display for FieldReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            FieldOutcome::Matched { expected, actual } => {
                write!(f, "{:>8} matched     expected {:>20.13} actual {:>20.13}", self.name, expected, actual)
            }
            FieldOutcome::Mismatched { expected, actual } => {
                write!(f, "{:>8} MISMATCHED  expected {:>20.13} actual {:>20.13}", self.name, expected, actual)
            }
            FieldOutcome::NotChecked { expected, actual } => {
                let side = if expected.is_some() { "computed" } else { "reference" };
                write!(f, "{:>8} not checked (absent from {})", self.name, side)?;
                if let Some(v) = expected.or(*actual) {
                    write!(f, ", value {:.13}", v)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValidationReport {
    pub label: String,
    pub fields: Vec<FieldReport>,
}

impl ValidationReport {
    fn count(&self, pred: impl Fn(&FieldOutcome) -> bool) -> usize {
        self.fields.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn matched(&self) -> usize {
        self.count(|o| matches!(o, FieldOutcome::Matched { .. }))
    }

    pub fn mismatched(&self) -> usize {
        self.count(|o| matches!(o, FieldOutcome::Mismatched { .. }))
    }

    pub fn not_checked(&self) -> usize {
        self.count(|o| matches!(o, FieldOutcome::NotChecked { .. }))
    }

    /// Every reference field was computed and agrees.
    pub fn passed(&self) -> bool {
        self.fields.iter().all(|r| match r.outcome {
            FieldOutcome::Matched { .. } => true,
            FieldOutcome::Mismatched { .. } => false,
            FieldOutcome::NotChecked { expected, .. } => expected.is_none(),
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldOutcome> {
        self.fields.iter().find(|r| r.name == name).map(|r| &r.outcome)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} matched, {} mismatched, {} not checked",
            self.label,
            self.matched(),
            self.mismatched(),
            self.not_checked()
        )?;
        for field in &self.fields {
            writeln!(f, "  {}", field)?;
        }
        Ok(())
    }
}

/// Compares every field of `computed` and `reference`, in name order.
pub fn validate_against(
    label: &str,
    computed: &Record,
    reference: &Record,
    tolerance: Tolerance,
) -> ValidationReport {
    let names: BTreeSet<&String> = computed.keys().chain(reference.keys()).collect();
    let fields = names
        .into_iter()
        .map(|name| {
            let outcome = match (reference.get(name), computed.get(name)) {
                (Some(&expected), Some(&actual)) if tolerance.accepts(actual, expected) => {
                    FieldOutcome::Matched { expected, actual }
                }
                (Some(&expected), Some(&actual)) => {
                    warn!(%label, field = %name, expected, actual, "validation mismatch");
                    FieldOutcome::Mismatched { expected, actual }
                }
                (expected, actual) => FieldOutcome::NotChecked {
                    expected: expected.copied(),
                    actual: actual.copied(),
                },
            };
            FieldReport {
                name: name.clone(),
                outcome,
            }
        })
        .collect();
    ValidationReport {
        label: label.to_string(),
        fields,
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;
    use crate::benchmark::record;

    #[test]
    fn absolute_tolerance_covers_roundoff_zeros() {
        // Arrange
        let tol = Tolerance::new(1e-8, 1e-10);

        // Act
        let comparison = compare_arrays("M", &[-4e-14, 2.0], &[0.0, 2.0 + 1e-9], tol);

        // Assert
        assert!(comparison.passed());
        assert!(!Tolerance::new(1e-8, 0.0).accepts(-4e-14, 0.0));
    }

    #[test]
    fn length_mismatch_is_reported() {
        // Arrange
        let tol = Tolerance::new(1e-8, 0.0);

        // Act
        let comparison = compare_arrays("F", &[1.0, 2.0], &[1.0, 2.0, 3.0], tol);

        // Assert
        assert_eq!(comparison.mismatched, vec![2]);
        assert!(comparison.to_string().contains("1 of 3"));
    }

    #[test]
    fn every_field_is_reported() {
        // Arrange
        let computed = record(&[("psidd", -7.85552811282), ("phidd", 0.2), ("x", 0.0)]);
        let reference = record(&[("psidd", -7.8555281128244), ("phidd", 0.1205543897884), ("zdd", -1.46)]);

        // Act
        let report = validate_against("exact", &computed, &reference, Tolerance::new(1e-7, 0.0));

        // Assert
        assert_eq!(report.fields.len(), 4);
        assert!(matches!(report.field("psidd"), Some(FieldOutcome::Matched { .. })));
        assert!(matches!(report.field("phidd"), Some(FieldOutcome::Mismatched { .. })));
        assert!(matches!(
            report.field("zdd"),
            Some(FieldOutcome::NotChecked { expected: Some(_), actual: None })
        ));
        assert!(matches!(
            report.field("x"),
            Some(FieldOutcome::NotChecked { expected: None, actual: Some(_) })
        ));
        assert!(!report.passed());
        assert!(report.to_string().contains("1 matched, 1 mismatched, 2 not checked"));
    }
}
