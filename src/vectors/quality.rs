// Vector quality validator.
//
// A pre-flight pass over a canonical vector source: every vector is checked
// for NaN/infinite components, all-zero content, degenerate or non-unit norm,
// and extreme component magnitudes. All checks run on every vector (no short
// circuit) so the issue histogram reflects everything wrong with a source.
//
// The unit-norm check assumes the source was produced by the normalizer.
// Temporal exports are not renormalized and will legitimately trip it.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use super::l2_norm;

/// Norm below which a vector counts as degenerate.
pub const MIN_NORM: f64 = 1e-6;
/// Allowed deviation of the norm from 1.0 for normalized spaces.
pub const UNIT_NORM_TOLERANCE: f64 = 0.1;
/// Components with larger magnitude are flagged as extreme.
pub const MAX_ABS_COMPONENT: f64 = 10.0;

/// Invalid words listed in a report before truncating to a count.
const MAX_INVALID_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    ContainsNan,
    ContainsInfinite,
    AllZeros,
    NormTooSmall,
    NormNotUnit,
    ExtremeValues,
    /// Only produced while reading a file, never by `validate`.
    ParseError,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContainsNan => "contains NaN",
            Self::ContainsInfinite => "contains infinity",
            Self::AllZeros => "all zeros",
            Self::NormTooSmall => "norm too small",
            Self::NormNotUnit => "norm not close to 1.0",
            Self::ExtremeValues => "extreme values",
            Self::ParseError => "parse error",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub is_valid: bool,
    pub issues: Vec<IssueKind>,
    pub norm: f64,
}

/// Validate one vector. Comparisons against a NaN norm or NaN maximum are
/// false, so a vector with any NaN component reports only `ContainsNan`.
pub fn validate<T: Copy + Into<f64>>(vec: &[T]) -> Validation {
    let mut issues = Vec::new();

    let mut has_nan = false;
    let mut has_inf = false;
    let mut all_zero = true;
    let mut max_abs: f64 = 0.0;
    for &v in vec {
        let v: f64 = v.into();
        has_nan |= v.is_nan();
        has_inf |= v.is_infinite();
        all_zero &= v == 0.0;
        max_abs = max_abs.max(v.abs());
    }
    if has_nan {
        max_abs = f64::NAN;
    }

    if has_nan {
        issues.push(IssueKind::ContainsNan);
    }
    if has_inf {
        issues.push(IssueKind::ContainsInfinite);
    }
    if all_zero {
        issues.push(IssueKind::AllZeros);
    }

    let norm = l2_norm(vec);
    if norm < MIN_NORM {
        issues.push(IssueKind::NormTooSmall);
    }
    if (norm - 1.0).abs() > UNIT_NORM_TOLERANCE {
        issues.push(IssueKind::NormNotUnit);
    }
    if max_abs > MAX_ABS_COMPONENT {
        issues.push(IssueKind::ExtremeValues);
    }

    Validation {
        is_valid: issues.is_empty(),
        issues,
        norm,
    }
}

/// Aggregate validation results for one vector source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityReport {
    pub total_loaded: u64,
    pub valid: u64,
    pub invalid: u64,
    pub issues: BTreeMap<IssueKind, u64>,
    /// First few invalid tokens, for display.
    pub invalid_samples: Vec<String>,
}

impl QualityReport {
    /// Record one vector's validation outcome.
    pub fn record(&mut self, token: &str, validation: &Validation) {
        self.total_loaded += 1;
        if validation.is_valid {
            self.valid += 1;
        } else {
            self.invalid += 1;
            for issue in &validation.issues {
                *self.issues.entry(*issue).or_insert(0) += 1;
            }
            self.sample(token);
        }
    }

    fn record_parse_error(&mut self, token: &str) {
        self.invalid += 1;
        *self.issues.entry(IssueKind::ParseError).or_insert(0) += 1;
        self.sample(token);
    }

    fn sample(&mut self, token: &str) {
        if self.invalid_samples.len() < MAX_INVALID_SAMPLES {
            self.invalid_samples.push(token.to_string());
        }
    }

    /// Percentage of loaded vectors that passed every check.
    pub fn quality_pct(&self) -> f64 {
        if self.total_loaded == 0 {
            0.0
        } else {
            100.0 * self.valid as f64 / self.total_loaded as f64
        }
    }
}

/// Validate already-loaded vectors, e.g. a snapshot's contents.
pub fn validate_all<'a, I>(vectors: I) -> QualityReport
where
    I: IntoIterator<Item = (&'a str, &'a [f32])>,
{
    let mut report = QualityReport::default();
    for (token, vec) in vectors {
        report.record(token, &validate(vec));
    }
    report
}

/// Stream a canonical vector file through the validator.
///
/// Lines with fewer than two fields are ignored; lines with unparseable
/// components count as invalid with a `ParseError` issue but are not part of
/// `total_loaded`.
pub fn validate_file(path: &Path) -> Result<QualityReport> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open vector file: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut report = QualityReport::default();
    let mut line = String::new();
    let mut vec: Vec<f64> = Vec::new();

    loop {
        line.clear();
        if reader
            .read_line(&mut line)
            .with_context(|| format!("Failed to read {}", path.display()))?
            == 0
        {
            break;
        }

        let mut fields = line.split_whitespace();
        let Some(token) = fields.next() else {
            continue;
        };

        vec.clear();
        let mut ok = true;
        for field in fields {
            match field.parse::<f64>() {
                Ok(v) => vec.push(v),
                Err(_) => {
                    ok = false;
                    break;
                }
            }
        }
        if vec.is_empty() && ok {
            continue;
        }
        if !ok {
            report.record_parse_error(token);
            continue;
        }

        report.record(token, &validate(&vec));
    }

    info!(
        path = %path.display(),
        valid = report.valid,
        invalid = report.invalid,
        "Validated vector file"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_vector_is_valid() {
        let v = validate(&[0.6_f64, 0.8]);
        assert!(v.is_valid);
        assert!(v.issues.is_empty());
        assert!((v.norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_reports_every_issue() {
        let v = validate(&[0.0_f64, 0.0, 0.0]);
        assert!(!v.is_valid);
        assert_eq!(
            v.issues,
            vec![
                IssueKind::AllZeros,
                IssueKind::NormTooSmall,
                IssueKind::NormNotUnit
            ]
        );
    }

    #[test]
    fn test_nan_only_flags_nan() {
        let v = validate(&[f64::NAN, 1.0]);
        assert_eq!(v.issues, vec![IssueKind::ContainsNan]);
    }

    #[test]
    fn test_infinite_component() {
        let v = validate(&[f32::INFINITY, 0.0]);
        assert_eq!(
            v.issues,
            vec![
                IssueKind::ContainsInfinite,
                IssueKind::NormNotUnit,
                IssueKind::ExtremeValues
            ]
        );
    }

    #[test]
    fn test_extreme_and_unnormalized() {
        let v = validate(&[11.0_f64, 0.0]);
        assert_eq!(
            v.issues,
            vec![IssueKind::NormNotUnit, IssueKind::ExtremeValues]
        );
    }

    #[test]
    fn test_report_histogram() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.txt");
        std::fs::write(&path, "good 0.6 0.8\nzero 0 0\nbig 20 0\nbad 1 oops\nlonely\n").unwrap();

        let report = validate_file(&path).unwrap();
        assert_eq!(report.total_loaded, 3);
        assert_eq!(report.valid, 1);
        assert_eq!(report.invalid, 3);
        assert_eq!(report.issues[&IssueKind::ParseError], 1);
        assert_eq!(report.issues[&IssueKind::NormNotUnit], 2);
        assert_eq!(report.issues[&IssueKind::AllZeros], 1);
        assert_eq!(report.invalid_samples, vec!["zero", "big", "bad"]);
        assert!((report.quality_pct() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate_all() {
        let a = [0.6_f32, 0.8];
        let b = [0.0_f32, 0.0];
        let report = validate_all([("aa", &a[..]), ("bb", &b[..])]);
        assert_eq!(report.total_loaded, 2);
        assert_eq!(report.valid, 1);
        assert_eq!(report.issues[&IssueKind::AllZeros], 1);
    }
}
