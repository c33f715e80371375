// Temporal vector exporter — decade matrices to canonical per-year files.
//
// Each year of a temporal source ships as a dense `<year>-w.npy` matrix, a
// pickled vocabulary list whose entry i names row i, and optionally a pickled
// token→count table in a sibling `counts/` directory. The exporter writes the
// rows back out verbatim (no renormalization) in original row order, plus a
// `token count` vocabulary file when counts exist.
//
// Row errors are logged and the row is dropped from both outputs. Rows are
// never reordered.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::Array2;
use ndarray_npy::read_npy;
use serde::Serialize;
use serde_pickle::{DeOptions, HashableValue, Value};
use tracing::{info, warn};

use super::format_line;
use crate::sources::{temporal_vector_file, temporal_vocab_file};

/// A year's vector matrix in whatever float width it was saved with.
pub enum DecadeMatrix {
    F32(Array2<f32>),
    F64(Array2<f64>),
}

impl DecadeMatrix {
    pub fn rows(&self) -> usize {
        match self {
            Self::F32(m) => m.nrows(),
            Self::F64(m) => m.nrows(),
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            Self::F32(m) => m.ncols(),
            Self::F64(m) => m.ncols(),
        }
    }

    /// Canonical line for row `i`, components printed at their stored width.
    fn line(&self, token: &str, i: usize) -> String {
        match self {
            Self::F32(m) => format_line(token, m.row(i).iter()),
            Self::F64(m) => format_line(token, m.row(i).iter()),
        }
    }
}

/// Load a `.npy` matrix, accepting either float64 or float32 storage.
pub fn read_matrix(path: &Path) -> Result<DecadeMatrix> {
    if let Ok(m) = read_npy::<_, Array2<f64>>(path) {
        return Ok(DecadeMatrix::F64(m));
    }
    let m = read_npy::<_, Array2<f32>>(path)
        .with_context(|| format!("Failed to read vector matrix: {}", path.display()))?;
    Ok(DecadeMatrix::F32(m))
}

fn read_pickle(path: &Path) -> Result<Value> {
    let file =
        File::open(path).with_context(|| format!("Failed to open pickle: {}", path.display()))?;
    serde_pickle::value_from_reader(BufReader::new(file), DeOptions::new().decode_strings())
        .with_context(|| format!("Failed to unpickle {}", path.display()))
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        _ => None,
    }
}

fn hashable_text(value: &HashableValue) -> Option<String> {
    match value {
        HashableValue::String(s) => Some(s.clone()),
        HashableValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        _ => None,
    }
}

/// Load a pickled vocabulary sequence. Entries that aren't strings are kept
/// as `None` so positions stay aligned with matrix rows.
pub fn read_vocab_pickle(path: &Path) -> Result<Vec<Option<String>>> {
    match read_pickle(path)? {
        Value::List(items) | Value::Tuple(items) => Ok(items.iter().map(text_of).collect()),
        other => anyhow::bail!(
            "Vocabulary pickle {} is not a sequence (found {})",
            path.display(),
            value_kind(&other)
        ),
    }
}

/// Load a pickled token→count table. Non-integer counts are dropped.
pub fn read_counts_pickle(path: &Path) -> Result<HashMap<String, u64>> {
    let Value::Dict(map) = read_pickle(path)? else {
        anyhow::bail!("Count pickle {} is not a dict", path.display());
    };

    let mut counts = HashMap::with_capacity(map.len());
    for (key, value) in &map {
        let Some(token) = hashable_text(key) else {
            continue;
        };
        let count = match value {
            Value::I64(n) if *n >= 0 => *n as u64,
            Value::F64(f) if f.is_finite() && *f >= 0.0 => *f as u64,
            _ => continue,
        };
        counts.insert(token, count);
    }
    Ok(counts)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::None => "None",
        Value::Dict(_) => "dict",
        Value::String(_) | Value::Bytes(_) => "str",
        Value::I64(_) | Value::F64(_) => "number",
        _ => "other value",
    }
}

/// Why a single row was left out of the export.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("vocabulary entry is not a string")]
    NotText,
    /// Empty or containing whitespace, which would break the line format.
    #[error("unusable token {0:?}")]
    UnusableToken(String),
    /// The vocabulary has more entries than the matrix has rows.
    #[error("no matrix row for token {0:?}")]
    NoMatrixRow(String),
    /// A count table exists but doesn't mention this token.
    #[error("token {0:?} missing from count table")]
    MissingCount(String),
}

/// Input locations for one labeled temporal source.
#[derive(Debug, Clone)]
pub struct TemporalSource {
    /// Label used in output file names (e.g. "sgns").
    pub label: String,
    /// Directory holding `<year>-w.npy` and `<year>-vocab.pkl`.
    pub raw_dir: PathBuf,
    /// Directory holding `<year>-counts.pkl`. Defaults to `<raw_dir>/../counts`.
    pub counts_dir: Option<PathBuf>,
}

impl TemporalSource {
    pub fn new(label: impl Into<String>, raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            raw_dir: raw_dir.into(),
            counts_dir: None,
        }
    }

    pub fn matrix_path(&self, year: i32) -> PathBuf {
        self.raw_dir.join(format!("{year}-w.npy"))
    }

    pub fn vocab_path(&self, year: i32) -> PathBuf {
        self.raw_dir.join(format!("{year}-vocab.pkl"))
    }

    pub fn counts_path(&self, year: i32) -> PathBuf {
        let dir = self
            .counts_dir
            .clone()
            .unwrap_or_else(|| self.raw_dir.join("..").join("counts"));
        dir.join(format!("{year}-counts.pkl"))
    }
}

/// What one year's export produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct YearExport {
    pub year: i32,
    pub rows_written: u64,
    pub rows_skipped: u64,
    /// Matrix rows beyond the end of the vocabulary, never exported.
    pub unlabeled_rows: u64,
    pub vectors_file: PathBuf,
    pub vocab_file: Option<PathBuf>,
}

/// Export in-memory year data. Separated from file loading so alignment rules
/// can be exercised directly.
pub fn export_rows(
    matrix: &DecadeMatrix,
    vocab: &[Option<String>],
    counts: Option<&HashMap<String, u64>>,
    vec_out: &mut impl Write,
    mut vocab_out: Option<&mut dyn Write>,
) -> Result<(u64, Vec<(usize, RowError)>)> {
    let mut written = 0;
    let mut errors = Vec::new();

    for (i, entry) in vocab.iter().enumerate() {
        let row = check_row(matrix, entry.as_deref(), counts, i);
        let (token, count) = match row {
            Ok(ok) => ok,
            Err(e) => {
                errors.push((i, e));
                continue;
            }
        };

        writeln!(vec_out, "{}", matrix.line(token, i))?;
        if let (Some(out), Some(count)) = (vocab_out.as_deref_mut(), count) {
            writeln!(out, "{token} {count}")?;
        }
        written += 1;
    }

    Ok((written, errors))
}

fn check_row<'a>(
    matrix: &DecadeMatrix,
    token: Option<&'a str>,
    counts: Option<&HashMap<String, u64>>,
    i: usize,
) -> Result<(&'a str, Option<u64>), RowError> {
    let token = token.ok_or(RowError::NotText)?;
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return Err(RowError::UnusableToken(token.to_string()));
    }
    if i >= matrix.rows() {
        return Err(RowError::NoMatrixRow(token.to_string()));
    }
    let count = match counts {
        Some(table) => Some(
            *table
                .get(token)
                .ok_or_else(|| RowError::MissingCount(token.to_string()))?,
        ),
        None => None,
    };
    Ok((token, count))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Export one year of a temporal source into `out_dir`.
pub fn export_year(source: &TemporalSource, year: i32, out_dir: &Path) -> Result<YearExport> {
    let matrix = read_matrix(&source.matrix_path(year))?;
    let vocab = read_vocab_pickle(&source.vocab_path(year))?;

    let counts_path = source.counts_path(year);
    let counts = if counts_path.exists() {
        Some(read_counts_pickle(&counts_path)?)
    } else {
        warn!(
            year,
            path = %counts_path.display(),
            "No count table; exporting vectors without a vocabulary file"
        );
        None
    };

    if vocab.len() != matrix.rows() {
        warn!(
            year,
            vocab = vocab.len(),
            rows = matrix.rows(),
            "Vocabulary length differs from matrix row count"
        );
    }

    let vectors_file = temporal_vector_file(out_dir, &source.label, year);
    let vocab_file = counts
        .as_ref()
        .map(|_| temporal_vocab_file(out_dir, &source.label, year));

    let mut vec_out = create(&vectors_file)?;
    let mut vocab_writer = match &vocab_file {
        Some(p) => Some(create(p)?),
        None => None,
    };

    let (written, errors) = export_rows(
        &matrix,
        &vocab,
        counts.as_ref(),
        &mut vec_out,
        vocab_writer.as_mut().map(|w| w as &mut dyn Write),
    )?;
    vec_out.flush()?;
    if let Some(w) = vocab_writer.as_mut() {
        w.flush()?;
    }

    for (row, err) in &errors {
        warn!(year, row, error = %err, "Skipping row");
    }

    let unlabeled_rows = matrix.rows().saturating_sub(vocab.len()) as u64;
    info!(
        year,
        label = %source.label,
        written,
        skipped = errors.len(),
        dim = matrix.dim(),
        "Exported year"
    );

    Ok(YearExport {
        year,
        rows_written: written,
        rows_skipped: errors.len() as u64,
        unlabeled_rows,
        vectors_file,
        vocab_file,
    })
}

/// Export every year in `years`. The loop is the same for any label.
pub fn export_years(
    source: &TemporalSource,
    years: &[i32],
    out_dir: &Path,
) -> Result<Vec<YearExport>> {
    years
        .iter()
        .map(|&year| {
            export_year(source, year, out_dir)
                .with_context(|| format!("Export failed for {} {year}", source.label))
        })
        .collect()
}
