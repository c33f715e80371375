// Vector normalizer — raw embedding source to canonical unit-norm file.
//
// Two entry points share one rule set: plain-text sources (GloVe-style
// `token v1 ... vD` lines) and word2vec binary stores. For every record the
// token is cleaned, the vector's L2 norm is computed, near-zero vectors are
// dropped with their own counter, and the rest are divided by their norm and
// written out in source order.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::word2vec::Word2VecReader;
use super::{clean_token, format_line, l2_norm, majority_dim, DIM_SAMPLE_LINES, NEAR_ZERO_NORM};

/// Progress ticks every this many source records.
const PROGRESS_EVERY: u64 = 100_000;

/// Counters reported when a normalization pass completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeStats {
    /// Vectors written to the canonical file.
    pub written: u64,
    /// Vectors dropped because their norm was below `NEAR_ZERO_NORM`.
    pub near_zero_norm: u64,
    /// Records whose token cleaned down to fewer than two letters.
    pub short_token: u64,
    /// Records with an unparseable component or an inconsistent dimension.
    pub malformed: u64,
}

impl NormalizeStats {
    pub fn skipped(&self) -> u64 {
        self.near_zero_norm + self.short_token + self.malformed
    }
}

/// Outcome of pushing one record through the shared normalization rule.
enum Record {
    Written,
    ShortToken,
    NearZero,
    Malformed,
    /// Held until the output dimension is settled.
    Deferred,
}

/// Writes canonical lines and enforces a constant dimension per output file.
///
/// Without a known dimension the first `DIM_SAMPLE_LINES` records are held
/// back and the dimension is the most common length among the usable ones.
struct CanonicalWriter<W: Write> {
    out: W,
    dim: Option<usize>,
    pending: Vec<(String, Vec<f64>)>,
    stats: NormalizeStats,
}

impl<W: Write> CanonicalWriter<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            dim: None,
            pending: Vec::new(),
            stats: NormalizeStats::default(),
        }
    }

    /// A writer whose dimension is already known, e.g. from a binary header.
    fn with_dim(out: W, dim: usize) -> Self {
        Self {
            dim: Some(dim),
            ..Self::new(out)
        }
    }

    fn push(&mut self, raw_token: &str, vec: &[f64]) -> Result<Record> {
        if self.dim.is_some() {
            return self.emit(raw_token, vec);
        }
        self.pending.push((raw_token.to_string(), vec.to_vec()));
        if self.pending.len() >= DIM_SAMPLE_LINES {
            self.settle()?;
        }
        Ok(Record::Deferred)
    }

    fn settle(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        self.dim = majority_dim(
            pending
                .iter()
                .filter(|(t, v)| clean_token(t).is_some() && v.iter().all(|c| c.is_finite()))
                .map(|(_, v)| v.len()),
        );
        for (token, vec) in &pending {
            if let Record::Malformed = self.emit(token, vec)? {
                debug!(token = %token, "Inconsistent vector record");
            }
        }
        Ok(())
    }

    fn emit(&mut self, raw_token: &str, vec: &[f64]) -> Result<Record> {
        let outcome = self.classify(raw_token, vec)?;
        match outcome {
            Record::Written => self.stats.written += 1,
            Record::ShortToken => self.stats.short_token += 1,
            Record::NearZero => self.stats.near_zero_norm += 1,
            Record::Malformed => self.stats.malformed += 1,
            Record::Deferred => {}
        }
        Ok(outcome)
    }

    fn classify(&mut self, raw_token: &str, vec: &[f64]) -> Result<Record> {
        let Some(token) = clean_token(raw_token) else {
            return Ok(Record::ShortToken);
        };

        if vec.is_empty() || vec.iter().any(|v| !v.is_finite()) {
            return Ok(Record::Malformed);
        }
        match self.dim {
            Some(d) if d != vec.len() => return Ok(Record::Malformed),
            Some(_) => {}
            None => self.dim = Some(vec.len()),
        }

        let norm = l2_norm(vec);
        if norm < NEAR_ZERO_NORM {
            return Ok(Record::NearZero);
        }

        let normed: Vec<f64> = vec.iter().map(|v| v / norm).collect();
        writeln!(self.out, "{}", format_line(&token, &normed))?;
        Ok(Record::Written)
    }

    fn finish(mut self) -> Result<NormalizeStats> {
        if !self.pending.is_empty() {
            self.settle()?;
        }
        self.out.flush()?;
        Ok(self.stats)
    }
}

fn create_output(output: &Path) -> Result<BufWriter<File>> {
    if let Some(dir) = output.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        }
    }
    let file = File::create(output)
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    Ok(BufWriter::new(file))
}

fn spinner(label: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg} {pos} records ({elapsed})")
            .unwrap(),
    );
    pb.set_message(label.to_string());
    pb
}

/// Normalize a plain-text vector source into a canonical file.
///
/// Blank lines are ignored. A line with any unparseable component is skipped
/// and counted as malformed; it is never zero-filled.
pub fn normalize_text(input: &Path, output: &Path) -> Result<NormalizeStats> {
    let file = File::open(input)
        .with_context(|| format!("Failed to open vector source: {}", input.display()))?;
    let mut reader = BufReader::new(file);
    let mut writer = CanonicalWriter::new(create_output(output)?);

    let pb = spinner("Normalizing");
    let mut line = String::new();
    let mut line_no: u64 = 0;
    let mut components: Vec<f64> = Vec::new();

    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .with_context(|| format!("Failed to read {}", input.display()))?;
        if n == 0 {
            break;
        }
        line_no += 1;

        let mut fields = line.split_whitespace();
        let Some(raw_token) = fields.next() else {
            continue;
        };

        components.clear();
        let mut parse_failed = false;
        for field in fields {
            match field.parse::<f64>() {
                Ok(v) => components.push(v),
                Err(_) => {
                    parse_failed = true;
                    break;
                }
            }
        }

        if parse_failed {
            writer.stats.malformed += 1;
            debug!(line = line_no, token = raw_token, "Unparseable vector component");
            continue;
        }

        if let Record::Malformed = writer.push(raw_token, &components)? {
            debug!(line = line_no, token = raw_token, "Inconsistent vector record");
        }

        if line_no % PROGRESS_EVERY == 0 {
            pb.set_position(line_no);
        }
    }
    pb.finish_and_clear();

    let stats = writer.finish()?;
    report(input, output, &stats);
    Ok(stats)
}

/// Normalize a word2vec binary store into a canonical file.
///
/// Keys are visited in the store's native order. A truncated record ends the
/// pass with an error since the stream can't be resynchronized.
pub fn normalize_binary(input: &Path, output: &Path) -> Result<NormalizeStats> {
    let file = File::open(input)
        .with_context(|| format!("Failed to open binary vector store: {}", input.display()))?;
    let reader = Word2VecReader::new(BufReader::new(file))
        .with_context(|| format!("Failed to read {}", input.display()))?;
    info!(
        vocab = reader.vocab_size(),
        dim = reader.dim(),
        "Opened word2vec binary store"
    );

    let mut writer = CanonicalWriter::with_dim(create_output(output)?, reader.dim());
    let pb = spinner("Normalizing");
    let mut components: Vec<f64> = Vec::with_capacity(reader.dim());

    for (i, record) in reader.enumerate() {
        let (raw_token, vec) = record.with_context(|| format!("Corrupt {}", input.display()))?;
        components.clear();
        components.extend(vec.iter().map(|&v| v as f64));
        writer.push(&raw_token, &components)?;

        if (i as u64 + 1) % PROGRESS_EVERY == 0 {
            pb.set_position(i as u64 + 1);
        }
    }
    pb.finish_and_clear();

    let stats = writer.finish()?;
    report(input, output, &stats);
    Ok(stats)
}

fn report(input: &Path, output: &Path, stats: &NormalizeStats) {
    info!(
        input = %input.display(),
        output = %output.display(),
        written = stats.written,
        near_zero_norm = stats.near_zero_norm,
        "Normalization complete"
    );
    if stats.malformed > 0 {
        warn!(
            malformed = stats.malformed,
            input = %input.display(),
            "Skipped malformed vector records"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &str) -> (NormalizeStats, String) {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("raw.txt");
        let out = dir.path().join("nested/out/vectors.txt");
        std::fs::write(&src, input).unwrap();
        let stats = normalize_text(&src, &out).unwrap();
        (stats, std::fs::read_to_string(&out).unwrap())
    }

    #[test]
    fn test_normalizes_and_cleans() {
        let (stats, out) = run("Man 3 4\nthe 0 2\n");
        assert_eq!(stats.written, 2);
        assert_eq!(out, "man 0.6 0.8\nthe 0 1\n");
    }

    #[test]
    fn test_drops_near_zero_norm() {
        let (stats, out) = run("tiny 0.001 0.001\nbig 1 0\n");
        assert_eq!(stats.near_zero_norm, 1);
        assert_eq!(stats.written, 1);
        assert!(!out.contains("tiny"));
    }

    #[test]
    fn test_short_and_malformed_counted_separately() {
        let (stats, out) = run("a 1 0\nword 1 x\n, 1 1\nok 1 0\nbad 1 0 0\n\n");
        assert_eq!(stats.short_token, 2);
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.written, 1);
        assert_eq!(out, "ok 1 0\n");
        assert_eq!(stats.skipped(), 4);
    }

    #[test]
    fn test_truncated_first_line_does_not_fix_dimension() {
        let (stats, out) = run("broken 0.5\nman 1 0 0\nwoman 0 2 0\nnurse 0 0 3\n");
        assert_eq!(stats.written, 3);
        assert_eq!(stats.malformed, 1);
        assert_eq!(out, "man 1 0 0\nwoman 0 1 0\nnurse 0 0 1\n");
    }

    #[test]
    fn test_binary_matches_text_rule() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("vectors.bin");
        let bytes = crate::vectors::word2vec::encode(
            &[
                ("New_York", vec![3.0, 4.0]),
                ("x", vec![1.0, 0.0]),
                ("zero", vec![0.0, 0.0]),
            ],
            true,
        );
        std::fs::write(&bin, bytes).unwrap();
        let out = dir.path().join("out.txt");
        let stats = normalize_binary(&bin, &out).unwrap();

        assert_eq!(stats.written, 1);
        assert_eq!(stats.short_token, 1);
        assert_eq!(stats.near_zero_norm, 1);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "newyork 0.6 0.8\n");
    }

    #[test]
    fn test_missing_input_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = normalize_text(&dir.path().join("nope.txt"), &dir.path().join("o.txt"));
        assert!(err.is_err());
    }
}
