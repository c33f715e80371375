// Embedding loader — canonical vector files into in-memory snapshots.
//
// A snapshot is one source at one point in time: token → vector. Files are
// streamed line by line into a reused buffer, so the raw text is never held
// alongside the parsed vectors. Vectors are stored as f32 to keep a full
// 300-dimensional vocabulary within reach; all arithmetic downstream happens
// in f64.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::vectors::{majority_dim, DIM_SAMPLE_LINES};

/// Malformed-line warnings emitted per file before going quiet.
const MAX_LINE_WARNINGS: u64 = 20;

/// An immutable token → vector mapping for one time slice.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl Snapshot {
    /// Build a snapshot from in-memory pairs. Pairs whose dimension differs
    /// from the first pair are dropped.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: Into<String>,
    {
        let mut snapshot = Self::default();
        for (token, vec) in pairs {
            if snapshot.dim == 0 {
                snapshot.dim = vec.len();
            }
            if vec.len() == snapshot.dim {
                snapshot.vectors.insert(token.into(), vec);
            }
        }
        snapshot
    }

    pub fn get(&self, token: &str) -> Option<&[f32]> {
        self.vectors.get(token).map(Vec::as_slice)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.vectors.contains_key(token)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Every token and its vector, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.vectors.iter().map(|(t, v)| (t.as_str(), v.as_slice()))
    }
}

/// Line accounting for one loaded file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub loaded: u64,
    pub malformed: u64,
    /// Later lines for a token already loaded; the first occurrence wins.
    pub duplicates: u64,
}

/// Accumulates one file's snapshot. The first `DIM_SAMPLE_LINES` parsed
/// lines are held back and the dimension is the most common length among
/// them, so a truncated leading line can't disqualify the rest of the file.
struct SnapshotBuilder<'a> {
    path: &'a Path,
    snapshot: Snapshot,
    stats: LoadStats,
    pending: Vec<(u64, String, Vec<f32>)>,
}

impl<'a> SnapshotBuilder<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            snapshot: Snapshot::default(),
            stats: LoadStats::default(),
            pending: Vec::new(),
        }
    }

    fn reject(&mut self, line_no: u64, reason: &str) {
        self.stats.malformed += 1;
        if self.stats.malformed <= MAX_LINE_WARNINGS {
            warn!(
                line = line_no,
                path = %self.path.display(),
                reason = reason,
                "Skipping malformed vector line"
            );
        }
    }

    fn offer(&mut self, line_no: u64, token: &str, vec: Vec<f32>) {
        if self.snapshot.dim > 0 {
            self.accept(line_no, token, vec);
            return;
        }
        self.pending.push((line_no, token.to_string(), vec));
        if self.pending.len() >= DIM_SAMPLE_LINES {
            self.settle();
        }
    }

    fn settle(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if let Some(dim) = majority_dim(pending.iter().map(|(_, _, v)| v.len())) {
            self.snapshot.dim = dim;
        }
        for (line_no, token, vec) in pending {
            self.accept(line_no, &token, vec);
        }
    }

    fn accept(&mut self, line_no: u64, token: &str, vec: Vec<f32>) {
        if vec.len() != self.snapshot.dim {
            self.stats.malformed += 1;
            if self.stats.malformed <= MAX_LINE_WARNINGS {
                warn!(
                    line = line_no,
                    path = %self.path.display(),
                    fields = vec.len(),
                    expected = self.snapshot.dim,
                    "Skipping vector line with wrong field count"
                );
            }
            return;
        }
        if self.snapshot.vectors.contains_key(token) {
            self.stats.duplicates += 1;
            return;
        }
        self.snapshot.vectors.insert(token.to_string(), vec);
        self.stats.loaded += 1;
    }

    fn finish(mut self) -> (Snapshot, LoadStats) {
        self.settle();
        if self.stats.malformed > MAX_LINE_WARNINGS {
            warn!(
                malformed = self.stats.malformed,
                path = %self.path.display(),
                "Further malformed-line warnings suppressed"
            );
        }
        if self.stats.malformed > self.stats.loaded {
            warn!(
                malformed = self.stats.malformed,
                loaded = self.stats.loaded,
                dim = self.snapshot.dim,
                path = %self.path.display(),
                "Most vector lines were rejected; check the file's dimension"
            );
        }
        (self.snapshot, self.stats)
    }
}

/// Load one canonical vector file.
///
/// Lines with a non-numeric or non-finite component, or a field count that
/// differs from the file's dimension, are skipped with a line-numbered
/// warning.
pub fn load_snapshot(path: &Path) -> Result<(Snapshot, LoadStats)> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open vector file: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut builder = SnapshotBuilder::new(path);
    let mut line = String::new();
    let mut line_no: u64 = 0;

    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        line_no += 1;

        let mut fields = line.split_whitespace();
        let Some(token) = fields.next() else {
            continue;
        };

        match fields.map(str::parse::<f32>).collect::<Result<Vec<f32>, _>>() {
            Ok(v) if v.is_empty() => builder.reject(line_no, "no components"),
            Ok(v) if v.iter().any(|c| !c.is_finite()) => {
                builder.reject(line_no, "non-finite component")
            }
            Ok(v) => builder.offer(line_no, token, v),
            Err(_) => builder.reject(line_no, "non-numeric component"),
        }
    }

    let (snapshot, stats) = builder.finish();
    info!(
        path = %path.display(),
        vectors = stats.loaded,
        dim = snapshot.dim,
        "Loaded snapshot"
    );
    Ok((snapshot, stats))
}

/// Load several files, one snapshot per file, in the given order.
///
/// Callers pass files in year order; nothing here checks that.
pub fn load_snapshots(paths: &[PathBuf]) -> Result<Vec<Snapshot>> {
    paths
        .iter()
        .map(|p| load_snapshot(p).map(|(s, _)| s))
        .collect()
}

/// Lazily yields one snapshot per file so a caller can finish with a slice
/// before the next is read, keeping peak memory at one slice.
pub struct SnapshotStream {
    paths: std::vec::IntoIter<PathBuf>,
}

impl SnapshotStream {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths: paths.into_iter(),
        }
    }
}

impl Iterator for SnapshotStream {
    type Item = Result<(PathBuf, Snapshot, LoadStats)>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.next()?;
        debug!(path = %path.display(), "Loading next slice");
        Some(load_snapshot(&path).map(|(s, stats)| (path, s, stats)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.txt");
        std::fs::write(
            &path,
            "man 1 0\nwoman 0 1\nshort 1\nbad 1 q\n\nman 9 9\nnurse 0.5 0.5\n",
        )
        .unwrap();

        let (snap, stats) = load_snapshot(&path).unwrap();
        assert_eq!(snap.dim(), 2);
        assert_eq!(snap.len(), 3);
        assert_eq!(snap.get("man"), Some(&[1.0f32, 0.0][..]));
        assert_eq!(stats.loaded, 3);
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.duplicates, 1);
    }

    #[test]
    fn test_truncated_first_line_does_not_fix_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.txt");
        std::fs::write(&path, "broken 0.5\nman 1 0 0\nwoman 0 1 0\nnurse 0 0 1\n").unwrap();

        let (snap, stats) = load_snapshot(&path).unwrap();
        assert_eq!(snap.dim(), 3);
        assert_eq!(snap.len(), 3);
        assert!(!snap.contains("broken"));
        assert_eq!(stats.loaded, 3);
        assert_eq!(stats.malformed, 1);
    }

    #[test]
    fn test_dimension_holds_past_the_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.txt");
        let mut text = String::from("odd 1\n");
        for i in 0..DIM_SAMPLE_LINES + 10 {
            text.push_str(&format!("w{} 1 2\n", "x".repeat(i + 1)));
        }
        text.push_str("late 1 2 3\n");
        std::fs::write(&path, text).unwrap();

        let (snap, stats) = load_snapshot(&path).unwrap();
        assert_eq!(snap.dim(), 2);
        assert_eq!(stats.loaded, DIM_SAMPLE_LINES as u64 + 10);
        assert_eq!(stats.malformed, 2);
    }

    #[test]
    fn test_overflowing_component_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.txt");
        std::fs::write(&path, "huge 1e40 0\nman 1 0\nwoman 0 1\n").unwrap();

        let (snap, stats) = load_snapshot(&path).unwrap();
        assert!(!snap.contains("huge"));
        assert_eq!(snap.len(), 2);
        assert_eq!(stats.malformed, 1);
    }

    #[test]
    fn test_scientific_notation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.txt");
        std::fs::write(&path, "aa 1e-3 -2.5E+1\n").unwrap();
        let (snap, _) = load_snapshot(&path).unwrap();
        let v = snap.get("aa").unwrap();
        assert!((v[0] - 0.001).abs() < 1e-9);
        assert!((v[1] + 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_load_snapshots_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "aa 1 0\n").unwrap();
        std::fs::write(&b, "bb 0 1\ncc 1 1\n").unwrap();

        let snaps = load_snapshots(&[b.clone(), a.clone()]).unwrap();
        assert_eq!(snaps[0].len(), 2);
        assert_eq!(snaps[1].len(), 1);

        let streamed: Vec<_> = SnapshotStream::new(vec![a, b]).map(|r| r.unwrap()).collect();
        assert_eq!(streamed[0].1.len(), 1);
        assert_eq!(streamed[1].1.len(), 2);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_snapshot(Path::new("/nonexistent/vectors.txt")).is_err());
    }

    #[test]
    fn test_from_pairs_drops_mismatched_dim() {
        let snap = Snapshot::from_pairs([("aa", vec![1.0, 0.0]), ("bb", vec![1.0])]);
        assert_eq!(snap.len(), 1);
        assert!(!snap.contains("bb"));
    }
}
