// Result records — what an analysis run hands to external reporting.
//
// Records are stored as JSON Lines, one record per run, appended to
// `<output_dir>/<label>.jsonl`. Every series keeps one value per year; an
// unmeasured slice is NaN in memory and `null` on disk, never a dropped
// position.

pub mod value;

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{info, warn};

/// One scalar per year. `values.len() == years.len()` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub years: Vec<i32>,
    #[serde(with = "nan_as_null")]
    pub values: Vec<f64>,
}

impl TimeSeries {
    /// A series of all-NaN values over `years`.
    pub fn unmeasured(years: &[i32]) -> Self {
        Self {
            years: years.to_vec(),
            values: vec![f64::NAN; years.len()],
        }
    }

    /// Pair years with values. Panics if the lengths differ, since a
    /// misaligned series would silently shift every later column.
    pub fn new(years: Vec<i32>, values: Vec<f64>) -> Self {
        assert_eq!(
            years.len(),
            values.len(),
            "time series must have one value per year"
        );
        Self { years, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `year`, `None` if the year is not part of the series.
    pub fn at(&self, year: i32) -> Option<f64> {
        self.years
            .iter()
            .position(|&y| y == year)
            .map(|i| self.values[i])
    }

    /// Number of measured (non-NaN) positions.
    pub fn measured(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }
}

/// NaN ↔ `null` for `Vec<f64>`.
pub mod nan_as_null {
    use super::*;

    pub fn serialize<S: Serializer>(values: &[f64], s: S) -> Result<S::Ok, S::Error> {
        let opt: Vec<Option<f64>> = values
            .iter()
            .map(|v| if v.is_finite() { Some(*v) } else { None })
            .collect();
        opt.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        let opt: Vec<Option<f64>> = Vec::deserialize(d)?;
        Ok(opt.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

/// `list name → scalar`, with NaN stored as null.
pub mod nan_map {
    use super::*;

    pub fn serialize<S: Serializer>(map: &BTreeMap<String, f64>, s: S) -> Result<S::Ok, S::Error> {
        let opt: BTreeMap<&String, Option<f64>> = map
            .iter()
            .map(|(k, v)| (k, v.is_finite().then_some(*v)))
            .collect();
        opt.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, f64>, D::Error> {
        let opt: BTreeMap<String, Option<f64>> = BTreeMap::deserialize(d)?;
        Ok(opt
            .into_iter()
            .map(|(k, v)| (k, v.unwrap_or(f64::NAN)))
            .collect())
    }
}

/// The output of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub years: Vec<i32>,
    /// list → word → one count per slice.
    pub counts_all: BTreeMap<String, BTreeMap<String, Vec<u64>>>,
    /// list → number of list words present in each slice's snapshot.
    pub coverage: BTreeMap<String, Vec<usize>>,
    /// list → centroid dispersion across slices.
    #[serde(with = "nan_map")]
    pub variance_over_time: BTreeMap<String, f64>,
    /// `<neutral>_<group>` → association distance per slice.
    pub distances: BTreeMap<String, TimeSeries>,
    /// neutral list → neutral word → group list → distance per slice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indiv_distances_neutral: Option<IndividualDistances>,
    /// group list → group word → neutral list → distance per slice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indiv_distances_group: Option<IndividualDistances>,
}

/// Per-word trajectories, keyed by the list that owns the word, then the
/// word, then the list it is measured against. A word shared by two lists
/// gets one entry under each.
pub type IndividualDistances = BTreeMap<String, BTreeMap<String, BTreeMap<String, TimeSeries>>>;

/// Key under which a neutral/group pair's distance series is stored.
pub fn distance_key(neutral: &str, group: &str) -> String {
    format!("{neutral}_{group}")
}

/// `<output_dir>/<label>.jsonl`
pub fn record_path(output_dir: &Path, label: &str) -> PathBuf {
    output_dir.join(format!("{label}.jsonl"))
}

/// Append one record to its label's JSONL file, creating the directory.
pub fn append_record(output_dir: &Path, record: &RunRecord) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
    let path = record_path(output_dir, &record.label);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open result file: {}", path.display()))?;

    let line = serde_json::to_string(record).context("Failed to serialize run record")?;
    writeln!(file, "{line}").with_context(|| format!("Failed to write {}", path.display()))?;
    info!(label = %record.label, path = %path.display(), "Stored run record");
    Ok(path)
}

/// Read every record in a JSONL file. Unparseable lines are skipped with a
/// warning.
pub fn read_records(path: &Path) -> Result<Vec<RunRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open result file: {}", path.display()))?;
    let mut records = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RunRecord>(&line) {
            Ok(r) => records.push(r),
            Err(e) => warn!(line = i + 1, path = %path.display(), error = %e, "Skipping unreadable record"),
        }
    }
    Ok(records)
}

/// Count stored records per label file in a directory. A missing directory
/// counts as empty.
pub fn count_records(output_dir: &Path) -> Result<BTreeMap<String, usize>> {
    let mut counts = BTreeMap::new();
    if !output_dir.is_dir() {
        return Ok(counts);
    }
    for entry in fs::read_dir(output_dir)
        .with_context(|| format!("Failed to list {}", output_dir.display()))?
    {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "jsonl") {
            let label = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            counts.insert(label, text.lines().filter(|l| !l.trim().is_empty()).count());
        }
    }
    Ok(counts)
}
