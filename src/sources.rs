// Embedding source kinds, their year sequences, and canonical file naming.
//
// A run is keyed by a free-form label ("sgns", "svd_lemma", "commoncrawlglove",
// ...). The label resolves to exactly one source kind, which fixes the year
// sequence every time series of that run is aligned to.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Year assigned to single-snapshot (static) sources.
pub const STATIC_YEAR: i32 = 2015;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EmbeddingSourceKind {
    Sgns,
    Svd,
    Wikipedia,
    GoogleNews,
    CommonCrawlGlove,
    Nyt,
    Unknown,
}

impl EmbeddingSourceKind {
    /// Resolve a run label, case-insensitively. Precedence follows the order
    /// the labels were historically checked in, so "svd_sgns" is SVD.
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("svd") {
            Self::Svd
        } else if label.contains("sgns") {
            Self::Sgns
        } else if label.contains("wikipedia") {
            Self::Wikipedia
        } else if label.contains("google") {
            Self::GoogleNews
        } else if label.contains("commoncrawlglove") {
            Self::CommonCrawlGlove
        } else if label.contains("nyt") {
            Self::Nyt
        } else {
            Self::Unknown
        }
    }

    /// The fixed year sequence for this kind. `Unknown` is rejected rather
    /// than defaulted.
    pub fn years(&self) -> Result<Vec<i32>, ConfigError> {
        match self {
            Self::Sgns | Self::Svd => Ok((1910..2000).step_by(10).collect()),
            Self::Wikipedia | Self::GoogleNews | Self::CommonCrawlGlove => Ok(vec![STATIC_YEAR]),
            Self::Nyt => Ok((1987..2005).collect()),
            Self::Unknown => Err(ConfigError::UnknownSource(self.to_string())),
        }
    }

    /// Temporal kinds have one canonical file per year.
    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Sgns | Self::Svd | Self::Nyt)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sgns => "SGNS",
            Self::Svd => "SVD",
            Self::Wikipedia => "Wikipedia",
            Self::GoogleNews => "GoogleNews",
            Self::CommonCrawlGlove => "CommonCrawlGlove",
            Self::Nyt => "NYT",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for EmbeddingSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolve a label straight to its year sequence, reporting the label itself
/// when it is unrecognized.
pub fn years_for_label(label: &str) -> Result<Vec<i32>, ConfigError> {
    match EmbeddingSourceKind::from_label(label) {
        EmbeddingSourceKind::Unknown => Err(ConfigError::UnknownSource(label.to_string())),
        kind => kind.years(),
    }
}

/// Year sequence for a per-year source. Unknown labels and static sources
/// are rejected with the label as given.
pub fn temporal_years(label: &str) -> Result<Vec<i32>> {
    let years = years_for_label(label)?;
    let kind = EmbeddingSourceKind::from_label(label);
    if !kind.is_temporal() {
        anyhow::bail!("{label} is a static source ({kind}); only per-year sources are exported");
    }
    Ok(years)
}

/// `<dir>/vectors_<label><year>.txt`
pub fn temporal_vector_file(dir: &Path, label: &str, year: i32) -> PathBuf {
    dir.join(format!("vectors_{label}{year}.txt"))
}

/// `<dir>/vocab/vocab_<label><year>.txt`
pub fn temporal_vocab_file(dir: &Path, label: &str, year: i32) -> PathBuf {
    dir.join("vocab").join(format!("vocab_{label}{year}.txt"))
}

/// `<dir>/vectors<label>.txt`
pub fn static_vector_file(dir: &Path, label: &str) -> PathBuf {
    dir.join(format!("vectors{label}.txt"))
}

/// `<dir>/vocab/vocab<label>.txt`
pub fn static_vocab_file(dir: &Path, label: &str) -> PathBuf {
    dir.join("vocab").join(format!("vocab{label}.txt"))
}

/// One time slice of a labeled source: its year and canonical files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceFiles {
    pub year: i32,
    pub vectors: PathBuf,
    pub vocab: PathBuf,
}

/// All slices for a label, in year order.
pub fn slice_files(dir: &Path, label: &str) -> Result<Vec<SliceFiles>, ConfigError> {
    let kind = EmbeddingSourceKind::from_label(label);
    let years = years_for_label(label)?;
    Ok(years
        .into_iter()
        .map(|year| {
            if kind.is_temporal() {
                SliceFiles {
                    year,
                    vectors: temporal_vector_file(dir, label, year),
                    vocab: temporal_vocab_file(dir, label, year),
                }
            } else {
                SliceFiles {
                    year,
                    vectors: static_vector_file(dir, label),
                    vocab: static_vocab_file(dir, label),
                }
            }
        })
        .collect())
}

/// Well-known static canonical files, by display name.
const STATIC_FILES: [(&str, &str); 3] = [
    ("GloVe", "vectorscommoncrawlglove.txt"),
    ("GoogleNews", "vectorsGoogleNews_exactclean.txt"),
    ("Wikipedia", "vectorswikipedia.txt"),
];

/// Canonical vector files found in a directory.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredVectors {
    pub static_sources: BTreeMap<String, PathBuf>,
    pub sgns: BTreeMap<i32, PathBuf>,
    pub svd: BTreeMap<i32, PathBuf>,
}

impl DiscoveredVectors {
    pub fn is_empty(&self) -> bool {
        self.static_sources.is_empty() && self.sgns.is_empty() && self.svd.is_empty()
    }

    pub fn len(&self) -> usize {
        self.static_sources.len() + self.sgns.len() + self.svd.len()
    }

    /// Flatten to `(name, path)` pairs: static sources first, then SGNS and
    /// SVD in year order. Names look like `static_GloVe` or `sgns_1950`.
    pub fn entries(&self) -> Vec<(String, PathBuf)> {
        let statics = self
            .static_sources
            .iter()
            .map(|(name, p)| (format!("static_{name}"), p.clone()));
        let sgns = self
            .sgns
            .iter()
            .map(|(y, p)| (format!("sgns_{y}"), p.clone()));
        let svd = self.svd.iter().map(|(y, p)| (format!("svd_{y}"), p.clone()));
        statics.chain(sgns).chain(svd).collect()
    }
}

fn temporal_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^vectors_(sgns|svd)(\d{4})\.txt$").expect("static regex is valid")
    })
}

/// Scan a canonical directory for known static files and per-year SGNS/SVD files.
pub fn discover_vector_files(dir: &Path) -> Result<DiscoveredVectors> {
    let mut found = DiscoveredVectors::default();

    for (name, file) in STATIC_FILES {
        let path = dir.join(file);
        if path.exists() {
            found.static_sources.insert(name.to_string(), path);
        }
    }

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list vector directory: {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(caps) = temporal_pattern().captures(name) else {
            continue;
        };
        let Ok(year) = caps[2].parse::<i32>() else {
            continue;
        };
        let target = if &caps[1] == "sgns" {
            &mut found.sgns
        } else {
            &mut found.svd
        };
        target.insert(year, entry.path());
    }

    Ok(found)
}
