// Typed errors callers need to tell apart.
//
// Most of the crate propagates `anyhow::Result` with context. The variants
// here are the configuration failures that end a run; everything else
// (malformed records, missing tokens, NaN slices) is a counter or a warning.

use std::path::PathBuf;

/// Fatal configuration problems for a single run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The label doesn't map to any known embedding source.
    #[error("Unrecognized embedding source label: {0:?} (expected one containing svd, sgns, wikipedia, google, commoncrawlglove or nyt)")]
    UnknownSource(String),

    /// A required input file or directory doesn't exist.
    #[error("Required input not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// A word list file exists but yields no usable tokens.
    #[error("Word list has no usable tokens: {}", .0.display())]
    EmptyWordList(PathBuf),

    /// Nothing to process at all.
    #[error("No inputs found: {0}")]
    NoInputs(String),
}
