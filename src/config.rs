use std::env;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::error::ConfigError;

pub const DEFAULT_VECTORS_DIR: &str = "vectors/normalized_clean";
pub const DEFAULT_RAW_DIR: &str = "vectors/raw";
pub const DEFAULT_WORDLISTS_DIR: &str = "data/word_lists";
pub const DEFAULT_OUTPUT_DIR: &str = "run_results";

/// Central configuration loaded from environment variables.
///
/// Every directory has a default relative to the working directory. The
/// .env file is loaded automatically at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    /// Canonical vector files, with a `vocab/` subdirectory for count tables.
    pub vectors_dir: PathBuf,
    /// Raw `.npy`/`.pkl` decade exports.
    pub raw_dir: PathBuf,
    /// Word list files (`<name>.txt`).
    pub wordlists_dir: PathBuf,
    /// Result records. Created on first write.
    pub output_dir: PathBuf,
}

fn dir_var(name: &str, default: &str) -> PathBuf {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        Ok(Self {
            vectors_dir: dir_var("BIASDRIFT_VECTORS_DIR", DEFAULT_VECTORS_DIR),
            raw_dir: dir_var("BIASDRIFT_RAW_DIR", DEFAULT_RAW_DIR),
            wordlists_dir: dir_var("BIASDRIFT_WORDLISTS_DIR", DEFAULT_WORDLISTS_DIR),
            output_dir: dir_var("BIASDRIFT_OUTPUT_DIR", DEFAULT_OUTPUT_DIR),
        })
    }

    /// Check that the canonical vector directory exists.
    /// Call this before validating, measuring coverage or running analyses.
    pub fn require_vectors(&self) -> Result<()> {
        require_dir(&self.vectors_dir)
    }

    /// Check that the raw export directory exists.
    pub fn require_raw(&self) -> Result<()> {
        require_dir(&self.raw_dir)
    }

    /// Check that the word list directory exists.
    pub fn require_wordlists(&self) -> Result<()> {
        require_dir(&self.wordlists_dir)
    }
}

/// Fail with `ConfigError::MissingInput` unless `dir` is a directory.
pub fn require_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(ConfigError::MissingInput(dir.to_path_buf()).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(require_dir(dir.path()).is_ok());
        let err = require_dir(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingInput(_))
        ));
    }
}
