// Word lists — the groups and neutral target sets an analysis compares.
//
// A list file holds one token per line. Lines are cleaned with the same rule
// the normalizer applies to vocabulary tokens, so list entries and canonical
// tokens meet in the same space. Duplicates collapse to their first position.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::error::ConfigError;
use crate::vectors::clean_token;

/// An ordered, duplicate-free list of cleaned tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordList {
    pub name: String,
    words: Vec<String>,
}

impl WordList {
    /// Build a list from raw entries, cleaning and deduplicating them.
    pub fn from_words<I, S>(name: impl Into<String>, raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut words = Vec::new();
        for entry in raw {
            if let Some(token) = clean_token(entry.as_ref()) {
                if seen.insert(token.clone()) {
                    words.push(token);
                }
            }
        }
        Self {
            name: name.into(),
            words,
        }
    }

    /// A one-word list, used for individual-word trajectories.
    pub fn singleton(word: &str) -> Self {
        Self {
            name: word.to_string(),
            words: vec![word.to_string()],
        }
    }

    /// Load a list file. The list is named after the file stem.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read word list: {}", path.display()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let list = Self::from_words(name, text.lines());

        if list.is_empty() {
            return Err(ConfigError::EmptyWordList(path.to_path_buf()).into());
        }
        debug!(list = %list.name, words = list.len(), "Loaded word list");
        Ok(list)
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// `<dir>/<name>.txt`
pub fn list_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.txt"))
}

/// Names (file stems) of every `.txt` list in a directory, sorted.
pub fn available_lists(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list word list directory: {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "txt") {
            if let Some(stem) = path.file_stem() {
                names.push(stem.to_string_lossy().into_owned());
            }
        }
    }
    names.sort();
    Ok(names)
}
