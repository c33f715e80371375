// Vocabulary & count tables — per-slice token frequencies.
//
// Counts are diagnostic: they feed coverage/frequency summaries in result
// records and only influence centroids when frequency weighting is requested.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::wordlist::WordList;

/// Token → occurrence count for one time slice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabTable {
    counts: HashMap<String, u64>,
}

impl VocabTable {
    pub fn from_counts(counts: HashMap<String, u64>) -> Self {
        Self { counts }
    }

    /// Parse a `token count` file. Malformed lines are skipped with a warning.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open vocabulary file: {}", path.display()))?;
        let mut counts = HashMap::new();
        let mut skipped = 0u64;

        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
            let mut fields = line.split_whitespace();
            let (Some(token), Some(count), None) = (fields.next(), fields.next(), fields.next())
            else {
                if !line.trim().is_empty() {
                    skipped += 1;
                    warn!(line = i + 1, path = %path.display(), "Malformed vocabulary line");
                }
                continue;
            };
            match count.parse::<u64>() {
                Ok(n) => {
                    counts.insert(token.to_string(), n);
                }
                Err(_) => {
                    skipped += 1;
                    warn!(line = i + 1, path = %path.display(), "Non-integer vocabulary count");
                }
            }
        }

        if skipped > 0 {
            warn!(skipped, path = %path.display(), "Skipped malformed vocabulary lines");
        }
        Ok(Self { counts })
    }

    /// Count for a token, 0 when absent.
    pub fn count(&self, token: &str) -> u64 {
        self.counts.get(token).copied().unwrap_or(0)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.counts.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The table restricted to tokens of `words` that it contains.
    pub fn restrict(&self, words: &WordList) -> BTreeMap<String, u64> {
        words
            .words()
            .iter()
            .filter_map(|w| self.counts.get(w).map(|&c| (w.clone(), c)))
            .collect()
    }

    /// Summed count over a word list.
    pub fn total(&self, words: &WordList) -> u64 {
        words.words().iter().map(|w| self.count(w)).sum()
    }
}

/// Per-word counts across slices: word → one count per slice, 0 where absent.
/// Every word of the list appears, so positions stay aligned with years.
pub fn counts_over_time(tables: &[VocabTable], words: &WordList) -> BTreeMap<String, Vec<u64>> {
    words
        .words()
        .iter()
        .map(|w| (w.clone(), tables.iter().map(|t| t.count(w)).collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, u64)]) -> VocabTable {
        VocabTable::from_counts(pairs.iter().map(|(w, c)| (w.to_string(), *c)).collect())
    }

    #[test]
    fn test_load_skips_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        std::fs::write(&path, "man 120\nwoman 80\nbroken\nnurse x\n\nthree fields 1\n").unwrap();
        let t = VocabTable::load(&path).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.count("man"), 120);
        assert_eq!(t.count("nurse"), 0);
        assert!(!t.contains("nurse"));
    }

    #[test]
    fn test_restrict_and_total() {
        let t = table(&[("man", 10), ("woman", 5), ("nurse", 2)]);
        let list = WordList::from_words("g", ["woman", "man", "girl"]);
        let restricted = t.restrict(&list);
        assert_eq!(restricted.len(), 2);
        assert_eq!(restricted["man"], 10);
        assert_eq!(t.total(&list), 15);
    }

    #[test]
    fn test_counts_over_time_aligned() {
        let tables = vec![table(&[("man", 1)]), table(&[]), table(&[("man", 3), ("girl", 4)])];
        let list = WordList::from_words("g", ["man", "girl"]);
        let counts = counts_over_time(&tables, &list);
        assert_eq!(counts["man"], vec![1, 0, 3]);
        assert_eq!(counts["girl"], vec![0, 0, 4]);
    }
}
