// Word-list coverage diagnostics.

use serde::Serialize;

use crate::embeddings::Snapshot;
use crate::wordlist::WordList;

/// How much of a word list a snapshot knows about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coverage {
    pub found: usize,
    pub total: usize,
    pub percentage: f64,
    /// List words absent from the snapshot, in list order.
    pub missing: Vec<String>,
}

impl Coverage {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

pub fn coverage(snapshot: &Snapshot, words: &WordList) -> Coverage {
    let missing: Vec<String> = words
        .words()
        .iter()
        .filter(|w| !snapshot.contains(w))
        .cloned()
        .collect();
    let total = words.len();
    let found = total - missing.len();
    let percentage = if total == 0 {
        0.0
    } else {
        100.0 * found as f64 / total as f64
    };
    Coverage {
        found,
        total,
        percentage,
        missing,
    }
}

/// Number of list words present in a snapshot.
pub fn found_count(snapshot: &Snapshot, words: &WordList) -> usize {
    words.words().iter().filter(|w| snapshot.contains(w)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_counts_missing() {
        let s = Snapshot::from_pairs([("nurse", vec![1.0_f32]), ("pilot", vec![0.5])]);
        let list = WordList::from_words("occ", ["nurse", "smith", "pilot", "baker"]);
        let c = coverage(&s, &list);
        assert_eq!(c.found, 2);
        assert_eq!(c.total, 4);
        assert!((c.percentage - 50.0).abs() < 1e-12);
        assert_eq!(c.missing, vec!["smith", "baker"]);
        assert!(!c.is_complete());
        assert_eq!(found_count(&s, &list), 2);
    }
}
