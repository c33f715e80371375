// Group/neutral distance engine.
//
// Per time slice: resolve both word lists against the snapshot, average the
// resolved vectors into centroids, and report the cosine distance between
// the centroids. Words absent from a snapshot are left out of that slice,
// never counted as zero vectors. A slice where either side resolves to
// nothing, or where a centroid collapses to (near) zero length, is NaN.

use serde::{Deserialize, Serialize};

use crate::embeddings::Snapshot;
use crate::vocab::VocabTable;
use crate::wordlist::WordList;

/// Centroid norms below this are treated as degenerate.
pub const MIN_CENTROID_NORM: f64 = 1e-8;

/// How resolved words contribute to a centroid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    /// Every resolved word counts once.
    #[default]
    Uniform,
    /// Each resolved word is weighted by its count in the slice's vocabulary
    /// table. Words with no count contribute nothing.
    Frequency,
}

/// The words of `words` present in `snapshot`, in list order.
pub fn resolve<'a>(snapshot: &Snapshot, words: &'a WordList) -> Vec<&'a str> {
    words
        .words()
        .iter()
        .map(String::as_str)
        .filter(|w| snapshot.contains(w))
        .collect()
}

/// Mean vector of the resolved subset of `words`.
///
/// Returns `None` when nothing resolves, or when frequency weighting leaves
/// a zero total weight. With `Weighting::Frequency` and no table, words are
/// weighted uniformly.
pub fn centroid(
    snapshot: &Snapshot,
    words: &WordList,
    vocab: Option<&VocabTable>,
    weighting: Weighting,
) -> Option<Vec<f64>> {
    let mut sum = vec![0.0_f64; snapshot.dim()];
    let mut total_weight = 0.0_f64;

    for word in words.words() {
        let Some(vec) = snapshot.get(word) else {
            continue;
        };
        let weight = match (weighting, vocab) {
            (Weighting::Frequency, Some(table)) => table.count(word) as f64,
            _ => 1.0,
        };
        if weight == 0.0 {
            continue;
        }
        for (acc, &v) in sum.iter_mut().zip(vec) {
            *acc += weight * f64::from(v);
        }
        total_weight += weight;
    }

    if total_weight == 0.0 {
        return None;
    }
    for acc in &mut sum {
        *acc /= total_weight;
    }
    Some(sum)
}

/// `1 - cos(a, b)`. NaN when either vector is near zero length or the
/// dimensions differ.
pub fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return f64::NAN;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let mag_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if mag_a < MIN_CENTROID_NORM || mag_b < MIN_CENTROID_NORM {
        return f64::NAN;
    }
    1.0 - dot / (mag_a * mag_b)
}

/// Cosine distance between two optional centroids, NaN if either is missing.
pub fn centroid_distance(a: Option<&[f64]>, b: Option<&[f64]>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => cosine_distance(a, b),
        _ => f64::NAN,
    }
}

/// Distance between two lists within a single snapshot.
pub fn distance_at(
    snapshot: &Snapshot,
    set_a: &WordList,
    set_b: &WordList,
    vocab: Option<&VocabTable>,
    weighting: Weighting,
) -> f64 {
    let a = centroid(snapshot, set_a, vocab, weighting);
    let b = centroid(snapshot, set_b, vocab, weighting);
    centroid_distance(a.as_deref(), b.as_deref())
}

/// One distance per snapshot, in snapshot order.
///
/// `vocab` is indexed alongside `snapshots`; a missing table for a slice
/// means uniform weights for that slice.
pub fn distance_series(
    snapshots: &[Snapshot],
    set_a: &WordList,
    set_b: &WordList,
    vocab: &[VocabTable],
    weighting: Weighting,
) -> Vec<f64> {
    snapshots
        .iter()
        .enumerate()
        .map(|(t, snap)| distance_at(snap, set_a, set_b, vocab.get(t), weighting))
        .collect()
}

/// Per-word trajectories: for each word of `words`, the distance series
/// between that word alone and `other`. Cost grows with
/// `|words| × |snapshots|`, so callers opt in.
pub fn individual_distance_series(
    snapshots: &[Snapshot],
    words: &WordList,
    other: &WordList,
    vocab: &[VocabTable],
    weighting: Weighting,
) -> Vec<(String, Vec<f64>)> {
    words
        .words()
        .iter()
        .map(|w| {
            let single = WordList::singleton(w);
            let series = distance_series(snapshots, &single, other, vocab, weighting);
            (w.clone(), series)
        })
        .collect()
}
