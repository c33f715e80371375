// Variance-over-time engine.
//
// A word list's centroid is computed in every slice where the list resolves;
// the dispersion of that trajectory around its grand mean is the list's
// stability signal. Slices where the list does not resolve are left out.
//
// The statistic is the mean squared Euclidean distance of each valid
// centroid from the grand mean (population variance summed over
// dimensions).

use crate::embeddings::Snapshot;
use crate::vocab::VocabTable;
use crate::wordlist::WordList;

use super::distance::{centroid, Weighting};

/// Fewer valid slices than this yields NaN.
pub const MIN_VALID_SLICES: usize = 2;

/// Dispersion of a centroid trajectory. `None` entries are unresolved
/// slices and are skipped.
pub fn centroid_dispersion(trajectory: &[Option<Vec<f64>>]) -> f64 {
    let valid: Vec<&[f64]> = trajectory.iter().filter_map(|c| c.as_deref()).collect();
    if valid.len() < MIN_VALID_SLICES {
        return f64::NAN;
    }
    if valid.windows(2).all(|w| w[0] == w[1]) {
        return 0.0;
    }

    let dim = valid[0].len();
    if valid.iter().any(|c| c.len() != dim) {
        return f64::NAN;
    }

    let n = valid.len() as f64;
    let mut mean = vec![0.0_f64; dim];
    for c in &valid {
        for (m, v) in mean.iter_mut().zip(c.iter()) {
            *m += v;
        }
    }
    for m in &mut mean {
        *m /= n;
    }

    let total: f64 = valid
        .iter()
        .map(|c| {
            c.iter()
                .zip(&mean)
                .map(|(v, m)| (v - m) * (v - m))
                .sum::<f64>()
        })
        .sum();
    total / n
}

/// Centroid dispersion of `words` across `snapshots`.
///
/// `vocab` is indexed alongside `snapshots` and only matters for frequency
/// weighting.
pub fn variance_series(
    snapshots: &[Snapshot],
    words: &WordList,
    vocab: &[VocabTable],
    weighting: Weighting,
) -> f64 {
    let trajectory: Vec<Option<Vec<f64>>> = snapshots
        .iter()
        .enumerate()
        .map(|(t, snap)| centroid(snap, words, vocab.get(t), weighting))
        .collect();
    centroid_dispersion(&trajectory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_valid_slice_is_nan() {
        assert!(centroid_dispersion(&[Some(vec![1.0, 0.0]), None]).is_nan());
        assert!(centroid_dispersion(&[]).is_nan());
    }

    #[test]
    fn test_constant_trajectory_is_zero() {
        let c = Some(vec![0.1, 0.7, 0.3]);
        let v = centroid_dispersion(&[c.clone(), None, c.clone(), c]);
        assert_eq!(v, 0.0);
    }

    #[test]
    fn test_two_points() {
        // Mean (0.5, 0.5); each point sits 0.5 away in squared distance.
        let v = centroid_dispersion(&[Some(vec![1.0, 0.0]), Some(vec![0.0, 1.0])]);
        assert!((v - 0.5).abs() < 1e-12, "Expected 0.5, got {v}");
    }

    #[test]
    fn test_unresolved_slices_do_not_count_as_zero() {
        let with_gap = centroid_dispersion(&[
            Some(vec![1.0, 0.0]),
            None,
            Some(vec![0.0, 1.0]),
        ]);
        let without = centroid_dispersion(&[Some(vec![1.0, 0.0]), Some(vec![0.0, 1.0])]);
        assert_eq!(with_gap, without);
    }
}
