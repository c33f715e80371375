// Analysis engine tests — distance and variance behavior over in-memory
// snapshots: missing-word exclusion, symmetry, NaN on degenerate input, and
// the variance slice-count rules.

use biasdrift::analysis::coverage::coverage;
use biasdrift::analysis::distance::{
    centroid, cosine_distance, distance_series, individual_distance_series, Weighting,
};
use biasdrift::analysis::variance::variance_series;
use biasdrift::embeddings::Snapshot;
use biasdrift::vocab::VocabTable;
use biasdrift::wordlist::WordList;

fn snap(pairs: Vec<(&str, Vec<f32>)>) -> Snapshot {
    Snapshot::from_pairs(pairs)
}

fn unit(v: [f32; 2]) -> Vec<f32> {
    let n = (v[0] * v[0] + v[1] * v[1]).sqrt();
    vec![v[0] / n, v[1] / n]
}

fn list(name: &str, words: &[&str]) -> WordList {
    WordList::from_words(name, words.iter().copied())
}

fn slices() -> Vec<Snapshot> {
    vec![
        snap(vec![
            ("man", vec![1.0, 0.0]),
            ("woman", vec![0.0, 1.0]),
            ("nurse", vec![0.2, 0.9]),
            ("pilot", vec![0.9, 0.1]),
        ]),
        snap(vec![
            ("man", unit([0.9, 0.1])),
            ("woman", unit([0.1, 0.9])),
            ("nurse", vec![0.4, 0.6]),
        ]),
    ]
}

// ============================================================
// Distance engine
// ============================================================

#[test]
fn end_to_end_man_woman_drift() {
    let series = distance_series(
        &slices(),
        &list("m", &["man"]),
        &list("w", &["woman"]),
        &[],
        Weighting::Uniform,
    );
    assert_eq!(series.len(), 2);
    assert!((series[0] - 1.0).abs() < 1e-12, "1910 distance should be 1.0, got {}", series[0]);
    assert!(series[1].is_finite());
    assert!(series[0] >= series[1], "Vectors moved closer, distance should not grow");

    let a = unit([0.9, 0.1]);
    let b = unit([0.1, 0.9]);
    let cos = (a[0] as f64 * b[0] as f64 + a[1] as f64 * b[1] as f64)
        / (((a[0] as f64).powi(2) + (a[1] as f64).powi(2)).sqrt()
            * ((b[0] as f64).powi(2) + (b[1] as f64).powi(2)).sqrt());
    assert!((series[1] - (1.0 - cos)).abs() < 1e-9, "Expected {}, got {}", 1.0 - cos, series[1]);
}

#[test]
fn missing_tokens_match_prefiltered_subset_exactly() {
    let snaps = slices();
    let occupations = list("occ", &["nurse", "pilot", "astronaut"]);
    let group = list("g", &["man", "woman"]);

    let full = distance_series(&snaps, &occupations, &group, &[], Weighting::Uniform);

    // Slice 0 resolves nurse + pilot; slice 1 resolves only nurse.
    let pre0 = list("occ", &["nurse", "pilot"]);
    let pre1 = list("occ", &["nurse"]);
    let d0 = distance_series(&snaps[..1], &pre0, &group, &[], Weighting::Uniform);
    let d1 = distance_series(&snaps[1..], &pre1, &group, &[], Weighting::Uniform);

    assert_eq!(full[0].to_bits(), d0[0].to_bits());
    assert_eq!(full[1].to_bits(), d1[0].to_bits());
}

#[test]
fn distance_is_symmetric() {
    let snaps = slices();
    let a = list("a", &["nurse", "pilot"]);
    let b = list("b", &["man", "woman", "nurse"]);
    let ab = distance_series(&snaps, &a, &b, &[], Weighting::Uniform);
    let ba = distance_series(&snaps, &b, &a, &[], Weighting::Uniform);
    for (x, y) in ab.iter().zip(&ba) {
        assert_eq!(x.to_bits(), y.to_bits(), "d(A,B)={x} but d(B,A)={y}");
    }
}

#[test]
fn absent_set_yields_nan_without_error() {
    let snaps = slices();
    let series = distance_series(
        &snaps,
        &list("ghost", &["zebra", "yak"]),
        &list("g", &["man"]),
        &[],
        Weighting::Uniform,
    );
    assert_eq!(series.len(), 2);
    assert!(series.iter().all(|v| v.is_nan()));

    // Pilot only exists in the first slice.
    let partial = distance_series(
        &snaps,
        &list("p", &["pilot"]),
        &list("g", &["man"]),
        &[],
        Weighting::Uniform,
    );
    assert!(partial[0].is_finite());
    assert!(partial[1].is_nan());
}

#[test]
fn cosine_distance_guards() {
    assert!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]).is_nan());
    assert!(cosine_distance(&[1.0], &[1.0, 0.0]).is_nan());
    assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-12);
}

#[test]
fn individual_trajectories_are_singleton_distances() {
    let snaps = slices();
    let occ = list("occ", &["nurse", "pilot"]);
    let group = list("g", &["woman"]);
    let per_word = individual_distance_series(&snaps, &occ, &group, &[], Weighting::Uniform);
    assert_eq!(per_word.len(), 2);
    let (word, series) = &per_word[0];
    assert_eq!(word, "nurse");
    let direct = distance_series(&snaps, &WordList::singleton("nurse"), &group, &[], Weighting::Uniform);
    assert_eq!(series, &direct);
}

#[test]
fn frequency_weighting_uses_slice_tables() {
    let s = snap(vec![("aa", vec![1.0, 0.0]), ("bb", vec![0.0, 1.0])]);
    let table = VocabTable::from_counts([("aa".to_string(), 9), ("bb".to_string(), 1)].into());
    let words = list("x", &["aa", "bb"]);
    let c = centroid(&s, &words, Some(&table), Weighting::Frequency).unwrap();
    assert!((c[0] - 0.9).abs() < 1e-12);

    let d_uniform = distance_series(
        std::slice::from_ref(&s),
        &words,
        &list("a", &["aa"]),
        &[table.clone()],
        Weighting::Uniform,
    );
    let d_freq = distance_series(
        std::slice::from_ref(&s),
        &words,
        &list("a", &["aa"]),
        &[table],
        Weighting::Frequency,
    );
    assert!(d_freq[0] < d_uniform[0], "Heavier aa weight should pull the centroid toward aa");
}

// ============================================================
// Variance engine
// ============================================================

#[test]
fn variance_needs_two_valid_slices() {
    let snaps = slices();
    let v = variance_series(&snaps, &list("p", &["pilot"]), &[], Weighting::Uniform);
    assert!(v.is_nan(), "Pilot resolves in one slice only, got {v}");
}

#[test]
fn constant_trajectory_has_zero_variance() {
    let s = snap(vec![("aa", vec![0.3, 0.7]), ("bb", vec![0.1, 0.2])]);
    let snaps = vec![s.clone(), s.clone(), s];
    let v = variance_series(&snaps, &list("x", &["aa", "bb"]), &[], Weighting::Uniform);
    assert_eq!(v, 0.0);
}

#[test]
fn moving_trajectory_has_positive_variance() {
    let v = variance_series(&slices(), &list("m", &["man"]), &[], Weighting::Uniform);
    assert!(v > 0.0 && v.is_finite(), "Expected positive variance, got {v}");
}

// ============================================================
// Coverage
// ============================================================

#[test]
fn coverage_reports_missing_per_slice() {
    let snaps = slices();
    let occ = list("occ", &["nurse", "pilot"]);
    assert!(coverage(&snaps[0], &occ).is_complete());
    let c = coverage(&snaps[1], &occ);
    assert_eq!(c.found, 1);
    assert_eq!(c.missing, vec!["pilot"]);
}
