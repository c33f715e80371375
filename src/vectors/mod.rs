// Vector sources — raw embedding ingestion and canonical file production.
//
// Everything downstream of this module reads the canonical plain-text format:
// one `token c1 c2 ... cD` line per vector, space-separated, no header. The
// normalizer and the temporal exporter are the only two producers of that
// format; the quality validator is a read-only diagnostic over it.

pub mod export;
pub mod normalize;
pub mod quality;
pub mod word2vec;

use std::sync::OnceLock;

use regex_lite::Regex;

/// Tokens shorter than this after cleaning never reach a canonical file.
pub const MIN_TOKEN_LEN: usize = 2;

/// Vectors whose raw L2 norm falls below this are dropped instead of normalized.
pub const NEAR_ZERO_NORM: f64 = 1e-2;

fn non_letters() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("[^a-z]+").expect("static regex is valid"))
}

/// Clean a raw token: lowercase, then strip everything outside `[a-z]`.
///
/// Returns `None` when fewer than two letters survive. Cleaning is a pure
/// function of its input and is idempotent: `clean_token(clean_token(x)) ==
/// clean_token(x)`.
pub fn clean_token(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    let cleaned = non_letters().replace_all(&lowered, "").into_owned();
    if cleaned.len() < MIN_TOKEN_LEN {
        None
    } else {
        Some(cleaned)
    }
}

/// Euclidean norm, accumulated in f64.
pub fn l2_norm<T: Copy + Into<f64>>(vec: &[T]) -> f64 {
    vec.iter()
        .map(|&v| {
            let v: f64 = v.into();
            v * v
        })
        .sum::<f64>()
        .sqrt()
}

/// Records sampled before a text source's dimension is fixed.
pub const DIM_SAMPLE_LINES: usize = 64;

/// The most common non-zero length among `lengths`. Ties go to the length
/// seen first.
pub fn majority_dim<I: IntoIterator<Item = usize>>(lengths: I) -> Option<usize> {
    let mut tally: Vec<(usize, usize)> = Vec::new();
    for len in lengths.into_iter().filter(|&l| l > 0) {
        match tally.iter_mut().find(|(l, _)| *l == len) {
            Some((_, n)) => *n += 1,
            None => tally.push((len, 1)),
        }
    }
    let mut best: Option<(usize, usize)> = None;
    for (len, n) in tally {
        if best.map_or(true, |(_, b)| n > b) {
            best = Some((len, n));
        }
    }
    best.map(|(len, _)| len)
}

/// Render one canonical line (without the trailing newline).
pub fn format_line<I>(token: &str, components: I) -> String
where
    I: IntoIterator,
    I::Item: std::fmt::Display,
{
    let mut line = String::from(token);
    for c in components {
        line.push(' ');
        line.push_str(&c.to_string());
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_lowercases_and_strips() {
        assert_eq!(clean_token("New-York"), Some("newyork".to_string()));
        assert_eq!(clean_token("  Doctor's  "), Some("doctors".to_string()));
    }

    #[test]
    fn test_clean_drops_short_tokens() {
        assert_eq!(clean_token("a"), None);
        assert_eq!(clean_token("1990"), None);
        assert_eq!(clean_token("x-1"), None);
        assert_eq!(clean_token(""), None);
    }

    #[test]
    fn test_clean_non_ascii_letters_removed() {
        // Accented letters lowercase to non-[a-z] characters and are stripped
        assert_eq!(clean_token("Café"), Some("caf".to_string()));
    }

    #[test]
    fn test_l2_norm() {
        assert!((l2_norm(&[3.0_f64, 4.0]) - 5.0).abs() < 1e-12);
        assert!((l2_norm(&[3.0_f32, 4.0]) - 5.0).abs() < 1e-6);
        assert_eq!(l2_norm::<f64>(&[]), 0.0);
    }

    #[test]
    fn test_majority_dim() {
        assert_eq!(majority_dim([1, 3, 3, 3]), Some(3));
        assert_eq!(majority_dim([2, 3, 3, 2]), Some(2));
        assert_eq!(majority_dim([0, 0]), None);
        assert_eq!(majority_dim(std::iter::empty()), None);
    }

    #[test]
    fn test_format_line() {
        assert_eq!(format_line("man", &[0.5_f64, -1.0]), "man 0.5 -1");
    }
}
