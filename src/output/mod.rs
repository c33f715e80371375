// Output formatting — terminal display of batch counters and run summaries.

pub mod terminal;

/// Join up to `max` words with commas, noting how many were left out.
pub fn preview_words(words: &[String], max: usize) -> String {
    if words.len() <= max {
        words.join(", ")
    } else {
        format!("{}, ... (+{} more)", words[..max].join(", "), words.len() - max)
    }
}

/// Format a possibly-NaN statistic for display.
pub fn format_stat(value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else {
        format!("{value:.4}")
    }
}
