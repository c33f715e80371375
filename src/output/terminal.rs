// Colored terminal output for batch tools.
//
// The library computes; these functions print. main.rs calls into here after
// each subcommand finishes so counters and tables share one look.

use std::path::Path;

use colored::Colorize;

use crate::analysis::coverage::Coverage;
use crate::results::RunRecord;
use crate::vectors::export::YearExport;
use crate::vectors::normalize::NormalizeStats;
use crate::vectors::quality::QualityReport;

use super::{format_stat, preview_words};

/// Missing words shown per coverage row.
const MISSING_PREVIEW: usize = 8;

/// Display the counters from one normalization pass.
pub fn display_normalize_stats(input: &Path, output: &Path, stats: &NormalizeStats) {
    println!("\n{}", "=== Normalization ===".bold());
    println!("  Source: {}", input.display());
    println!("  Output: {}", output.display());
    println!("  {} vectors written", stats.written.to_string().green());
    if stats.near_zero_norm > 0 {
        println!("  {} dropped for near-zero norm", stats.near_zero_norm.to_string().yellow());
    }
    if stats.short_token > 0 {
        println!("  {} dropped for short tokens", stats.short_token);
    }
    if stats.malformed > 0 {
        println!("  {} malformed records skipped", stats.malformed.to_string().red());
    }
}

/// Display per-year export results.
pub fn display_exports(label: &str, exports: &[YearExport]) {
    println!(
        "\n{}",
        format!("=== Export: {label} ({} years) ===", exports.len()).bold()
    );
    println!(
        "  {:>6}  {:>10}  {:>8}  {}",
        "Year".dimmed(),
        "Written".dimmed(),
        "Skipped".dimmed(),
        "Vocab".dimmed(),
    );
    for e in exports {
        let vocab = if e.vocab_file.is_some() {
            "yes".green()
        } else {
            "no counts".yellow()
        };
        let skipped = if e.rows_skipped > 0 {
            e.rows_skipped.to_string().yellow()
        } else {
            e.rows_skipped.to_string().normal()
        };
        println!("  {:>6}  {:>10}  {:>8}  {}", e.year, e.rows_written, skipped, vocab);
    }
}

/// Display one source's quality report.
pub fn display_quality(name: &str, report: &QualityReport) {
    let pct = report.quality_pct();
    let pct_str = format!("{pct:.1}%");
    let pct_colored = if pct >= 99.0 {
        pct_str.green()
    } else if pct >= 90.0 {
        pct_str.yellow()
    } else {
        pct_str.red()
    };

    println!(
        "  {:<24} {:>10} loaded  {:>8} invalid  {}",
        name, report.total_loaded, report.invalid, pct_colored
    );
    for (kind, count) in &report.issues {
        println!("      {} {}", format!("{count:>8}").dimmed(), kind);
    }
    if !report.invalid_samples.is_empty() {
        println!(
            "      {} {}",
            "e.g.".dimmed(),
            preview_words(&report.invalid_samples, MISSING_PREVIEW).dimmed()
        );
    }
}

/// Display coverage of one word list across sources. Each row carries the
/// source's quality percentage when it was validated.
pub fn display_coverage(list: &str, rows: &[(String, Coverage, Option<f64>)]) {
    println!("\n{}", format!("=== Coverage: {list} ===").bold());
    println!(
        "  {:<24} {:>9}  {:>7}  {:>8}",
        "Source".dimmed(),
        "Found".dimmed(),
        "%".dimmed(),
        "Quality".dimmed(),
    );
    println!("  {}", "-".repeat(54).dimmed());

    for (source, cov, quality) in rows {
        let found = format!("{}/{}", cov.found, cov.total);
        let pct = format!("{:.1}", cov.percentage);
        let pct = if cov.is_complete() { pct.green() } else { pct.yellow() };
        let quality = quality
            .map(|q| format!("{q:.1}%"))
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<24} {:>9}  {:>7}  {:>8}", source, found, pct, quality);
        if !cov.missing.is_empty() {
            println!(
                "      {} {}",
                "missing:".dimmed(),
                preview_words(&cov.missing, MISSING_PREVIEW).dimmed()
            );
        }
    }
}

/// Display the headline numbers of a finished run.
pub fn display_run_summary(record: &RunRecord, stored_at: &Path) {
    println!(
        "\n{}",
        format!(
            "=== Run: {} ({} slices, {}–{}) ===",
            record.label,
            record.years.len(),
            record.years.first().copied().unwrap_or_default(),
            record.years.last().copied().unwrap_or_default(),
        )
        .bold()
    );

    println!("  {}", "Variance over time".dimmed());
    for (list, v) in &record.variance_over_time {
        println!("    {:<28} {}", list, format_stat(*v));
    }

    println!("  {}", "Distances (first → last measured slice)".dimmed());
    for (pair, series) in &record.distances {
        let measured: Vec<f64> = series.values.iter().copied().filter(|v| !v.is_nan()).collect();
        let span = match (measured.first(), measured.last()) {
            (Some(a), Some(b)) => format!("{} → {}", format_stat(*a), format_stat(*b)),
            _ => "n/a".red().to_string(),
        };
        let gaps = series.len() - measured.len();
        if gaps > 0 {
            println!("    {:<28} {}  {}", pair, span, format!("({gaps} unmeasured)").yellow());
        } else {
            println!("    {:<28} {}", pair, span);
        }
    }

    println!("  Stored in {}", stored_at.display().to_string().dimmed());
}
