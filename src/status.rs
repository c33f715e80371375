// System status display — shows configured directories, discovered vector
// sources, word lists and stored run records.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::config::Config;
use crate::results::count_records;
use crate::sources::discover_vector_files;
use crate::wordlist::available_lists;

/// Display system status to the terminal.
pub fn show(config: &Config) -> Result<()> {
    println!("{}", "=== biasdrift status ===".bold());
    print_dir("Vectors", &config.vectors_dir);
    print_dir("Raw exports", &config.raw_dir);
    print_dir("Word lists", &config.wordlists_dir);
    print_dir("Results", &config.output_dir);

    if config.vectors_dir.is_dir() {
        let found = discover_vector_files(&config.vectors_dir)?;
        if found.is_empty() {
            println!("\nVector sources: none found");
            println!("  Run `biasdrift normalize` or `biasdrift export-temporal` first");
        } else {
            println!("\nVector sources: {}", found.len());
            for name in found.static_sources.keys() {
                println!("  static  {name}");
            }
            print_years("sgns", found.sgns.keys().copied().collect());
            print_years("svd", found.svd.keys().copied().collect());
        }
    }

    if config.wordlists_dir.is_dir() {
        let lists = available_lists(&config.wordlists_dir)?;
        println!("\nWord lists: {}", lists.len());
        if !lists.is_empty() {
            println!("  {}", lists.join(", ").dimmed());
        }
    }

    let records = count_records(&config.output_dir)?;
    let total: usize = records.values().sum();
    if total == 0 {
        println!("\nStored runs: none");
    } else {
        println!("\nStored runs: {total}");
        for (label, n) in &records {
            println!("  {label:<20} {n}");
        }
    }

    Ok(())
}

fn print_dir(name: &str, dir: &Path) {
    let state = if dir.is_dir() {
        "ok".green()
    } else {
        "missing".yellow()
    };
    println!("{:<12} {} ({})", format!("{name}:"), dir.display(), state);
}

fn print_years(label: &str, years: Vec<i32>) {
    if let (Some(first), Some(last)) = (years.first(), years.last()) {
        println!("  {label:<7} {} slices, {first}–{last}", years.len());
    }
}
