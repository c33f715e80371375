use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use tracing::{info, warn};

use biasdrift::analysis::coverage::{coverage, Coverage};
use biasdrift::analysis::run::{run, RunInputs, RunPlan};
use biasdrift::analysis::Weighting;
use biasdrift::config::{require_dir, Config};
use biasdrift::embeddings::load_snapshot;
use biasdrift::error::ConfigError;
use biasdrift::output::terminal;
use biasdrift::results::append_record;
use biasdrift::sources::{discover_vector_files, temporal_years};
use biasdrift::vectors::{export, normalize, quality};
use biasdrift::wordlist::{available_lists, list_path, WordList};

/// biasdrift: measure how word-group associations in embeddings drift over time.
///
/// Normalizes raw embeddings into canonical per-year files, then tracks the
/// cosine distance between word-list centroids across decades.
#[derive(Parser)]
#[command(name = "biasdrift", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a raw embedding source into a canonical vector file
    Normalize {
        /// Raw source (text `token v1 ... vD` lines, or word2vec binary with --binary)
        input: PathBuf,

        /// Canonical output file
        #[arg(long)]
        output: PathBuf,

        /// Read the input as a word2vec binary store
        #[arg(long)]
        binary: bool,
    },

    /// Export decade .npy/.pkl files to canonical per-year vector and vocab files
    ExportTemporal {
        /// Source label, e.g. sgns or svd
        #[arg(long)]
        label: String,

        /// Directory with <year>-w.npy and <year>-vocab.pkl (default: $BIASDRIFT_RAW_DIR/<label>)
        #[arg(long)]
        raw_dir: Option<PathBuf>,

        /// Directory with <year>-counts.pkl (default: <raw-dir>/../counts)
        #[arg(long)]
        counts_dir: Option<PathBuf>,

        /// Output directory (default: $BIASDRIFT_VECTORS_DIR)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Check canonical vector files for NaN, zero, non-unit and extreme vectors
    Validate {
        /// Specific files to check (default: every discovered source)
        files: Vec<PathBuf>,
    },

    /// Report how much of each word list every discovered source covers
    Coverage {
        /// Word lists to check (default: every list in $BIASDRIFT_WORDLISTS_DIR)
        #[arg(long = "list")]
        lists: Vec<String>,
    },

    /// Run bias-drift analyses and append result records
    Run {
        /// JSON plan file (one plan or an array of plans)
        #[arg(long, conflicts_with = "label")]
        plan: Option<PathBuf>,

        /// Source label for a single inline plan
        #[arg(long, requires = "group")]
        label: Option<String>,

        /// Neutral word list (repeatable)
        #[arg(long = "neutral")]
        neutral: Vec<String>,

        /// Group word list (repeatable)
        #[arg(long = "group")]
        group: Vec<String>,

        /// Per-word trajectories for neutral words (slow)
        #[arg(long)]
        individual_neutral: bool,

        /// Per-word trajectories for group words (slow)
        #[arg(long)]
        individual_group: bool,

        /// Weight words by their per-slice frequency
        #[arg(long)]
        frequency_weighted: bool,

        /// Number of plans to run in parallel (default: 2)
        #[arg(long, default_value = "2")]
        concurrency: usize,
    },

    /// Show configured directories, discovered sources and stored runs
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("biasdrift=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Normalize {
            input,
            output,
            binary,
        } => {
            if !input.exists() {
                return Err(ConfigError::MissingInput(input).into());
            }
            let stats = if binary {
                normalize::normalize_binary(&input, &output)?
            } else {
                normalize::normalize_text(&input, &output)?
            };
            terminal::display_normalize_stats(&input, &output, &stats);
        }

        Commands::ExportTemporal {
            label,
            raw_dir,
            counts_dir,
            out_dir,
        } => {
            let years = temporal_years(&label)?;

            let raw_dir = match raw_dir {
                Some(dir) => dir,
                None => {
                    config.require_raw()?;
                    config.raw_dir.join(&label)
                }
            };
            require_dir(&raw_dir)?;
            let out_dir = out_dir.unwrap_or_else(|| config.vectors_dir.clone());

            let mut source = export::TemporalSource::new(label.clone(), raw_dir);
            source.counts_dir = counts_dir;

            println!("Exporting {} years of {label}...", years.len());
            let exports = export::export_years(&source, &years, &out_dir)?;
            terminal::display_exports(&label, &exports);
        }

        Commands::Validate { files } => {
            let targets: Vec<(String, PathBuf)> = if files.is_empty() {
                config.require_vectors()?;
                discover_vector_files(&config.vectors_dir)?.entries()
            } else {
                files
                    .into_iter()
                    .map(|p| (p.display().to_string(), p))
                    .collect()
            };
            if targets.is_empty() {
                return Err(ConfigError::NoInputs(format!(
                    "no vector files in {}",
                    config.vectors_dir.display()
                ))
                .into());
            }

            println!("\n{}", format!("=== Vector quality ({} sources) ===", targets.len()).bold());
            for (name, path) in &targets {
                if !path.exists() {
                    return Err(ConfigError::MissingInput(path.clone()).into());
                }
                let report = quality::validate_file(path)?;
                terminal::display_quality(name, &report);
            }
        }

        Commands::Coverage { lists } => {
            config.require_vectors()?;
            config.require_wordlists()?;

            let names = if lists.is_empty() {
                available_lists(&config.wordlists_dir)?
            } else {
                lists
            };
            if names.is_empty() {
                return Err(ConfigError::NoInputs(format!(
                    "no word lists in {}",
                    config.wordlists_dir.display()
                ))
                .into());
            }
            let word_lists = names
                .iter()
                .map(|n| {
                    let path = list_path(&config.wordlists_dir, n);
                    if !path.exists() {
                        return Err(ConfigError::MissingInput(path).into());
                    }
                    WordList::load(&path)
                })
                .collect::<Result<Vec<_>>>()?;

            let sources = discover_vector_files(&config.vectors_dir)?.entries();
            if sources.is_empty() {
                return Err(ConfigError::NoInputs(format!(
                    "no vector files in {}",
                    config.vectors_dir.display()
                ))
                .into());
            }

            // One snapshot in memory at a time: load, measure every list, drop.
            let mut rows: Vec<Vec<(String, Coverage, Option<f64>)>> =
                vec![Vec::new(); word_lists.len()];
            for (name, path) in &sources {
                let (snapshot, _) = load_snapshot(path)?;
                let quality = quality::validate_all(snapshot.iter()).quality_pct();
                for (i, list) in word_lists.iter().enumerate() {
                    rows[i].push((name.clone(), coverage(&snapshot, list), Some(quality)));
                }
            }
            for (list, list_rows) in word_lists.iter().zip(&rows) {
                terminal::display_coverage(&list.name, list_rows);
            }
        }

        Commands::Run {
            plan,
            label,
            neutral,
            group,
            individual_neutral,
            individual_group,
            frequency_weighted,
            concurrency,
        } => {
            let plans = match (plan, label) {
                (Some(path), _) => RunPlan::load(&path)?,
                (None, Some(label)) => vec![RunPlan {
                    label,
                    neutral_lists: neutral,
                    group_lists: group,
                    individual_neutral_words: individual_neutral,
                    individual_group_words: individual_group,
                    weighting: if frequency_weighted {
                        Weighting::Frequency
                    } else {
                        Weighting::Uniform
                    },
                }],
                (None, None) => anyhow::bail!("Pass --plan <file> or --label with --group/--neutral lists"),
            };

            config.require_vectors()?;
            config.require_wordlists()?;
            let inputs = RunInputs {
                vectors_dir: config.vectors_dir.clone(),
                wordlists_dir: config.wordlists_dir.clone(),
            };

            info!(plans = plans.len(), concurrency, "Running analysis plans");

            // Each plan is independent; run them on blocking threads.
            let results: Vec<(String, Result<_>)> = stream::iter(plans)
                .map(|plan| {
                    let inputs = inputs.clone();
                    async move {
                        let label = plan.label.clone();
                        let outcome = tokio::task::spawn_blocking(move || run(&plan, &inputs))
                            .await
                            .map_err(anyhow::Error::from)
                            .and_then(|r| r);
                        (label, outcome)
                    }
                })
                .buffer_unordered(concurrency.max(1))
                .collect()
                .await;

            let mut failed = 0;
            for (label, outcome) in results {
                match outcome {
                    Ok(record) => {
                        let path = append_record(&config.output_dir, &record)?;
                        terminal::display_run_summary(&record, &path);
                    }
                    Err(e) => {
                        failed += 1;
                        warn!(label = %label, error = %e, "Analysis run failed");
                        eprintln!("{} {label}: {e:#}", "Run failed:".red().bold());
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} run(s) failed");
            }
        }

        Commands::Status => {
            biasdrift::status::show(&config)?;
        }
    }

    Ok(())
}
