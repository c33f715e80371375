// Analysis run — one labeled embedding source against a set of word lists.
//
// A run resolves the label to its year sequence and canonical files, loads
// the word lists once, then walks the slices in year order. Each slice is
// loaded, reduced to centroids, distances and counts, and dropped before the
// next one is read, so peak memory is one snapshot regardless of how many
// decades the source spans. Variance is computed at the end from the
// per-slice centroids, which are tiny compared to a snapshot.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embeddings::load_snapshot;
use crate::error::ConfigError;
use crate::results::{distance_key, IndividualDistances, RunRecord, TimeSeries};
use crate::sources::slice_files;
use crate::vocab::VocabTable;
use crate::wordlist::{list_path, WordList};

use super::coverage::found_count;
use super::distance::{centroid, centroid_distance, Weighting};
use super::variance::centroid_dispersion;

/// What to compute for one labeled source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    /// Source label, e.g. `sgns`, `svd`, `wikipedia`.
    pub label: String,
    pub neutral_lists: Vec<String>,
    pub group_lists: Vec<String>,
    /// Per-word trajectories for each neutral word against each group list.
    #[serde(default)]
    pub individual_neutral_words: bool,
    /// Per-word trajectories for each group word against each neutral list.
    #[serde(default)]
    pub individual_group_words: bool,
    #[serde(default)]
    pub weighting: Weighting,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanFile {
    Many(Vec<RunPlan>),
    One(RunPlan),
}

impl RunPlan {
    /// Read a plan file holding either one plan object or an array of them.
    pub fn load(path: &Path) -> Result<Vec<RunPlan>> {
        if !path.exists() {
            return Err(ConfigError::MissingInput(path.to_path_buf()).into());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run plan: {}", path.display()))?;
        let plans = match serde_json::from_str::<PlanFile>(&text)
            .with_context(|| format!("Invalid run plan: {}", path.display()))?
        {
            PlanFile::Many(plans) => plans,
            PlanFile::One(plan) => vec![plan],
        };
        if plans.is_empty() {
            return Err(ConfigError::NoInputs(format!("no plans in {}", path.display())).into());
        }
        Ok(plans)
    }
}

/// Where a run finds its inputs.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub vectors_dir: PathBuf,
    pub wordlists_dir: PathBuf,
}

/// Load the named lists once each. A name repeated in the plan is loaded a
/// single time so every series key stays unique.
fn load_lists(dir: &Path, names: &[String]) -> Result<Vec<WordList>> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|name| {
            let first = seen.insert(name.as_str());
            if !first {
                warn!(list = %name, "Word list named twice in plan; using it once");
            }
            first
        })
        .map(|name| {
            let path = list_path(dir, name);
            if !path.exists() {
                return Err(ConfigError::MissingInput(path).into());
            }
            let mut list = WordList::load(&path)?;
            list.name = name.clone();
            Ok(list)
        })
        .collect()
}

fn progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {msg} [{bar:30}] {pos}/{len} slices ({eta})")
            .unwrap()
            .progress_chars("=> "),
    );
    pb.set_message(label.to_string());
    pb
}

/// Per-word series keyed `owning list → word → other list → values`, one
/// value pushed per slice.
type IndividualSeries = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<f64>>>>;

/// Execute one plan and return its record.
///
/// Configuration problems (unknown label, missing vector file or word list,
/// nothing to compare) are errors. A missing vocabulary file only costs the
/// slice its counts and is logged.
pub fn run(plan: &RunPlan, inputs: &RunInputs) -> Result<RunRecord> {
    if plan.neutral_lists.is_empty() && plan.group_lists.is_empty() {
        return Err(ConfigError::NoInputs(format!("plan {:?} names no word lists", plan.label)).into());
    }

    let slices = slice_files(&inputs.vectors_dir, &plan.label)?;
    if let Some(missing) = slices.iter().find(|s| !s.vectors.exists()) {
        return Err(ConfigError::MissingInput(missing.vectors.clone()).into());
    }

    let neutral = load_lists(&inputs.wordlists_dir, &plan.neutral_lists)?;
    let groups = load_lists(&inputs.wordlists_dir, &plan.group_lists)?;
    let mut keys = HashSet::new();
    for n in &neutral {
        for g in &groups {
            if !keys.insert(distance_key(&n.name, &g.name)) {
                anyhow::bail!(
                    "Word list names collide: pair ({}, {}) maps to an existing result key {:?}",
                    n.name,
                    g.name,
                    distance_key(&n.name, &g.name)
                );
            }
        }
    }

    let mut all_lists: Vec<&WordList> = Vec::new();
    for list in neutral.iter().chain(&groups) {
        if !all_lists.iter().any(|l| l.name == list.name) {
            all_lists.push(list);
        }
    }

    info!(
        label = %plan.label,
        slices = slices.len(),
        neutral = neutral.len(),
        groups = groups.len(),
        weighting = ?plan.weighting,
        "Starting analysis run"
    );

    let years: Vec<i32> = slices.iter().map(|s| s.year).collect();
    let mut trajectories: BTreeMap<String, Vec<Option<Vec<f64>>>> = BTreeMap::new();
    let mut coverage: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut counts_all: BTreeMap<String, BTreeMap<String, Vec<u64>>> = BTreeMap::new();
    let mut distances: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut indiv_neutral: IndividualSeries = BTreeMap::new();
    let mut indiv_group: IndividualSeries = BTreeMap::new();

    let pb = progress_bar(slices.len() as u64, &plan.label);

    for slice in &slices {
        let (snapshot, stats) = load_snapshot(&slice.vectors)?;
        if stats.malformed > 0 {
            warn!(year = slice.year, malformed = stats.malformed, "Slice had malformed vector lines");
        }

        let vocab = if slice.vocab.exists() {
            VocabTable::load(&slice.vocab)?
        } else {
            warn!(
                year = slice.year,
                path = %slice.vocab.display(),
                "No vocabulary file for slice; counts will be zero"
            );
            VocabTable::default()
        };
        let table = Some(&vocab);

        let mut centroids: BTreeMap<&str, Option<Vec<f64>>> = BTreeMap::new();
        for &list in &all_lists {
            let c = centroid(&snapshot, list, table, plan.weighting);
            let found = found_count(&snapshot, list);
            if found == 0 {
                warn!(year = slice.year, list = %list.name, "Word list does not resolve in slice");
            } else if found < list.len() {
                debug!(year = slice.year, list = %list.name, found, total = list.len(), "Partial coverage");
            }
            coverage.entry(list.name.clone()).or_default().push(found);

            let list_counts = counts_all.entry(list.name.clone()).or_default();
            for word in list.words() {
                list_counts.entry(word.clone()).or_default().push(vocab.count(word));
            }

            trajectories.entry(list.name.clone()).or_default().push(c.clone());
            centroids.insert(list.name.as_str(), c);
        }

        for n in &neutral {
            let cn = centroids[n.name.as_str()].as_deref();
            for g in &groups {
                let cg = centroids[g.name.as_str()].as_deref();
                distances
                    .entry(distance_key(&n.name, &g.name))
                    .or_default()
                    .push(centroid_distance(cn, cg));

                if plan.individual_neutral_words {
                    for word in n.words() {
                        let cw = centroid(&snapshot, &WordList::singleton(word), table, plan.weighting);
                        indiv_neutral
                            .entry(n.name.clone())
                            .or_default()
                            .entry(word.clone())
                            .or_default()
                            .entry(g.name.clone())
                            .or_default()
                            .push(centroid_distance(cw.as_deref(), cg));
                    }
                }
                if plan.individual_group_words {
                    for word in g.words() {
                        let cw = centroid(&snapshot, &WordList::singleton(word), table, plan.weighting);
                        indiv_group
                            .entry(g.name.clone())
                            .or_default()
                            .entry(word.clone())
                            .or_default()
                            .entry(n.name.clone())
                            .or_default()
                            .push(centroid_distance(cn, cw.as_deref()));
                    }
                }
            }
        }

        debug!(year = slice.year, vectors = snapshot.len(), "Slice processed");
        pb.inc(1);
    }
    pb.finish_and_clear();

    let variance_over_time = trajectories
        .iter()
        .map(|(name, traj)| (name.clone(), centroid_dispersion(traj)))
        .collect();

    let to_series = |values: Vec<f64>| TimeSeries::new(years.clone(), values);
    let nest = |m: IndividualSeries| -> IndividualDistances {
        m.into_iter()
            .map(|(list, words)| {
                let words: BTreeMap<String, BTreeMap<String, TimeSeries>> = words
                    .into_iter()
                    .map(|(w, inner)| (w, inner.into_iter().map(|(k, v)| (k, to_series(v))).collect()))
                    .collect();
                (list, words)
            })
            .collect()
    };

    let record = RunRecord {
        label: plan.label.clone(),
        timestamp: Utc::now(),
        years: years.clone(),
        counts_all,
        coverage,
        variance_over_time,
        distances: distances.into_iter().map(|(k, v)| (k, to_series(v))).collect(),
        indiv_distances_neutral: plan.individual_neutral_words.then(|| nest(indiv_neutral)),
        indiv_distances_group: plan.individual_group_words.then(|| nest(indiv_group)),
    };

    info!(
        label = %record.label,
        pairs = record.distances.len(),
        "Analysis run complete"
    );
    Ok(record)
}
