// Occupation metrics — external ground-truth series that bias distances are
// compared against.
//
// Each metric turns one census-style row (column name → text cell) into an
// optional scalar. Rows are grouped by occupation and laid out against a
// year sequence, NaN where the metric has no value, so they line up with
// distance series column for column.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::results::TimeSeries;

/// Female share below this (or above 1 minus this) has no finite logit.
pub const FEMALE_LOGIT_CLIP: f64 = 1e-5;
/// Same bound for minority/White shares.
pub const ETHNIC_LOGIT_CLIP: f64 = 1e-4;
/// Added to minority/White denominators so empty occupations don't divide by zero.
pub const PROPORTION_SMOOTHING: f64 = 1e-5;
/// Minority logits above this are discarded.
pub const LOGIT_DISCARD_ABOVE: f64 = 5.0;
/// Occupations excluded from ethnicity metrics.
pub const BAD_OCCUPATIONS: [&str; 2] = ["smith", "conductor"];
/// MTurk stereotype scores are centered by subtracting this.
pub const MTURK_CENTER: f64 = 2.0;

/// One row of an occupation table.
pub type Row = HashMap<String, String>;

/// A named, typed metric over occupation rows.
#[derive(Clone, Copy)]
pub struct OccupationMetric {
    pub id: &'static str,
    /// Label for charts and tables.
    pub display_label: &'static str,
    /// Short label used in saved file names.
    pub save_label: &'static str,
    pub compute: fn(&Row) -> Option<f64>,
}

impl std::fmt::Debug for OccupationMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OccupationMetric")
            .field("id", &self.id)
            .field("save_label", &self.save_label)
            .finish()
    }
}

impl OccupationMetric {
    pub fn compute(&self, row: &Row) -> Option<f64> {
        (self.compute)(row)
    }
}

fn field(row: &Row, name: &str) -> Option<f64> {
    row.get(name)?.trim().parse().ok()
}

fn is_bad_occupation(row: &Row) -> bool {
    row.get("Occupation")
        .is_some_and(|o| BAD_OCCUPATIONS.contains(&o.trim()))
}

fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// Minority share of minority + White, smoothed.
fn minority_share(row: &Row, minority: &str) -> Option<f64> {
    let m = field(row, minority)?;
    let w = field(row, "white")?;
    Some(m / (m + w + PROPORTION_SMOOTHING))
}

fn minority_logit(row: &Row, minority: &str) -> Option<f64> {
    if is_bad_occupation(row) {
        return None;
    }
    let p = minority_share(row, minority)?;
    if p < ETHNIC_LOGIT_CLIP || p > 1.0 - ETHNIC_LOGIT_CLIP {
        return None;
    }
    let l = logit(p);
    (l <= LOGIT_DISCARD_ABOVE).then_some(l)
}

fn minority_percent(row: &Row, minority: &str) -> Option<f64> {
    if is_bad_occupation(row) {
        return None;
    }
    minority_share(row, minority).map(|p| (2.0 * p - 1.0) * 100.0)
}

fn female_logit(row: &Row) -> Option<f64> {
    let p = field(row, "Female")?;
    if p < FEMALE_LOGIT_CLIP || p > 1.0 - FEMALE_LOGIT_CLIP {
        return None;
    }
    Some(logit(p))
}

fn female_percent(row: &Row) -> Option<f64> {
    field(row, "Female").map(|p| (2.0 * p - 1.0) * 100.0)
}

fn hispanic_logit(row: &Row) -> Option<f64> {
    minority_logit(row, "hispanic")
}

fn hispanic_percent(row: &Row) -> Option<f64> {
    minority_percent(row, "hispanic")
}

fn asian_logit(row: &Row) -> Option<f64> {
    minority_logit(row, "asian")
}

fn asian_percent(row: &Row) -> Option<f64> {
    minority_percent(row, "asian")
}

fn stereotype_score(row: &Row) -> Option<f64> {
    field(row, "transformed_score")
}

pub const FEMALE_LOGIT_PROP: OccupationMetric = OccupationMetric {
    id: "female_logitprop",
    display_label: "Women Occupation Logit Prop",
    save_label: "WomenOccupationLogProp",
    compute: female_logit,
};

pub const FEMALE_PERCENT: OccupationMetric = OccupationMetric {
    id: "female_percent",
    display_label: "Women Occupation % Difference",
    save_label: "WomenOccupRelativePer",
    compute: female_percent,
};

pub const HISPANIC_LOGIT_PROP: OccupationMetric = OccupationMetric {
    id: "whitehispanic_logitprop",
    display_label: "Hispanic Occupation Logit Prop",
    save_label: "HispanicOccupationLogProp",
    compute: hispanic_logit,
};

pub const HISPANIC_PERCENT: OccupationMetric = OccupationMetric {
    id: "whitehispanic_percent",
    display_label: "Hispanic Occupation % Difference",
    save_label: "HispanicOccupRelativePer",
    compute: hispanic_percent,
};

pub const ASIAN_LOGIT_PROP: OccupationMetric = OccupationMetric {
    id: "whiteasian_logitprop",
    display_label: "Asian Occupation Logit Prop",
    save_label: "AsianOccupationProportion",
    compute: asian_logit,
};

pub const ASIAN_PERCENT: OccupationMetric = OccupationMetric {
    id: "whiteasian_percent",
    display_label: "Asian Occupation % Difference",
    save_label: "AsianOccupRelativeProp",
    compute: asian_percent,
};

/// Human stereotype score from the Williams & Best adjective ratings.
pub const HUMAN_STEREOTYPE_SCORE: OccupationMetric = OccupationMetric {
    id: "williamsbestadject",
    display_label: "Human Stereotype Score",
    save_label: "HSS",
    compute: stereotype_score,
};

pub const ALL_METRICS: [OccupationMetric; 7] = [
    FEMALE_LOGIT_PROP,
    FEMALE_PERCENT,
    HISPANIC_LOGIT_PROP,
    HISPANIC_PERCENT,
    ASIAN_LOGIT_PROP,
    ASIAN_PERCENT,
    HUMAN_STEREOTYPE_SCORE,
];

pub fn metric_by_id(id: &str) -> Option<OccupationMetric> {
    ALL_METRICS.into_iter().find(|m| m.id == id)
}

/// Per-occupation metric values and weights, each aligned to a year sequence.
#[derive(Debug, Clone, Default)]
pub struct OccupationSeries {
    pub values: BTreeMap<String, TimeSeries>,
    /// From the row's `Total Weight` column, 1 when blank; NaN for years the
    /// occupation has no value.
    pub weights: BTreeMap<String, TimeSeries>,
}

/// Group rows by `Occupation` and `Census year` into series over `years`.
///
/// Rows where the metric yields nothing are skipped entirely, weight
/// included. Rows without an occupation or a parseable year are skipped.
pub fn occupation_series(rows: &[Row], metric: &OccupationMetric, years: &[i32]) -> OccupationSeries {
    let mut values: BTreeMap<String, HashMap<i32, f64>> = BTreeMap::new();
    let mut weights: BTreeMap<String, HashMap<i32, f64>> = BTreeMap::new();

    for row in rows {
        let Some(occ) = row.get("Occupation") else {
            continue;
        };
        let Some(year) = row.get("Census year").and_then(|y| y.trim().parse::<i32>().ok()) else {
            continue;
        };
        let Some(v) = metric.compute(row) else {
            debug!(occupation = %occ, year, metric = metric.id, "Metric undefined for row");
            continue;
        };
        values.entry(occ.clone()).or_default().insert(year, v);

        let weight = match row.get("Total Weight").map(|w| w.trim()) {
            None | Some("") => 1.0,
            Some(w) => w.parse().unwrap_or(1.0),
        };
        weights.entry(occ.clone()).or_default().insert(year, weight);
    }

    let align = |m: BTreeMap<String, HashMap<i32, f64>>| -> BTreeMap<String, TimeSeries> {
        m.into_iter()
            .map(|(occ, by_year)| {
                let vals = years
                    .iter()
                    .map(|y| by_year.get(y).copied().unwrap_or(f64::NAN))
                    .collect();
                (occ, TimeSeries::new(years.to_vec(), vals))
            })
            .collect()
    };

    OccupationSeries {
        values: align(values),
        weights: align(weights),
    }
}

/// Word-keyed series from year-tagged rows (the Williams & Best layout:
/// `word`, `year` columns). Weights are 1 everywhere.
pub fn word_series(rows: &[Row], metric: &OccupationMetric, years: &[i32]) -> OccupationSeries {
    let mut by_word: BTreeMap<String, HashMap<i32, f64>> = BTreeMap::new();
    for row in rows {
        let Some(word) = row.get("word") else {
            continue;
        };
        let word = word.replace("p.n", "").trim().to_string();
        let Some(year) = row
            .get("year")
            .and_then(|y| y.trim().parse::<f64>().ok())
            .map(|y| y as i32)
        else {
            continue;
        };
        let entry = by_word.entry(word).or_default();
        if let Some(v) = metric.compute(row) {
            entry.insert(year, v);
        }
    }

    let mut out = OccupationSeries::default();
    for (word, by_year) in by_word {
        let vals = years
            .iter()
            .map(|y| by_year.get(y).copied().unwrap_or(f64::NAN))
            .collect();
        out.values.insert(word.clone(), TimeSeries::new(years.to_vec(), vals));
        out.weights
            .insert(word, TimeSeries::new(years.to_vec(), vec![1.0; years.len()]));
    }
    out
}

/// Center MTurk stereotype scores: `occupation → stereotype_score - 2`.
/// Rows with an unparseable score are skipped.
pub fn mturk_stereotypes(rows: &[Row]) -> BTreeMap<String, f64> {
    rows.iter()
        .filter_map(|row| {
            let occ = row.get("occupation")?;
            let score = field(row, "stereotype_score")?;
            Some((occ.clone(), score - MTURK_CENTER))
        })
        .collect()
}
