// Analysis engines — distances, variance and coverage over snapshots, plus
// the run that assembles them into a result record.

pub mod coverage;
pub mod distance;
pub mod run;
pub mod variance;

pub use distance::{distance_series, Weighting};
pub use variance::variance_series;
