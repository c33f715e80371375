// biasdrift: temporal word-embedding bias measurement
//
// This is the library root. Raw embeddings flow through `vectors` into
// canonical per-year files, `embeddings` and `vocab` load them back as
// snapshots and count tables, and `analysis` turns snapshots plus word lists
// into distance and variance series stored by `results`.

pub mod analysis;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod metrics;
pub mod output;
pub mod results;
pub mod sources;
pub mod status;
pub mod vectors;
pub mod vocab;
pub mod wordlist;
