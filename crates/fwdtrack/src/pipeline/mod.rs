//! Per-event tracking pipeline.
//!
//! This module is the glue layer that wires the stages together:
//! hit ingest -> overlap map -> automaton rounds over the cutoff ladder ->
//! overlap versions -> fit -> subset selection.
//!
//! Algorithmic primitives live in `crate::hits`, `crate::automaton`,
//! `crate::fit` and `crate::subset`. The pipeline layer owns stage order,
//! retry policy and bookkeeping.

mod candidates;
mod ingest;
mod result;
mod run;

pub use result::{EventStats, FitFailureCounts, RunStats, Track, TrackCollection};
pub use run::track_event;
