//! fwdtrack: cellular-automaton track finding for forward disk detectors.
//!
//! Hits from the disks of a forward tracker are turned into fitted tracks in
//! these stages:
//!
//! 1. **Sectors** – every hit gets an integer sector key (side, layer, phi and
//!    theta division); overpopulated sectors are dropped.
//! 2. **Overlaps** – pairs of close hits on neighbouring modules of one disk
//!    are remembered for later.
//! 3. **Automaton** – hits are linked outer → inner into segments that pass
//!    the configured criteria, grown one hit per generation and pruned to
//!    what can reach the interaction point. A cutoff ladder tightens the
//!    criteria when the connection budget is exceeded.
//! 4. **Fit** – every candidate (and its overlap-hit versions) gets a helix
//!    pre-fit and a Kalman fit; bad fits are dropped.
//! 5. **Subset** – a Hopfield network (or greedy/exact search) picks the best
//!    set of tracks that share no hit.
//!
//! # Public API
//! - [`Tracker`] and [`TrackingConfig`] as primary entry points
//! - [`EventHits`] input and [`TrackCollection`] output
//! - the stage modules for direct use of the algorithms

mod api;
pub mod automaton;
pub mod config;
pub mod criteria;
pub mod fit;
pub mod hits;
mod pipeline;
pub mod sector;
pub mod subset;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::Tracker;
pub use config::{
    AutomatonConfig, ConfigError, ConnectorConfig, ExhaustedLadderPolicy, ExtendedCriteriaPolicy,
    FitConfig, HopfieldParams, OverlapConfig, SectorGeometry, SubsetConfig, TrackingConfig,
};
pub use criteria::{CriterionCutoffs, CriterionName};
pub use fit::{TrackState, TrackStateLocation};
pub use hits::{CollectionQuality, EventHits, HitCollection, HitRef, RawHit};
pub use pipeline::{track_event, EventStats, FitFailureCounts, RunStats, Track, TrackCollection};
pub use sector::{SectorError, SectorSystem};
pub use subset::{SubsetStrategy, TrackQuality};
