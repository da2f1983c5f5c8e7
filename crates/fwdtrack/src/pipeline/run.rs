//! Top-level per-event orchestrator: ingest → automaton rounds → fit → subset.

use super::candidates::{fit_candidates, Scored};
use super::ingest::ingest;
use super::{EventStats, Track, TrackCollection};
use crate::automaton::{AutomatonError, GrowthSummary, LayerConnector, SegmentGraphBuilder};
use crate::config::{ExhaustedLadderPolicy, TrackingConfig};
use crate::criteria::{CriteriaContext, CriteriaSet, CutoffLadder};
use crate::hits::{build_overlap_map, EventHits, HitId, HitStore};
use crate::sector::SectorSystem;
use crate::subset::select_subset;

/// Candidates of one automaton run.
struct RoundOutput {
    candidates: Vec<Vec<HitId>>,
    growth: GrowthSummary,
}

fn run_round(
    store: &HitStore,
    sectors: &SectorSystem,
    cfg: &TrackingConfig,
    criteria: &CriteriaSet,
    budget: Option<usize>,
) -> Result<RoundOutput, AutomatonError> {
    let ctx = CriteriaContext { bz: cfg.fit.bz };
    let builder = SegmentGraphBuilder::new(sectors, LayerConnector::from(&cfg.connector));
    let mut automaton = builder.build(store, criteria, &ctx, budget)?;
    let growth = automaton.grow(store, criteria, &ctx, &cfg.automaton, budget)?;
    Ok(RoundOutput {
        candidates: automaton.track_candidates(),
        growth,
    })
}

enum Search {
    Found(RoundOutput),
    /// Every ladder round overflowed and the policy says skip.
    Exhausted,
}

/// Walk the cutoff ladder until a round fits the connection budget.
fn find_candidates(
    store: &HitStore,
    sectors: &SectorSystem,
    cfg: &TrackingConfig,
    ladder: &CutoffLadder,
    stats: &mut EventStats,
) -> Result<Search, AutomatonError> {
    let budget = Some(cfg.automaton.max_connections);
    let mut round = 0;
    while let Some(criteria) = ladder.criteria_for_round(round) {
        stats.criteria_rounds = round + 1;
        match run_round(store, sectors, cfg, &criteria, budget) {
            Ok(out) => return Ok(Search::Found(out)),
            Err(AutomatonError::CombinatorialOverflow {
                connections,
                max_connections,
            }) => {
                tracing::info!(
                    round,
                    connections,
                    max_connections,
                    "too many automaton connections, tightening cutoffs"
                );
            }
            Err(e) => return Err(e),
        }

        if ladder.criteria_for_round(round + 1).is_none() {
            return match cfg.automaton.exhausted_ladder {
                ExhaustedLadderPolicy::SkipEvent => Ok(Search::Exhausted),
                ExhaustedLadderPolicy::ContinueUnbounded => {
                    tracing::warn!(round, "cutoff ladder exhausted, continuing without budget");
                    Ok(Search::Found(run_round(store, sectors, cfg, &criteria, None)?))
                }
            };
        }
        round += 1;
    }
    // The ladder always yields round 0.
    Ok(Search::Exhausted)
}

/// Fail loudly in debug builds; release builds skip the event.
fn wiring_error(event_number: u64, error: &dyn std::fmt::Display) {
    tracing::error!(event_number, %error, "tracking is misconfigured, skipping event");
    if cfg!(debug_assertions) {
        panic!("tracking is misconfigured: {}", error);
    }
}

/// Reconstruct the tracks of one event. Never fails: problems lower the
/// collection quality or mark the event as skipped.
pub fn track_event(event: &EventHits, cfg: &TrackingConfig) -> TrackCollection {
    let mut stats = EventStats {
        event_number: event.event_number,
        ..Default::default()
    };
    let name = cfg.output_collection.as_str();
    let sectors = cfg.sector_system();

    let ladder = match cfg.ladder() {
        Ok(l) => l,
        Err(e) => {
            wiring_error(event.event_number, &e);
            return TrackCollection::skipped(name, stats);
        }
    };

    let ingested = match ingest(event, &sectors, cfg, &mut stats) {
        Ok(i) => i,
        Err(e) => {
            wiring_error(event.event_number, &e);
            return TrackCollection::skipped(name, stats);
        }
    };
    let store = ingested.store;
    let quality = ingested.quality;

    let overlaps = build_overlap_map(&store, &sectors, cfg.overlap.dist_max);
    stats.overlap_pairs = overlaps.n_pairs();

    let found = match find_candidates(&store, &sectors, cfg, &ladder, &mut stats) {
        Ok(Search::Found(out)) => out,
        Ok(Search::Exhausted) => {
            tracing::warn!(
                event_number = event.event_number,
                rounds = stats.criteria_rounds,
                "cutoff ladder exhausted, skipping event"
            );
            return TrackCollection::skipped(name, stats);
        }
        Err(AutomatonError::CombinatorialOverflow { .. }) => {
            return TrackCollection::skipped(name, stats);
        }
        Err(e) => {
            wiring_error(event.event_number, &e);
            return TrackCollection::skipped(name, stats);
        }
    };
    stats.peak_connections = found.growth.peak_connections;
    stats.candidates = found.candidates.len();

    let fitted = fit_candidates(&found.candidates, &store, &overlaps, cfg, &mut stats);
    stats.tracks_fitted = fitted.len();

    let selection = select_subset(
        fitted,
        |s: &Scored| s.quality,
        |a: &Scored, b: &Scored| !a.shares_hit_with(b),
        &cfg.subset,
    );
    let tracks: Vec<Track> = selection
        .accepted
        .into_iter()
        .map(|s| Track::from_fitted(s.track, &store))
        .collect();
    stats.tracks_written = tracks.len();

    tracing::info!(
        event_number = event.event_number,
        n_hits = stats.hits_read,
        rounds = stats.criteria_rounds,
        n_candidates = stats.candidates,
        n_versions = stats.overlap_versions,
        n_fitted = stats.tracks_fitted,
        n_tracks = tracks.len(),
        quality = ?quality,
        "event tracked"
    );

    TrackCollection {
        name: name.to_string(),
        tracks,
        quality,
        skipped: false,
        stats,
    }
}
