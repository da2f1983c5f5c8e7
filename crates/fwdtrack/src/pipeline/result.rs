use crate::fit::{FitFailure, FittedTrack, TrackState};
use crate::hits::{CollectionQuality, HitRef, HitStore};

/// One reconstructed track.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Track {
    /// Raw hits, outer → inner.
    pub hits: Vec<HitRef>,
    pub chi2: f64,
    pub ndf: usize,
    pub chi2_prob: f64,
    pub states: Vec<TrackState>,
    /// Number of hits taken from each input collection, by collection index.
    pub hits_per_collection: Vec<usize>,
    /// Transverse radius of the innermost hit (mm).
    pub innermost_radius: f64,
}

impl Track {
    pub(crate) fn from_fitted(track: FittedTrack, store: &HitStore) -> Self {
        let hits = track
            .hits
            .iter()
            .filter_map(|&id| store.hit(id).source)
            .collect();
        Self {
            hits,
            chi2: track.chi2,
            ndf: track.ndf,
            chi2_prob: track.chi2_prob,
            states: track.states,
            hits_per_collection: track.hits_per_collection,
            innermost_radius: track.innermost_radius,
        }
    }

    pub fn n_hits(&self) -> usize {
        self.hits.len()
    }

    pub fn shares_hit_with(&self, other: &Track) -> bool {
        self.hits.iter().any(|h| other.hits.contains(h))
    }
}

/// Rejected candidate versions by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FitFailureCounts {
    pub too_few_hits: usize,
    pub degenerate: usize,
    pub helix_chi2: usize,
    pub chi2_prob: usize,
}

impl FitFailureCounts {
    pub fn record(&mut self, failure: &FitFailure) {
        match failure {
            FitFailure::TooFewHits { .. } => self.too_few_hits += 1,
            FitFailure::Degenerate => self.degenerate += 1,
            FitFailure::HelixChi2 { .. } => self.helix_chi2 += 1,
            FitFailure::Chi2Prob { .. } => self.chi2_prob += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.too_few_hits + self.degenerate + self.helix_chi2 + self.chi2_prob
    }

    fn add(&mut self, other: &FitFailureCounts) {
        self.too_few_hits += other.too_few_hits;
        self.degenerate += other.degenerate;
        self.helix_chi2 += other.helix_chi2;
        self.chi2_prob += other.chi2_prob;
    }
}

/// Per-event bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EventStats {
    pub event_number: u64,
    /// Raw hits read from the selected collections.
    pub hits_read: usize,
    /// Hits dropped because their location was outside the sector system.
    pub hits_dropped_geometry: usize,
    /// Sectors emptied by the overflow guard.
    pub sectors_dropped: usize,
    pub hits_dropped_overflow: usize,
    pub overlap_pairs: usize,
    /// Cutoff ladder rounds run (1 when the first round fit the budget).
    pub criteria_rounds: usize,
    /// Largest connection count of the accepted round.
    pub peak_connections: usize,
    pub candidates: usize,
    /// Additional versions created by overlap hits.
    pub overlap_versions: usize,
    pub fit_failures: FitFailureCounts,
    /// Fitted tracks entering subset selection.
    pub tracks_fitted: usize,
    pub tracks_written: usize,
}

/// Output of one event.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackCollection {
    pub name: String,
    pub tracks: Vec<Track>,
    pub quality: CollectionQuality,
    /// The event was skipped (no tracking was attempted or it was abandoned).
    pub skipped: bool,
    pub stats: EventStats,
}

impl TrackCollection {
    pub(crate) fn skipped(name: &str, stats: EventStats) -> Self {
        Self {
            name: name.to_string(),
            tracks: Vec::new(),
            quality: CollectionQuality::Poor,
            skipped: true,
            stats,
        }
    }
}

/// Counters accumulated over a run of events.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunStats {
    pub events: usize,
    pub events_skipped: usize,
    pub events_good: usize,
    pub events_fair: usize,
    pub events_poor: usize,
    pub hits_read: usize,
    pub candidates: usize,
    pub overlap_versions: usize,
    pub fit_failures: FitFailureCounts,
    pub tracks_written: usize,
}

impl RunStats {
    pub fn record(&mut self, collection: &TrackCollection) {
        let s = &collection.stats;
        self.events += 1;
        if collection.skipped {
            self.events_skipped += 1;
        }
        match collection.quality {
            CollectionQuality::Good => self.events_good += 1,
            CollectionQuality::Fair => self.events_fair += 1,
            CollectionQuality::Poor => self.events_poor += 1,
        }
        self.hits_read += s.hits_read;
        self.candidates += s.candidates;
        self.overlap_versions += s.overlap_versions;
        self.fit_failures.add(&s.fit_failures);
        self.tracks_written += s.tracks_written;
    }

    /// Mean number of tracks per processed event.
    pub fn tracks_per_event(&self) -> f64 {
        if self.events == 0 {
            return 0.0;
        }
        self.tracks_written as f64 / self.events as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_stats_accumulate() {
        let mut run = RunStats::default();
        let mut stats = EventStats {
            hits_read: 10,
            candidates: 3,
            tracks_written: 2,
            ..Default::default()
        };
        stats.fit_failures.record(&FitFailure::Degenerate);
        let good = TrackCollection {
            name: "ForwardTracks".into(),
            tracks: Vec::new(),
            quality: CollectionQuality::Good,
            skipped: false,
            stats,
        };
        run.record(&good);
        run.record(&TrackCollection::skipped("ForwardTracks", EventStats::default()));
        assert_eq!(run.events, 2);
        assert_eq!(run.events_skipped, 1);
        assert_eq!(run.events_good, 1);
        assert_eq!(run.events_poor, 1);
        assert_eq!(run.hits_read, 10);
        assert_eq!(run.fit_failures.total(), 1);
        assert_eq!(run.tracks_per_event(), 1.0);
    }
}
