//! High-level tracking API.
//!
//! [`Tracker`] is the primary entry point. It owns a [`TrackingConfig`] and
//! the [`RunStats`] accumulated over the events it processed.

use std::path::Path;

use crate::config::{ConfigError, TrackingConfig};
use crate::hits::EventHits;
use crate::pipeline::{self, RunStats, TrackCollection};

/// Primary tracking interface.
///
/// Create once, process many events.
///
/// # Examples
///
/// ```
/// use fwdtrack::{EventHits, Tracker};
///
/// let mut tracker = Tracker::new();
/// let tracks = tracker.process_event(&EventHits::default());
/// assert!(tracks.tracks.is_empty());
/// assert_eq!(tracker.run_stats().events, 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    config: TrackingConfig,
    stats: RunStats,
}

impl Tracker {
    /// Create a tracker with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with full config control. The configuration is validated.
    pub fn with_config(config: TrackingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            stats: RunStats::default(),
        })
    }

    /// Load a JSON configuration and create a tracker in one step.
    pub fn from_config_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::with_config(TrackingConfig::from_json_file(path)?)?)
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Mutable access to configuration for post-construction tuning.
    ///
    /// Changes are not validated; call [`TrackingConfig::validate`] when in doubt.
    pub fn config_mut(&mut self) -> &mut TrackingConfig {
        &mut self.config
    }

    /// Reconstruct the tracks of one event and record its statistics.
    pub fn process_event(&mut self, event: &EventHits) -> TrackCollection {
        let collection = pipeline::track_event(event, &self.config);
        self.stats.record(&collection);
        collection
    }

    pub fn run_stats(&self) -> &RunStats {
        &self.stats
    }

    /// Return the accumulated statistics and start a fresh run.
    pub fn take_run_stats(&mut self) -> RunStats {
        std::mem::take(&mut self.stats)
    }
}
