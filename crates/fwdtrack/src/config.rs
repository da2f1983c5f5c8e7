use std::path::Path;

use crate::criteria::{CriterionCutoffs, CriterionError, CriterionName, CutoffLadder};
use crate::sector::SectorSystem;
use crate::subset::{SubsetStrategy, TrackQuality};

/// Errors reported by [`TrackingConfig::validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A criterion entry could not be interpreted.
    Criterion(CriterionError),
    /// A field has a value outside its valid range.
    Invalid {
        field: &'static str,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Criterion(e) => write!(f, "criteria: {}", e),
            Self::Invalid { field, reason } => write!(f, "{}: {}", field, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<CriterionError> for ConfigError {
    fn from(e: CriterionError) -> Self {
        Self::Criterion(e)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Division counts of the endcap sector system.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SectorGeometry {
    /// Number of layers including the IP layer 0.
    pub n_layers: u32,
    pub n_divisions_phi: u32,
    pub n_divisions_theta: u32,
}

impl SectorGeometry {
    pub fn sector_system(&self) -> SectorSystem {
        SectorSystem::new(self.n_layers, self.n_divisions_phi, self.n_divisions_theta)
    }
}

impl Default for SectorGeometry {
    fn default() -> Self {
        Self {
            n_layers: 8,
            n_divisions_phi: 16,
            n_divisions_theta: 4,
        }
    }
}

/// Which sectors a hit may connect to.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Maximum number of layers skipped inwards by one connection, plus one.
    pub layer_step_max: u32,
    /// Hits up to this layer may connect straight to the IP.
    pub last_layer_to_ip: u32,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            layer_step_max: 2,
            last_layer_to_ip: 3,
        }
    }
}

/// How links between segments longer than three hits are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtendedCriteriaPolicy {
    /// Every link is accepted.
    #[default]
    AcceptAll,
    /// The 4-hit criteria are applied to the two outermost and two innermost
    /// hits spanned by the link.
    ReuseFourHit,
}

/// What happens when the connection budget is still exceeded in the last ladder round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedLadderPolicy {
    /// Write an empty collection flagged as skipped with quality Poor.
    #[default]
    SkipEvent,
    /// Rerun the last round without a connection budget.
    ContinueUnbounded,
}

/// Cellular automaton growth controls.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AutomatonConfig {
    /// Final segment length; links between these segments use `max_segment_hits + 1` hit criteria.
    pub max_segment_hits: usize,
    /// Connection budget per event and round.
    pub max_connections: usize,
    pub extended_criteria: ExtendedCriteriaPolicy,
    pub exhausted_ladder: ExhaustedLadderPolicy,
}

impl Default for AutomatonConfig {
    fn default() -> Self {
        Self {
            max_segment_hits: 3,
            max_connections: 100_000,
            extended_criteria: ExtendedCriteriaPolicy::default(),
            exhausted_ladder: ExhaustedLadderPolicy::default(),
        }
    }
}

/// Track fit and candidate acceptance.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Magnetic field along z in Tesla.
    pub bz: f64,
    pub multiple_scattering: bool,
    pub energy_loss: bool,
    /// Run the backward smoother and keep the smoothed state at every hit.
    pub smoothing: bool,
    /// Minimum chi² probability of an accepted track.
    pub chi2_prob_cut: f64,
    /// Maximum chi²/ndf of the helix pre-fit.
    pub helix_fit_max: f64,
    /// At least 3; the helix pre-fit needs three points.
    pub hits_per_track_min: usize,
    /// Transverse hit resolution in mm (both coordinates).
    pub hit_resolution_mm: f64,
    /// Material per disk in radiation lengths.
    pub layer_thickness_x0: f64,
    /// Energy lost per disk crossing in GeV.
    pub layer_energy_loss_gev: f64,
    /// |z| of the calorimeter face; `None` disables that track state.
    pub calo_face_z: Option<f64>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            bz: 3.5,
            multiple_scattering: true,
            energy_loss: true,
            smoothing: false,
            chi2_prob_cut: 0.005,
            helix_fit_max: 500.0,
            hits_per_track_min: 3,
            hit_resolution_mm: 0.01,
            layer_thickness_x0: 0.01,
            layer_energy_loss_gev: 1e-4,
            calo_face_z: Some(2450.0),
        }
    }
}

/// Overlap-region hit handling.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OverlapConfig {
    /// Maximum 3-D distance between two hits of one crossing (mm).
    pub dist_max: f64,
    /// Keep only the best fitted version of each candidate.
    pub take_best_version: bool,
    /// Maximum number of overlap hits added to one candidate.
    pub max_added_hits: usize,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            dist_max: 3.5,
            take_best_version: true,
            max_added_hits: 8,
        }
    }
}

/// Hopfield network parameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HopfieldParams {
    /// Weight of the quality term; compatible pairs couple with `(1 - omega) / (n - 1)`.
    pub omega: f64,
    /// Neurons at or above this activation are accepted.
    pub activation_threshold: f64,
    /// Asymptotic temperature.
    pub t_inf: f64,
    pub initial_temperature: f64,
    /// Convergence limit on the largest activation change per sweep.
    pub limit_for_stable: f64,
    pub max_iterations: usize,
    /// Seed of the neuron update order.
    pub seed: u64,
}

impl Default for HopfieldParams {
    fn default() -> Self {
        Self {
            omega: 0.75,
            activation_threshold: 0.5,
            t_inf: 0.1,
            initial_temperature: 2.1,
            limit_for_stable: 0.01,
            max_iterations: 200,
            seed: 0x5eed,
        }
    }
}

/// Final track subset selection.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SubsetConfig {
    pub strategy: SubsetStrategy,
    pub quality: TrackQuality,
    pub hopfield: HopfieldParams,
    /// Largest problem solved exactly; bigger ones fall back to greedy.
    pub exact_max_items: usize,
}

impl Default for SubsetConfig {
    fn default() -> Self {
        Self {
            strategy: SubsetStrategy::HopfieldNn,
            quality: TrackQuality::Chi2Prob,
            hopfield: HopfieldParams::default(),
            exact_max_items: 24,
        }
    }
}

/// Default cutoff ladder: wide enough for straight and moderately curved
/// tracks from the IP, tightened once per retry round.
pub fn default_criteria() -> Vec<CriterionCutoffs> {
    use CriterionName as C;
    vec![
        CriterionCutoffs::new(C::RzRatio, &[0.99], &[1.25]),
        CriterionCutoffs::new(C::StraightTrackRatio, &[0.9, 0.95], &[1.1, 1.05]),
        CriterionCutoffs::new(C::HelixWithIp, &[0.9, 0.95], &[1.1, 1.05]),
        CriterionCutoffs::new(C::Angle3d, &[0.0], &[10.0, 8.0]),
        CriterionCutoffs::new(C::ChangeRzRatio, &[0.95], &[1.05]),
        CriterionCutoffs::new(C::IpCircleDist, &[0.0], &[20.0, 10.0]),
        CriterionCutoffs::new(C::DistToExtrapolation, &[0.0], &[2.0, 1.0]),
    ]
}

/// Top-level tracking configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Names of the input hit collections; empty reads every collection.
    pub input_collections: Vec<String>,
    pub output_collection: String,
    pub geometry: SectorGeometry,
    /// Sectors with more hits are emptied before tracking.
    pub max_hits_per_sector: usize,
    pub connector: ConnectorConfig,
    pub automaton: AutomatonConfig,
    /// Cutoff ladder, one entry per active criterion.
    pub criteria: Vec<CriterionCutoffs>,
    pub fit: FitConfig,
    pub overlap: OverlapConfig,
    pub subset: SubsetConfig,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            input_collections: vec!["FTDPixelTrackerHits".into(), "FTDSpacePoints".into()],
            output_collection: "ForwardTracks".into(),
            geometry: SectorGeometry::default(),
            max_hits_per_sector: 1000,
            connector: ConnectorConfig::default(),
            automaton: AutomatonConfig::default(),
            criteria: default_criteria(),
            fit: FitConfig::default(),
            overlap: OverlapConfig::default(),
            subset: SubsetConfig::default(),
        }
    }
}

impl TrackingConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn sector_system(&self) -> SectorSystem {
        self.geometry.sector_system()
    }

    pub fn ladder(&self) -> Result<CutoffLadder, CriterionError> {
        CutoffLadder::from_cutoffs(&self.criteria)
    }

    /// Check every field for a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.geometry;
        if g.n_layers < 2 {
            return Err(invalid("geometry.n_layers", "need the IP layer and at least one disk"));
        }
        if g.n_divisions_phi == 0 || g.n_divisions_theta == 0 {
            return Err(invalid("geometry", "division counts must be >= 1"));
        }
        let per_side = g.n_layers as u64 * g.n_divisions_phi as u64 * g.n_divisions_theta as u64;
        if 2 * per_side > i32::MAX as u64 {
            return Err(invalid("geometry", "too many sectors for an i32 sector id"));
        }
        if self.max_hits_per_sector == 0 {
            return Err(invalid("max_hits_per_sector", "must be >= 1"));
        }

        let c = &self.connector;
        if c.layer_step_max == 0 {
            return Err(invalid("connector.layer_step_max", "must be >= 1"));
        }
        if c.last_layer_to_ip >= g.n_layers {
            return Err(invalid(
                "connector.last_layer_to_ip",
                format!("must be < n_layers ({})", g.n_layers),
            ));
        }

        let a = &self.automaton;
        if !(1..=8).contains(&a.max_segment_hits) {
            return Err(invalid("automaton.max_segment_hits", "must be in 1..=8"));
        }
        if a.max_connections == 0 {
            return Err(invalid("automaton.max_connections", "must be >= 1"));
        }

        let ladder = self.ladder()?;
        for cut in &self.criteria {
            if cut.min.is_empty() && cut.max.is_empty() {
                return Err(invalid("criteria", format!("{} has no cutoff values", cut.name)));
            }
            if cut.min.iter().chain(&cut.max).any(|v| !v.is_finite()) {
                return Err(invalid("criteria", format!("{} has a non-finite cutoff", cut.name)));
            }
        }
        for round in 0..ladder.n_rounds() {
            if let Some(set) = ladder.criteria_for_round(round) {
                if let Some(bad) = set.criteria().iter().find(|c| c.min > c.max) {
                    return Err(invalid(
                        "criteria",
                        format!("{} has min > max in round {}", bad.name, round),
                    ));
                }
            }
        }

        let f = &self.fit;
        if !(0.0..=1.0).contains(&f.chi2_prob_cut) {
            return Err(invalid("fit.chi2_prob_cut", "must be in [0, 1]"));
        }
        if !(f.helix_fit_max > 0.0) {
            return Err(invalid("fit.helix_fit_max", "must be > 0"));
        }
        if f.hits_per_track_min < 3 {
            return Err(invalid("fit.hits_per_track_min", "must be >= 3"));
        }
        if !f.bz.is_finite() {
            return Err(invalid("fit.bz", "must be finite"));
        }
        if !(f.hit_resolution_mm > 0.0) {
            return Err(invalid("fit.hit_resolution_mm", "must be > 0"));
        }
        if !(f.layer_thickness_x0 >= 0.0) || !(f.layer_energy_loss_gev >= 0.0) {
            return Err(invalid("fit", "material values must be >= 0"));
        }
        if matches!(f.calo_face_z, Some(z) if !(z > 0.0)) {
            return Err(invalid("fit.calo_face_z", "must be > 0"));
        }

        let o = &self.overlap;
        if !(o.dist_max >= 0.0) {
            return Err(invalid("overlap.dist_max", "must be >= 0"));
        }
        if o.max_added_hits > 16 {
            return Err(invalid("overlap.max_added_hits", "must be <= 16"));
        }

        let h = &self.subset.hopfield;
        if !(h.t_inf > 0.0) || !(h.initial_temperature > 0.0) {
            return Err(invalid("subset.hopfield", "temperatures must be > 0"));
        }
        if !(0.0..=1.0).contains(&h.activation_threshold) {
            return Err(invalid("subset.hopfield.activation_threshold", "must be in [0, 1]"));
        }
        if h.max_iterations == 0 {
            return Err(invalid("subset.hopfield.max_iterations", "must be >= 1"));
        }
        Ok(())
    }
}
