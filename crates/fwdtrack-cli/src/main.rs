//! fwdtrack CLI: command-line driver for forward disk track finding.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use fwdtrack::{
    CriterionName, EventHits, ExhaustedLadderPolicy, RunStats, SectorSystem, SubsetStrategy,
    TrackCollection, TrackQuality, Tracker, TrackingConfig,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "fwdtrack")]
#[command(about = "Find and fit tracks in forward tracking disks (cellular automaton + Hopfield subset)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[allow(clippy::large_enum_variant)]
enum Commands {
    /// Reconstruct tracks for one or more events.
    Track(CliTrackArgs),

    /// List the available criteria and the configured cutoff ladder.
    Criteria {
        /// Tracking configuration (JSON). Defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the sector system, or decode/encode a single sector.
    SectorInfo(CliSectorArgs),

    /// Print the default configuration as JSON.
    DefaultConfig {
        /// Write to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct CliTrackArgs {
    /// Input event(s): one event object or an array of events (JSON).
    #[arg(long)]
    events: PathBuf,

    /// Path to write the track collections (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Tracking configuration (JSON). Command-line overrides apply on top.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Subset selection strategy.
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Track quality used by the subset selection.
    #[arg(long, value_enum)]
    quality: Option<QualityArg>,

    /// Magnetic field along z (Tesla).
    #[arg(long)]
    bz: Option<f64>,

    /// Minimum chi² probability of an accepted track.
    #[arg(long)]
    chi2_prob_cut: Option<f64>,

    /// Minimum number of hits per track.
    #[arg(long)]
    hits_per_track_min: Option<usize>,

    /// Connection budget per event and round.
    #[arg(long)]
    max_connections: Option<usize>,

    /// Sectors with more hits are emptied before tracking.
    #[arg(long)]
    max_hits_per_sector: Option<usize>,

    /// Keep every fitted overlap version instead of the best one.
    #[arg(long)]
    all_versions: bool,

    /// Enable the backward smoother.
    #[arg(long)]
    smoothing: bool,

    /// Disable multiple scattering in the fit.
    #[arg(long)]
    no_multiple_scattering: bool,

    /// Disable energy loss in the fit.
    #[arg(long)]
    no_energy_loss: bool,

    /// Rerun the last ladder round without a budget instead of skipping the event.
    #[arg(long)]
    continue_unbounded: bool,

    /// Seed of the Hopfield update order.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Args)]
struct CliSectorArgs {
    /// Tracking configuration (JSON) providing the geometry.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sector id to decode.
    #[arg(long, conflicts_with_all = ["side", "layer", "phi", "theta"])]
    sector: Option<i32>,

    /// Side to encode (+1 forward, -1 backward).
    #[arg(long, allow_hyphen_values = true, requires_all = ["layer", "phi", "theta"])]
    side: Option<i8>,

    #[arg(long, requires = "side")]
    layer: Option<u32>,

    #[arg(long, requires = "side")]
    phi: Option<u32>,

    #[arg(long, requires = "side")]
    theta: Option<u32>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Neural,
    Greedy,
    Exact,
    None,
}

impl StrategyArg {
    fn to_core(self) -> SubsetStrategy {
        match self {
            Self::Neural => SubsetStrategy::HopfieldNn,
            Self::Greedy => SubsetStrategy::Greedy,
            Self::Exact => SubsetStrategy::Exact,
            Self::None => SubsetStrategy::None,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum QualityArg {
    Chi2Prob,
    Chi2ProbSpecial,
    HitCount,
}

impl QualityArg {
    fn to_core(self) -> TrackQuality {
        match self {
            Self::Chi2Prob => TrackQuality::Chi2Prob,
            Self::Chi2ProbSpecial => TrackQuality::Chi2ProbSpecial,
            Self::HitCount => TrackQuality::HitCount,
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum EventInput {
    Many(Vec<EventHits>),
    One(EventHits),
}

#[derive(serde::Serialize)]
struct RunOutput<'a> {
    collections: &'a [TrackCollection],
    run_stats: &'a RunStats,
}

fn load_config(path: Option<&Path>) -> CliResult<TrackingConfig> {
    match path {
        Some(p) => {
            tracing::info!("Loading config: {}", p.display());
            TrackingConfig::from_json_file(p)
        }
        None => Ok(TrackingConfig::default()),
    }
}

impl CliTrackArgs {
    fn apply_overrides(&self, config: &mut TrackingConfig) {
        if let Some(s) = self.strategy {
            config.subset.strategy = s.to_core();
        }
        if let Some(q) = self.quality {
            config.subset.quality = q.to_core();
        }
        if let Some(bz) = self.bz {
            config.fit.bz = bz;
        }
        if let Some(cut) = self.chi2_prob_cut {
            config.fit.chi2_prob_cut = cut;
        }
        if let Some(n) = self.hits_per_track_min {
            config.fit.hits_per_track_min = n;
        }
        if let Some(n) = self.max_connections {
            config.automaton.max_connections = n;
        }
        if let Some(n) = self.max_hits_per_sector {
            config.max_hits_per_sector = n;
        }
        if let Some(seed) = self.seed {
            config.subset.hopfield.seed = seed;
        }
        if self.all_versions {
            config.overlap.take_best_version = false;
        }
        if self.smoothing {
            config.fit.smoothing = true;
        }
        if self.no_multiple_scattering {
            config.fit.multiple_scattering = false;
        }
        if self.no_energy_loss {
            config.fit.energy_loss = false;
        }
        if self.continue_unbounded {
            config.automaton.exhausted_ladder = ExhaustedLadderPolicy::ContinueUnbounded;
        }
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Track(args) => run_track(&args),
        Commands::Criteria { config } => run_criteria(config.as_deref()),
        Commands::SectorInfo(args) => run_sector_info(&args),
        Commands::DefaultConfig { out } => run_default_config(out.as_deref()),
    }
}

// ── criteria ───────────────────────────────────────────────────────────

fn run_criteria(config_path: Option<&Path>) -> CliResult<()> {
    let config = load_config(config_path)?;

    println!("fwdtrack criteria");
    for name in CriterionName::ALL {
        println!(
            "  {:<28} {:<9} {}",
            name.as_str(),
            format!("{:?}", name.kind()),
            name.description()
        );
    }

    let ladder = config.ladder()?;
    println!();
    println!("configured ladder ({} rounds)", ladder.n_rounds());
    let mut round = 0;
    while let Some(set) = ladder.criteria_for_round(round) {
        println!("  round {}:", round);
        for c in set.criteria() {
            println!("    {:<28} [{}, {}]", c.name.as_str(), c.min, c.max);
        }
        round += 1;
    }

    Ok(())
}

// ── sector-info ────────────────────────────────────────────────────────

fn run_sector_info(args: &CliSectorArgs) -> CliResult<()> {
    let config = load_config(args.config.as_deref())?;
    let sectors: SectorSystem = config.sector_system();

    if let Some(sector) = args.sector {
        let loc = sectors.locate(sector)?;
        println!("{}", sectors.describe(sector));
        println!(
            "  side={} layer={} phi={} theta={}",
            loc.side, loc.layer, loc.phi, loc.theta
        );
        return Ok(());
    }

    if let (Some(side), Some(layer), Some(phi), Some(theta)) =
        (args.side, args.layer, args.phi, args.theta)
    {
        let sector = sectors.sector(side, layer, phi, theta)?;
        println!("{}", sectors.describe(sector));
        return Ok(());
    }

    println!("fwdtrack sector system");
    println!("  layers (incl. IP):   {}", sectors.n_layers());
    println!("  phi divisions:       {}", sectors.n_divisions_phi());
    println!("  theta divisions:     {}", sectors.n_divisions_theta());
    println!("  sector range:        0..={}", sectors.sector_max());
    println!("  first sector:        {}", sectors.describe(0));
    println!(
        "  last sector:         {}",
        sectors.describe(sectors.sector_max())
    );

    Ok(())
}

// ── default-config ─────────────────────────────────────────────────────

fn run_default_config(out: Option<&Path>) -> CliResult<()> {
    let json = serde_json::to_string_pretty(&TrackingConfig::default())?;
    match out {
        Some(path) => {
            std::fs::write(path, &json)?;
            tracing::info!("Default config written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

// ── track ──────────────────────────────────────────────────────────────

fn run_track(args: &CliTrackArgs) -> CliResult<()> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    let mut tracker = Tracker::with_config(config)?;

    tracing::info!("Loading events: {}", args.events.display());
    let data = std::fs::read_to_string(&args.events).map_err(|e| -> CliError {
        format!("Failed to read {}: {}", args.events.display(), e).into()
    })?;
    let events = match serde_json::from_str::<EventInput>(&data)? {
        EventInput::Many(events) => events,
        EventInput::One(event) => vec![event],
    };
    tracing::info!("{} events", events.len());

    let collections: Vec<TrackCollection> =
        events.iter().map(|e| tracker.process_event(e)).collect();

    let stats = tracker.run_stats();
    tracing::info!(
        "Processed {} events ({} skipped): {} tracks, {:.2} per event",
        stats.events,
        stats.events_skipped,
        stats.tracks_written,
        stats.tracks_per_event(),
    );
    tracing::info!(
        "Event quality: {} good, {} fair, {} poor; {} fit failures",
        stats.events_good,
        stats.events_fair,
        stats.events_poor,
        stats.fit_failures.total(),
    );

    let output = RunOutput {
        collections: &collections,
        run_stats: stats,
    };
    let json = serde_json::to_string_pretty(&output)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!("Results written to {}", args.out.display());

    Ok(())
}
