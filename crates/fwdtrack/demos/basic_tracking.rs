use fwdtrack::{EventHits, Tracker, TrackingConfig};
use std::error::Error;
use std::path::Path;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <event.json> [config.json] [out.json]", args[0]);
        std::process::exit(2);
    }

    let event: EventHits = serde_json::from_str(&std::fs::read_to_string(&args[1])?)?;
    let config = match args.get(2) {
        Some(path) => TrackingConfig::from_json_file(Path::new(path))?,
        None => TrackingConfig::default(),
    };

    let mut tracker = Tracker::with_config(config)?;
    let result = tracker.process_event(&event);

    println!(
        "Event {}: {} tracks from {} hits (quality {:?}{}).",
        result.stats.event_number,
        result.tracks.len(),
        result.stats.hits_read,
        result.quality,
        if result.skipped { ", skipped" } else { "" }
    );
    let bz = tracker.config().fit.bz;
    for (i, track) in result.tracks.iter().enumerate() {
        let pt = track
            .states
            .first()
            .map(|s| s.pt(bz))
            .unwrap_or(f64::NAN);
        println!(
            "  track {:>3}: {} hits, chi2/ndf = {:.2}/{}, p = {:.3}, pt = {:.2} GeV",
            i,
            track.n_hits(),
            track.chi2,
            track.ndf,
            track.chi2_prob,
            pt
        );
    }

    if let Some(out_path) = args.get(3) {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
