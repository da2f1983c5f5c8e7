//! Raw hit collections → sector-bucketed hit store.

use super::EventStats;
use crate::config::TrackingConfig;
use crate::hits::{CollectionQuality, EventHits, Hit, HitRef, HitStore, RawHit};
use crate::sector::{SectorError, SectorSystem};

pub(super) struct Ingested {
    pub(super) store: HitStore,
    pub(super) quality: CollectionQuality,
}

fn sector_of(raw: &RawHit, sectors: &SectorSystem) -> Result<i32, SectorError> {
    if raw.layer == 0 {
        // Layer 0 belongs to the virtual IP hits.
        return Err(SectorError::IndexOutOfRange {
            what: "layer",
            value: 0,
            limit: 0,
        });
    }
    sectors.sector_from_position(raw.side, raw.layer, raw.position)
}

fn selected(cfg: &TrackingConfig, name: &str) -> bool {
    cfg.input_collections.is_empty() || cfg.input_collections.iter().any(|c| c == name)
}

/// Assign sectors, bucket the hits and add the virtual IP hits.
///
/// Hits with an invalid location or a non-finite position are dropped and
/// lower the quality to [`CollectionQuality::Fair`].
pub(super) fn ingest(
    event: &EventHits,
    sectors: &SectorSystem,
    cfg: &TrackingConfig,
    stats: &mut EventStats,
) -> Result<Ingested, SectorError> {
    let mut quality = CollectionQuality::Good;
    let mut hits = Vec::new();
    for (ci, collection) in event.collections.iter().enumerate() {
        if !selected(cfg, &collection.name) {
            tracing::debug!(name = %collection.name, "skipping unselected hit collection");
            continue;
        }
        for (index, raw) in collection.hits.iter().enumerate() {
            stats.hits_read += 1;
            if raw.position.iter().any(|v| !v.is_finite()) {
                stats.hits_dropped_geometry += 1;
                continue;
            }
            match sector_of(raw, sectors) {
                Ok(sector) => hits.push(Hit {
                    position: raw.position,
                    sector,
                    source: Some(HitRef {
                        collection: ci,
                        index,
                    }),
                }),
                Err(e) => {
                    tracing::trace!(collection = ci, index, error = %e, "dropping hit");
                    stats.hits_dropped_geometry += 1;
                }
            }
        }
    }
    if stats.hits_dropped_geometry > 0 {
        tracing::warn!(
            n_dropped = stats.hits_dropped_geometry,
            n_read = stats.hits_read,
            "hits outside the sector system were dropped"
        );
        quality.degrade(CollectionQuality::Fair);
    }

    let mut store = HitStore::build(hits, cfg.max_hits_per_sector);
    quality.degrade(store.quality());
    stats.sectors_dropped = store.dropped_sectors().len();
    stats.hits_dropped_overflow = store.dropped_sectors().iter().map(|&(_, n)| n).sum();
    store.add_virtual_ip_hits(sectors)?;
    tracing::debug!("sector occupancy:\n{}", store.occupancy_summary(sectors));

    Ok(Ingested { store, quality })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hits::HitCollection;

    fn raw(position: [f64; 3], layer: u32) -> RawHit {
        RawHit {
            position,
            side: if position[2] < 0.0 { -1 } else { 1 },
            layer,
        }
    }

    #[test]
    fn invalid_hits_are_dropped_and_lower_quality() {
        let cfg = TrackingConfig::default();
        let sectors = cfg.sector_system();
        let event = EventHits {
            event_number: 4,
            collections: vec![HitCollection {
                name: "FTDPixelTrackerHits".into(),
                hits: vec![
                    raw([10.0, 0.0, 220.0], 1),
                    raw([10.0, 0.0, 220.0], 99),
                    raw([10.0, f64::NAN, 370.0], 2),
                    raw([0.0, 0.0, 10.0], 0),
                ],
            }],
        };
        let mut stats = EventStats::default();
        let out = ingest(&event, &sectors, &cfg, &mut stats).unwrap();
        assert_eq!(stats.hits_read, 4);
        assert_eq!(stats.hits_dropped_geometry, 3);
        assert_eq!(out.quality, CollectionQuality::Fair);
        // One real hit plus the two IP hits.
        assert_eq!(out.store.n_bucketed(), 3);
    }

    #[test]
    fn only_selected_collections_are_read() {
        let cfg = TrackingConfig::default();
        let sectors = cfg.sector_system();
        let event = EventHits {
            event_number: 1,
            collections: vec![
                HitCollection {
                    name: "VXDTrackerHits".into(),
                    hits: vec![raw([1.0, 1.0, 50.0], 1)],
                },
                HitCollection {
                    name: "FTDSpacePoints".into(),
                    hits: vec![raw([1.0, 1.0, -220.0], 1)],
                },
            ],
        };
        let mut stats = EventStats::default();
        let out = ingest(&event, &sectors, &cfg, &mut stats).unwrap();
        assert_eq!(stats.hits_read, 1);
        assert_eq!(out.quality, CollectionQuality::Good);
        let source = out.store.hit(crate::hits::HitId(0)).source.unwrap();
        assert_eq!(source.collection, 1);
    }

    #[test]
    fn overflowing_sector_is_poor() {
        let cfg = TrackingConfig {
            max_hits_per_sector: 2,
            ..Default::default()
        };
        let sectors = cfg.sector_system();
        let hits = (0..3)
            .map(|i| raw([100.0, 1.0 + i as f64, 220.0], 1))
            .collect();
        let event = EventHits {
            event_number: 2,
            collections: vec![HitCollection {
                name: "FTDPixelTrackerHits".into(),
                hits,
            }],
        };
        let mut stats = EventStats::default();
        let out = ingest(&event, &sectors, &cfg, &mut stats).unwrap();
        assert_eq!(out.quality, CollectionQuality::Poor);
        assert_eq!(stats.sectors_dropped, 1);
        assert_eq!(stats.hits_dropped_overflow, 3);
        assert_eq!(out.store.n_bucketed(), 2);
    }
}
