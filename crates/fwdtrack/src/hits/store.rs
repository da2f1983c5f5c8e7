use std::collections::BTreeMap;

use super::{Hit, HitId};
use crate::sector::{SectorError, SectorSystem};

/// Quality flag of an output track collection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CollectionQuality {
    #[default]
    Good,
    Fair,
    Poor,
}

impl CollectionQuality {
    /// Lower the quality to `other` if that is worse; never raises it.
    pub fn degrade(&mut self, other: CollectionQuality) {
        if other > *self {
            *self = other;
        }
    }
}

/// Per-event hit arena with sector buckets.
///
/// Hits keep their arena index for the whole event, even when their sector was
/// dropped; dropped hits are simply not referenced by any bucket.
#[derive(Debug, Clone, Default)]
pub struct HitStore {
    hits: Vec<Hit>,
    sectors: BTreeMap<i32, Vec<HitId>>,
    dropped_sectors: Vec<(i32, usize)>,
    ip_hits: Vec<HitId>,
    quality: CollectionQuality,
}

impl HitStore {
    /// Bucket hits by sector, keeping input order within each bucket.
    ///
    /// Any sector holding more than `max_hits_per_sector` hits is emptied and
    /// the store quality drops to [`CollectionQuality::Poor`].
    pub fn build(hits: Vec<Hit>, max_hits_per_sector: usize) -> Self {
        let mut sectors: BTreeMap<i32, Vec<HitId>> = BTreeMap::new();
        for (i, hit) in hits.iter().enumerate() {
            sectors.entry(hit.sector).or_default().push(HitId(i));
        }

        let mut dropped_sectors = Vec::new();
        sectors.retain(|&sector, ids| {
            if ids.len() > max_hits_per_sector {
                dropped_sectors.push((sector, ids.len()));
                false
            } else {
                true
            }
        });

        let mut quality = CollectionQuality::Good;
        for &(sector, n) in &dropped_sectors {
            tracing::warn!(
                sector,
                n_hits = n,
                max_hits_per_sector,
                "dropping overpopulated sector"
            );
            quality = CollectionQuality::Poor;
        }

        Self {
            hits,
            sectors,
            dropped_sectors,
            ip_hits: Vec::new(),
            quality,
        }
    }

    /// Insert one virtual IP hit at the origin for each side, in layer 0.
    pub fn add_virtual_ip_hits(&mut self, sectors: &SectorSystem) -> Result<(), SectorError> {
        for side in [1i8, -1] {
            let sector = sectors.sector(side, 0, 0, 0)?;
            let id = HitId(self.hits.len());
            self.hits.push(Hit {
                position: [0.0, 0.0, 0.0],
                sector,
                source: None,
            });
            self.sectors.entry(sector).or_default().push(id);
            self.ip_hits.push(id);
        }
        Ok(())
    }

    pub fn hit(&self, id: HitId) -> &Hit {
        &self.hits[id.0]
    }

    /// Total number of hits in the arena (including dropped and virtual ones).
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Number of hits still referenced by a sector bucket.
    pub fn n_bucketed(&self) -> usize {
        self.sectors.values().map(Vec::len).sum()
    }

    pub fn sector_hits(&self, sector: i32) -> &[HitId] {
        self.sectors.get(&sector).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-empty sectors in ascending sector order.
    pub fn sectors(&self) -> impl Iterator<Item = (i32, &[HitId])> + '_ {
        self.sectors.iter().map(|(&s, ids)| (s, ids.as_slice()))
    }

    /// Sectors emptied by the overflow guard with their hit counts before clearing.
    pub fn dropped_sectors(&self) -> &[(i32, usize)] {
        &self.dropped_sectors
    }

    pub fn ip_hits(&self) -> &[HitId] {
        &self.ip_hits
    }

    pub fn quality(&self) -> CollectionQuality {
        self.quality
    }

    pub fn positions(&self, ids: &[HitId]) -> Vec<[f64; 3]> {
        ids.iter().map(|&id| self.hit(id).position).collect()
    }

    /// One line per occupied sector, for debug logging.
    pub fn occupancy_summary(&self, sectors: &SectorSystem) -> String {
        let mut out = String::new();
        for (sector, ids) in &self.sectors {
            out.push_str(&format!("{}: {} hits\n", sectors.describe(*sector), ids.len()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(sector: i32, z: f64) -> Hit {
        Hit {
            position: [1.0, 1.0, z],
            sector,
            source: Some(crate::hits::HitRef {
                collection: 0,
                index: 0,
            }),
        }
    }

    #[test]
    fn buckets_keep_input_order() {
        let hits = vec![hit(3, 1.0), hit(5, 2.0), hit(3, 3.0)];
        let store = HitStore::build(hits, 10);
        assert_eq!(store.sector_hits(3), &[HitId(0), HitId(2)]);
        assert_eq!(store.sector_hits(5), &[HitId(1)]);
        assert!(store.sector_hits(7).is_empty());
        assert_eq!(store.quality(), CollectionQuality::Good);
    }

    #[test]
    fn overpopulated_sector_is_dropped_and_quality_is_poor() {
        let mut hits: Vec<Hit> = (0..4).map(|i| hit(2, i as f64)).collect();
        hits.push(hit(9, 10.0));
        let store = HitStore::build(hits, 3);
        assert!(store.sector_hits(2).is_empty());
        assert_eq!(store.sector_hits(9), &[HitId(4)]);
        assert_eq!(store.dropped_sectors(), &[(2, 4)]);
        assert_eq!(store.quality(), CollectionQuality::Poor);
        assert_eq!(store.n_bucketed(), 1);
        // Arena indices stay valid.
        assert_eq!(store.hit(HitId(4)).z(), 10.0);
    }

    #[test]
    fn sector_at_limit_is_kept() {
        let hits: Vec<Hit> = (0..3).map(|i| hit(2, i as f64)).collect();
        let store = HitStore::build(hits, 3);
        assert_eq!(store.sector_hits(2).len(), 3);
        assert_eq!(store.quality(), CollectionQuality::Good);
    }

    #[test]
    fn virtual_ip_hits_sit_in_layer_zero_of_both_sides() {
        let sys = SectorSystem::new(4, 2, 2);
        let mut store = HitStore::build(Vec::new(), 10);
        store.add_virtual_ip_hits(&sys).unwrap();
        assert_eq!(store.ip_hits().len(), 2);
        let sides: Vec<i8> = store
            .ip_hits()
            .iter()
            .map(|&id| {
                let h = store.hit(id);
                assert!(h.is_virtual());
                assert_eq!(sys.layer(h.sector).unwrap(), 0);
                sys.side(h.sector).unwrap()
            })
            .collect();
        assert_eq!(sides, vec![1, -1]);
    }

    #[test]
    fn quality_only_degrades() {
        let mut q = CollectionQuality::Fair;
        q.degrade(CollectionQuality::Good);
        assert_eq!(q, CollectionQuality::Fair);
        q.degrade(CollectionQuality::Poor);
        assert_eq!(q, CollectionQuality::Poor);
    }
}
