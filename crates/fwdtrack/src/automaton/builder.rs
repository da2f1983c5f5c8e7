use crate::criteria::{CriteriaContext, CriteriaSet};
use crate::hits::HitStore;
use crate::sector::{SectorError, SectorSystem};

use super::{Automaton, AutomatonError, Segment};

/// Decides which sectors a hit in a given sector may connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerConnector {
    /// Every layer from `layer - 1` down to `layer - layer_step_max` is a target.
    pub layer_step_max: u32,
    /// Layers `2..=last_layer_to_ip` may also connect straight to layer 0.
    pub last_layer_to_ip: u32,
}

impl LayerConnector {
    pub fn new(layer_step_max: u32, last_layer_to_ip: u32) -> Self {
        Self {
            layer_step_max,
            last_layer_to_ip,
        }
    }

    /// Target sectors for hits in `sector`, inner layers only, same side.
    pub fn targets(&self, sectors: &SectorSystem, sector: i32) -> Result<Vec<i32>, SectorError> {
        let side = sectors.side(sector)?;
        let layer = sectors.layer(sector)?;

        let mut layers: Vec<u32> = (1..=self.layer_step_max)
            .filter(|&step| step <= layer)
            .map(|step| layer - step)
            .collect();
        if layer > 1 && layer <= self.last_layer_to_ip && !layers.contains(&0) {
            layers.push(0);
        }

        let mut out = Vec::new();
        for l in layers {
            out.extend(sectors.layer_sectors(side, l)?);
        }
        Ok(out)
    }
}

impl From<&crate::config::ConnectorConfig> for LayerConnector {
    fn from(cfg: &crate::config::ConnectorConfig) -> Self {
        Self::new(cfg.layer_step_max, cfg.last_layer_to_ip)
    }
}

/// Builds the first automaton generation: one 1-hit segment per stored hit,
/// connected outer → inner where the connector and the 2-hit criteria allow.
pub struct SegmentGraphBuilder<'a> {
    sectors: &'a SectorSystem,
    connector: LayerConnector,
}

impl<'a> SegmentGraphBuilder<'a> {
    pub fn new(sectors: &'a SectorSystem, connector: LayerConnector) -> Self {
        Self { sectors, connector }
    }

    /// Build the 1-hit segment graph.
    ///
    /// Fails with [`AutomatonError::CombinatorialOverflow`] as soon as the
    /// number of connections exceeds `max_connections` (when given).
    pub fn build(
        &self,
        store: &HitStore,
        criteria: &CriteriaSet,
        ctx: &CriteriaContext,
        max_connections: Option<usize>,
    ) -> Result<Automaton, AutomatonError> {
        let mut segments = Vec::with_capacity(store.n_bucketed());
        let mut by_sector: std::collections::HashMap<i32, Vec<usize>> = Default::default();
        for (sector, ids) in store.sectors() {
            for &id in ids {
                by_sector.entry(sector).or_default().push(segments.len());
                segments.push(Segment::new(vec![id], store.hit(id).is_virtual()));
            }
        }

        let mut n_connections = 0usize;
        for (sector, ids) in store.sectors() {
            let targets = self.connector.targets(self.sectors, sector)?;
            for &outer in &by_sector[&sector] {
                let outer_pos = [store.hit(segments[outer].hits[0]).position];
                for target in &targets {
                    let Some(inner_list) = by_sector.get(target) else {
                        continue;
                    };
                    for &inner in inner_list {
                        let inner_pos = [store.hit(segments[inner].hits[0]).position];
                        if !criteria.are_compatible(&outer_pos, &inner_pos, ctx)? {
                            continue;
                        }
                        segments[outer].children.push(inner);
                        segments[inner].parents.push(outer);
                        n_connections += 1;
                        if let Some(max) = max_connections {
                            if n_connections > max {
                                return Err(AutomatonError::CombinatorialOverflow {
                                    connections: n_connections,
                                    max_connections: max,
                                });
                            }
                        }
                    }
                }
            }
            tracing::trace!(sector, n_hits = ids.len(), n_connections, "sector connected");
        }

        tracing::debug!(
            n_segments = segments.len(),
            n_connections,
            "built 1-hit segment graph"
        );
        Ok(Automaton::from_segments(segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_step_inwards_and_jump_to_ip() {
        let sys = SectorSystem::new(6, 2, 1);
        let conn = LayerConnector::new(1, 3);
        let layers = |sector: i32| -> Vec<u32> {
            let mut l: Vec<u32> = conn
                .targets(&sys, sector)
                .unwrap()
                .into_iter()
                .map(|s| sys.layer(s).unwrap())
                .collect();
            l.dedup();
            l
        };
        assert_eq!(layers(sys.sector(1, 1, 0, 0).unwrap()), vec![0]);
        assert_eq!(layers(sys.sector(1, 3, 1, 0).unwrap()), vec![2, 0]);
        assert_eq!(layers(sys.sector(1, 4, 0, 0).unwrap()), vec![3]);
        assert!(conn.targets(&sys, sys.sector(1, 0, 0, 0).unwrap()).unwrap().is_empty());
    }

    #[test]
    fn targets_stay_on_the_same_side() {
        let sys = SectorSystem::new(4, 3, 2);
        let conn = LayerConnector::new(2, 0);
        let sector = sys.sector(-1, 3, 2, 1).unwrap();
        let targets = conn.targets(&sys, sector).unwrap();
        assert_eq!(targets.len(), 2 * 3 * 2);
        assert!(targets.iter().all(|&t| sys.side(t).unwrap() == -1));
    }
}
