//! Synthetic event helpers shared by unit tests.

use rand::Rng;

use crate::criteria::geometry::Point;
use crate::hits::{EventHits, Hit, HitCollection, HitRef, HitStore, RawHit};
use crate::sector::SectorSystem;

const DISK_Z: [f64; 8] = [0.0, 220.0, 370.0, 645.0, 795.0, 1080.0, 1650.0, 2200.0];

/// Absolute z of a forward disk, extrapolated with 500 mm spacing past the last one.
pub(crate) fn disk_z(layer: u32) -> f64 {
    let l = layer as usize;
    if l < DISK_Z.len() {
        DISK_Z[l]
    } else {
        DISK_Z[DISK_Z.len() - 1] + 500.0 * (l - DISK_Z.len() + 1) as f64
    }
}

/// Intersections of a straight line from the origin with the given disks.
pub(crate) fn line_through_origin(dir: [f64; 3], layers: &[u32]) -> Vec<(u32, Point)> {
    layers
        .iter()
        .map(|&layer| {
            let z = disk_z(layer).copysign(dir[2]);
            let t = z / dir[2];
            (layer, [dir[0] * t, dir[1] * t, z])
        })
        .collect()
}

/// Intersections of a helix from the origin with the given disks.
///
/// `sense` is `+1` for counterclockwise, `-1` for clockwise motion in xy.
pub(crate) fn helix_through_origin(
    pt: f64,
    bz: f64,
    tan_lambda: f64,
    phi0: f64,
    sense: f64,
    layers: &[u32],
) -> Vec<(u32, Point)> {
    let r = pt / (0.0003 * bz);
    layers
        .iter()
        .map(|&layer| {
            let z = disk_z(layer).copysign(tan_lambda);
            let s = z / tan_lambda;
            let a = phi0 + sense * s / r;
            let x = r * sense * (a.sin() - phi0.sin());
            let y = -r * sense * (a.cos() - phi0.cos());
            (layer, [x, y, z])
        })
        .collect()
}

/// Gaussian smearing of the transverse coordinates.
pub(crate) fn smear(points: &[(u32, Point)], sigma: f64, rng: &mut impl Rng) -> Vec<(u32, Point)> {
    points
        .iter()
        .map(|&(layer, p)| {
            let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
            let u2: f64 = rng.gen_range(0.0..1.0);
            let r = (-2.0 * u1.ln()).sqrt() * sigma;
            let a = std::f64::consts::TAU * u2;
            (layer, [p[0] + r * a.cos(), p[1] + r * a.sin(), p[2]])
        })
        .collect()
}

pub(crate) fn sorted_outer_first(points: &[(u32, Point)]) -> Vec<Point> {
    let mut out: Vec<Point> = points.iter().map(|(_, p)| *p).collect();
    out.sort_by(|a, b| b[2].abs().total_cmp(&a[2].abs()));
    out
}

/// Bucket points into a store (hit `i` gets `HitId(i)`) and add the IP hits.
pub(crate) fn store_with_ip(sys: &SectorSystem, points: &[(u32, Point)]) -> HitStore {
    let hits = points
        .iter()
        .enumerate()
        .map(|(i, &(layer, position))| {
            let side = if position[2] < 0.0 { -1 } else { 1 };
            Hit {
                position,
                sector: sys.sector_from_position(side, layer, position).unwrap(),
                source: Some(HitRef {
                    collection: 0,
                    index: i,
                }),
            }
        })
        .collect();
    let mut store = HitStore::build(hits, 1000);
    store.add_virtual_ip_hits(sys).unwrap();
    store
}

/// Single-collection event from layer-tagged points.
pub(crate) fn event_from_points(points: &[(u32, Point)]) -> EventHits {
    let hits = points
        .iter()
        .map(|&(layer, position)| RawHit {
            position,
            side: if position[2] < 0.0 { -1 } else { 1 },
            layer,
        })
        .collect();
    EventHits {
        event_number: 1,
        collections: vec![HitCollection {
            name: "FTDPixelTrackerHits".to_string(),
            hits,
        }],
    }
}
