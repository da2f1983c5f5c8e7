//! Hit records: raw input, per-event arena entries and sector bucketing.

mod overlap;
mod store;

pub use overlap::{build_overlap_map, expand_candidate, OverlapMap};
pub use store::{CollectionQuality, HitStore};

/// A raw measurement as delivered by the hit collections of one event.
///
/// Side and layer come from the (external) CellID decoding; phi and theta
/// divisions are derived from the position when the hit is stored.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawHit {
    /// Global position in mm.
    pub position: [f64; 3],
    /// `+1` forward, `-1` backward.
    pub side: i8,
    /// Disk layer, starting at 1 (layer 0 is the IP).
    pub layer: u32,
}

/// A named input hit collection.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct HitCollection {
    pub name: String,
    pub hits: Vec<RawHit>,
}

/// All hit collections of a single event.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct EventHits {
    #[serde(default)]
    pub event_number: u64,
    pub collections: Vec<HitCollection>,
}

/// Back-reference from a stored hit to its raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct HitRef {
    /// Index of the collection in [`EventHits::collections`].
    pub collection: usize,
    /// Index of the hit within that collection.
    pub index: usize,
}

/// Index of a hit in the per-event [`HitStore`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HitId(pub usize);

/// Immutable per-event hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub position: [f64; 3],
    pub sector: i32,
    /// `None` for the virtual IP hits.
    pub source: Option<HitRef>,
}

impl Hit {
    pub fn x(&self) -> f64 {
        self.position[0]
    }

    pub fn y(&self) -> f64 {
        self.position[1]
    }

    pub fn z(&self) -> f64 {
        self.position[2]
    }

    /// Distance from the beam axis.
    pub fn rho(&self) -> f64 {
        self.x().hypot(self.y())
    }

    /// Whether this is a synthetic IP hit.
    pub fn is_virtual(&self) -> bool {
        self.source.is_none()
    }

    pub fn distance_to(&self, other: &Hit) -> f64 {
        let dx = self.x() - other.x();
        let dy = self.y() - other.y();
        let dz = self.z() - other.z();
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}
