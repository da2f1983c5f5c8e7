//! Sector system for the forward disks.
//!
//! A sector is a single integer encoding `(side, layer, phi division, theta
//! division)`. It is used as a compact, hashable locality key by the hit store,
//! the layer connector and the overlap resolver.
//!
//! Layer 0 is reserved for the virtual IP hit; detector disks start at layer 1.

use std::f64::consts::PI;

/// Errors returned when a sector id or one of its components is out of range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectorError {
    /// Sector id outside `[0, sector_max]`.
    OutOfRange {
        /// Offending sector id.
        sector: i32,
        /// Largest valid sector id.
        sector_max: i32,
    },
    /// A layer or division index exceeded the configured count.
    IndexOutOfRange {
        /// Which component was invalid (`"layer"`, `"phi"`, `"theta"`).
        what: &'static str,
        /// Offending value.
        value: u32,
        /// Number of valid values (exclusive upper bound).
        limit: u32,
    },
    /// Side must be `+1` or `-1`.
    InvalidSide(i8),
}

impl std::fmt::Display for SectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { sector, sector_max } => {
                write!(f, "sector {} out of range [0, {}]", sector, sector_max)
            }
            Self::IndexOutOfRange { what, value, limit } => {
                write!(f, "{} index {} out of range (limit {})", what, value, limit)
            }
            Self::InvalidSide(side) => write!(f, "invalid side {} (expected +1 or -1)", side),
        }
    }
}

impl std::error::Error for SectorError {}

/// Decoded sector components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectorLocation {
    pub side: i8,
    pub layer: u32,
    pub phi: u32,
    pub theta: u32,
}

/// Fixed-radix sector encoding for two endcaps of layered disks.
///
/// `sector = side_offset + layer + n_layers * (phi + n_phi * theta)`, with
/// `side_offset = 0` for the forward side (`+1`) and `n_layers * n_phi *
/// n_theta` for the backward side (`-1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorSystem {
    n_layers: u32,
    n_divisions_phi: u32,
    n_divisions_theta: u32,
    per_side: i64,
    sector_max: i32,
}

impl SectorSystem {
    /// Create a sector system.
    ///
    /// `n_layers` counts layer 0 (IP) as well, so a detector with 7 disks
    /// needs `n_layers = 8`. Zero counts are raised to one.
    pub fn new(n_layers: u32, n_divisions_phi: u32, n_divisions_theta: u32) -> Self {
        let n_layers = n_layers.max(1);
        let n_divisions_phi = n_divisions_phi.max(1);
        let n_divisions_theta = n_divisions_theta.max(1);
        let per_side = n_layers as i64 * n_divisions_phi as i64 * n_divisions_theta as i64;
        let sector_max = (2 * per_side - 1).min(i32::MAX as i64) as i32;
        Self {
            n_layers,
            n_divisions_phi,
            n_divisions_theta,
            per_side,
            sector_max,
        }
    }

    pub fn n_layers(&self) -> u32 {
        self.n_layers
    }

    pub fn n_divisions_phi(&self) -> u32 {
        self.n_divisions_phi
    }

    pub fn n_divisions_theta(&self) -> u32 {
        self.n_divisions_theta
    }

    /// Largest valid sector id.
    pub fn sector_max(&self) -> i32 {
        self.sector_max
    }


    /// Encode a location into a sector id.
    pub fn sector(&self, side: i8, layer: u32, phi: u32, theta: u32) -> Result<i32, SectorError> {
        let side_offset = match side {
            1 => 0,
            -1 => self.per_side,
            other => return Err(SectorError::InvalidSide(other)),
        };
        check_index("layer", layer, self.n_layers)?;
        check_index("phi", phi, self.n_divisions_phi)?;
        check_index("theta", theta, self.n_divisions_theta)?;

        let local = layer as i64
            + self.n_layers as i64 * (phi as i64 + self.n_divisions_phi as i64 * theta as i64);
        let sector = side_offset + local;
        if sector > self.sector_max as i64 {
            return Err(SectorError::OutOfRange {
                sector: sector.min(i32::MAX as i64) as i32,
                sector_max: self.sector_max,
            });
        }
        Ok(sector as i32)
    }

    /// Encode a location, deriving the phi and theta divisions from a position.
    ///
    /// Azimuth is mapped onto `[0, 2π)` and `|cos θ|` onto `[0, 1]`; values on
    /// the upper edge fall into the last division.
    pub fn sector_from_position(
        &self,
        side: i8,
        layer: u32,
        position: [f64; 3],
    ) -> Result<i32, SectorError> {
        let [x, y, z] = position;
        let mut phi = y.atan2(x);
        if phi < 0.0 {
            phi += 2.0 * PI;
        }
        let r = (x * x + y * y + z * z).sqrt();
        let cos_theta = if r > 0.0 { (z / r).abs() } else { 1.0 };

        let phi_div = division(phi / (2.0 * PI), self.n_divisions_phi);
        let theta_div = division(cos_theta, self.n_divisions_theta);
        self.sector(side, layer, phi_div, theta_div)
    }

    fn check_sector(&self, sector: i32) -> Result<i32, SectorError> {
        if sector < 0 || sector > self.sector_max {
            return Err(SectorError::OutOfRange {
                sector,
                sector_max: self.sector_max,
            });
        }
        Ok((sector as i64 % self.per_side) as i32)
    }

    pub fn side(&self, sector: i32) -> Result<i8, SectorError> {
        self.check_sector(sector)?;
        Ok(if (sector as i64) < self.per_side { 1 } else { -1 })
    }

    pub fn layer(&self, sector: i32) -> Result<u32, SectorError> {
        let local = self.check_sector(sector)? as u32;
        Ok(local % self.n_layers)
    }

    pub fn phi(&self, sector: i32) -> Result<u32, SectorError> {
        let local = self.check_sector(sector)? as u32;
        Ok((local / self.n_layers) % self.n_divisions_phi)
    }

    pub fn theta(&self, sector: i32) -> Result<u32, SectorError> {
        let local = self.check_sector(sector)? as u64;
        Ok((local / (self.n_layers as u64 * self.n_divisions_phi as u64)) as u32)
    }

    /// Decode all components of a sector id at once.
    pub fn locate(&self, sector: i32) -> Result<SectorLocation, SectorError> {
        Ok(SectorLocation {
            side: self.side(sector)?,
            layer: self.layer(sector)?,
            phi: self.phi(sector)?,
            theta: self.theta(sector)?,
        })
    }

    /// Human-readable description of a sector, for logs and the CLI.
    pub fn describe(&self, sector: i32) -> String {
        match self.locate(sector) {
            Ok(loc) => format!(
                "sector {}: side {:+}, layer {}, phi {}/{}, theta {}/{}",
                sector,
                loc.side,
                loc.layer,
                loc.phi,
                self.n_divisions_phi,
                loc.theta,
                self.n_divisions_theta
            ),
            Err(e) => format!("sector {}: {}", sector, e),
        }
    }

    /// All sector ids of one side and layer.
    pub fn layer_sectors(&self, side: i8, layer: u32) -> Result<Vec<i32>, SectorError> {
        let mut out =
            Vec::with_capacity((self.n_divisions_phi * self.n_divisions_theta) as usize);
        for theta in 0..self.n_divisions_theta {
            for phi in 0..self.n_divisions_phi {
                out.push(self.sector(side, layer, phi, theta)?);
            }
        }
        Ok(out)
    }
}

impl Default for SectorSystem {
    fn default() -> Self {
        Self::new(8, 16, 4)
    }
}

fn check_index(what: &'static str, value: u32, limit: u32) -> Result<(), SectorError> {
    if value >= limit {
        return Err(SectorError::IndexOutOfRange { what, value, limit });
    }
    Ok(())
}

fn division(fraction: f64, n: u32) -> u32 {
    if !fraction.is_finite() || fraction <= 0.0 {
        return 0;
    }
    ((fraction * n as f64) as u32).min(n - 1)
}
