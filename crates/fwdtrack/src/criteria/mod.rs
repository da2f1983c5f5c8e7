//! Segment compatibility criteria.
//!
//! A criterion looks at two segments of equal length, the outer one (parent)
//! and the inner one (child), which share all but one hit. It computes a single
//! quantity and accepts the pair when that quantity lies inside `[min, max]`.
//! Segment hits are ordered outer → inner.
//!
//! Criteria are grouped by the number of distinct hits they look at:
//! 2-hit criteria compare 1-hit segments, 3-hit criteria 2-hit segments and
//! 4-hit criteria 3-hit segments.

mod four_hit;
pub(crate) mod geometry;
mod ladder;
mod three_hit;
mod two_hit;

use std::str::FromStr;

pub use geometry::Point;
pub use ladder::{CriterionCutoffs, CutoffLadder};
pub(crate) use three_hit::pt_from_radius;

/// Errors raised by criteria and their configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum CriterionError {
    /// Segments passed to a criterion do not have the hit count it needs.
    BadSegmentLength {
        /// Criterion that was asked, `None` for a whole set.
        criterion: Option<CriterionName>,
        parent: usize,
        child: usize,
    },
    /// A configured criterion name is not known.
    UnknownCriterion(String),
}

impl std::fmt::Display for CriterionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadSegmentLength {
                criterion,
                parent,
                child,
            } => {
                let who = criterion.map(|c| c.as_str()).unwrap_or("criteria set");
                write!(
                    f,
                    "{}: unsupported segment lengths (parent {} hits, child {} hits)",
                    who, parent, child
                )
            }
            Self::UnknownCriterion(name) => write!(f, "unknown criterion '{}'", name),
        }
    }
}

impl std::error::Error for CriterionError {}

/// Number of distinct hits a criterion looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CriterionKind {
    TwoHit,
    ThreeHit,
    FourHit,
}

impl CriterionKind {
    /// Hit count of each of the two segments compared.
    pub fn segment_len(self) -> usize {
        match self {
            Self::TwoHit => 1,
            Self::ThreeHit => 2,
            Self::FourHit => 3,
        }
    }

    pub fn for_segment_len(len: usize) -> Option<Self> {
        match len {
            1 => Some(Self::TwoHit),
            2 => Some(Self::ThreeHit),
            3 => Some(Self::FourHit),
            _ => None,
        }
    }
}

/// Closed registry of the available criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CriterionName {
    /// Radius of the outer hit minus radius of the inner hit (mm).
    DeltaRho,
    /// 3-D distance over `|Δz|` between the two hits.
    RzRatio,
    /// `(ρ/z)` of the outer hit over `(ρ/z)` of the inner hit.
    StraightTrackRatio,
    /// Azimuth difference of the two hits (degrees).
    DeltaPhi,
    /// Arc-length over z of both hits on the circle through them and the IP.
    HelixWithIp,
    /// Ratio of the rz ratios of the outer and the inner 2-hit segment.
    ChangeRzRatio,
    /// Transverse momentum of the circle through the three hits (GeV).
    Pt,
    /// Angle between the two 2-hit segments in the xy plane (degrees).
    Angle2d,
    /// 3-D angle between the two 2-hit segments (degrees).
    Angle3d,
    /// Distance of the origin from the circle through the three hits (mm).
    IpCircleDist,
    /// Ratio of consecutive xy angles.
    AngleChange2d,
    /// Ratio of consecutive 3-D angles.
    AngleChange3d,
    /// xy distance of the innermost hit from the helix through the outer three (mm).
    DistToExtrapolation,
    /// Product of consecutive signed xy angles (degrees squared).
    NoZigZag,
    /// Ratio of the radii of the outer and the inner circle (3 hits each).
    RChange,
}

impl CriterionName {
    pub const ALL: [CriterionName; 15] = [
        Self::DeltaRho,
        Self::RzRatio,
        Self::StraightTrackRatio,
        Self::DeltaPhi,
        Self::HelixWithIp,
        Self::ChangeRzRatio,
        Self::Pt,
        Self::Angle2d,
        Self::Angle3d,
        Self::IpCircleDist,
        Self::AngleChange2d,
        Self::AngleChange3d,
        Self::DistToExtrapolation,
        Self::NoZigZag,
        Self::RChange,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeltaRho => "Crit2_DeltaRho",
            Self::RzRatio => "Crit2_RZRatio",
            Self::StraightTrackRatio => "Crit2_StraightTrackRatio",
            Self::DeltaPhi => "Crit2_DeltaPhi",
            Self::HelixWithIp => "Crit2_HelixWithIP",
            Self::ChangeRzRatio => "Crit3_ChangeRZRatio",
            Self::Pt => "Crit3_PT",
            Self::Angle2d => "Crit3_2DAngle",
            Self::Angle3d => "Crit3_3DAngle",
            Self::IpCircleDist => "Crit3_IPCircleDist",
            Self::AngleChange2d => "Crit4_2DAngleChange",
            Self::AngleChange3d => "Crit4_3DAngleChange",
            Self::DistToExtrapolation => "Crit4_DistToExtrapolation",
            Self::NoZigZag => "Crit4_NoZigZag",
            Self::RChange => "Crit4_RChange",
        }
    }

    pub fn kind(self) -> CriterionKind {
        match self {
            Self::DeltaRho
            | Self::RzRatio
            | Self::StraightTrackRatio
            | Self::DeltaPhi
            | Self::HelixWithIp => CriterionKind::TwoHit,
            Self::ChangeRzRatio | Self::Pt | Self::Angle2d | Self::Angle3d | Self::IpCircleDist => {
                CriterionKind::ThreeHit
            }
            Self::AngleChange2d
            | Self::AngleChange3d
            | Self::DistToExtrapolation
            | Self::NoZigZag
            | Self::RChange => CriterionKind::FourHit,
        }
    }

    /// One-line description for listings.
    pub fn description(self) -> &'static str {
        match self {
            Self::DeltaRho => "outer radius minus inner radius [mm]",
            Self::RzRatio => "3-D distance over |dz| of the two hits",
            Self::StraightTrackRatio => "(rho/z) of outer hit over (rho/z) of inner hit",
            Self::DeltaPhi => "azimuth difference of the two hits [deg]",
            Self::HelixWithIp => "ratio of arc-length/z of both hits on the circle through the IP",
            Self::ChangeRzRatio => "ratio of the rz ratios of outer and inner 2-hit segment",
            Self::Pt => "transverse momentum of the circle through the hits [GeV]",
            Self::Angle2d => "xy angle between the 2-hit segments [deg]",
            Self::Angle3d => "3-D angle between the 2-hit segments [deg]",
            Self::IpCircleDist => "distance of the origin from the circle through the hits [mm]",
            Self::AngleChange2d => "ratio of consecutive xy angles",
            Self::AngleChange3d => "ratio of consecutive 3-D angles",
            Self::DistToExtrapolation => "xy distance of the inner hit from the extrapolation [mm]",
            Self::NoZigZag => "product of consecutive signed xy angles [deg^2]",
            Self::RChange => "ratio of outer and inner circle radius",
        }
    }
}

impl std::fmt::Display for CriterionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CriterionName {
    type Err = CriterionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CriterionError::UnknownCriterion(s.to_string()))
    }
}

/// Per-event context shared by all criteria.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriteriaContext {
    /// Solenoid field along z in Tesla.
    pub bz: f64,
}

impl Default for CriteriaContext {
    fn default() -> Self {
        Self { bz: 3.5 }
    }
}

/// A named criterion with its accepted range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Criterion {
    pub name: CriterionName,
    pub min: f64,
    pub max: f64,
}

impl Criterion {
    pub fn new(name: CriterionName, min: f64, max: f64) -> Self {
        Self { name, min, max }
    }

    pub fn kind(&self) -> CriterionKind {
        self.name.kind()
    }

    /// Compute the criterion quantity for a parent/child pair.
    ///
    /// `Ok(None)` means the quantity is undefined for this geometry, for
    /// example a ratio of two vanishing angles.
    pub fn value(
        &self,
        parent: &[Point],
        child: &[Point],
        ctx: &CriteriaContext,
    ) -> Result<Option<f64>, CriterionError> {
        let len = self.kind().segment_len();
        if parent.len() != len || child.len() != len {
            return Err(CriterionError::BadSegmentLength {
                criterion: Some(self.name),
                parent: parent.len(),
                child: child.len(),
            });
        }
        Ok(match self.kind() {
            CriterionKind::TwoHit => two_hit::value(self.name, &parent[0], &child[0]),
            CriterionKind::ThreeHit => {
                three_hit::value(self.name, &parent[0], &parent[1], &child[1], ctx)
            }
            CriterionKind::FourHit => {
                four_hit::value(self.name, &parent[0], &parent[1], &parent[2], &child[2])
            }
        })
    }

    /// Whether the pair passes. Undefined and NaN values pass.
    pub fn accepts(
        &self,
        parent: &[Point],
        child: &[Point],
        ctx: &CriteriaContext,
    ) -> Result<bool, CriterionError> {
        Ok(match self.value(parent, child, ctx)? {
            Some(v) if !v.is_nan() => v >= self.min && v <= self.max,
            _ => true,
        })
    }
}

/// The criteria active in one round of the cutoff ladder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CriteriaSet {
    criteria: Vec<Criterion>,
}

impl CriteriaSet {
    pub fn new(criteria: Vec<Criterion>) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn of_kind(&self, kind: CriterionKind) -> impl Iterator<Item = &Criterion> + '_ {
        self.criteria.iter().filter(move |c| c.kind() == kind)
    }

    /// Apply every criterion matching the segment length.
    ///
    /// Segments must both have 1, 2 or 3 hits; anything else is an error even
    /// when no criterion of that kind is configured.
    pub fn are_compatible(
        &self,
        parent: &[Point],
        child: &[Point],
        ctx: &CriteriaContext,
    ) -> Result<bool, CriterionError> {
        let kind = CriterionKind::for_segment_len(parent.len())
            .filter(|_| parent.len() == child.len())
            .ok_or(CriterionError::BadSegmentLength {
                criterion: None,
                parent: parent.len(),
                child: child.len(),
            })?;
        for crit in self.of_kind(kind) {
            if !crit.accepts(parent, child, ctx)? {
                tracing::trace!(criterion = crit.name.as_str(), "pair rejected");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: CriteriaContext = CriteriaContext { bz: 3.5 };

    fn straight(n: usize) -> Vec<Point> {
        // Points along one line through the origin, outer first.
        (0..n)
            .map(|i| {
                let t = (n - i) as f64;
                [10.0 * t, 5.0 * t, 200.0 * t]
            })
            .collect()
    }

    #[test]
    fn names_round_trip_through_strings() {
        for name in CriterionName::ALL {
            assert_eq!(name.as_str().parse::<CriterionName>().unwrap(), name);
        }
        assert_eq!(
            "Crit5_Bogus".parse::<CriterionName>(),
            Err(CriterionError::UnknownCriterion("Crit5_Bogus".to_string()))
        );
    }

    #[test]
    fn every_criterion_rejects_wrong_segment_lengths() {
        let pts = straight(4);
        for name in CriterionName::ALL {
            let crit = Criterion::new(name, f64::MIN, f64::MAX);
            let len = name.kind().segment_len();
            for (p, c) in [(len + 1, len + 1), (len, len + 1), (len - 1, len)] {
                let err = crit.value(&pts[..p], &pts[..c], &CTX).unwrap_err();
                assert!(
                    matches!(err, CriterionError::BadSegmentLength { .. }),
                    "{} accepted lengths {} / {}",
                    name,
                    p,
                    c
                );
            }
        }
    }

    #[test]
    fn set_rejects_unsupported_lengths_even_when_empty() {
        let pts = straight(4);
        let set = CriteriaSet::default();
        assert!(set.are_compatible(&pts[..1], &pts[1..2], &CTX).unwrap());
        assert!(set.are_compatible(&pts[..2], &pts[..1], &CTX).is_err());
        assert!(set.are_compatible(&pts[..4], &pts[..4], &CTX).is_err());
        assert!(set.are_compatible(&[], &[], &CTX).is_err());
    }

    #[test]
    fn undefined_values_are_accepted() {
        // Straight line: both angles vanish, the ratio is undefined.
        let pts = straight(4);
        let crit = Criterion::new(CriterionName::AngleChange2d, 0.5, 2.0);
        assert_eq!(crit.value(&pts[..3], &pts[1..4], &CTX).unwrap(), None);
        assert!(crit.accepts(&pts[..3], &pts[1..4], &CTX).unwrap());
    }

    #[test]
    fn set_applies_only_matching_kind() {
        let pts = straight(3);
        let set = CriteriaSet::new(vec![
            // Would reject every 2-hit pair of this line.
            Criterion::new(CriterionName::DeltaRho, 100.0, 200.0),
            Criterion::new(CriterionName::Angle3d, 0.0, 1.0),
        ]);
        assert!(!set.are_compatible(&pts[..1], &pts[1..2], &CTX).unwrap());
        assert!(set.are_compatible(&pts[..2], &pts[1..3], &CTX).unwrap());
    }
}
