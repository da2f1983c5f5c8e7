use super::geometry::{circle_through, norm, normalize_angle, ratio_or_none, rho, sub, Point};
use super::CriterionName;

/// `a` is the outer hit, `b` the inner one.
pub(super) fn value(name: CriterionName, a: &Point, b: &Point) -> Option<f64> {
    match name {
        CriterionName::DeltaRho => Some(rho(a) - rho(b)),
        CriterionName::RzRatio => ratio_or_none(norm(&sub(a, b)), (a[2] - b[2]).abs()),
        CriterionName::StraightTrackRatio => ratio_or_none(rho(a) * b[2], rho(b) * a[2]),
        CriterionName::DeltaPhi => {
            if rho(a) < 1e-9 || rho(b) < 1e-9 {
                return None;
            }
            let d = normalize_angle(a[1].atan2(a[0]) - b[1].atan2(b[0]));
            Some(d.abs().to_degrees())
        }
        CriterionName::HelixWithIp => {
            let origin = [0.0; 3];
            let (sa, sb) = match circle_through(&origin, a, b) {
                Some(c) => (arc_from_origin(c.radius, a), arc_from_origin(c.radius, b)),
                None => (rho(a), rho(b)),
            };
            ratio_or_none(sa * b[2], sb * a[2])
        }
        _ => None,
    }
}

/// Arc length in xy from the origin to `p` along a circle of radius `r` through both.
fn arc_from_origin(r: f64, p: &Point) -> f64 {
    let chord = rho(p);
    2.0 * r * (chord / (2.0 * r)).min(1.0).asin()
}
