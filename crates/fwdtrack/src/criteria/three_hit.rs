use super::geometry::{
    angle_3d, circle_through, line_distance_to_origin, norm, ratio_or_none, signed_angle_xy, sub,
    Point,
};
use super::{CriteriaContext, CriterionName};

/// Transverse momentum in GeV of a circle with radius `radius_mm` in field `bz` (T).
pub(crate) fn pt_from_radius(radius_mm: f64, bz: f64) -> f64 {
    0.0003 * bz.abs() * radius_mm
}

fn rz_ratio(outer: &Point, inner: &Point) -> Option<f64> {
    ratio_or_none(norm(&sub(outer, inner)), (outer[2] - inner[2]).abs())
}

/// Hits `a`, `b`, `c` ordered outer → inner.
pub(super) fn value(
    name: CriterionName,
    a: &Point,
    b: &Point,
    c: &Point,
    ctx: &CriteriaContext,
) -> Option<f64> {
    let outer = sub(b, a);
    let inner = sub(c, b);
    match name {
        CriterionName::ChangeRzRatio => ratio_or_none(rz_ratio(a, b)?, rz_ratio(b, c)?),
        CriterionName::Pt => Some(match circle_through(a, b, c) {
            Some(circle) => pt_from_radius(circle.radius, ctx.bz),
            None => f64::INFINITY,
        }),
        CriterionName::Angle2d => {
            signed_angle_xy(&outer, &inner).map(|a| a.abs().to_degrees())
        }
        CriterionName::Angle3d => angle_3d(&outer, &inner).map(f64::to_degrees),
        CriterionName::IpCircleDist => match circle_through(a, b, c) {
            Some(circle) => Some(circle.distance_to_origin()),
            None => line_distance_to_origin(a, c),
        },
        _ => None,
    }
}
