use super::geometry::{
    angle_3d, circle_through, normalize_angle, ratio_or_none, signed_angle_xy, sub, Point,
};
use super::CriterionName;

/// Parent hits `a`, `b`, `c` and the child's innermost hit `d`, outer → inner.
pub(super) fn value(name: CriterionName, a: &Point, b: &Point, c: &Point, d: &Point) -> Option<f64> {
    let outer = sub(b, a);
    let middle = sub(c, b);
    let inner = sub(d, c);
    match name {
        CriterionName::AngleChange2d => ratio_or_none(
            signed_angle_xy(&outer, &middle)?,
            signed_angle_xy(&middle, &inner)?,
        ),
        CriterionName::AngleChange3d => {
            ratio_or_none(angle_3d(&outer, &middle)?, angle_3d(&middle, &inner)?)
        }
        CriterionName::DistToExtrapolation => {
            let predicted = match circle_through(a, b, c) {
                Some(_) => circle_extrapolation(a, b, c, d[2])?,
                None => extrapolate_xy(b, c, d[2])?,
            };
            Some((predicted[0] - d[0]).hypot(predicted[1] - d[1]))
        }
        CriterionName::NoZigZag => {
            let first = signed_angle_xy(&outer, &middle)?.to_degrees();
            let second = signed_angle_xy(&middle, &inner)?.to_degrees();
            Some(first * second)
        }
        CriterionName::RChange => {
            let r1 = circle_through(a, b, c).map_or(f64::INFINITY, |c| c.radius);
            let r2 = circle_through(b, c, d).map_or(f64::INFINITY, |c| c.radius);
            if r1.is_infinite() && r2.is_infinite() {
                None
            } else {
                Some(r1 / r2)
            }
        }
        _ => None,
    }
}

/// Straight-line prolongation of `b -> c` to plane `z`.
fn extrapolate_xy(b: &Point, c: &Point, z: f64) -> Option<[f64; 2]> {
    let dz = c[2] - b[2];
    if dz.abs() < 1e-9 {
        return None;
    }
    let t = (z - c[2]) / dz;
    Some([c[0] + (c[0] - b[0]) * t, c[1] + (c[1] - b[1]) * t])
}

/// Helix prolongation: the azimuth around the circle through `a, b, c` advances
/// linearly with z.
fn circle_extrapolation(a: &Point, b: &Point, c: &Point, z: f64) -> Option<[f64; 2]> {
    let circle = circle_through(a, b, c)?;
    let dz = c[2] - b[2];
    if dz.abs() < 1e-9 {
        return None;
    }
    let phi_b = circle.angle_of(b);
    let phi_c = circle.angle_of(c);
    let dphi_dz = normalize_angle(phi_c - phi_b) / dz;
    let phi = phi_c + dphi_dz * (z - c[2]);
    Some([
        circle.center[0] + circle.radius * phi.cos(),
        circle.center[1] + circle.radius * phi.sin(),
    ])
}
