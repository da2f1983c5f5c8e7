//! Small geometric helpers shared by the criteria.

use std::f64::consts::PI;

const EPS: f64 = 1e-12;

pub type Point = [f64; 3];

pub(crate) fn sub(a: &Point, b: &Point) -> Point {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub(crate) fn norm(v: &Point) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

pub(crate) fn rho(p: &Point) -> f64 {
    p[0].hypot(p[1])
}

/// Angle between two 3-D vectors in radians, `None` if either has zero length.
pub(crate) fn angle_3d(u: &Point, v: &Point) -> Option<f64> {
    let nu = norm(u);
    let nv = norm(v);
    if nu < EPS || nv < EPS {
        return None;
    }
    let c = (u[0] * v[0] + u[1] * v[1] + u[2] * v[2]) / (nu * nv);
    Some(c.clamp(-1.0, 1.0).acos())
}

/// Signed change of azimuth from `u` to `v` in the xy plane, in `(-π, π]`.
pub(crate) fn signed_angle_xy(u: &Point, v: &Point) -> Option<f64> {
    if u[0].hypot(u[1]) < EPS || v[0].hypot(v[1]) < EPS {
        return None;
    }
    Some(normalize_angle(u[1].atan2(u[0]) - v[1].atan2(v[0])))
}

/// Map an angle into `(-π, π]`.
pub(crate) fn normalize_angle(a: f64) -> f64 {
    let mut a = a - 2.0 * PI * (a / (2.0 * PI)).floor();
    if a > PI {
        a -= 2.0 * PI;
    }
    a
}

/// `num / den`, or `None` when both are (numerically) zero.
pub(crate) fn ratio_or_none(num: f64, den: f64) -> Option<f64> {
    if num.abs() < 1e-9 && den.abs() < 1e-9 {
        return None;
    }
    Some(num / den)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Circle {
    pub center: [f64; 2],
    pub radius: f64,
}

impl Circle {
    /// Azimuth of `p` seen from the circle centre.
    pub fn angle_of(&self, p: &Point) -> f64 {
        (p[1] - self.center[1]).atan2(p[0] - self.center[0])
    }

    /// Distance of the origin from the circle.
    pub fn distance_to_origin(&self) -> f64 {
        (self.center[0].hypot(self.center[1]) - self.radius).abs()
    }
}

/// Circle through the xy projections of three points, `None` if collinear.
pub(crate) fn circle_through(p1: &Point, p2: &Point, p3: &Point) -> Option<Circle> {
    let (ax, ay) = (p1[0], p1[1]);
    let (bx, by) = (p2[0], p2[1]);
    let (cx, cy) = (p3[0], p3[1]);
    let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
    let scale = [ax, ay, bx, by, cx, cy]
        .iter()
        .fold(1.0f64, |m, v| m.max(v.abs()));
    if d.abs() < 1e-9 * scale * scale {
        return None;
    }
    let a2 = ax * ax + ay * ay;
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    let ux = (a2 * (by - cy) + b2 * (cy - ay) + c2 * (ay - by)) / d;
    let uy = (a2 * (cx - bx) + b2 * (ax - cx) + c2 * (bx - ax)) / d;
    Some(Circle {
        center: [ux, uy],
        radius: (ax - ux).hypot(ay - uy),
    })
}

/// Distance of the origin from the xy line through `a` and `b`.
pub(crate) fn line_distance_to_origin(a: &Point, b: &Point) -> Option<f64> {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let len = dx.hypot(dy);
    if len < EPS {
        return None;
    }
    Some((a[0] * dy - a[1] * dx).abs() / len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn circle_through_three_points() {
        let c = circle_through(&[5.0, 0.0, 0.0], &[0.0, 5.0, 1.0], &[-5.0, 0.0, 2.0]).unwrap();
        assert_relative_eq!(c.center[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(c.center[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(c.radius, 5.0, epsilon = 1e-12);
        assert!(circle_through(&[0.0, 0.0, 0.0], &[1.0, 1.0, 0.0], &[2.0, 2.0, 0.0]).is_none());
    }

    #[test]
    fn angles_are_normalized() {
        assert_relative_eq!(normalize_angle(3.0 * PI), PI, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(-PI), PI, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(-0.5), -0.5, epsilon = 1e-12);
        let a = signed_angle_xy(&[-1.0, 0.01, 0.0], &[-1.0, -0.01, 0.0]).unwrap();
        assert!(a.abs() < 0.03);
    }

    #[test]
    fn ratio_of_two_zeros_is_not_applicable() {
        assert_eq!(ratio_or_none(0.0, 0.0), None);
        assert_eq!(ratio_or_none(1.0, 2.0), Some(0.5));
        assert_eq!(ratio_or_none(1.0, 0.0), Some(f64::INFINITY));
    }
}
