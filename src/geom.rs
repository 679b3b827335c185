// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use svgtypes::NumberListParser;

/// Representation of an affine transform.
///
/// `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Clone, Copy, PartialEq, Debug)]
#[allow(missing_docs)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Transform {
    /// Constructs a new transform.
    #[inline]
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Transform { a, b, c, d, e, f }
    }

    /// Constructs a new translate transform.
    #[inline]
    pub fn new_translate(x: f64, y: f64) -> Self {
        Transform::new(1.0, 0.0, 0.0, 1.0, x, y)
    }

    /// Constructs a new scale transform.
    #[inline]
    pub fn new_scale(sx: f64, sy: f64) -> Self {
        Transform::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Constructs a new rotate transform.
    #[inline]
    pub fn new_rotate(angle: f64) -> Self {
        let v = angle.to_radians();
        let a = v.cos();
        let b = v.sin();
        Transform::new(a, b, -b, a, 0.0, 0.0)
    }

    /// Constructs a new rotate transform at the specified position.
    #[inline]
    pub fn new_rotate_at(angle: f64, x: f64, y: f64) -> Self {
        let mut ts = Self::default();
        ts.translate(x, y);
        ts.append(&Transform::new_rotate(angle));
        ts.translate(-x, -y);
        ts
    }

    /// Constructs a new skew transform along the X axis.
    #[inline]
    pub fn new_skew_x(angle: f64) -> Self {
        Transform::new(1.0, 0.0, angle.to_radians().tan(), 1.0, 0.0, 0.0)
    }

    /// Constructs a new skew transform along the Y axis.
    #[inline]
    pub fn new_skew_y(angle: f64) -> Self {
        Transform::new(1.0, angle.to_radians().tan(), 0.0, 1.0, 0.0, 0.0)
    }

    /// Translates the current transform.
    #[inline]
    pub fn translate(&mut self, x: f64, y: f64) {
        self.append(&Transform::new_translate(x, y));
    }

    /// Appends `other` to the current transform.
    #[inline]
    pub fn append(&mut self, other: &Transform) {
        *self = multiply(self, other);
    }

    /// Applies the transform to the selected coordinates.
    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Returns the inverted transform, or `None` when the matrix is singular.
    pub fn invert(&self) -> Option<Transform> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < 1e-12 {
            return None;
        }

        let inv_det = 1.0 / det;
        let a = self.d * inv_det;
        let b = -self.b * inv_det;
        let c = -self.c * inv_det;
        let d = self.a * inv_det;
        let e = -(a * self.e + c * self.f);
        let f = -(b * self.e + d * self.f);
        Some(Transform::new(a, b, c, d, e, f))
    }
}

impl Default for Transform {
    #[inline]
    fn default() -> Self {
        Transform::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }
}

#[inline(never)]
fn multiply(ts1: &Transform, ts2: &Transform) -> Transform {
    Transform {
        a: ts1.a * ts2.a + ts1.c * ts2.b,
        b: ts1.b * ts2.a + ts1.d * ts2.b,
        c: ts1.a * ts2.c + ts1.c * ts2.d,
        d: ts1.b * ts2.c + ts1.d * ts2.d,
        e: ts1.a * ts2.e + ts1.c * ts2.f + ts1.e,
        f: ts1.b * ts2.e + ts1.d * ts2.f + ts1.f,
    }
}

/// Parses a `transform` attribute into a single affine transform.
///
/// Recognizes `matrix`, `translate`, `scale`, `rotate`, `skewX` and `skewY`;
/// `rotate` with a center expands to translate·rotate·translate⁻¹.
/// Unrecognized calls and calls with the wrong argument count are skipped.
/// Composition is left-to-right multiplication.
pub fn parse_transform_list(text: &str) -> Transform {
    let mut ts = Transform::default();
    let mut rest = text;

    while let Some(paren) = rest.find('(') {
        let name = rest[..paren].trim().to_ascii_lowercase();
        let after = &rest[paren + 1..];
        let close = match after.find(')') {
            Some(v) => v,
            None => break,
        };
        let args: Vec<f64> = NumberListParser::from(&after[..close])
            .filter_map(|n| n.ok())
            .collect();
        rest = &after[close + 1..];

        let t = match (name.as_str(), args.len()) {
            ("matrix", 6) => Transform::new(args[0], args[1], args[2], args[3], args[4], args[5]),
            ("translate", 1) => Transform::new_translate(args[0], 0.0),
            ("translate", 2) => Transform::new_translate(args[0], args[1]),
            ("scale", 1) => Transform::new_scale(args[0], args[0]),
            ("scale", 2) => Transform::new_scale(args[0], args[1]),
            ("rotate", 1) => Transform::new_rotate(args[0]),
            ("rotate", n) if n >= 3 => Transform::new_rotate_at(args[0], args[1], args[2]),
            ("skewx", 1) => Transform::new_skew_x(args[0]),
            ("skewy", 1) => Transform::new_skew_y(args[0]),
            _ => continue,
        };
        ts.append(&t);
    }

    ts
}

/// An axis-aligned bounding box in left/top/right/bottom form.
#[derive(Clone, Copy, PartialEq, Debug)]
#[allow(missing_docs)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    /// Creates a rect from its edges.
    #[inline]
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Rect { left, top, right, bottom }
    }

    /// Returns the rect width.
    #[inline]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Returns the rect height.
    #[inline]
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Returns the rect center.
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    /// Returns the smallest rect covering both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: (f64, f64), b: (f64, f64)) {
        assert!((a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9, "{:?} != {:?}", a, b);
    }

    #[test]
    fn translate_scale_composition() {
        let ts = parse_transform_list("translate(40 60) scale(1.5)");
        assert_close(ts.apply(10.0, 10.0), (55.0, 75.0));
    }

    #[test]
    fn rotate_with_center() {
        let ts = parse_transform_list("rotate(90 10 10)");
        assert_close(ts.apply(20.0, 10.0), (10.0, 20.0));
    }

    #[test]
    fn unknown_calls_are_skipped() {
        let ts = parse_transform_list("frobnicate(1 2) translate(5)");
        assert_close(ts.apply(0.0, 0.0), (5.0, 0.0));
    }

    #[test]
    fn invert_round_trips() {
        let mut ts = Transform::new_translate(12.0, -3.0);
        ts.append(&Transform::new_rotate(30.0));
        ts.append(&Transform::new_scale(2.0, 0.5));
        let inv = ts.invert().unwrap();
        let (x, y) = ts.apply(7.0, 11.0);
        assert_close(inv.apply(x, y), (7.0, 11.0));
    }

    #[test]
    fn singular_has_no_inverse() {
        assert!(Transform::new_scale(0.0, 1.0).invert().is_none());
    }
}
