//! Axis-aligned bounding boxes and line segments.

use crate::math::{self as m, Vec2};

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct AABB {
    pub min: Vec2,
    pub max: Vec2,
}

impl AABB {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        AABB { min, max }
    }

    pub fn zero() -> Self {
        AABB {
            min: Vec2::zero(),
            max: Vec2::zero(),
        }
    }

    /// Verify that the bounds are sorted and finite.
    pub fn is_valid(&self) -> bool {
        let d = self.max - self.min;
        d.x >= 0.0 && d.y >= 0.0 && m::is_finite(self.min) && m::is_finite(self.max)
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        0.5 * (self.min + self.max)
    }

    /// Half-widths of the box.
    #[inline]
    pub fn extents(&self) -> Vec2 {
        0.5 * (self.max - self.min)
    }

    /// The smallest AABB containing both `self` and `other`.
    pub fn union(&self, other: &Self) -> Self {
        AABB {
            min: self.min.min_by_component(other.min),
            max: self.max.max_by_component(other.max),
        }
    }

    /// Grow `self` to also contain `other`.
    pub fn combine(&mut self, other: &Self) {
        *self = self.union(other);
    }

    /// Does this AABB fully contain the other one.
    pub fn contains(&self, other: &Self) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Extend the box by `margin` in every direction.
    pub fn padded(&self, margin: f64) -> Self {
        let pad = Vec2::new(margin, margin);
        AABB {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    /// The overlapping region of two boxes, if they overlap.
    /// Touching boxes produce a zero-area intersection.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !test_overlap(self, other) {
            return None;
        }
        Some(AABB {
            min: self.min.max_by_component(other.min),
            max: self.max.min_by_component(other.max),
        })
    }
}

/// Separating axis test for two AABBs. Touching counts as overlapping.
#[inline]
pub fn test_overlap(a: &AABB, b: &AABB) -> bool {
    let d1 = b.min - a.max;
    let d2 = a.min - b.max;
    !(d1.x > 0.0 || d1.y > 0.0 || d2.x > 0.0 || d2.y > 0.0)
}

/// A line segment, also used as a ray from `p1` towards `p2`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub p1: Vec2,
    pub p2: Vec2,
}

impl Segment {
    pub fn new(p1: Vec2, p2: Vec2) -> Self {
        Segment { p1, p2 }
    }

    #[inline]
    pub fn point_at(&self, lambda: f64) -> Vec2 {
        self.p1 + lambda * (self.p2 - self.p1)
    }

    pub fn aabb(&self) -> AABB {
        AABB {
            min: self.p1.min_by_component(self.p2),
            max: self.p1.max_by_component(self.p2),
        }
    }

    /// Cast `ray` against this segment.
    ///
    /// Returns the hit fraction along `ray` and the normal of this segment facing the ray.
    /// Only hits on the side of the segment's right normal are reported
    /// and parallel segments never hit.
    pub fn test_segment(&self, ray: &Segment, max_lambda: f64) -> Option<(f64, m::Unit<Vec2>)> {
        // x = s + a * r on the ray, x = p1 + mu2 * d on this segment,
        // solved for a and mu2 with Cramer's rule
        let s = ray.p1;
        let r = ray.p2 - s;
        let d = self.p2 - self.p1;
        let n = m::right_normal(d);

        let slop = 100.0 * f64::EPSILON;
        let denom = -r.dot(n);

        if denom <= slop {
            return None;
        }
        let b = s - self.p1;
        let a = b.dot(n);
        if a < 0.0 || a > max_lambda * denom {
            return None;
        }
        let mu2 = -r.x * b.y + r.y * b.x;
        if mu2 < -slop * denom || mu2 > denom * (1.0 + slop) {
            return None;
        }
        Some((a / denom, m::Unit::new_normalize(n)))
    }

    /// Slab test against an AABB.
    /// Returns the fraction along the segment where it enters the box,
    /// or 0 if it starts inside.
    pub fn enters_aabb(&self, aabb: &AABB, max_lambda: f64) -> Option<f64> {
        let dir = self.p2 - self.p1;
        let mut t_min: f64 = 0.0;
        let mut t_max = max_lambda;
        for ax in 0..2 {
            let start = m::axis(self.p1, ax);
            let d = m::axis(dir, ax);
            let lo = m::axis(aabb.min, ax);
            let hi = m::axis(aabb.max, ax);
            if d.abs() < f64::EPSILON {
                if start < lo || start > hi {
                    return None;
                }
            } else {
                let inv_d = 1.0 / d;
                let mut t1 = (lo - start) * inv_d;
                let mut t2 = (hi - start) * inv_d;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                t_min = t_min.max(t1);
                t_max = t_max.min(t2);
                if t_min > t_max {
                    return None;
                }
            }
        }
        Some(t_min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aabb(min: [f64; 2], max: [f64; 2]) -> AABB {
        AABB::new(Vec2::new(min[0], min[1]), Vec2::new(max[0], max[1]))
    }

    #[test]
    fn validity() {
        assert!(aabb([0.0, 0.0], [1.0, 1.0]).is_valid());
        assert!(aabb([0.0, 0.0], [0.0, 0.0]).is_valid());
        assert!(!aabb([1.0, 0.0], [0.0, 1.0]).is_valid());
        assert!(!aabb([0.0, f64::NAN], [1.0, 1.0]).is_valid());
        assert!(!aabb([0.0, 0.0], [f64::INFINITY, 1.0]).is_valid());
    }

    #[test]
    fn overlap_and_containment() {
        let a = aabb([0.0, 0.0], [1.0, 1.0]);
        let b = aabb([0.5, 0.5], [1.5, 1.5]);
        let c = aabb([1.0, 0.0], [2.0, 1.0]);
        let d = aabb([1.1, 0.0], [2.0, 1.0]);
        assert!(test_overlap(&a, &b));
        assert!(test_overlap(&a, &c), "touching boxes overlap");
        assert!(!test_overlap(&a, &d));
        assert_eq!(a.intersection(&b), Some(aabb([0.5, 0.5], [1.0, 1.0])));
        assert!(a.union(&b).contains(&a));
        assert!(a.union(&b).contains(&b));
        assert!(!a.contains(&b));
        // containment must check the y axis against y
        assert!(!aabb([0.0, 0.0], [3.0, 1.0]).contains(&aabb([0.0, 0.0], [2.0, 2.0])));
    }

    #[test]
    fn segment_hits_segment_from_front_only() {
        let wall = Segment::new(Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0));
        // wall's right normal points towards +x
        let ray = Segment::new(Vec2::new(2.0, 0.0), Vec2::new(-2.0, 0.0));
        let (lambda, normal) = wall.test_segment(&ray, 1.0).expect("should hit");
        assert!((lambda - 0.5).abs() < 1e-12);
        assert!((normal.x - 1.0).abs() < 1e-12);

        let back = Segment::new(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0));
        assert!(wall.test_segment(&back, 1.0).is_none());

        let short = Segment::new(Vec2::new(2.0, 0.0), Vec2::new(1.0, 0.0));
        assert!(wall.test_segment(&short, 1.0).is_none());
    }

    #[test]
    fn segment_slab_test() {
        let b = aabb([1.0, -1.0], [2.0, 1.0]);
        let seg = Segment::new(Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0));
        assert_eq!(seg.enters_aabb(&b, 1.0), Some(0.25));
        let miss = Segment::new(Vec2::new(0.0, 2.0), Vec2::new(4.0, 2.0));
        assert_eq!(miss.enters_aabb(&b, 1.0), None);
        let inside = Segment::new(Vec2::new(1.5, 0.0), Vec2::new(4.0, 0.0));
        assert_eq!(inside.enters_aabb(&b, 1.0), Some(0.0));
        let too_short = Segment::new(Vec2::new(0.0, 0.0), Vec2::new(0.5, 0.0));
        assert_eq!(too_short.enters_aabb(&b, 1.0), None);
    }
}
