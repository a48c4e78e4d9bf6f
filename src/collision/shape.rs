//! Convex collision shapes.

use super::{CollisionConfig, CollisionError, Segment, AABB};
use crate::math::{self as m, Angle, Pose, Rotor2, Unit, Vec2};

use itertools::Itertools;

/// Mass properties of a shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MassData {
    pub mass: f64,
    /// Center of mass in shape-local coordinates.
    pub center: Vec2,
    /// Rotational inertia about the shape's local origin.
    pub inertia: f64,
}

/// Result of casting a segment against a shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SegmentCollide {
    /// The segment starts inside the shape, so there is no meaningful hit point.
    StartsInside,
    Miss,
    /// `lambda` is the fraction along the segment, `normal` the shape's surface normal there.
    Hit { lambda: f64, normal: Unit<Vec2> },
}

/// Geometric queries every shape supports.
///
/// Positions and directions passed in are in world space unless noted otherwise.
pub trait ShapeGeometry {
    /// Tight world-space bounding box, including the skin radius.
    fn compute_aabb(&self, pose: &Pose) -> AABB;

    /// Is the point inside the shape. Shapes without area never contain points.
    fn test_point(&self, pose: &Pose, point: Vec2) -> bool;

    /// Cast a segment, scaled by `max_lambda`, against the shape.
    fn test_segment(&self, pose: &Pose, segment: &Segment, max_lambda: f64) -> SegmentCollide;

    fn compute_mass(&self, density: f64) -> MassData;

    /// Index of the vertex furthest in the local direction `d`.
    fn support(&self, d: Vec2) -> usize;

    /// The vertex furthest in the local direction `d`.
    fn support_vertex(&self, d: Vec2) -> Vec2;

    /// Largest distance from a local pivot point to the shape's core,
    /// for bounding the motion of the shape when rotating around the pivot.
    fn sweep_radius(&self, pivot: Vec2) -> f64;

    /// Area and world-space centroid of the part of the shape
    /// below the plane `normal . p = offset`, for buoyancy.
    /// The skin radius of polygons and edges is ignored.
    fn compute_submerged_area(&self, pose: &Pose, normal: Unit<Vec2>, offset: f64) -> (f64, Vec2);

    /// Skin radius around the shape's core.
    fn radius(&self) -> f64;
}

//
// CIRCLE
//

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle {
    /// Position of the center in shape-local coordinates.
    pub center: Vec2,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: Vec2, radius: f64) -> Result<Self, CollisionError> {
        if !(radius.is_finite() && radius > 0.0) || !m::is_finite(center) {
            return Err(CollisionError::InvalidGeometry(
                "circle radius must be positive and finite",
            ));
        }
        Ok(Circle { center, radius })
    }
}

impl ShapeGeometry for Circle {
    fn compute_aabb(&self, pose: &Pose) -> AABB {
        let p = *pose * self.center;
        AABB::new(p, p).padded(self.radius)
    }

    fn test_point(&self, pose: &Pose, point: Vec2) -> bool {
        let d = point - *pose * self.center;
        d.mag_sq() <= self.radius * self.radius
    }

    fn test_segment(&self, pose: &Pose, segment: &Segment, max_lambda: f64) -> SegmentCollide {
        // solve |s + a * d|^2 = r^2 for the smaller root a
        let s = segment.p1 - *pose * self.center;
        let b = s.mag_sq() - self.radius * self.radius;
        if b < 0.0 {
            return SegmentCollide::StartsInside;
        }

        let d = segment.p2 - segment.p1;
        let c = s.dot(d);
        let rr = d.mag_sq();
        let sigma = c * c - rr * b;
        if sigma < 0.0 || rr < f64::EPSILON {
            return SegmentCollide::Miss;
        }

        let a = -(c + sigma.sqrt());
        if 0.0 <= a && a <= max_lambda * rr {
            let lambda = a / rr;
            return SegmentCollide::Hit {
                lambda,
                normal: Unit::new_normalize(s + lambda * d),
            };
        }
        SegmentCollide::Miss
    }

    fn compute_mass(&self, density: f64) -> MassData {
        let mass = density * std::f64::consts::PI * self.radius * self.radius;
        MassData {
            mass,
            center: self.center,
            inertia: mass * (0.5 * self.radius * self.radius + self.center.mag_sq()),
        }
    }

    fn support(&self, _d: Vec2) -> usize {
        0
    }

    fn support_vertex(&self, _d: Vec2) -> Vec2 {
        self.center
    }

    fn sweep_radius(&self, pivot: Vec2) -> f64 {
        (self.center - pivot).mag()
    }

    fn compute_submerged_area(&self, pose: &Pose, normal: Unit<Vec2>, offset: f64) -> (f64, Vec2) {
        let p = *pose * self.center;
        // depth of the center below the surface
        let l = offset - normal.dot(p);
        let r = self.radius;
        if l <= -r {
            return (0.0, Vec2::zero());
        }
        if l >= r {
            return (std::f64::consts::PI * r * r, p);
        }

        // circular segment
        let rr = r * r;
        let ll = l * l;
        let area = rr * ((l / r).asin() + std::f64::consts::FRAC_PI_2) + l * (rr - ll).sqrt();
        let com = -2.0 / 3.0 * (rr - ll).powf(1.5) / area;
        (area, p + com * *normal)
    }

    fn radius(&self) -> f64 {
        self.radius
    }
}

//
// POLYGON
//

/// A convex polygon with vertices in counter-clockwise order.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    vertices: Vec<Vec2>,
    /// Outward unit normal of the edge from vertex `i` to vertex `i + 1`.
    normals: Vec<Vec2>,
    centroid: Vec2,
    radius: f64,
}

impl Polygon {
    /// Create a polygon from points given counter-clockwise.
    pub fn new(points: &[Vec2], config: &CollisionConfig) -> Result<Self, CollisionError> {
        if points.len() < 3 {
            return Err(CollisionError::InvalidGeometry(
                "polygon needs at least three vertices",
            ));
        }
        if points.len() > config.max_polygon_vertices {
            return Err(CollisionError::InvalidGeometry("polygon has too many vertices"));
        }
        if !points.iter().all(|p| m::is_finite(*p)) {
            return Err(CollisionError::InvalidGeometry("polygon vertex is not finite"));
        }

        let count = points.len();
        let mut normals = Vec::with_capacity(count);
        for (start, end) in points.iter().circular_tuple_windows() {
            let edge = *end - *start;
            if edge.mag_sq() <= f64::EPSILON * f64::EPSILON {
                return Err(CollisionError::InvalidGeometry(
                    "polygon has coincident vertices",
                ));
            }
            normals.push(m::right_normal(edge).normalized());
        }

        // every other vertex must be strictly to the left of each edge
        for i in 0..count {
            let start = points[i];
            let edge = points[(i + 1) % count] - start;
            let convex = (0..count)
                .filter(|&j| j != i && j != (i + 1) % count)
                .all(|j| m::cross(edge, points[j] - start) > 0.0);
            if !convex {
                return Err(CollisionError::InvalidGeometry(
                    "polygon is not convex and counter-clockwise",
                ));
            }
        }

        let centroid = compute_centroid(points)?;
        Ok(Polygon {
            vertices: points.to_vec(),
            normals,
            centroid,
            radius: config.polygon_radius,
        })
    }

    /// An axis-aligned box centered on the local origin, from half-widths.
    pub fn new_box(hw: f64, hh: f64, config: &CollisionConfig) -> Result<Self, CollisionError> {
        Self::new_oriented_box(hw, hh, Vec2::zero(), Angle::Rad(0.0), config)
    }

    /// A box from half-widths, centered at `center` and rotated by `angle`
    /// in shape-local coordinates.
    pub fn new_oriented_box(
        hw: f64,
        hh: f64,
        center: Vec2,
        angle: Angle,
        config: &CollisionConfig,
    ) -> Result<Self, CollisionError> {
        if !(hw > 0.0 && hh > 0.0) {
            return Err(CollisionError::InvalidGeometry(
                "box half-widths must be positive",
            ));
        }
        let rot = Rotor2::from(angle);
        let corners = [
            Vec2::new(-hw, -hh),
            Vec2::new(hw, -hh),
            Vec2::new(hw, hh),
            Vec2::new(-hw, hh),
        ];
        Self::new(&corners.map(|c| center + rot * c), config)
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    #[inline]
    pub fn normals(&self) -> &[Vec2] {
        &self.normals
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }

    /// Polygon with the same outline but zero skin radius,
    /// e.g. for a polygon standing in for an edge.
    pub(crate) fn from_parts(vertices: Vec<Vec2>, normals: Vec<Vec2>, radius: f64) -> Self {
        let centroid = vertices.iter().fold(Vec2::zero(), |acc, v| acc + *v)
            / vertices.len().max(1) as f64;
        Polygon {
            vertices,
            normals,
            centroid,
            radius,
        }
    }
}

/// Area-weighted centroid of a convex polygon, by triangle fan from the first vertex.
fn compute_centroid(points: &[Vec2]) -> Result<Vec2, CollisionError> {
    let origin = points[0];
    let mut center = Vec2::zero();
    let mut area = 0.0;
    for i in 1..points.len() - 1 {
        let e1 = points[i] - origin;
        let e2 = points[i + 1] - origin;
        let tri_area = 0.5 * m::cross(e1, e2);
        area += tri_area;
        center += tri_area * (e1 + e2) / 3.0;
    }
    if area <= f64::EPSILON {
        return Err(CollisionError::InvalidGeometry("polygon has no area"));
    }
    Ok(origin + center / area)
}

impl ShapeGeometry for Polygon {
    fn compute_aabb(&self, pose: &Pose) -> AABB {
        let first = *pose * self.vertices[0];
        let mut aabb = AABB::new(first, first);
        for v in &self.vertices[1..] {
            let p = *pose * *v;
            aabb.min = aabb.min.min_by_component(p);
            aabb.max = aabb.max.max_by_component(p);
        }
        aabb.padded(self.radius)
    }

    fn test_point(&self, pose: &Pose, point: Vec2) -> bool {
        let local = m::to_local(pose, point);
        self.vertices
            .iter()
            .zip(&self.normals)
            .all(|(v, n)| n.dot(local - *v) <= 0.0)
    }

    fn test_segment(&self, pose: &Pose, segment: &Segment, max_lambda: f64) -> SegmentCollide {
        let p1 = m::to_local(pose, segment.p1);
        let d = pose.rotation.reversed() * (segment.p2 - segment.p1);

        // clip the segment against the half-planes of every edge
        let mut lower = 0.0;
        let mut upper = max_lambda;
        let mut hit_edge = None;
        for (i, (v, n)) in self.vertices.iter().zip(&self.normals).enumerate() {
            let numerator = n.dot(*v - p1);
            let denominator = n.dot(d);

            if denominator == 0.0 {
                if numerator < 0.0 {
                    return SegmentCollide::Miss;
                }
            } else if denominator < 0.0 && numerator < lower * denominator {
                // entering this half-plane
                lower = numerator / denominator;
                hit_edge = Some(i);
            } else if denominator > 0.0 && numerator < upper * denominator {
                // leaving this half-plane
                upper = numerator / denominator;
            }

            if upper < lower {
                return SegmentCollide::Miss;
            }
        }

        match hit_edge {
            Some(i) => SegmentCollide::Hit {
                lambda: lower,
                normal: Unit::new_unchecked(pose.rotation * self.normals[i]),
            },
            None => SegmentCollide::StartsInside,
        }
    }

    fn compute_mass(&self, density: f64) -> MassData {
        // sum over a triangle fan from the local origin
        let mut area = 0.0;
        let mut center = Vec2::zero();
        let mut inertia = 0.0;
        let count = self.vertices.len();
        for i in 0..count {
            let e1 = self.vertices[i];
            let e2 = self.vertices[(i + 1) % count];
            let d = m::cross(e1, e2);
            let tri_area = 0.5 * d;
            area += tri_area;
            center += tri_area * (e1 + e2) / 3.0;

            let int_x2 = (e1.x * e1.x + e2.x * e1.x + e2.x * e2.x) / 12.0;
            let int_y2 = (e1.y * e1.y + e2.y * e1.y + e2.y * e2.y) / 12.0;
            inertia += d * (int_x2 + int_y2);
        }
        MassData {
            mass: density * area,
            center: center / area,
            inertia: density * inertia,
        }
    }

    fn support(&self, d: Vec2) -> usize {
        let mut best = 0;
        let mut best_value = self.vertices[0].dot(d);
        for (i, v) in self.vertices.iter().enumerate().skip(1) {
            let value = v.dot(d);
            if value > best_value {
                best = i;
                best_value = value;
            }
        }
        best
    }

    fn support_vertex(&self, d: Vec2) -> Vec2 {
        self.vertices[self.support(d)]
    }

    fn sweep_radius(&self, pivot: Vec2) -> f64 {
        self.vertices
            .iter()
            .map(|v| (*v - pivot).mag())
            .fold(0.0, f64::max)
    }

    fn compute_submerged_area(&self, pose: &Pose, normal: Unit<Vec2>, offset: f64) -> (f64, Vec2) {
        let local_normal = pose.rotation.reversed() * *normal;
        let local_offset = offset - normal.dot(pose.translation);
        let count = self.vertices.len();
        let depths: Vec<f64> = self
            .vertices
            .iter()
            .map(|v| v.dot(local_normal) - local_offset)
            .collect();

        // edges where the outline goes under the surface and comes back up
        let mut into_index = None;
        let mut out_index = None;
        let mut last_submerged = false;
        for (i, depth) in depths.iter().enumerate() {
            let submerged = *depth < -f64::EPSILON;
            if i > 0 && submerged != last_submerged {
                if submerged {
                    into_index = Some(i - 1);
                } else {
                    out_index = Some(i - 1);
                }
            }
            last_submerged = submerged;
        }
        let (into_index, out_index) = match (into_index, out_index) {
            (Some(into), Some(out)) => (into, out),
            // the missing crossing is on the edge from the last vertex to the first
            (None, Some(out)) => (count - 1, out),
            (Some(into), None) => (into, count - 1),
            (None, None) if last_submerged => {
                let mass = self.compute_mass(1.0);
                return (mass.mass, *pose * mass.center);
            }
            (None, None) => return (0.0, Vec2::zero()),
        };

        let into_next = (into_index + 1) % count;
        let out_next = (out_index + 1) % count;
        let crossing = |a: usize, b: usize| {
            let lambda = depths[a] / (depths[a] - depths[b]);
            self.vertices[a] + lambda * (self.vertices[b] - self.vertices[a])
        };
        let into_point = crossing(into_index, into_next);
        let out_point = crossing(out_index, out_next);

        // triangle fan from the entry point over the submerged outline
        let mut area = 0.0;
        let mut center = Vec2::zero();
        let mut p2 = self.vertices[into_next];
        let mut i = into_next;
        while i != out_next {
            i = (i + 1) % count;
            let p3 = if i == out_next {
                out_point
            } else {
                self.vertices[i]
            };
            let tri_area = 0.5 * m::cross(p2 - into_point, p3 - into_point);
            area += tri_area;
            center += tri_area * (into_point + p2 + p3) / 3.0;
            p2 = p3;
        }
        if area <= 0.0 {
            return (0.0, Vec2::zero());
        }
        (area, *pose * (center / area))
    }

    fn radius(&self) -> f64 {
        self.radius
    }
}

//
// EDGE
//

/// A line segment with a skin radius. Has no area, so it can't contain points or have mass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub v1: Vec2,
    pub v2: Vec2,
    radius: f64,
}

impl Edge {
    pub fn new(v1: Vec2, v2: Vec2, config: &CollisionConfig) -> Result<Self, CollisionError> {
        if !(m::is_finite(v1) && m::is_finite(v2)) {
            return Err(CollisionError::InvalidGeometry("edge vertex is not finite"));
        }
        if (v2 - v1).mag_sq() <= f64::EPSILON * f64::EPSILON {
            return Err(CollisionError::InvalidGeometry("edge has zero length"));
        }
        Ok(Edge {
            v1,
            v2,
            radius: config.polygon_radius,
        })
    }

    /// Unit normal on the right side of the edge going from `v1` to `v2`.
    pub fn normal(&self) -> Vec2 {
        m::right_normal(self.v2 - self.v1).normalized()
    }

    /// The edge as a two-sided polygon with two vertices,
    /// so that polygon routines can collide against it.
    pub(crate) fn as_polygon(&self) -> Polygon {
        let n = self.normal();
        Polygon::from_parts(vec![self.v1, self.v2], vec![n, -n], self.radius)
    }
}

impl ShapeGeometry for Edge {
    fn compute_aabb(&self, pose: &Pose) -> AABB {
        Segment::new(*pose * self.v1, *pose * self.v2)
            .aabb()
            .padded(self.radius)
    }

    fn test_point(&self, _pose: &Pose, _point: Vec2) -> bool {
        false
    }

    fn test_segment(&self, pose: &Pose, segment: &Segment, max_lambda: f64) -> SegmentCollide {
        let world_edge = Segment::new(*pose * self.v1, *pose * self.v2);
        match world_edge.test_segment(segment, max_lambda) {
            Some((lambda, normal)) => SegmentCollide::Hit { lambda, normal },
            None => SegmentCollide::Miss,
        }
    }

    fn compute_mass(&self, _density: f64) -> MassData {
        MassData {
            mass: 0.0,
            center: 0.5 * (self.v1 + self.v2),
            inertia: 0.0,
        }
    }

    fn support(&self, d: Vec2) -> usize {
        if self.v1.dot(d) >= self.v2.dot(d) {
            0
        } else {
            1
        }
    }

    fn support_vertex(&self, d: Vec2) -> Vec2 {
        if self.support(d) == 0 {
            self.v1
        } else {
            self.v2
        }
    }

    fn sweep_radius(&self, pivot: Vec2) -> f64 {
        (self.v1 - pivot).mag().max((self.v2 - pivot).mag())
    }

    fn compute_submerged_area(
        &self,
        pose: &Pose,
        _normal: Unit<Vec2>,
        _offset: f64,
    ) -> (f64, Vec2) {
        (0.0, *pose * (0.5 * (self.v1 + self.v2)))
    }

    fn radius(&self) -> f64 {
        self.radius
    }
}

//
// DISPATCH
//

/// Any shape a collider can have.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Circle(Circle),
    Polygon(Polygon),
    Edge(Edge),
}

impl From<Circle> for Shape {
    fn from(c: Circle) -> Self {
        Shape::Circle(c)
    }
}

impl From<Polygon> for Shape {
    fn from(p: Polygon) -> Self {
        Shape::Polygon(p)
    }
}

impl From<Edge> for Shape {
    fn from(e: Edge) -> Self {
        Shape::Edge(e)
    }
}

impl Shape {
    fn geometry(&self) -> &dyn ShapeGeometry {
        match self {
            Shape::Circle(c) => c,
            Shape::Polygon(p) => p,
            Shape::Edge(e) => e,
        }
    }
}

impl ShapeGeometry for Shape {
    fn compute_aabb(&self, pose: &Pose) -> AABB {
        self.geometry().compute_aabb(pose)
    }

    fn test_point(&self, pose: &Pose, point: Vec2) -> bool {
        self.geometry().test_point(pose, point)
    }

    fn test_segment(&self, pose: &Pose, segment: &Segment, max_lambda: f64) -> SegmentCollide {
        self.geometry().test_segment(pose, segment, max_lambda)
    }

    fn compute_mass(&self, density: f64) -> MassData {
        self.geometry().compute_mass(density)
    }

    fn support(&self, d: Vec2) -> usize {
        self.geometry().support(d)
    }

    fn support_vertex(&self, d: Vec2) -> Vec2 {
        self.geometry().support_vertex(d)
    }

    fn sweep_radius(&self, pivot: Vec2) -> f64 {
        self.geometry().sweep_radius(pivot)
    }

    fn compute_submerged_area(&self, pose: &Pose, normal: Unit<Vec2>, offset: f64) -> (f64, Vec2) {
        self.geometry().compute_submerged_area(pose, normal, offset)
    }

    fn radius(&self) -> f64 {
        self.geometry().radius()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::PoseBuilder;

    fn config() -> CollisionConfig {
        CollisionConfig::default()
    }

    fn v(x: f64, y: f64) -> Vec2 {
        Vec2::new(x, y)
    }

    #[test]
    fn polygon_validation() {
        let square = [v(0.0, 0.0), v(1.0, 0.0), v(1.0, 1.0), v(0.0, 1.0)];
        assert!(Polygon::new(&square, &config()).is_ok());

        let mut clockwise = square;
        clockwise.reverse();
        assert!(matches!(
            Polygon::new(&clockwise, &config()),
            Err(CollisionError::InvalidGeometry(_))
        ));

        let concave = [v(0.0, 0.0), v(2.0, 0.0), v(1.0, 0.5), v(2.0, 2.0), v(0.0, 2.0)];
        assert!(Polygon::new(&concave, &config()).is_err());

        let duplicate = [v(0.0, 0.0), v(1.0, 0.0), v(1.0, 0.0), v(0.0, 1.0)];
        assert!(Polygon::new(&duplicate, &config()).is_err());

        assert!(Polygon::new(&square[..2], &config()).is_err());

        let ngon: Vec<Vec2> = (0..9)
            .map(|i| {
                let a = i as f64 * std::f64::consts::TAU / 9.0;
                v(a.cos(), a.sin())
            })
            .collect();
        assert!(Polygon::new(&ngon, &config()).is_err());
        assert!(Polygon::new(&ngon[..8], &config()).is_ok());
    }

    #[test]
    fn box_properties() {
        let b = Polygon::new_box(1.0, 0.5, &config()).unwrap();
        assert_eq!(b.vertex_count(), 4);
        assert!(b.centroid().mag() < 1e-12);
        itertools::assert_equal(
            b.normals().iter().copied(),
            [v(0.0, -1.0), v(1.0, 0.0), v(0.0, 1.0), v(-1.0, 0.0)],
        );

        let mass = b.compute_mass(2.0);
        assert!((mass.mass - 4.0).abs() < 1e-12);
        // m (w^2 + h^2) / 12 for a 2 x 1 box
        assert!((mass.inertia - 4.0 * (4.0 + 1.0) / 12.0).abs() < 1e-12);

        let oriented =
            Polygon::new_oriented_box(1.0, 1.0, v(3.0, 2.0), Angle::Deg(30.0), &config()).unwrap();
        assert!((oriented.centroid() - v(3.0, 2.0)).mag() < 1e-12);
        assert!((oriented.compute_mass(1.0).center - v(3.0, 2.0)).mag() < 1e-12);

        assert!(Polygon::new_box(0.0, 1.0, &config()).is_err());
    }

    #[test]
    fn aabbs_include_radius() {
        let pose = PoseBuilder::new()
            .with_position([10.0, 0.0])
            .with_rotation(Angle::Deg(45.0))
            .build();
        let b = Polygon::new_box(1.0, 1.0, &config()).unwrap();
        let aabb = b.compute_aabb(&pose);
        let half = 2.0_f64.sqrt() + config().polygon_radius;
        assert!((aabb.min - v(10.0 - half, -half)).mag() < 1e-9);
        assert!((aabb.max - v(10.0 + half, half)).mag() < 1e-9);

        let c = Circle::new(v(1.0, 0.0), 0.5).unwrap();
        let aabb = c.compute_aabb(&pose);
        let center = v(10.0, 0.0) + v(1.0, 1.0) * (0.5 * 2.0_f64.sqrt());
        assert!((aabb.center() - center).mag() < 1e-9);
        assert!((aabb.width() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn point_tests() {
        let pose = PoseBuilder::new()
            .with_position([5.0, 5.0])
            .with_rotation(Angle::Deg(90.0))
            .build();
        let b: Shape = Polygon::new_box(2.0, 0.5, &config()).unwrap().into();
        // rotated 90 degrees, so tall and thin
        assert!(b.test_point(&pose, v(5.0, 6.5)));
        assert!(!b.test_point(&pose, v(6.5, 5.0)));

        let c: Shape = Circle::new(Vec2::zero(), 1.0).unwrap().into();
        assert!(c.test_point(&pose, v(5.5, 5.5)));
        assert!(!c.test_point(&pose, v(6.0, 6.0)));

        let e: Shape = Edge::new(v(-1.0, 0.0), v(1.0, 0.0), &config())
            .unwrap()
            .into();
        assert!(!e.test_point(&pose, v(5.0, 5.0)));
    }

    #[test]
    fn segment_casts() {
        let pose = Pose::identity();
        let ray = Segment::new(v(-5.0, 0.0), v(5.0, 0.0));

        let b = Polygon::new_box(1.0, 1.0, &config()).unwrap();
        match b.test_segment(&pose, &ray, 1.0) {
            SegmentCollide::Hit { lambda, normal } => {
                assert!((lambda - 0.4).abs() < 1e-12);
                assert_eq!(*normal, v(-1.0, 0.0));
            }
            other => panic!("expected a hit, got {:?}", other),
        }
        assert_eq!(b.test_segment(&pose, &ray, 0.3), SegmentCollide::Miss);
        let inside = Segment::new(v(0.0, 0.0), v(5.0, 0.0));
        assert_eq!(
            b.test_segment(&pose, &inside, 1.0),
            SegmentCollide::StartsInside
        );

        let c = Circle::new(v(0.0, 0.0), 1.0).unwrap();
        match c.test_segment(&pose, &ray, 1.0) {
            SegmentCollide::Hit { lambda, normal } => {
                assert!((lambda - 0.4).abs() < 1e-12);
                assert!((*normal - v(-1.0, 0.0)).mag() < 1e-12);
            }
            other => panic!("expected a hit, got {:?}", other),
        }
        let above = Segment::new(v(-5.0, 2.0), v(5.0, 2.0));
        assert_eq!(c.test_segment(&pose, &above, 1.0), SegmentCollide::Miss);
        assert_eq!(
            c.test_segment(&pose, &inside, 1.0),
            SegmentCollide::StartsInside
        );

        // only the right side of an edge faces segments
        let e = Edge::new(v(0.0, 1.0), v(0.0, -1.0), &config()).unwrap();
        match e.test_segment(&pose, &ray, 1.0) {
            SegmentCollide::Hit { lambda, normal } => {
                assert!((lambda - 0.5).abs() < 1e-12);
                assert!((*normal - v(-1.0, 0.0)).mag() < 1e-12);
            }
            other => panic!("expected a hit, got {:?}", other),
        }
        let backwards = Segment::new(v(5.0, 0.0), v(-5.0, 0.0));
        assert_eq!(e.test_segment(&pose, &backwards, 1.0), SegmentCollide::Miss);
    }

    #[test]
    fn support_and_sweep() {
        let b = Polygon::new_box(1.0, 2.0, &config()).unwrap();
        assert_eq!(b.support_vertex(v(1.0, 1.0)), v(1.0, 2.0));
        assert_eq!(b.support_vertex(v(-1.0, -0.1)), v(-1.0, -2.0));
        assert!((b.sweep_radius(Vec2::zero()) - 5.0_f64.sqrt()).abs() < 1e-12);

        let e = Edge::new(v(0.0, 0.0), v(3.0, 0.0), &config()).unwrap();
        assert_eq!(e.support(v(1.0, 0.0)), 1);
        assert_eq!(e.sweep_radius(v(1.0, 0.0)), 2.0);
        assert_eq!(e.compute_mass(1.0).mass, 0.0);

        let c = Circle::new(v(0.0, 3.0), 1.0).unwrap();
        assert_eq!(c.sweep_radius(v(0.0, -1.0)), 4.0);
        let mass = c.compute_mass(1.0);
        assert!((mass.mass - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn submerged_areas() {
        use std::f64::consts::PI;
        let up = Unit::new_unchecked(v(0.0, 1.0));
        let origin = Pose::identity();

        // box spanning y in [-1, 1], surface at y = 0
        let b = Polygon::new_box(1.0, 1.0, &config()).unwrap();
        let (area, center) = b.compute_submerged_area(&origin, up, 0.0);
        assert!((area - 2.0).abs() < 1e-12);
        assert!((center - v(0.0, -0.5)).mag() < 1e-12);

        // moved box, a quarter of it under
        let moved = PoseBuilder::new().with_position([3.0, 0.5]).build();
        let (area, center) = b.compute_submerged_area(&moved, up, 0.0);
        assert!((area - 1.0).abs() < 1e-12);
        assert!((center - v(3.0, -0.25)).mag() < 1e-12);

        // rotated box, cut along its diagonal
        let turned = PoseBuilder::new().with_rotation(Angle::Deg(45.0)).build();
        let (area, center) = b.compute_submerged_area(&turned, up, 0.0);
        assert!((area - 2.0).abs() < 1e-9);
        assert!(center.x.abs() < 1e-9 && center.y < 0.0);

        assert_eq!(b.compute_submerged_area(&origin, up, -5.0).0, 0.0);
        let (area, center) = b.compute_submerged_area(&moved, up, 5.0);
        assert!((area - 4.0).abs() < 1e-12);
        assert!((center - v(3.0, 0.5)).mag() < 1e-12);

        let c = Circle::new(v(0.0, 0.0), 1.0).unwrap();
        let (area, center) = c.compute_submerged_area(&origin, up, 0.0);
        assert!((area - 0.5 * PI).abs() < 1e-12);
        assert!((center - v(0.0, -4.0 / (3.0 * PI))).mag() < 1e-12);
        assert_eq!(c.compute_submerged_area(&origin, up, -2.0), (0.0, Vec2::zero()));
        let (area, center) = c.compute_submerged_area(&moved, up, 10.0);
        assert!((area - PI).abs() < 1e-12);
        assert_eq!(center, v(3.0, 0.5));

        let e = Shape::from(Edge::new(v(-1.0, 0.0), v(1.0, 0.0), &config()).unwrap());
        let (area, center) = e.compute_submerged_area(&moved, up, 10.0);
        assert_eq!(area, 0.0);
        assert!((center - v(3.0, 0.5)).mag() < 1e-12);
    }
}
