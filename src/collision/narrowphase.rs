//! Contact generation between pairs of convex shapes.
//!
//! Every routine produces a [`Manifold`] in the local spaces of the two shapes.
//! Polygon contacts are found by picking a reference face with the separating axis test
//! and clipping the most anti-parallel edge of the other polygon against its side planes.

use super::{
    clip::{clip_segment_to_line, ClipResult, ClipVertex},
    manifold::{ContactId, Manifold, ManifoldKind},
    shape::{Circle, Polygon, Shape, ShapeGeometry},
    CollisionConfig,
};
use crate::math::{self as m, Pose, Vec2};

use itertools::Itertools;

/// Separation on the second polygon's axes must beat the first by this factor
/// before the reference face is switched, so that it doesn't flicker between steps.
const RELATIVE_TOLERANCE: f64 = 0.98;
const ABSOLUTE_TOLERANCE: f64 = 0.001;

/// Compute the contact manifold of two shapes. Empty if they don't touch.
///
/// A manifold with kind `FaceA` has its reference face on `shape_a`,
/// `FaceB` on `shape_b`. Edges act as two-sided polygons;
/// two edges never collide with each other.
pub fn collide(
    shape_a: &Shape,
    pose_a: &Pose,
    shape_b: &Shape,
    pose_b: &Pose,
    config: &CollisionConfig,
) -> Manifold {
    match (shape_a, shape_b) {
        (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, pose_a, b, pose_b),
        (Shape::Polygon(a), Shape::Circle(b)) => {
            collide_polygon_and_circle(a, pose_a, b, pose_b, config)
        }
        (Shape::Circle(a), Shape::Polygon(b)) => {
            swap_roles(collide_polygon_and_circle(b, pose_b, a, pose_a, config))
        }
        (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(a, pose_a, b, pose_b),
        (Shape::Edge(a), Shape::Circle(b)) => {
            collide_polygon_and_circle(&a.as_polygon(), pose_a, b, pose_b, config)
        }
        (Shape::Circle(a), Shape::Edge(b)) => swap_roles(collide_polygon_and_circle(
            &b.as_polygon(),
            pose_b,
            a,
            pose_a,
            config,
        )),
        (Shape::Edge(a), Shape::Polygon(b)) => collide_polygons(&a.as_polygon(), pose_a, b, pose_b),
        (Shape::Polygon(a), Shape::Edge(b)) => collide_polygons(a, pose_a, &b.as_polygon(), pose_b),
        (Shape::Edge(_), Shape::Edge(_)) => Manifold::empty(),
    }
}

/// Turn a manifold computed with the shapes in swapped order
/// into one for the original order.
fn swap_roles(mut manifold: Manifold) -> Manifold {
    manifold.kind = match manifold.kind {
        ManifoldKind::FaceA => ManifoldKind::FaceB,
        ManifoldKind::FaceB => ManifoldKind::FaceA,
        ManifoldKind::Circles => ManifoldKind::Circles,
    };
    manifold
}

//
// CIRCLE <-> CIRCLE
//

pub fn collide_circles(
    circle_a: &Circle,
    pose_a: &Pose,
    circle_b: &Circle,
    pose_b: &Pose,
) -> Manifold {
    let p_a = *pose_a * circle_a.center;
    let p_b = *pose_b * circle_b.center;

    let dist_sq = (p_b - p_a).mag_sq();
    let radius = circle_a.radius + circle_b.radius;
    if dist_sq > radius * radius {
        return Manifold::empty();
    }

    let mut manifold = Manifold {
        kind: ManifoldKind::Circles,
        local_point: circle_a.center,
        local_normal: Vec2::zero(),
        point_count: 1,
        ..Default::default()
    };
    manifold.points[0].local_point = circle_b.center;
    manifold.points[0].id = ContactId::default();
    manifold
}

//
// POLYGON <-> CIRCLE
//

pub fn collide_polygon_and_circle(
    polygon: &Polygon,
    pose_a: &Pose,
    circle: &Circle,
    pose_b: &Pose,
    config: &CollisionConfig,
) -> Manifold {
    // circle center in the polygon's frame
    let c = m::to_local(pose_a, *pose_b * circle.center);
    let radius = polygon.radius() + circle.radius;
    let vertices = polygon.vertices();
    let normals = polygon.normals();

    // edge with the largest separation
    let mut normal_index = 0;
    let mut separation = f64::MIN;
    for (i, (v, n)) in vertices.iter().zip(normals).enumerate() {
        let s = n.dot(c - *v);
        if s > radius {
            return Manifold::empty();
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    let v1 = vertices[normal_index];
    let v2 = vertices[(normal_index + 1) % vertices.len()];

    let mut manifold = Manifold {
        kind: ManifoldKind::FaceA,
        point_count: 1,
        ..Default::default()
    };
    manifold.points[0].local_point = circle.center;
    manifold.points[0].id = ContactId::default();

    // center inside the polygon
    if separation < config.epsilon {
        manifold.local_normal = normals[normal_index];
        manifold.local_point = 0.5 * (v1 + v2);
        return manifold;
    }

    // which voronoi region of the edge the center is in
    let u1 = (c - v1).dot(v2 - v1);
    let u2 = (c - v2).dot(v1 - v2);
    if u1 <= 0.0 {
        if (c - v1).mag_sq() > radius * radius {
            return Manifold::empty();
        }
        manifold.local_normal = (c - v1).normalized();
        manifold.local_point = v1;
    } else if u2 <= 0.0 {
        if (c - v2).mag_sq() > radius * radius {
            return Manifold::empty();
        }
        manifold.local_normal = (c - v2).normalized();
        manifold.local_point = v2;
    } else {
        let face_center = 0.5 * (v1 + v2);
        if (c - face_center).dot(normals[normal_index]) > radius {
            return Manifold::empty();
        }
        manifold.local_normal = normals[normal_index];
        manifold.local_point = face_center;
    }
    manifold
}

//
// POLYGON <-> POLYGON
//

/// Find the edge of `poly1` with the largest separation from `poly2`.
fn find_max_separation(
    poly1: &Polygon,
    pose1: &Pose,
    poly2: &Polygon,
    pose2: &Pose,
) -> (usize, f64) {
    // work in poly2's frame
    let rel = m::relative_pose(pose2, pose1);
    let mut best_index = 0;
    let mut max_separation = f64::MIN;
    for (i, (v, n)) in poly1.vertices().iter().zip(poly1.normals()).enumerate() {
        let n = rel.rotation * *n;
        let v1 = rel * *v;
        let separation = poly2
            .vertices()
            .iter()
            .map(|v2| n.dot(*v2 - v1))
            .fold(f64::INFINITY, f64::min);
        if separation > max_separation {
            max_separation = separation;
            best_index = i;
        }
    }
    (best_index, max_separation)
}

/// The edge of `poly2` most anti-parallel to the reference edge of `poly1`, in world space.
fn find_incident_edge(
    poly1: &Polygon,
    pose1: &Pose,
    edge1: usize,
    poly2: &Polygon,
    pose2: &Pose,
) -> [ClipVertex; 2] {
    let normal1 = pose2.rotation.reversed() * (pose1.rotation * poly1.normals()[edge1]);

    let i1 = poly2
        .normals()
        .iter()
        .position_min_by(|n, other| normal1.dot(**n).total_cmp(&normal1.dot(**other)))
        .unwrap_or(0);
    let i2 = (i1 + 1) % poly2.vertex_count();
    let vertex = |i: usize, incident_vertex: u8| ClipVertex {
        v: *pose2 * poly2.vertices()[i],
        id: ContactId {
            reference_edge: edge1 as u8,
            incident_edge: i as u8,
            incident_vertex,
            flip: 0,
        },
    };
    [vertex(i1, 0), vertex(i2, 1)]
}

pub fn collide_polygons(
    poly_a: &Polygon,
    pose_a: &Pose,
    poly_b: &Polygon,
    pose_b: &Pose,
) -> Manifold {
    let total_radius = poly_a.radius() + poly_b.radius();

    let (edge_a, separation_a) = find_max_separation(poly_a, pose_a, poly_b, pose_b);
    if separation_a > total_radius {
        return Manifold::empty();
    }
    let (edge_b, separation_b) = find_max_separation(poly_b, pose_b, poly_a, pose_a);
    if separation_b > total_radius {
        return Manifold::empty();
    }

    // reference polygon 1, incident polygon 2
    let (poly1, pose1, poly2, pose2, edge1, kind, flip) =
        if separation_b > RELATIVE_TOLERANCE * separation_a + ABSOLUTE_TOLERANCE {
            (poly_b, pose_b, poly_a, pose_a, edge_b, ManifoldKind::FaceB, 1)
        } else {
            (poly_a, pose_a, poly_b, pose_b, edge_a, ManifoldKind::FaceA, 0)
        };

    let incident_edge = find_incident_edge(poly1, pose1, edge1, poly2, pose2);

    let v11 = poly1.vertices()[edge1];
    let v12 = poly1.vertices()[(edge1 + 1) % poly1.vertex_count()];
    let local_tangent = (v12 - v11).normalized();
    let local_normal = m::right_normal(local_tangent);
    let plane_point = 0.5 * (v11 + v12);

    let tangent = pose1.rotation * local_tangent;
    let normal = m::right_normal(tangent);
    let v11 = *pose1 * v11;
    let v12 = *pose1 * v12;

    let front_offset = normal.dot(v11);
    // side planes extended by the skin radius
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    let ClipResult::Two(clip1) = clip_segment_to_line(incident_edge, -tangent, side_offset1) else {
        return Manifold::empty();
    };
    let ClipResult::Two(clip2) = clip_segment_to_line(clip1, tangent, side_offset2) else {
        return Manifold::empty();
    };

    let mut manifold = Manifold {
        kind,
        local_normal,
        local_point: plane_point,
        ..Default::default()
    };
    for clip_vertex in &clip2 {
        let separation = normal.dot(clip_vertex.v) - front_offset;
        if separation <= total_radius {
            let point = &mut manifold.points[manifold.point_count];
            point.local_point = m::to_local(pose2, clip_vertex.v);
            point.id = ContactId {
                flip,
                ..clip_vertex.id
            };
            manifold.point_count += 1;
        }
    }
    manifold
}
