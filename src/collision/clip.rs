//! Sutherland-Hodgman clipping of a segment against a half-plane.

use super::ContactId;
use crate::math::Vec2;

/// A point of an incident edge being clipped, with the features it came from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipVertex {
    pub v: Vec2,
    pub id: ContactId,
}

/// The part of a segment left after clipping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClipResult {
    Zero,
    One(ClipVertex),
    Two([ClipVertex; 2]),
}

impl ClipResult {
    pub fn len(&self) -> usize {
        match self {
            ClipResult::Zero => 0,
            ClipResult::One(_) => 1,
            ClipResult::Two(_) => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ClipResult::Zero)
    }

    pub fn as_slice(&self) -> &[ClipVertex] {
        match self {
            ClipResult::Zero => &[],
            ClipResult::One(v) => std::slice::from_ref(v),
            ClipResult::Two(vs) => vs,
        }
    }
}

/// Clip a segment to the half-plane `normal · p <= offset`.
///
/// Endpoints inside the half-plane are kept. If the segment crosses the line,
/// the crossing point is added and takes the id of the endpoint that was cut away.
pub fn clip_segment_to_line(v_in: [ClipVertex; 2], normal: Vec2, offset: f64) -> ClipResult {
    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    let mut out = [v_in[0]; 2];
    let mut count = 0;
    for (vertex, distance) in v_in.iter().zip([distance0, distance1]) {
        if distance <= 0.0 {
            out[count] = *vertex;
            count += 1;
        }
    }

    if distance0 * distance1 < 0.0 {
        let interp = distance0 / (distance0 - distance1);
        out[count] = ClipVertex {
            v: v_in[0].v + interp * (v_in[1].v - v_in[0].v),
            id: if distance0 > 0.0 {
                v_in[0].id
            } else {
                v_in[1].id
            },
        };
        count += 1;
    }

    match count {
        0 => ClipResult::Zero,
        1 => ClipResult::One(out[0]),
        _ => ClipResult::Two(out),
    }
}
