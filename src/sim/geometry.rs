//! Collision predicates
//!
//! Head-versus-trail collision is deliberately approximate: the head is
//! expanded into a grid of unit offsets covering a square of side
//! `2 * radius + 1`, and each offset point is tested against the *start* point
//! of every prior segment. Thin near-misses are part of the game's feel, so
//! this must not be replaced by an exact segment intersection.

use glam::DVec2;

use super::agent::Segment;

/// True iff `(px, py)` lies within `r` of `(cx, cy)` (boundary included)
#[inline]
pub fn point_in_circle(px: f64, py: f64, cx: f64, cy: f64, r: f64) -> bool {
    let dx = px - cx;
    let dy = py - cy;
    dx * dx + dy * dy <= r * r
}

/// Vector form of [`point_in_circle`]
#[inline]
pub fn point_in_disk(p: DVec2, center: DVec2, r: f64) -> bool {
    point_in_circle(p.x, p.y, center.x, center.y, r)
}

/// Discretized head-versus-trail overlap test
///
/// Returns true if any integer offset of `head` in `[-radius, radius]²`
/// falls inside the disk of `radius` around the start point of a segment.
pub fn head_overlaps_segments<'a, I>(head: DVec2, segments: I, radius: f64) -> bool
where
    I: IntoIterator<Item = &'a Segment>,
{
    if radius < 0.0 {
        return false;
    }
    // No offset point can reach a start point farther than this
    let reach = radius * std::f64::consts::SQRT_2 + radius;

    segments.into_iter().any(|segment| {
        let start = segment.start;
        if (start - head).length_squared() > reach * reach {
            return false;
        }
        let mut dx = -radius;
        while dx <= radius {
            let mut dy = -radius;
            while dy <= radius {
                if point_in_circle(head.x + dx, head.y + dy, start.x, start.y, radius) {
                    return true;
                }
                dy += 1.0;
            }
            dx += 1.0;
        }
        false
    })
}

/// True iff `p` lies outside `[0, width) × [0, height)`
#[inline]
pub fn outside_arena(p: DVec2, width: f64, height: f64) -> bool {
    p.x < 0.0 || p.x >= width || p.y < 0.0 || p.y >= height
}
