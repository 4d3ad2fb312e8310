//! Start-of-round placement
//!
//! Agents start on a circle around the arena centre, facing along their
//! placement angle. Points are spread by rejection sampling first; when that
//! under-fills, a jittered evenly-spaced pass takes over.

use std::f64::consts::TAU;

use glam::DVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::polar_to_cartesian;

/// Rejected samples allowed in a row before rejection sampling gives up
const RANDOM_PHASE_ATTEMPTS: u32 = 1000;
/// Candidates tried per slot in the evenly-spaced pass
const SPACED_PHASE_ATTEMPTS: u32 = 50;
/// Nominal spacing padding for the evenly-spaced pass
const SPACED_PADDING: f64 = 1.2;
/// Angular variation (± fraction of the nominal spacing)
const SPACED_VARIATION: f64 = 0.25;

/// Full layout calls per distance level in [`layout_with_retry`]
const ATTEMPTS_PER_LEVEL: u32 = 5;
/// Times the minimum distance is relaxed before falling back to even spacing
const MAX_RELAX_LEVELS: u32 = 10;
/// Minimum distance multiplier applied per relax level
const RELAX_FACTOR: f64 = 0.9;

/// One agent's start position and heading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: DVec2,
    pub heading: f64,
}

/// Inputs to a layout pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub arena_width: f64,
    pub arena_height: f64,
    pub radius: f64,
    pub min_distance: f64,
    pub count: usize,
    /// Radius variation, applied as ± this fraction
    pub jitter: f64,
}

impl LayoutParams {
    fn center(&self) -> DVec2 {
        DVec2::new(self.arena_width / 2.0, self.arena_height / 2.0)
    }

    /// Points that fit on the circumference at `min_distance` spacing
    pub fn max_points(&self) -> usize {
        if self.min_distance <= 0.0 {
            return self.count;
        }
        (TAU * self.radius / self.min_distance).floor().max(0.0) as usize
    }
}

fn placement_at(center: DVec2, radius: f64, angle: f64) -> Placement {
    let p = polar_to_cartesian(center, radius, angle);
    Placement {
        position: DVec2::new(p.x.round(), p.y.round()),
        heading: angle,
    }
}

fn jittered_radius<R: Rng>(rng: &mut R, radius: f64, jitter: f64) -> f64 {
    let variation = rng.random::<f64>() * jitter * 2.0 - jitter;
    radius * (1.0 + variation)
}

fn is_valid(candidate: &Placement, placed: &[Placement], min_distance: f64) -> bool {
    placed
        .iter()
        .all(|p| p.position.distance(candidate.position) >= min_distance)
}

/// Single layout pass; may return fewer than `count` placements
///
/// The count is first capped at `floor(circumference / min_distance)`.
pub fn layout<R: Rng>(rng: &mut R, params: &LayoutParams) -> Vec<Placement> {
    if params.count == 0 || params.radius <= 0.0 {
        return Vec::new();
    }
    let center = params.center();
    let target = params.count.min(params.max_points());
    let mut placed: Vec<Placement> = Vec::with_capacity(target);

    // Phase A: rejection sampling at uniform random angles
    let mut attempts = 0;
    while placed.len() < target && attempts < RANDOM_PHASE_ATTEMPTS {
        let angle = rng.random::<f64>() * TAU;
        let radius = jittered_radius(rng, params.radius, params.jitter);
        let candidate = placement_at(center, radius, angle);
        if placed.is_empty() || is_valid(&candidate, &placed, params.min_distance) {
            placed.push(candidate);
            attempts = 0;
        } else {
            attempts += 1;
        }
    }

    if placed.len() >= target {
        return placed;
    }

    // Phase B: evenly spaced angles with per-slot jitter
    log::debug!(
        "Random layout placed {}/{} points, switching to spaced layout",
        placed.len(),
        target
    );
    placed.clear();
    let spacing = TAU / target as f64 * SPACED_PADDING;
    let mut angle = rng.random::<f64>() * TAU;
    for slot in 0..target {
        for _ in 0..SPACED_PHASE_ATTEMPTS {
            let variation = (rng.random::<f64>() * 2.0 * SPACED_VARIATION - SPACED_VARIATION) * spacing;
            let radius = jittered_radius(rng, params.radius, params.jitter);
            let candidate = placement_at(center, radius, angle + variation);
            if slot == 0 || is_valid(&candidate, &placed, params.min_distance) {
                placed.push(candidate);
                angle += spacing;
                break;
            }
        }
    }
    placed
}

/// Exact even spacing without jitter; always yields `count` placements
pub fn even_layout<R: Rng>(rng: &mut R, params: &LayoutParams) -> Vec<Placement> {
    if params.count == 0 {
        return Vec::new();
    }
    let center = params.center();
    let start = rng.random::<f64>() * TAU;
    let step = TAU / params.count as f64;
    (0..params.count)
        .map(|i| placement_at(center, params.radius, start + step * i as f64))
        .collect()
}

/// Layout that always covers every agent
///
/// Retries full passes, relaxing `min_distance` by 10% per level, and falls
/// back to [`even_layout`] once the relax budget is spent.
pub fn layout_with_retry<R: Rng>(rng: &mut R, params: &LayoutParams) -> Vec<Placement> {
    let mut level_params = *params;
    for level in 0..MAX_RELAX_LEVELS {
        for _ in 0..ATTEMPTS_PER_LEVEL {
            let placed = layout(rng, &level_params);
            if placed.len() >= params.count {
                return placed;
            }
        }
        log::warn!(
            "Layout under-filled at min distance {:.1} (level {}), relaxing",
            level_params.min_distance,
            level
        );
        level_params.min_distance *= RELAX_FACTOR;
    }
    log::warn!("Layout relax budget exhausted, using even spacing");
    even_layout(rng, params)
}
