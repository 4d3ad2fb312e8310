//! Demo-mode steering
//!
//! Looks a short distance ahead in three directions (hard left, straight,
//! hard right) and steers toward whichever stays clear the longest. Produces
//! a key snapshot, so the simulation cannot tell it apart from a human.

use std::cmp::Ordering;

use glam::DVec2;

use super::agent::{Agent, TurnInput};
use super::geometry::{outside_arena, point_in_disk};
use super::state::{GameSession, KeyState};
use crate::heading_vector;
use crate::settings::Settings;

/// Probe spacing along each look-ahead ray
const PROBE_STEP: f64 = 6.0;
/// Probes per ray
const PROBE_COUNT: usize = 15;
/// Angle between the straight ray and each turning ray (radians)
const PROBE_SPREAD: f64 = 0.6;
/// Own newest segments skipped (they sit right behind the head)
const OWN_NECK: usize = 12;

fn blocked(p: DVec2, me: &Agent, agents: &[Agent], settings: &Settings, clearance: f64) -> bool {
    if outside_arena(p, settings.arena_width, settings.arena_height) {
        return true;
    }
    agents.iter().any(|agent| {
        let segments = if agent.owner == me.owner {
            let end = agent.segments.len().saturating_sub(OWN_NECK);
            &agent.segments[..end]
        } else {
            &agent.segments[..]
        };
        segments
            .iter()
            .filter(|s| !s.removed)
            .any(|s| point_in_disk(p, s.start, clearance))
    })
}

/// Distance along `heading` before the first blocked probe
fn clear_distance(me: &Agent, heading: f64, agents: &[Agent], settings: &Settings) -> f64 {
    let dir = heading_vector(heading);
    let clearance = settings.line_width * 1.5;
    for i in 1..=PROBE_COUNT {
        let distance = PROBE_STEP * i as f64;
        if blocked(me.position + dir * distance, me, agents, settings, clearance) {
            return distance;
        }
    }
    PROBE_STEP * (PROBE_COUNT + 1) as f64
}

/// Steering for one agent
pub fn choose_turn(me: &Agent, agents: &[Agent], settings: &Settings) -> TurnInput {
    let straight = clear_distance(me, me.heading, agents, settings);
    if straight > PROBE_STEP * PROBE_COUNT as f64 {
        return TurnInput::default();
    }
    let left = clear_distance(me, me.heading - PROBE_SPREAD, agents, settings);
    let right = clear_distance(me, me.heading + PROBE_SPREAD, agents, settings);

    // Longest clearance wins; ties prefer going straight
    let best = [(straight, 0i32), (left, -1), (right, 1)]
        .into_iter()
        .max_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then(b.1.abs().cmp(&a.1.abs()))
        })
        .map_or(0, |(_, turn)| turn);

    TurnInput {
        left: best < 0,
        right: best > 0,
    }
}

/// Key snapshot steering every alive agent through its current driver's keys
pub fn keys_for(session: &GameSession) -> KeyState {
    let mut keys = KeyState::new();
    let Some(round) = session.round.as_ref() else {
        return keys;
    };
    for agent in round.alive() {
        let Some(player) = session.players.get(agent.driver) else {
            continue;
        };
        let input = choose_turn(agent, &round.agents, &session.settings);
        if input.left {
            keys.press(&player.controls.left);
        }
        if input.right {
            keys.press(&player.controls.right);
        }
    }
    keys
}
