//! Agents and their trails
//!
//! An agent is one player's moving head for one round. Every tick it moves
//! along its heading and leaves a segment behind; its speed grows by a fixed
//! increment per tick, which is what ramps up the difficulty over a round.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::geometry::{head_overlaps_segments, outside_arena};
use super::positioning::Placement;
use crate::settings::Settings;
use crate::{heading_vector, normalize_angle};

/// Stable per-game player index (0-based)
pub type PlayerId = usize;

/// One tick's movement, as a directed line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: DVec2,
    pub end: DVec2,
    /// Flagged by trail-shortening effects; erased and dropped on the next flush
    pub removed: bool,
}

impl Segment {
    pub fn new(start: DVec2, end: DVec2) -> Self {
        Self {
            start,
            end,
            removed: false,
        }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }
}

/// Key snapshot for the player driving an agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnInput {
    pub left: bool,
    pub right: bool,
}

/// What an agent ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Collision {
    /// Its own trail, outside the exclusion window behind the head
    OwnTrail,
    /// Another agent's trail
    Trail { other: PlayerId, other_alive: bool },
    /// Left the arena
    Wall,
}

/// Arena bounds and collision tuning shared by all agents in a round
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionRules {
    pub arena_width: f64,
    pub arena_height: f64,
    /// Head radius for the discretized overlap test
    pub radius: f64,
    /// Own segments ignored behind the newest one
    pub self_window: usize,
}

impl CollisionRules {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            arena_width: settings.arena_width,
            arena_height: settings.arena_height,
            radius: settings.line_width / 2.0,
            self_window: settings.self_collision_window,
        }
    }
}

/// A player's trail-leaving entity for one round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Player credited with this agent's score and color
    pub owner: PlayerId,
    /// Player whose keys currently steer this agent (changed by shuffles)
    pub driver: PlayerId,
    pub position: DVec2,
    pub previous: DVec2,
    /// Heading (radians)
    pub heading: f64,
    pub speed: f64,
    pub speed_increment: f64,
    pub boosting: bool,
    pub boost_speed: f64,
    pub turn_rate: f64,
    /// Rendered trail thickness
    pub line_width: f64,
    pub alive: bool,
    pub segments: Vec<Segment>,
}

impl Agent {
    pub fn new(owner: PlayerId, placement: Placement, settings: &Settings) -> Self {
        log::debug!(
            "Agent {} placed at ({:.0}, {:.0}) heading {:.2}",
            owner,
            placement.position.x,
            placement.position.y,
            placement.heading
        );
        Self {
            owner,
            driver: owner,
            position: placement.position,
            previous: placement.position,
            heading: placement.heading,
            speed: settings.initial_speed,
            speed_increment: settings.speed_increment,
            boosting: false,
            boost_speed: settings.boost_speed,
            turn_rate: settings.turn_rate,
            line_width: settings.line_width,
            alive: true,
            segments: Vec::new(),
        }
    }

    /// Toggle boosting; the speed delta applies on transitions only
    pub fn set_boost(&mut self, boosting: bool) {
        if self.boosting == boosting {
            return;
        }
        self.boosting = boosting;
        if boosting {
            self.speed += self.boost_speed;
        } else {
            self.speed = (self.speed - self.boost_speed).max(0.0);
        }
    }

    /// Advance one tick
    pub fn update(&mut self, input: TurnInput) {
        match (input.left, input.right) {
            (true, true) => self.set_boost(true),
            (true, false) => {
                self.heading -= self.turn_rate;
                self.set_boost(false);
            }
            (false, true) => {
                self.heading += self.turn_rate;
                self.set_boost(false);
            }
            (false, false) => self.set_boost(false),
        }
        self.heading = normalize_angle(self.heading);

        self.previous = self.position;
        self.position += heading_vector(self.heading) * self.speed;
        self.speed += self.speed_increment;

        if self.position != self.previous {
            self.segments.push(Segment::new(self.previous, self.position));
        }
    }

    /// First collision for the current head position, if any
    ///
    /// Checks own trail, then other agents' trails (alive or dead), then walls.
    pub fn check_collision<'a, I>(&self, others: I, rules: &CollisionRules) -> Option<Collision>
    where
        I: IntoIterator<Item = &'a Agent>,
    {
        let head = self.position;

        // The newest segment is the head itself; the window covers the neck behind it
        if self.segments.len() > rules.self_window {
            let end = self.segments.len() - (rules.self_window + 1);
            let priors = self.segments[..end].iter().filter(|s| !s.removed);
            if head_overlaps_segments(head, priors, rules.radius) {
                return Some(Collision::OwnTrail);
            }
        }

        for other in others {
            if other.owner == self.owner {
                continue;
            }
            let trail = other.segments.iter().filter(|s| !s.removed);
            if head_overlaps_segments(head, trail, rules.radius) {
                return Some(Collision::Trail {
                    other: other.owner,
                    other_alive: other.alive,
                });
            }
        }

        if outside_arena(head, rules.arena_width, rules.arena_height) {
            return Some(Collision::Wall);
        }

        None
    }

    /// Adjust speed by `delta`, never dropping below zero
    pub fn adjust_speed(&mut self, delta: f64) {
        self.speed = (self.speed + delta).max(0.0);
    }

    /// Halve the base speed, keeping an active boost intact
    pub fn halve_speed(&mut self) {
        if self.boosting {
            let base = (self.speed - self.boost_speed).max(0.0);
            self.speed = base / 2.0 + self.boost_speed;
        } else {
            self.speed /= 2.0;
        }
    }

    /// Flag the oldest half of the live trail for removal; returns the count
    pub fn flag_oldest_half(&mut self) -> usize {
        let live = self.segments.iter().filter(|s| !s.removed).count();
        let to_flag = live / 2;
        self.segments
            .iter_mut()
            .filter(|s| !s.removed)
            .take(to_flag)
            .for_each(|s| s.removed = true);
        to_flag
    }

    /// Drop flagged segments, returning them for erasure
    pub fn take_removed(&mut self) -> Vec<Segment> {
        if !self.segments.iter().any(|s| s.removed) {
            return Vec::new();
        }
        let (removed, kept): (Vec<Segment>, Vec<Segment>) =
            self.segments.drain(..).partition(|s| s.removed);
        self.segments = kept;
        removed
    }

    /// Sum of live segment lengths
    pub fn trail_length(&self) -> f64 {
        self.segments.iter().filter(|s| !s.removed).map(Segment::length).sum()
    }
}
