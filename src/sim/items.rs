//! Collectible items and spawn placement

use glam::DVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::agent::Agent;
use super::geometry::point_in_disk;
use crate::consts::{BONUS_ITEM_MULTIPLIER, ITEM_SPAWN_ATTEMPTS, NORMAL_ITEM_POINTS};
use crate::palette::{BONUS_ITEM_COLOR, NORMAL_ITEM_COLOR};

/// Unique item identifier within a session
pub type ItemId = u64;

/// Item category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Normal,
    /// Worth triple points and triggers a random bonus effect
    Bonus,
}

impl ItemKind {
    pub fn points(self) -> u32 {
        match self {
            ItemKind::Normal => NORMAL_ITEM_POINTS,
            ItemKind::Bonus => NORMAL_ITEM_POINTS * BONUS_ITEM_MULTIPLIER,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            ItemKind::Normal => NORMAL_ITEM_COLOR,
            ItemKind::Bonus => BONUS_ITEM_COLOR,
        }
    }
}

/// A collectible on the arena floor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub position: DVec2,
    pub radius: f64,
    pub kind: ItemKind,
    pub points: u32,
    /// Session clock tick the item appeared on
    pub created_at: u64,
    pub consumed: bool,
}

impl Item {
    pub fn new(id: ItemId, position: DVec2, radius: f64, kind: ItemKind, created_at: u64) -> Self {
        Self {
            id,
            position,
            radius,
            kind,
            points: kind.points(),
            created_at,
            consumed: false,
        }
    }

    /// Whether a head of the given trail width touches this item
    pub fn touches(&self, head: DVec2, line_width: f64) -> bool {
        point_in_disk(head, self.position, self.radius + line_width / 2.0)
    }
}

/// Spawn tuning for one attempt cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnParams {
    pub arena_width: f64,
    pub arena_height: f64,
    pub radius: f64,
    pub line_width: f64,
    pub bonus_probability: f64,
}

fn clear_of_items(p: DVec2, items: &[Item], radius: f64) -> bool {
    items.iter().all(|item| item.position.distance(p) >= 2.0 * radius)
}

fn clear_of_trails(p: DVec2, agents: &[Agent], clearance: f64) -> bool {
    agents.iter().all(|agent| {
        agent
            .segments
            .iter()
            .all(|s| !point_in_disk(p, s.start, clearance) && !point_in_disk(p, s.end, clearance))
    })
}

/// Find a free spot and create an item there
///
/// Returns `None` when every attempt landed too close to an item or trail;
/// that is a skipped spawn, not an error.
pub fn try_spawn<R: Rng>(
    rng: &mut R,
    params: &SpawnParams,
    items: &[Item],
    agents: &[Agent],
    id: ItemId,
    now: u64,
) -> Option<Item> {
    let r = params.radius;
    let clearance = r + params.line_width;

    for attempt in 0..ITEM_SPAWN_ATTEMPTS {
        let x = r + rng.random::<f64>() * (params.arena_width - 2.0 * r);
        let y = r + rng.random::<f64>() * (params.arena_height - 2.0 * r);
        let p = DVec2::new(x, y);

        if clear_of_items(p, items, r) && clear_of_trails(p, agents, clearance) {
            let kind = if params.bonus_probability > 0.0
                && rng.random_bool(params.bonus_probability.min(1.0))
            {
                ItemKind::Bonus
            } else {
                ItemKind::Normal
            };
            log::debug!(
                "Item {} ({:?}) spawned at ({:.0}, {:.0}) after {} attempts",
                id,
                kind,
                x,
                y,
                attempt + 1
            );
            return Some(Item::new(id, p, r, kind, now));
        }
    }

    log::warn!("Failed to place an item after {} attempts", ITEM_SPAWN_ATTEMPTS);
    None
}
