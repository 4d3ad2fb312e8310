//! Tick-scheduled one-shot events
//!
//! Every event carries the round generation it was scheduled in. Events from
//! an older generation are dropped instead of fired.

use super::items::ItemId;

/// Deferred work
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScheduledAction {
    /// Set up the next round
    StartRound,
    EndHallucination { tag: ItemId },
    /// Midpoint of the shuffle freeze
    ShuffleControls,
    /// `slow_downs` is the round's halving count when the boost was applied
    EndSpeedUp { delta: f64, slow_downs: u32 },
    EndThinTrail { tag: ItemId },
    EndDistortion { tag: ItemId },
    RestoreSpawnRate { tag: ItemId },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEvent {
    /// Session clock tick the event fires on
    pub due: u64,
    pub generation: u64,
    seq: u64,
    pub action: ScheduledAction,
}

/// Pending events, fired in (due, insertion) order
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<ScheduledEvent>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: u64, generation: u64, action: ScheduledAction) {
        self.events.push(ScheduledEvent {
            due,
            generation,
            seq: self.next_seq,
            action,
        });
        self.next_seq += 1;
    }

    /// Remove and return every event due at `now`
    ///
    /// Stale events (other generations) are discarded on the way out.
    pub fn drain_due(&mut self, now: u64, generation: u64) -> Vec<ScheduledEvent> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.events.drain(..).partition(|e| e.due <= now);
        self.events = pending;

        let before = due.len();
        due.retain(|e| e.generation == generation);
        if due.len() < before {
            log::debug!("Dropped {} stale scheduled events", before - due.len());
        }
        due.sort_by_key(|e| (e.due, e.seq));
        due
    }

    /// Drop every event not tagged with `generation`
    pub fn purge_stale(&mut self, generation: u64) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.generation == generation);
        before - self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &ScheduledEvent> {
        self.events.iter()
    }
}
