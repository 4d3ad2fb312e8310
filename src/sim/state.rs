//! Game session and round state
//!
//! Everything the tick function reads or mutates lives on [`GameSession`],
//! passed explicitly by reference. No ambient globals.

use std::collections::HashSet;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::agent::{Agent, PlayerId, TurnInput};
use super::effects::ArenaTransform;
use super::items::{Item, ItemId};
use super::schedule::EventQueue;
use crate::palette::PlayerColor;
use crate::render::{EraseSet, ErasedSegment};
use crate::settings::{Controls, KeyCode, Settings, SettingsError};
use crate::standings::{Scoreboard, Standings};

/// Errors from the game lifecycle entry points
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),
    #[error("a game is already running (phase {0:?})")]
    AlreadyRunning(GamePhase),
}

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// No game running
    Idle,
    /// Building the next round
    Setup,
    /// Tick driver running (possibly frozen)
    Playing,
    /// Between rounds, waiting for the delayed setup
    RoundEnd,
    /// Final standings reported; inert until reset
    GameEnd,
}

/// One participant, stable for a whole game
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub color: PlayerColor,
    /// Precomputed 10% lighter outline
    pub outline: String,
    pub controls: Controls,
}

impl Player {
    pub fn new(id: PlayerId, color: PlayerColor, controls: Controls) -> Self {
        let outline = color.outline();
        Self {
            id,
            color,
            outline,
            controls,
        }
    }
}

/// Snapshot of held keys for one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyState {
    pressed: HashSet<KeyCode>,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, code: &KeyCode) {
        self.pressed.insert(code.clone());
    }

    pub fn release(&mut self, code: &KeyCode) {
        self.pressed.remove(code);
    }

    pub fn is_down(&self, code: &KeyCode) -> bool {
        self.pressed.contains(code)
    }

}

/// Keys held across a round boundary stay ignored until released
#[derive(Debug, Clone, Default)]
pub struct InputLatch {
    stale: HashSet<KeyCode>,
    capture_pending: bool,
}

impl InputLatch {
    /// Ignore whatever is held on the next refresh
    pub fn release_all(&mut self) {
        self.capture_pending = true;
    }

    /// Fold in this tick's snapshot
    pub fn refresh(&mut self, keys: &KeyState) {
        if self.capture_pending {
            self.stale = keys.pressed.clone();
            self.capture_pending = false;
        }
        self.stale.retain(|k| keys.is_down(k));
    }

    pub fn turn_input(&self, keys: &KeyState, controls: &Controls) -> TurnInput {
        let held = |k: &KeyCode| keys.is_down(k) && !self.stale.contains(k);
        TurnInput {
            left: held(&controls.left),
            right: held(&controls.right),
        }
    }
}

/// Periodic item spawning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnTimer {
    /// Configured interval
    pub base_interval: u64,
    /// Interval in force (shortened by faster spawns)
    pub interval: u64,
    pub next_due: u64,
}

impl SpawnTimer {
    pub fn new(interval: u64, now: u64) -> Self {
        Self {
            base_interval: interval,
            interval,
            next_due: now + interval,
        }
    }

    /// True (and re-armed) when a spawn is due
    pub fn poll(&mut self, now: u64) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due = now + self.interval;
        true
    }

    /// Push the next spawn back by one tick
    pub fn hold(&mut self) {
        self.next_due += 1;
    }

    pub fn set_interval(&mut self, interval: u64, now: u64) {
        self.interval = interval.max(1);
        self.next_due = self.next_due.min(now + self.interval);
    }
}

/// Temporary effects in force, tagged with the item that started them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveEffects {
    pub hallucination: Option<ItemId>,
    pub thin_trail: Option<ItemId>,
    pub distortion: Option<(ItemId, ArenaTransform)>,
    pub faster_spawns: Option<ItemId>,
    /// Stacked speed-ups awaiting revert
    pub speed_ups: u32,
    /// Halvings applied this round; each one also halves any boost still active
    pub slow_downs: u32,
}

/// One round: agents (alive and dead), items, tick count
#[derive(Debug, Clone)]
pub struct Round {
    pub agents: Vec<Agent>,
    pub items: Vec<Item>,
    pub ticks: u64,
    /// Collected since the last flush
    pub erase: EraseSet,
}

impl Round {
    pub fn new(agents: Vec<Agent>) -> Self {
        Self {
            agents,
            items: Vec::new(),
            ticks: 0,
            erase: EraseSet::default(),
        }
    }

    pub fn alive_count(&self) -> usize {
        self.agents.iter().filter(|a| a.alive).count()
    }

    pub fn alive(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter().filter(|a| a.alive)
    }

    pub fn alive_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.agents.iter_mut().filter(|a| a.alive)
    }

    pub fn average_alive_speed(&self) -> Option<f64> {
        let (sum, n) = self
            .alive()
            .fold((0.0, 0usize), |(sum, n), a| (sum + a.speed, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// Move flagged segments into the erase set
    pub fn collect_removed(&mut self) {
        for agent in &mut self.agents {
            let line_width = agent.line_width;
            let owner = agent.owner;
            self.erase
                .segments
                .extend(agent.take_removed().into_iter().map(|segment| ErasedSegment {
                    owner,
                    segment,
                    line_width,
                }));
        }
    }
}

/// Everything that persists across rounds
#[derive(Debug, Clone)]
pub struct GameSession {
    /// Snapshot taken at game start
    pub settings: Settings,
    pub seed: u64,
    pub(crate) rng: Pcg32,
    pub players: Vec<Player>,
    /// Cumulative scores by player id
    pub scores: Vec<u32>,
    /// Grows by one on each tie
    pub target_rounds: u32,
    pub rounds_played: u32,
    pub phase: GamePhase,
    pub round: Option<Round>,
    /// Bumped on every round cancellation; stale scheduled events are dropped
    pub generation: u64,
    /// Session clock, advances every tick in every phase
    pub clock: u64,
    /// External pause toggle
    pub paused: bool,
    /// Effect freeze lasts while `clock < freeze_until`
    pub freeze_until: u64,
    pub events: EventQueue,
    pub spawn_timer: Option<SpawnTimer>,
    /// Whether the per-round tick driver is running
    pub tick_driver: bool,
    pub effects: ActiveEffects,
    pub input: InputLatch,
    pub standings: Option<Standings>,
    next_item_id: ItemId,
}

impl GameSession {
    /// Create an idle session
    pub fn new(settings: Settings, seed: u64) -> Result<Self, GameError> {
        settings.validate()?;
        let mut session = Self {
            settings,
            seed,
            rng: Pcg32::seed_from_u64(seed),
            players: Vec::new(),
            scores: Vec::new(),
            target_rounds: 0,
            rounds_played: 0,
            phase: GamePhase::Idle,
            round: None,
            generation: 0,
            clock: 0,
            paused: false,
            freeze_until: 0,
            events: EventQueue::new(),
            spawn_timer: None,
            tick_driver: false,
            effects: ActiveEffects::default(),
            input: InputLatch::default(),
            standings: None,
            next_item_id: 1,
        };
        session.rebuild_roster();
        Ok(session)
    }

    /// Swap in new settings; only allowed between games
    pub fn configure(&mut self, settings: Settings) -> Result<(), GameError> {
        if !matches!(self.phase, GamePhase::Idle | GamePhase::GameEnd) {
            return Err(GameError::AlreadyRunning(self.phase));
        }
        settings.validate()?;
        self.settings = settings;
        self.rebuild_roster();
        Ok(())
    }

    pub(crate) fn rebuild_roster(&mut self) {
        let settings = &self.settings;
        self.players = (0..settings.players)
            .map(|id| Player::new(id, settings.colors[id].clone(), settings.controls[id].clone()))
            .collect();
        self.scores = vec![0; settings.players];
        self.target_rounds = settings.rounds;
        self.rounds_played = 0;
    }

    pub fn is_frozen(&self) -> bool {
        self.paused || self.clock < self.freeze_until
    }

    /// Extend the effect freeze to at least `ticks` from now
    pub fn freeze_for(&mut self, ticks: u64) {
        self.freeze_until = self.freeze_until.max(self.clock + ticks);
    }

    /// External pause; unlike an effect freeze it also holds the spawn timer
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            log::info!("Game {}", if paused { "paused" } else { "resumed" });
        }
        self.paused = paused;
    }

    pub fn toggle_pause(&mut self) {
        self.set_paused(!self.paused);
    }

    pub(crate) fn next_item_id(&mut self) -> ItemId {
        let id = self.next_item_id;
        self.next_item_id += 1;
        id
    }

    /// Schedule `action` for `delay` ticks from now, in the current generation
    pub(crate) fn schedule(&mut self, delay: u64, action: super::schedule::ScheduledAction) {
        self.events
            .schedule(self.clock + delay, self.generation, action);
    }

    pub fn alive_count(&self) -> usize {
        self.round.as_ref().map_or(0, Round::alive_count)
    }

    /// Round number for display, 1-based
    pub fn display_round(&self) -> u32 {
        (self.rounds_played + 1).min(self.target_rounds.max(1))
    }

    pub fn scoreboard(&self) -> Scoreboard {
        Scoreboard::new(self.display_round(), self.target_rounds, &self.scores)
    }
}
