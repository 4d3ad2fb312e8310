//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only (60 Hz, every delay is a tick count)
//! - Seeded RNG only
//! - Stable iteration order (by player id)
//! - No rendering or platform dependencies; collaborators are called through traits

pub mod agent;
pub mod autopilot;
pub mod effects;
pub mod geometry;
pub mod items;
pub mod positioning;
pub mod schedule;
pub mod state;
pub mod tick;

pub use agent::{Agent, Collision, CollisionRules, PlayerId, Segment, TurnInput};
pub use effects::{ArenaTransform, BonusEffect};
pub use items::{Item, ItemId, ItemKind};
pub use positioning::{LayoutParams, Placement, layout, layout_with_retry};
pub use schedule::{EventQueue, ScheduledAction};
pub use state::{GameError, GamePhase, GameSession, KeyState, Player, Round};
pub use tick::{end_game, reset, start_game, tick};
