//! Trail Arena - same-screen multiplayer trail game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (motion, collisions, items, round lifecycle)
//! - `settings`: Configuration surface supplied at game start
//! - `render`, `audio`, `frontend`: Contracts for the external collaborators
//! - `standings`: Scoreboard and final ranking
//! - `palette`: Player colors and outline shading

pub mod audio;
pub mod frontend;
pub mod palette;
pub mod render;
pub mod settings;
pub mod sim;
pub mod standings;

pub use frontend::{Collaborators, FrontendError, NullFrontend, RecordingFrontend};
pub use settings::{Settings, SettingsError};
pub use standings::{Scoreboard, Standings};

use glam::DVec2;

/// Game timing constants
pub mod consts {
    /// Logical tick rate (fixed, ~60 Hz)
    pub const TICK_HZ: u32 = 60;

    /// Delay between the end of a round and the next setup (2 seconds)
    pub const ROUND_RESTART_DELAY_TICKS: u64 = 2 * TICK_HZ as u64;

    /// Normal items are worth one point, bonus items three times that
    pub const NORMAL_ITEM_POINTS: u32 = 1;
    pub const BONUS_ITEM_MULTIPLIER: u32 = 3;

    /// Placement attempts before a spawn is skipped for this cycle
    pub const ITEM_SPAWN_ATTEMPTS: u32 = 100;

    /// Bonus effect timings (ticks)
    pub const HALLUCINATION_TICKS: u64 = 5 * TICK_HZ as u64;
    pub const SPEED_UP_TICKS: u64 = 4 * TICK_HZ as u64;
    pub const THIN_TRAIL_TICKS: u64 = 6 * TICK_HZ as u64;
    pub const DISTORTION_TICKS: u64 = 6 * TICK_HZ as u64;
    pub const FASTER_SPAWNS_TICKS: u64 = 8 * TICK_HZ as u64;
    /// Freeze around a control shuffle; the swap lands halfway through
    pub const SHUFFLE_FREEZE_TICKS: u64 = TICK_HZ as u64;
    /// Freeze at each distortion on/off boundary
    pub const DISTORTION_FREEZE_TICKS: u64 = TICK_HZ as u64 / 3;

    /// Speed added to every alive agent by the temporary speed-up
    pub const SPEED_UP_DELTA: f64 = 0.5;
    /// Rendered thickness multiplier while the thin-trail effect is active
    pub const THIN_TRAIL_FACTOR: f64 = 0.5;
    /// Spawn interval divisor while faster spawns are active
    pub const FASTER_SPAWNS_DIVISOR: u64 = 3;

    /// Music tempo hint bounds
    pub const MIN_PLAYBACK_RATE: f64 = 0.5;
    pub const MAX_PLAYBACK_RATE: f64 = 3.0;
    pub const TEMPO_SPEED_FACTOR: f64 = 0.2;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f64) -> f64 {
    use std::f64::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Unit vector for a heading angle
#[inline]
pub fn heading_vector(angle: f64) -> DVec2 {
    DVec2::new(angle.cos(), angle.sin())
}

/// Convert polar (r, theta) around `center` to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(center: DVec2, r: f64, theta: f64) -> DVec2 {
    center + heading_vector(theta) * r
}

/// Convert seconds to whole ticks at the fixed tick rate
#[inline]
pub fn secs_to_ticks(secs: f64) -> u64 {
    (secs * consts::TICK_HZ as f64).round().max(1.0) as u64
}
