//! Game settings
//!
//! The configuration surface supplied at game start. The session keeps a
//! snapshot, so edits made while a round is running apply to the next game.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::palette::PlayerColor;
use crate::sim::effects::BonusEffect;

/// Errors raised while loading or validating settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl SettingsError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SettingsError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Logical key identifier (e.g. `ArrowLeft`, `KeyQ`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub String);

impl KeyCode {
    pub fn new(code: impl Into<String>) -> Self {
        KeyCode(code.into())
    }

    /// Human-readable label (`KeyQ` -> `Q`, arrows spelled out)
    pub fn label(&self) -> String {
        match self.0.as_str() {
            "ArrowLeft" => "Left Arrow".to_string(),
            "ArrowRight" => "Right Arrow".to_string(),
            "ArrowUp" => "Up Arrow".to_string(),
            "ArrowDown" => "Down Arrow".to_string(),
            "Space" => "Spacebar".to_string(),
            code => code.strip_prefix("Key").unwrap_or(code).to_string(),
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turn-left / turn-right binding for one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controls {
    pub left: KeyCode,
    pub right: KeyCode,
}

impl Controls {
    pub fn new(left: &str, right: &str) -> Self {
        Self {
            left: KeyCode::new(left),
            right: KeyCode::new(right),
        }
    }
}

fn default_controls() -> Vec<Controls> {
    vec![
        Controls::new("ArrowLeft", "ArrowRight"),
        Controls::new("KeyQ", "KeyW"),
        Controls::new("KeyN", "KeyM"),
        Controls::new("KeyO", "KeyP"),
        Controls::new("KeyA", "KeyS"),
        Controls::new("KeyK", "KeyL"),
        Controls::new("KeyF", "KeyG"),
        Controls::new("KeyV", "KeyB"),
    ]
}

fn default_colors() -> Vec<PlayerColor> {
    [
        ("red", "#FF0000"),
        ("green", "#008000"),
        ("blue", "#0000FF"),
        ("yellow", "#FFFF00"),
        ("purple", "#800080"),
        ("cyan", "#00FFFF"),
        ("orange", "#FFA500"),
        ("pink", "#FFC0CB"),
    ]
    .into_iter()
    .map(|(name, hex)| PlayerColor::new(name, hex))
    .collect()
}

/// Game configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Session ===
    /// Number of players (one agent each)
    pub players: usize,
    /// Target round count (extended by one on every tie)
    pub rounds: u32,

    // === Arena ===
    pub arena_width: f64,
    pub arena_height: f64,

    // === Motion ===
    /// Starting speed (units per tick)
    pub initial_speed: f64,
    /// Speed added every tick
    pub speed_increment: f64,
    /// Heading change per tick while a turn key is held (radians)
    pub turn_rate: f64,
    /// Speed delta while both keys are held
    pub boost_speed: f64,
    /// Trail thickness
    pub line_width: f64,
    /// Own segments ignored behind the head for self-collision
    pub self_collision_window: usize,

    // === Items ===
    pub display_items: bool,
    pub display_bonus_items: bool,
    pub item_spawn_interval_secs: f64,
    pub item_radius: f64,
    /// Chance that a spawned item is a bonus item (0 disables bonuses)
    pub bonus_probability: f64,
    /// Effect pool for bonus pickups
    pub bonus_effects: Vec<BonusEffect>,

    // === Scoring ===
    /// Kills and round survival award bonus points to survivors
    pub survivor_bonus: bool,

    // === Start layout ===
    /// Placement circle radius as a fraction of the smaller arena side
    pub layout_radius_fraction: f64,
    pub layout_min_distance: f64,
    /// Radius jitter (fraction, applied ±)
    pub layout_jitter: f64,

    // === Audio ===
    pub initial_music_rate: f64,

    // === Roster ===
    pub colors: Vec<PlayerColor>,
    pub controls: Vec<Controls>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            players: 2,
            rounds: 5,

            arena_width: 1000.0,
            arena_height: 700.0,

            initial_speed: 0.18,
            speed_increment: 0.00075,
            turn_rate: 0.07,
            boost_speed: 0.5,
            line_width: 4.0,
            self_collision_window: 50,

            display_items: true,
            display_bonus_items: true,
            item_spawn_interval_secs: 10.0,
            item_radius: 6.0,
            bonus_probability: 0.2,
            bonus_effects: BonusEffect::ALL.to_vec(),

            survivor_bonus: true,

            layout_radius_fraction: 0.35,
            layout_min_distance: 60.0,
            layout_jitter: 0.1,

            initial_music_rate: 0.85,

            colors: default_colors(),
            controls: default_controls(),
        }
    }
}

impl Settings {
    /// Check the invariants the simulation relies on
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.players == 0 {
            return Err(SettingsError::invalid("players", "at least one player is required"));
        }
        if self.players > self.controls.len() {
            return Err(SettingsError::invalid(
                "players",
                format!("{} players but only {} control bindings", self.players, self.controls.len()),
            ));
        }
        if self.players > self.colors.len() {
            return Err(SettingsError::invalid(
                "players",
                format!("{} players but only {} colors", self.players, self.colors.len()),
            ));
        }
        if self.rounds == 0 {
            return Err(SettingsError::invalid("rounds", "must be at least 1"));
        }
        if !(self.arena_width > 0.0 && self.arena_height > 0.0) {
            return Err(SettingsError::invalid("arena", "width and height must be positive"));
        }
        if !(0.0..=1.0).contains(&self.bonus_probability) {
            return Err(SettingsError::invalid(
                "bonus_probability",
                format!("{} is outside [0, 1]", self.bonus_probability),
            ));
        }
        if !(self.item_radius > 0.0) {
            return Err(SettingsError::invalid("item_radius", "must be positive"));
        }
        if !(self.line_width > 0.0) {
            return Err(SettingsError::invalid("line_width", "must be positive"));
        }
        if self.initial_speed < 0.0 || self.speed_increment < 0.0 || self.boost_speed < 0.0 {
            return Err(SettingsError::invalid("speed", "speeds must not be negative"));
        }
        if !(self.item_spawn_interval_secs > 0.0) {
            return Err(SettingsError::invalid("item_spawn_interval_secs", "must be positive"));
        }
        if !(self.layout_min_distance > 0.0) {
            return Err(SettingsError::invalid("layout_min_distance", "must be positive"));
        }
        if !(0.0..1.0).contains(&self.layout_jitter) {
            return Err(SettingsError::invalid("layout_jitter", "must be in [0, 1)"));
        }
        Ok(())
    }

    /// Item spawn interval in ticks
    pub fn spawn_interval_ticks(&self) -> u64 {
        crate::secs_to_ticks(self.item_spawn_interval_secs)
    }

    /// Bonus items can only appear when both item toggles are on
    pub fn effective_bonus_probability(&self) -> f64 {
        if self.display_items && self.display_bonus_items {
            self.bonus_probability
        } else {
            0.0
        }
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings: Settings = serde_json::from_str(&json)?;
        settings.validate()?;
        log::info!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            log::info!("No settings at {}, using defaults", path.as_ref().display());
            Ok(Self::default())
        }
    }

    /// Write settings as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        log::info!("Settings saved to {}", path.as_ref().display());
        Ok(())
    }
}
