//! Audio/feedback collaborator contract
//!
//! Discrete fire-and-forget notifications. Whatever plays them (bite sound,
//! collision tone, background blink, music tempo) lives outside the core, and
//! its failures never reach simulation state.

use serde::Serialize;

use crate::consts::{MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE, TEMPO_SPEED_FACTOR};
use crate::frontend::FrontendError;
use crate::sim::agent::{Collision, PlayerId};
use crate::sim::effects::BonusEffect;
use crate::sim::items::ItemKind;

/// Feedback event types
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FeedbackEvent {
    /// Round setup finished (1-based round number)
    RoundStarted { round: u32 },
    /// An item was picked up
    ItemCollected { player: PlayerId, kind: ItemKind },
    /// A bonus effect was triggered
    BonusTriggered { player: PlayerId, effect: BonusEffect },
    /// An agent died; `color` is the owner's hex color for the background blink
    AgentDied {
        player: PlayerId,
        color: String,
        cause: Collision,
    },
    /// Music tempo hint from the average alive-agent speed
    Tempo { speed_pct: f64, playback_rate: f64 },
    /// Round finished, with the sole survivor if there was one
    RoundEnded { survivor: Option<PlayerId> },
    /// Game finished
    GameOver,
}

/// Feedback output
pub trait AudioSink {
    fn feedback(&mut self, event: &FeedbackEvent) -> Result<(), FrontendError>;
}

/// Tempo hint for an average alive speed
///
/// Returns `(speed_pct, playback_rate)`; the rate is clamped to [0.5, 3.0].
pub fn tempo_hint(average_speed: f64, initial_speed: f64, initial_rate: f64) -> (f64, f64) {
    let speed_pct = if initial_speed > 0.0 {
        average_speed / initial_speed * 100.0
    } else {
        0.0
    };
    let rate = initial_rate + (average_speed - initial_speed) * TEMPO_SPEED_FACTOR;
    (speed_pct, rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE))
}

/// Audio sink that only logs
#[derive(Debug, Default)]
pub struct LogAudio {
    /// Tempo hints arrive every tick; log one in this many
    pub tempo_every: u64,
    tempo_seen: u64,
}

impl LogAudio {
    pub fn new(tempo_every: u64) -> Self {
        Self {
            tempo_every,
            tempo_seen: 0,
        }
    }
}

impl AudioSink for LogAudio {
    fn feedback(&mut self, event: &FeedbackEvent) -> Result<(), FrontendError> {
        match event {
            FeedbackEvent::Tempo {
                speed_pct,
                playback_rate,
            } => {
                self.tempo_seen += 1;
                if self.tempo_every > 0 && self.tempo_seen % self.tempo_every == 0 {
                    log::debug!("Speed {:.0}%, music rate {:.2}x", speed_pct, playback_rate);
                }
            }
            other => log::info!("Feedback: {:?}", other),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_at_start_speed() {
        let (pct, rate) = tempo_hint(0.18, 0.18, 0.85);
        assert!((pct - 100.0).abs() < 1e-9);
        assert!((rate - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_tempo_is_clamped() {
        assert_eq!(tempo_hint(100.0, 0.18, 0.85).1, MAX_PLAYBACK_RATE);
        assert_eq!(tempo_hint(0.0, 5.0, 0.85).1, MIN_PLAYBACK_RATE);
    }

    #[test]
    fn test_tempo_without_initial_speed() {
        assert_eq!(tempo_hint(1.0, 0.0, 0.85).0, 0.0);
    }
}
