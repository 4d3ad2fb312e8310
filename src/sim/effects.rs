//! Bonus effects
//!
//! Picking up a bonus item triggers one effect chosen uniformly from the
//! configured set, filtered to those that make sense right now. Each kind
//! maps to an application function through [`BonusEffect::handler`];
//! timed effects schedule their own revert on the session's event queue.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::agent::PlayerId;
use super::items::ItemId;
use super::schedule::ScheduledAction;
use super::state::GameSession;
use crate::audio::FeedbackEvent;
use crate::consts::*;
use crate::frontend::{Frontend, report};
use crate::render::VisualCue;

/// Effect kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BonusEffect {
    /// Background toggle, auto-reverts unless superseded
    Hallucination,
    /// Derangement of which player drives which agent
    ShuffleControls,
    /// Temporary speed boost for every alive agent
    SpeedUp,
    /// Permanent halving for the round
    SlowDown,
    /// Oldest half of every alive trail disappears
    ShortenTrail,
    /// Rendered trail thickness halves for a while
    ThinTrail,
    /// Flip/rotate/skew of the rendered arena
    Distortion,
    /// Shorter item-spawn interval for a while
    FasterSpawns,
}

impl BonusEffect {
    pub const ALL: [BonusEffect; 8] = [
        BonusEffect::Hallucination,
        BonusEffect::ShuffleControls,
        BonusEffect::SpeedUp,
        BonusEffect::SlowDown,
        BonusEffect::ShortenTrail,
        BonusEffect::ThinTrail,
        BonusEffect::Distortion,
        BonusEffect::FasterSpawns,
    ];

    /// Whether the effect does anything in the given situation
    pub fn is_relevant(self, ctx: &EffectContext) -> bool {
        match self {
            BonusEffect::FasterSpawns => ctx.items_enabled,
            BonusEffect::ShuffleControls => ctx.alive_agents >= 2,
            BonusEffect::SpeedUp
            | BonusEffect::SlowDown
            | BonusEffect::ShortenTrail
            | BonusEffect::ThinTrail => ctx.alive_agents >= 1,
            BonusEffect::Hallucination | BonusEffect::Distortion => true,
        }
    }

    /// Application function for this kind
    pub fn handler(self) -> EffectFn {
        match self {
            BonusEffect::Hallucination => hallucinate,
            BonusEffect::ShuffleControls => begin_shuffle,
            BonusEffect::SpeedUp => speed_up,
            BonusEffect::SlowDown => slow_down,
            BonusEffect::ShortenTrail => shorten_trails,
            BonusEffect::ThinTrail => thin_trails,
            BonusEffect::Distortion => distort,
            BonusEffect::FasterSpawns => faster_spawns,
        }
    }
}

/// Applies an effect; the item id tags anything that reverts later
pub type EffectFn = fn(&mut GameSession, &mut dyn Frontend, ItemId);

/// What selection needs to know about the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectContext {
    pub items_enabled: bool,
    pub alive_agents: usize,
}

/// Rendered arena transforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArenaTransform {
    FlipHorizontal,
    FlipVertical,
    Rotate,
    Skew,
}

impl ArenaTransform {
    pub const ALL: [ArenaTransform; 4] = [
        ArenaTransform::FlipHorizontal,
        ArenaTransform::FlipVertical,
        ArenaTransform::Rotate,
        ArenaTransform::Skew,
    ];
}

/// Pick one relevant effect uniformly from `pool`
pub fn select<R: Rng>(rng: &mut R, pool: &[BonusEffect], ctx: &EffectContext) -> Option<BonusEffect> {
    let mut candidates: Vec<BonusEffect> = Vec::with_capacity(pool.len());
    for &effect in pool {
        if effect.is_relevant(ctx) && !candidates.contains(&effect) {
            candidates.push(effect);
        }
    }
    candidates.choose(rng).copied()
}

/// Choose and apply a bonus effect for a pickup by `player`
pub fn trigger(session: &mut GameSession, out: &mut dyn Frontend, player: PlayerId, tag: ItemId) {
    let ctx = EffectContext {
        items_enabled: session.settings.display_items && session.spawn_timer.is_some(),
        alive_agents: session.alive_count(),
    };
    let pool = session.settings.bonus_effects.clone();
    let Some(effect) = select(&mut session.rng, &pool, &ctx) else {
        log::debug!("No bonus effect applies right now");
        return;
    };

    log::info!("Player {} triggered {:?} (item {})", player, effect, tag);
    report(
        "bonus feedback",
        out.feedback(&FeedbackEvent::BonusTriggered { player, effect }),
    );
    (effect.handler())(session, out, tag);
}

fn hallucinate(session: &mut GameSession, out: &mut dyn Frontend, tag: ItemId) {
    session.effects.hallucination = Some(tag);
    report(
        "hallucination cue",
        out.visual_cue(VisualCue::Hallucination { tag, active: true }),
    );
    session.schedule(HALLUCINATION_TICKS, ScheduledAction::EndHallucination { tag });
}

pub(crate) fn end_hallucination(session: &mut GameSession, out: &mut dyn Frontend, tag: ItemId) {
    if session.effects.hallucination != Some(tag) {
        log::debug!("Hallucination {} superseded, not reverting", tag);
        return;
    }
    session.effects.hallucination = None;
    report(
        "hallucination cue",
        out.visual_cue(VisualCue::Hallucination { tag, active: false }),
    );
}

fn begin_shuffle(session: &mut GameSession, _out: &mut dyn Frontend, _tag: ItemId) {
    session.freeze_for(SHUFFLE_FREEZE_TICKS);
    session.schedule(SHUFFLE_FREEZE_TICKS / 2, ScheduledAction::ShuffleControls);
}

/// Reassign drivers among alive agents so none keeps its own
pub(crate) fn shuffle_drivers(session: &mut GameSession) {
    let Some(round) = session.round.as_mut() else {
        return;
    };
    let alive: Vec<usize> = (0..round.agents.len())
        .filter(|&i| round.agents[i].alive)
        .collect();
    if alive.len() < 2 {
        log::debug!("Shuffle skipped with {} alive agents", alive.len());
        return;
    }

    let drivers: Vec<PlayerId> = alive.iter().map(|&i| round.agents[i].driver).collect();
    let perm = cyclic_permutation(&mut session.rng, alive.len());
    for (slot, &agent_index) in alive.iter().enumerate() {
        round.agents[agent_index].driver = drivers[perm[slot]];
    }
    log::info!(
        "Controls shuffled: {:?}",
        alive
            .iter()
            .map(|&i| (round.agents[i].owner, round.agents[i].driver))
            .collect::<Vec<_>>()
    );
}

/// Random single-cycle permutation (Sattolo); no index maps to itself
fn cyclic_permutation<R: Rng>(rng: &mut R, n: usize) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = rng.random_range(0..i);
        perm.swap(i, j);
    }
    perm
}

fn speed_up(session: &mut GameSession, _out: &mut dyn Frontend, _tag: ItemId) {
    let Some(round) = session.round.as_mut() else {
        return;
    };
    round.alive_mut().for_each(|a| a.adjust_speed(SPEED_UP_DELTA));
    session.effects.speed_ups += 1;
    session.schedule(
        SPEED_UP_TICKS,
        ScheduledAction::EndSpeedUp {
            delta: SPEED_UP_DELTA,
            slow_downs: session.effects.slow_downs,
        },
    );
}

/// Take back what is left of one speed-up after any halvings since it began
pub(crate) fn end_speed_up(session: &mut GameSession, delta: f64, slow_downs: u32) {
    let Some(round) = session.round.as_mut() else {
        return;
    };
    let halvings = session.effects.slow_downs.saturating_sub(slow_downs);
    let remaining = delta / 2f64.powi(halvings.min(64) as i32);
    round.alive_mut().for_each(|a| a.adjust_speed(-remaining));
    session.effects.speed_ups = session.effects.speed_ups.saturating_sub(1);
}

fn slow_down(session: &mut GameSession, _out: &mut dyn Frontend, _tag: ItemId) {
    if let Some(round) = session.round.as_mut() {
        round.alive_mut().for_each(|a| a.halve_speed());
        session.effects.slow_downs += 1;
    }
}

fn shorten_trails(session: &mut GameSession, _out: &mut dyn Frontend, _tag: ItemId) {
    if let Some(round) = session.round.as_mut() {
        let flagged: usize = round.alive_mut().map(|a| a.flag_oldest_half()).sum();
        log::debug!("Flagged {} segments for removal", flagged);
    }
}

fn thin_trails(session: &mut GameSession, _out: &mut dyn Frontend, tag: ItemId) {
    let thin = session.settings.line_width * THIN_TRAIL_FACTOR;
    let Some(round) = session.round.as_mut() else {
        return;
    };
    round.alive_mut().for_each(|a| a.line_width = thin);
    session.effects.thin_trail = Some(tag);
    session.schedule(THIN_TRAIL_TICKS, ScheduledAction::EndThinTrail { tag });
}

pub(crate) fn end_thin_trails(session: &mut GameSession, tag: ItemId) {
    if session.effects.thin_trail != Some(tag) {
        return;
    }
    session.effects.thin_trail = None;
    let width = session.settings.line_width;
    if let Some(round) = session.round.as_mut() {
        round.agents.iter_mut().for_each(|a| a.line_width = width);
    }
}

fn distort(session: &mut GameSession, out: &mut dyn Frontend, tag: ItemId) {
    let transform = ArenaTransform::ALL
        .choose(&mut session.rng)
        .copied()
        .unwrap_or(ArenaTransform::Rotate);
    session.freeze_for(DISTORTION_FREEZE_TICKS);
    session.effects.distortion = Some((tag, transform));
    report(
        "distortion cue",
        out.visual_cue(VisualCue::Distortion {
            tag,
            transform,
            active: true,
        }),
    );
    session.schedule(DISTORTION_TICKS, ScheduledAction::EndDistortion { tag });
}

pub(crate) fn end_distortion(session: &mut GameSession, out: &mut dyn Frontend, tag: ItemId) {
    let Some((current, transform)) = session.effects.distortion else {
        return;
    };
    if current != tag {
        return;
    }
    session.effects.distortion = None;
    session.freeze_for(DISTORTION_FREEZE_TICKS);
    report(
        "distortion cue",
        out.visual_cue(VisualCue::Distortion {
            tag,
            transform,
            active: false,
        }),
    );
}

fn faster_spawns(session: &mut GameSession, _out: &mut dyn Frontend, tag: ItemId) {
    let now = session.clock;
    let Some(timer) = session.spawn_timer.as_mut() else {
        return;
    };
    timer.set_interval(timer.base_interval / FASTER_SPAWNS_DIVISOR, now);
    session.effects.faster_spawns = Some(tag);
    session.schedule(FASTER_SPAWNS_TICKS, ScheduledAction::RestoreSpawnRate { tag });
}

pub(crate) fn restore_spawn_rate(session: &mut GameSession, tag: ItemId) {
    if session.effects.faster_spawns != Some(tag) {
        return;
    }
    session.effects.faster_spawns = None;
    let now = session.clock;
    if let Some(timer) = session.spawn_timer.as_mut() {
        timer.interval = timer.base_interval;
        timer.next_due = timer.next_due.max(now + 1);
    }
}

/// Turn off any visual effect still showing; used when a round is torn down
pub(crate) fn clear_visuals(session: &mut GameSession, out: &mut dyn Frontend) {
    if let Some(tag) = session.effects.hallucination.take() {
        report(
            "hallucination cue",
            out.visual_cue(VisualCue::Hallucination { tag, active: false }),
        );
    }
    if let Some((tag, transform)) = session.effects.distortion.take() {
        report(
            "distortion cue",
            out.visual_cue(VisualCue::Distortion {
                tag,
                transform,
                active: false,
            }),
        );
    }
    session.effects = Default::default();
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_items_disabled_never_selects_faster_spawns() {
        let mut rng = Pcg32::seed_from_u64(3);
        let ctx = EffectContext {
            items_enabled: false,
            alive_agents: 3,
        };
        for _ in 0..200 {
            assert_ne!(
                select(&mut rng, &BonusEffect::ALL, &ctx),
                Some(BonusEffect::FasterSpawns)
            );
        }
    }

    #[test]
    fn test_single_agent_never_shuffles() {
        let mut rng = Pcg32::seed_from_u64(4);
        let ctx = EffectContext {
            items_enabled: true,
            alive_agents: 1,
        };
        for _ in 0..200 {
            assert_ne!(
                select(&mut rng, &BonusEffect::ALL, &ctx),
                Some(BonusEffect::ShuffleControls)
            );
        }
    }

    #[test]
    fn test_empty_pool_selects_nothing() {
        let mut rng = Pcg32::seed_from_u64(5);
        let ctx = EffectContext {
            items_enabled: false,
            alive_agents: 1,
        };
        assert_eq!(select(&mut rng, &[], &ctx), None);
        assert_eq!(
            select(&mut rng, &[BonusEffect::FasterSpawns], &ctx),
            None
        );
    }

    #[test]
    fn test_every_effect_reachable() {
        let mut rng = Pcg32::seed_from_u64(6);
        let ctx = EffectContext {
            items_enabled: true,
            alive_agents: 2,
        };
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            if let Some(e) = select(&mut rng, &BonusEffect::ALL, &ctx) {
                seen.insert(e);
            }
        }
        assert_eq!(seen.len(), BonusEffect::ALL.len());
    }

    proptest! {
        #[test]
        fn prop_cyclic_permutation_has_no_fixed_points(seed in any::<u64>(), n in 2usize..9) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let perm = cyclic_permutation(&mut rng, n);
            let mut sorted = perm.clone();
            sorted.sort_unstable();
            prop_assert_eq!(sorted, (0..n).collect::<Vec<_>>());
            for (i, &p) in perm.iter().enumerate() {
                prop_assert_ne!(i, p);
            }
        }
    }
}
