//! Fixed timestep simulation tick and round lifecycle
//!
//! `Idle -> Setup -> Playing -> RoundEnd -> {Setup | GameEnd}`. One call to
//! [`tick`] is one 60 Hz step: the session clock advances, due scheduled
//! events fire, the spawn timer is polled, and unless frozen every alive
//! agent is advanced, checked for pickups and checked for collisions.

use super::agent::{Agent, Collision, CollisionRules};
use super::effects;
use super::items::{ItemKind, SpawnParams, try_spawn};
use super::positioning::{LayoutParams, layout_with_retry};
use super::schedule::ScheduledAction;
use super::state::{GameError, GamePhase, GameSession, KeyState, Round, SpawnTimer};
use crate::audio::{FeedbackEvent, tempo_hint};
use crate::consts::ROUND_RESTART_DELAY_TICKS;
use crate::frontend::{Frontend, report};
use crate::render::{AgentSprite, DrawFrame, ItemSprite, VisualCue};
use crate::standings::Standings;

/// Begin a new game with the session's settings snapshot
pub fn start_game(session: &mut GameSession, out: &mut dyn Frontend) -> Result<(), GameError> {
    if !matches!(session.phase, GamePhase::Idle | GamePhase::GameEnd) {
        return Err(GameError::AlreadyRunning(session.phase));
    }
    session.settings.validate()?;

    cancel_round(session, out);
    session.events.clear();
    session.rebuild_roster();
    session.standings = None;
    session.paused = false;
    session.freeze_until = session.clock;

    log::info!(
        "Game started: {} players, {} rounds (seed {})",
        session.players.len(),
        session.target_rounds,
        session.seed
    );
    start_round(session, out);
    Ok(())
}

/// Advance the session by one fixed timestep
pub fn tick(session: &mut GameSession, keys: &KeyState, out: &mut dyn Frontend) {
    session.clock += 1;
    session.input.refresh(keys);

    for event in session.events.drain_due(session.clock, session.generation) {
        // An earlier event in this batch may have cancelled the round
        if event.generation == session.generation {
            run_scheduled(session, event.action, out);
        }
    }

    if session.phase != GamePhase::Playing || !session.tick_driver {
        return;
    }

    // Effect freezes leave the spawn timer running; a pause holds it
    let spawn_due = match session.spawn_timer.as_mut() {
        Some(timer) if session.paused => {
            timer.hold();
            false
        }
        Some(timer) => timer.poll(session.clock),
        None => false,
    };
    if spawn_due {
        spawn_item(session);
    }

    if session.is_frozen() {
        return;
    }
    play_tick(session, keys, out);
}

/// End the game now; safe to call in any phase
pub fn end_game(session: &mut GameSession, out: &mut dyn Frontend) {
    if matches!(session.phase, GamePhase::Idle | GamePhase::GameEnd) {
        return;
    }
    cancel_round(session, out);
    session.events.clear();
    session.phase = GamePhase::GameEnd;

    let standings = Standings::from_scores(&session.scores);
    log::info!(
        "Game over after {} rounds: winners {:?}, scores {:?}",
        session.rounds_played,
        standings.winners(),
        session.scores
    );
    report("game over", out.game_over(&standings));
    report("game over feedback", out.feedback(&FeedbackEvent::GameOver));
    session.standings = Some(standings);
}

/// Back to `Idle` with zeroed scores
pub fn reset(session: &mut GameSession, out: &mut dyn Frontend) {
    cancel_round(session, out);
    session.events.clear();
    session.rebuild_roster();
    session.phase = GamePhase::Idle;
    session.standings = None;
    session.paused = false;
    session.freeze_until = session.clock;
    session.input = Default::default();
    log::info!("Session reset");
    report("scoreboard", out.scoreboard(&session.scoreboard()));
}

/// Stop the round's timers and invalidate everything scheduled for it
///
/// Idempotent. Whatever the round still shows is flushed to the renderer
/// before the round is dropped.
fn cancel_round(session: &mut GameSession, out: &mut dyn Frontend) {
    session.tick_driver = false;
    session.spawn_timer = None;
    session.generation += 1;
    let purged = session.events.purge_stale(session.generation);
    if purged > 0 {
        log::debug!("Cancelled {} pending events", purged);
    }

    if let Some(mut round) = session.round.take() {
        round.collect_removed();
        round.erase.items.append(&mut round.items);
        if !round.erase.is_empty() {
            report("erase", out.erase(&round.erase));
        }
    }
    effects::clear_visuals(session, out);
}

fn start_round(session: &mut GameSession, out: &mut dyn Frontend) {
    cancel_round(session, out);
    session.phase = GamePhase::Setup;

    let settings = &session.settings;
    let params = LayoutParams {
        arena_width: settings.arena_width,
        arena_height: settings.arena_height,
        radius: settings.arena_width.min(settings.arena_height) * settings.layout_radius_fraction,
        min_distance: settings.layout_min_distance,
        count: settings.players,
        jitter: settings.layout_jitter,
    };
    let placements = layout_with_retry(&mut session.rng, &params);
    let agents: Vec<Agent> = placements
        .into_iter()
        .take(session.players.len())
        .enumerate()
        .map(|(id, placement)| Agent::new(id, placement, &session.settings))
        .collect();
    session.round = Some(Round::new(agents));

    if session.settings.display_items {
        let interval = session.settings.spawn_interval_ticks();
        session.spawn_timer = Some(SpawnTimer::new(interval, session.clock));
    }
    session.tick_driver = true;
    session.phase = GamePhase::Playing;

    let round = session.display_round();
    log::info!("Round {} of {} started", round, session.target_rounds);
    report("clear cue", out.visual_cue(VisualCue::ClearArena));
    report(
        "round feedback",
        out.feedback(&FeedbackEvent::RoundStarted { round }),
    );
    report("scoreboard", out.scoreboard(&session.scoreboard()));
}

fn run_scheduled(session: &mut GameSession, action: ScheduledAction, out: &mut dyn Frontend) {
    match action {
        ScheduledAction::StartRound => {
            if session.phase == GamePhase::RoundEnd {
                start_round(session, out);
            }
        }
        ScheduledAction::EndHallucination { tag } => effects::end_hallucination(session, out, tag),
        ScheduledAction::ShuffleControls => effects::shuffle_drivers(session),
        ScheduledAction::EndSpeedUp { delta, slow_downs } => {
            effects::end_speed_up(session, delta, slow_downs)
        }
        ScheduledAction::EndThinTrail { tag } => effects::end_thin_trails(session, tag),
        ScheduledAction::EndDistortion { tag } => effects::end_distortion(session, out, tag),
        ScheduledAction::RestoreSpawnRate { tag } => effects::restore_spawn_rate(session, tag),
    }
}

fn spawn_item(session: &mut GameSession) {
    let settings = &session.settings;
    let params = SpawnParams {
        arena_width: settings.arena_width,
        arena_height: settings.arena_height,
        radius: settings.item_radius,
        line_width: settings.line_width,
        bonus_probability: settings.effective_bonus_probability(),
    };
    let id = session.next_item_id();
    let now = session.clock;
    let Some(round) = session.round.as_mut() else {
        return;
    };
    if let Some(item) = try_spawn(&mut session.rng, &params, &round.items, &round.agents, id, now) {
        round.items.push(item);
    }
}

fn play_tick(session: &mut GameSession, keys: &KeyState, out: &mut dyn Frontend) {
    let Some(round) = session.round.as_mut() else {
        return;
    };
    round.ticks += 1;

    // Erase-before-forget: last tick's removals go out first
    round.collect_removed();
    report("erase", out.erase(&round.erase));
    round.erase.clear();

    let count = round.agents.len();
    for index in 0..count {
        advance_agent(session, keys, index, out);
        check_agent_collision(session, index, out);
    }

    // Segments flagged this tick leave the draw set now and are erased next tick
    if let Some(round) = session.round.as_mut() {
        round.collect_removed();
    }
    draw(session, out);
    send_tempo(session, out);

    if session.alive_count() <= 1 {
        end_round(session, out);
    }
}

fn advance_agent(session: &mut GameSession, keys: &KeyState, index: usize, out: &mut dyn Frontend) {
    let Some(round) = session.round.as_mut() else {
        return;
    };
    let agent = &mut round.agents[index];
    if !agent.alive {
        return;
    }
    let input = session
        .players
        .get(agent.driver)
        .map(|p| session.input.turn_input(keys, &p.controls))
        .unwrap_or_default();
    agent.update(input);

    let (head, line_width, owner) = (agent.position, agent.line_width, agent.owner);
    let (touched, kept) = std::mem::take(&mut round.items)
        .into_iter()
        .partition::<Vec<_>, _>(|item| item.touches(head, line_width));
    round.items = kept;
    if touched.is_empty() {
        return;
    }

    let mut bonuses = Vec::new();
    for mut item in touched {
        item.consumed = true;
        session.scores[owner] += item.points;
        log::debug!(
            "Player {} collected item {} ({:?}, +{})",
            owner,
            item.id,
            item.kind,
            item.points
        );
        report(
            "pickup feedback",
            out.feedback(&FeedbackEvent::ItemCollected {
                player: owner,
                kind: item.kind,
            }),
        );
        if item.kind == ItemKind::Bonus {
            bonuses.push(item.id);
        }
        round.erase.items.push(item);
    }
    report("scoreboard", out.scoreboard(&session.scoreboard()));

    for tag in bonuses {
        effects::trigger(session, out, owner, tag);
    }
}

fn check_agent_collision(session: &mut GameSession, index: usize, out: &mut dyn Frontend) {
    let Some(round) = session.round.as_ref() else {
        return;
    };
    let agent = &round.agents[index];
    if !agent.alive {
        return;
    }
    let rules = CollisionRules::from_settings(&session.settings);
    if let Some(cause) = agent.check_collision(round.agents.iter(), &rules) {
        kill_agent(session, index, cause, out);
    }
}

fn kill_agent(session: &mut GameSession, index: usize, cause: Collision, out: &mut dyn Frontend) {
    let Some(round) = session.round.as_mut() else {
        return;
    };
    let agent = &mut round.agents[index];
    agent.alive = false;
    let owner = agent.owner;
    log::info!("Player {} died: {:?}", owner, cause);

    if session.settings.survivor_bonus {
        if let Collision::Trail {
            other,
            other_alive: true,
        } = cause
        {
            session.scores[other] += 1;
        }
        for survivor in round.alive() {
            session.scores[survivor.owner] += 1;
        }
    }

    let color = session.players[owner].color.hex.clone();
    report(
        "death feedback",
        out.feedback(&FeedbackEvent::AgentDied {
            player: owner,
            color,
            cause,
        }),
    );
    report("scoreboard", out.scoreboard(&session.scoreboard()));
}

fn draw(session: &GameSession, out: &mut dyn Frontend) {
    let Some(round) = session.round.as_ref() else {
        return;
    };
    let agents = round
        .alive()
        .map(|agent| {
            let player = &session.players[agent.owner];
            AgentSprite {
                owner: agent.owner,
                color: &player.color.hex,
                outline: &player.outline,
                line_width: agent.line_width,
                head: agent.position,
                boosting: agent.boosting,
                segments: &agent.segments,
            }
        })
        .collect();
    let frame = DrawFrame {
        tick: round.ticks,
        agents,
        items: round.items.iter().map(ItemSprite::from).collect(),
    };
    report("draw", out.draw(&frame));
}

fn send_tempo(session: &GameSession, out: &mut dyn Frontend) {
    let Some(average) = session.round.as_ref().and_then(Round::average_alive_speed) else {
        return;
    };
    let (speed_pct, playback_rate) = tempo_hint(
        average,
        session.settings.initial_speed,
        session.settings.initial_music_rate,
    );
    report(
        "tempo feedback",
        out.feedback(&FeedbackEvent::Tempo {
            speed_pct,
            playback_rate,
        }),
    );
}

fn end_round(session: &mut GameSession, out: &mut dyn Frontend) {
    let survivor = session.round.as_ref().and_then(|round| {
        let mut alive = round.alive();
        match (alive.next(), alive.next()) {
            (Some(agent), None) => Some(agent.owner),
            _ => None,
        }
    });

    cancel_round(session, out);
    session.phase = GamePhase::RoundEnd;
    session.input.release_all();

    if let Some(id) = survivor {
        if session.settings.survivor_bonus {
            session.scores[id] += 1;
        }
    }
    session.rounds_played += 1;
    log::info!(
        "Round {} ended, survivor {:?}, scores {:?}",
        session.rounds_played,
        survivor,
        session.scores
    );
    report(
        "round feedback",
        out.feedback(&FeedbackEvent::RoundEnded { survivor }),
    );

    let max = session.scores.iter().copied().max().unwrap_or(0);
    let leaders = session.scores.iter().filter(|&&s| s == max).count();
    if leaders > 1 {
        session.target_rounds += 1;
        log::info!(
            "{} players tied at {}, extending to {} rounds",
            leaders,
            max,
            session.target_rounds
        );
        session.schedule(ROUND_RESTART_DELAY_TICKS, ScheduledAction::StartRound);
    } else if session.rounds_played >= session.target_rounds {
        report("scoreboard", out.scoreboard(&session.scoreboard()));
        end_game(session, out);
        return;
    } else {
        session.schedule(ROUND_RESTART_DELAY_TICKS, ScheduledAction::StartRound);
    }
    report("scoreboard", out.scoreboard(&session.scoreboard()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{
        DISTORTION_FREEZE_TICKS, DISTORTION_TICKS, FASTER_SPAWNS_DIVISOR, FASTER_SPAWNS_TICKS,
        HALLUCINATION_TICKS, SPEED_UP_DELTA, SPEED_UP_TICKS, THIN_TRAIL_FACTOR, THIN_TRAIL_TICKS,
    };
    use crate::frontend::{NullFrontend, RecordingFrontend};
    use crate::settings::Settings;
    use crate::sim::autopilot;
    use crate::sim::effects::BonusEffect;
    use crate::sim::items::Item;
    use glam::DVec2;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn no_items() -> Settings {
        Settings {
            display_items: false,
            ..Settings::default()
        }
    }

    fn started(settings: Settings, out: &mut RecordingFrontend) -> GameSession {
        let mut session = GameSession::new(settings, 42).unwrap();
        start_game(&mut session, out).unwrap();
        session
    }

    /// Put an agent somewhere predictable
    fn place(session: &mut GameSession, index: usize, x: f64, y: f64, heading: f64) {
        let agent = &mut session.round.as_mut().unwrap().agents[index];
        agent.position = DVec2::new(x, y);
        agent.previous = agent.position;
        agent.heading = heading;
        agent.segments.clear();
    }

    fn fast_settings(players: usize, rounds: u32) -> Settings {
        Settings {
            players,
            rounds,
            arena_width: 300.0,
            arena_height: 200.0,
            initial_speed: 1.0,
            speed_increment: 0.01,
            layout_min_distance: 20.0,
            ..Settings::default()
        }
    }

    fn speeds(session: &GameSession) -> Vec<f64> {
        session.round.as_ref().unwrap().agents.iter().map(|a| a.speed).collect()
    }

    fn widths(session: &GameSession) -> Vec<f64> {
        session.round.as_ref().unwrap().agents.iter().map(|a| a.line_width).collect()
    }

    fn positions(session: &GameSession) -> Vec<DVec2> {
        session.round.as_ref().unwrap().agents.iter().map(|a| a.position).collect()
    }

    fn idle_ticks(session: &mut GameSession, out: &mut RecordingFrontend, n: u64) {
        for _ in 0..n {
            tick(session, &KeyState::new(), out);
        }
    }

    fn assert_speeds(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "speed {} expected {}", a, e);
        }
    }

    fn run_autopilot(session: &mut GameSession, out: &mut dyn Frontend, max_ticks: u64) {
        for _ in 0..max_ticks {
            if session.phase == GamePhase::GameEnd {
                break;
            }
            let keys = autopilot::keys_for(session);
            tick(session, &keys, out);
        }
    }

    #[test]
    fn test_start_game_enters_playing() {
        let mut out = RecordingFrontend::new();
        let session = started(Settings::default(), &mut out);
        assert_eq!(session.phase, GamePhase::Playing);
        assert_eq!(session.alive_count(), 2);
        assert!(session.spawn_timer.is_some());
        assert_eq!(out.cues, vec![VisualCue::ClearArena]);
        assert_eq!(out.last_scoreboard().unwrap().round, 1);
    }

    #[test]
    fn test_start_game_twice_is_an_error() {
        let mut out = RecordingFrontend::new();
        let mut session = started(Settings::default(), &mut out);
        assert!(matches!(
            start_game(&mut session, &mut out),
            Err(GameError::AlreadyRunning(GamePhase::Playing))
        ));
    }

    #[test]
    fn test_wall_death_scores_collision_and_survivor_bonus() {
        let mut out = RecordingFrontend::new();
        let mut session = started(no_items(), &mut out);
        place(&mut session, 0, 5.0, 350.0, PI);
        place(&mut session, 1, 500.0, 100.0, 0.0);

        let keys = KeyState::new();
        let mut ticks = 0;
        while session.phase == GamePhase::Playing {
            assert_eq!(session.alive_count(), 2, "round ended late");
            tick(&mut session, &keys, &mut out);
            ticks += 1;
            assert!(ticks < 200, "agent never reached the wall");
        }

        assert_eq!(session.phase, GamePhase::RoundEnd);
        assert_eq!(session.scores, vec![0, 2]);
        assert_eq!(session.rounds_played, 1);
        assert!(session.round.is_none());
        assert!(out.events().any(|e| matches!(
            e,
            FeedbackEvent::AgentDied {
                player: 0,
                cause: Collision::Wall,
                ..
            }
        )));
        assert!(
            out.events()
                .any(|e| *e == FeedbackEvent::RoundEnded { survivor: Some(1) })
        );
    }

    #[test]
    fn test_wall_death_without_bonus_scoring() {
        let mut out = RecordingFrontend::new();
        let settings = Settings {
            survivor_bonus: false,
            ..no_items()
        };
        let mut session = started(settings, &mut out);
        place(&mut session, 0, 5.0, 350.0, PI);
        place(&mut session, 1, 500.0, 100.0, 0.0);
        for _ in 0..200 {
            tick(&mut session, &KeyState::new(), &mut out);
        }
        assert_eq!(session.scores, vec![0, 0]);
    }

    #[test]
    fn test_hitting_live_trail_credits_its_owner() {
        let mut out = RecordingFrontend::new();
        let mut session = started(no_items(), &mut out);
        // Agent 1 drops a vertical trail across agent 0's path
        place(&mut session, 0, 470.0, 320.0, 0.0);
        place(&mut session, 1, 500.0, 300.0, FRAC_PI_2);

        let mut ticks = 0;
        while session.phase == GamePhase::Playing {
            tick(&mut session, &KeyState::new(), &mut out);
            ticks += 1;
            assert!(ticks < 400, "agent 0 never reached the trail");
        }

        assert!(out.events().any(|e| matches!(
            e,
            FeedbackEvent::AgentDied {
                player: 0,
                cause: Collision::Trail {
                    other: 1,
                    other_alive: true
                },
                ..
            }
        )));
        // Hit credit, survival of the death, last one standing
        assert_eq!(session.scores, vec![0, 3]);
    }

    #[test]
    fn test_hitting_live_trail_without_bonus_scoring() {
        let mut out = RecordingFrontend::new();
        let settings = Settings {
            survivor_bonus: false,
            ..no_items()
        };
        let mut session = started(settings, &mut out);
        place(&mut session, 0, 470.0, 320.0, 0.0);
        place(&mut session, 1, 500.0, 300.0, FRAC_PI_2);
        for _ in 0..400 {
            if session.phase != GamePhase::Playing {
                break;
            }
            tick(&mut session, &KeyState::new(), &mut out);
        }
        assert_eq!(session.phase, GamePhase::RoundEnd);
        assert_eq!(session.scores, vec![0, 0]);
    }

    #[test]
    fn test_next_round_starts_after_delay() {
        let mut out = RecordingFrontend::new();
        let mut session = started(no_items(), &mut out);
        place(&mut session, 0, 5.0, 350.0, PI);
        place(&mut session, 1, 500.0, 100.0, 0.0);
        while session.phase == GamePhase::Playing {
            tick(&mut session, &KeyState::new(), &mut out);
        }
        let ended_at = session.clock;
        while session.phase == GamePhase::RoundEnd {
            tick(&mut session, &KeyState::new(), &mut out);
        }
        assert_eq!(session.clock - ended_at, ROUND_RESTART_DELAY_TICKS);
        assert_eq!(session.phase, GamePhase::Playing);
        assert_eq!(session.display_round(), 2);
    }

    #[test]
    fn test_tie_extends_target_rounds() {
        let mut out = RecordingFrontend::new();
        let settings = Settings {
            players: 3,
            rounds: 3,
            survivor_bonus: false,
            ..no_items()
        };
        let mut session = started(settings, &mut out);
        session.rounds_played = 2;
        session.scores = vec![2, 2, 1];
        {
            let round = session.round.as_mut().unwrap();
            round.agents[1].alive = false;
            round.agents[2].alive = false;
        }
        tick(&mut session, &KeyState::new(), &mut out);

        assert_eq!(session.phase, GamePhase::RoundEnd);
        assert_eq!(session.target_rounds, 4);
        assert!(session.standings.is_none());
        assert!(out.game_overs.is_empty());

        for _ in 0..ROUND_RESTART_DELAY_TICKS {
            tick(&mut session, &KeyState::new(), &mut out);
        }
        assert_eq!(session.phase, GamePhase::Playing);
        assert_eq!(session.display_round(), 4);
    }

    #[test]
    fn test_last_round_ends_game_with_standings() {
        let mut out = RecordingFrontend::new();
        let settings = Settings {
            rounds: 1,
            ..no_items()
        };
        let mut session = started(settings, &mut out);
        place(&mut session, 0, 5.0, 350.0, PI);
        place(&mut session, 1, 500.0, 100.0, 0.0);
        for _ in 0..200 {
            tick(&mut session, &KeyState::new(), &mut out);
        }
        assert_eq!(session.phase, GamePhase::GameEnd);
        let standings = session.standings.as_ref().unwrap();
        assert_eq!(standings.winners(), vec![1]);
        assert_eq!(out.game_overs.len(), 1);
        assert!(session.events.is_empty());
    }

    #[test]
    fn test_pickup_scores_once_and_erases() {
        let mut out = RecordingFrontend::new();
        let mut session = started(Settings::default(), &mut out);
        place(&mut session, 0, 500.0, 350.0, 0.0);
        place(&mut session, 1, 500.0, 100.0, 0.0);
        let item = Item::new(900, DVec2::new(500.5, 350.0), 6.0, ItemKind::Normal, 0);
        session.round.as_mut().unwrap().items.push(item);

        tick(&mut session, &KeyState::new(), &mut out);
        assert_eq!(session.scores, vec![1, 0]);
        let round = session.round.as_ref().unwrap();
        assert!(round.items.is_empty());
        assert_eq!(round.erase.items.len(), 1);
        assert!(round.erase.items[0].consumed);

        tick(&mut session, &KeyState::new(), &mut out);
        tick(&mut session, &KeyState::new(), &mut out);
        assert_eq!(session.scores, vec![1, 0]);
        let erased: Vec<u64> = out
            .erases
            .iter()
            .flat_map(|e| e.items.iter().map(|i| i.id))
            .collect();
        assert_eq!(erased, vec![900]);
    }

    #[test]
    fn test_bonus_pickup_applies_effect() {
        let mut out = RecordingFrontend::new();
        let settings = Settings {
            bonus_effects: vec![BonusEffect::SlowDown],
            ..Settings::default()
        };
        let mut session = started(settings, &mut out);
        place(&mut session, 0, 500.0, 350.0, 0.0);
        place(&mut session, 1, 500.0, 100.0, 0.0);
        let item = Item::new(7, DVec2::new(500.5, 350.0), 6.0, ItemKind::Bonus, 0);
        session.round.as_mut().unwrap().items.push(item);

        tick(&mut session, &KeyState::new(), &mut out);
        assert_eq!(session.scores, vec![3, 0]);
        for agent in &session.round.as_ref().unwrap().agents {
            assert!(agent.speed < 0.1, "speed {}", agent.speed);
        }
        assert!(out.events().any(|e| *e
            == FeedbackEvent::BonusTriggered {
                player: 0,
                effect: BonusEffect::SlowDown
            }));
    }

    #[test]
    fn test_superseded_hallucination_reverts_once() {
        let mut out = RecordingFrontend::new();
        let mut session = started(no_items(), &mut out);
        session.set_paused(true);

        let apply = BonusEffect::Hallucination.handler();
        apply(&mut session, &mut out, 1);
        for _ in 0..10 {
            tick(&mut session, &KeyState::new(), &mut out);
        }
        apply(&mut session, &mut out, 2);
        for _ in 0..HALLUCINATION_TICKS {
            tick(&mut session, &KeyState::new(), &mut out);
        }

        let offs: Vec<_> = out
            .cues
            .iter()
            .filter(|c| matches!(c, VisualCue::Hallucination { active: false, .. }))
            .collect();
        assert_eq!(offs, vec![&VisualCue::Hallucination { tag: 2, active: false }]);
        assert_eq!(session.effects.hallucination, None);
    }

    #[test]
    fn test_speed_up_reverts_after_duration() {
        let mut out = RecordingFrontend::new();
        let mut session = started(no_items(), &mut out);
        session.set_paused(true);
        let before = speeds(&session);

        BonusEffect::SpeedUp.handler()(&mut session, &mut out, 1);
        let boosted: Vec<f64> = before.iter().map(|s| s + SPEED_UP_DELTA).collect();
        assert_speeds(&speeds(&session), &boosted);

        idle_ticks(&mut session, &mut out, SPEED_UP_TICKS - 1);
        assert_speeds(&speeds(&session), &boosted);
        assert_eq!(session.effects.speed_ups, 1);

        idle_ticks(&mut session, &mut out, 1);
        assert_speeds(&speeds(&session), &before);
        assert_eq!(session.effects.speed_ups, 0);
    }

    #[test]
    fn test_slow_down_halves_active_speed_up() {
        let mut out = RecordingFrontend::new();
        let mut session = started(no_items(), &mut out);
        session.set_paused(true);
        let halved: Vec<f64> = speeds(&session).iter().map(|s| s / 2.0).collect();

        BonusEffect::SpeedUp.handler()(&mut session, &mut out, 1);
        BonusEffect::SlowDown.handler()(&mut session, &mut out, 2);
        idle_ticks(&mut session, &mut out, SPEED_UP_TICKS);

        // Only the halved remainder of the boost comes off
        assert_speeds(&speeds(&session), &halved);
        assert!(speeds(&session).iter().all(|&s| s > 0.08));
    }

    #[test]
    fn test_stacked_speed_ups_around_slow_down() {
        let mut out = RecordingFrontend::new();
        let mut session = started(no_items(), &mut out);
        session.set_paused(true);
        let halved: Vec<f64> = speeds(&session).iter().map(|s| s / 2.0).collect();

        BonusEffect::SpeedUp.handler()(&mut session, &mut out, 1);
        BonusEffect::SlowDown.handler()(&mut session, &mut out, 2);
        BonusEffect::SpeedUp.handler()(&mut session, &mut out, 3);
        idle_ticks(&mut session, &mut out, SPEED_UP_TICKS);

        assert_speeds(&speeds(&session), &halved);
        assert_eq!(session.effects.speed_ups, 0);
    }

    #[test]
    fn test_thin_trail_restored_by_latest_tag_only() {
        let mut out = RecordingFrontend::new();
        let mut session = started(no_items(), &mut out);
        session.set_paused(true);
        let width = session.settings.line_width;
        let thin = vec![width * THIN_TRAIL_FACTOR; 2];

        let apply = BonusEffect::ThinTrail.handler();
        apply(&mut session, &mut out, 1);
        assert_eq!(widths(&session), thin);
        idle_ticks(&mut session, &mut out, 10);
        apply(&mut session, &mut out, 2);

        // First revert comes due but was superseded
        idle_ticks(&mut session, &mut out, THIN_TRAIL_TICKS - 10);
        assert_eq!(widths(&session), thin);
        assert_eq!(session.effects.thin_trail, Some(2));

        idle_ticks(&mut session, &mut out, 10);
        assert_eq!(widths(&session), vec![width; 2]);
        assert_eq!(session.effects.thin_trail, None);
    }

    #[test]
    fn test_distortion_freezes_on_apply_and_revert() {
        let mut out = RecordingFrontend::new();
        let mut session = started(no_items(), &mut out);
        place(&mut session, 0, 300.0, 350.0, 0.0);
        place(&mut session, 1, 300.0, 100.0, 0.0);

        BonusEffect::Distortion.handler()(&mut session, &mut out, 4);
        let (tag, transform) = session.effects.distortion.unwrap();
        assert_eq!(tag, 4);
        assert!(session.is_frozen());
        assert_eq!(
            out.cues.last(),
            Some(&VisualCue::Distortion {
                tag: 4,
                transform,
                active: true
            })
        );

        let held = positions(&session);
        idle_ticks(&mut session, &mut out, DISTORTION_FREEZE_TICKS - 1);
        assert_eq!(positions(&session), held);
        idle_ticks(&mut session, &mut out, 1);
        assert_ne!(positions(&session), held);

        idle_ticks(&mut session, &mut out, DISTORTION_TICKS - DISTORTION_FREEZE_TICKS - 1);
        assert!(session.effects.distortion.is_some());
        idle_ticks(&mut session, &mut out, 1);
        assert_eq!(session.effects.distortion, None);
        assert!(session.is_frozen());
        assert_eq!(
            out.cues.last(),
            Some(&VisualCue::Distortion {
                tag: 4,
                transform,
                active: false
            })
        );

        let held = positions(&session);
        idle_ticks(&mut session, &mut out, 1);
        assert_eq!(positions(&session), held);
    }

    #[test]
    fn test_faster_spawns_restores_configured_interval() {
        let mut out = RecordingFrontend::new();
        let mut session = started(Settings::default(), &mut out);
        session.set_paused(true);
        let base = session.settings.spawn_interval_ticks();

        BonusEffect::FasterSpawns.handler()(&mut session, &mut out, 6);
        assert_eq!(
            session.spawn_timer.unwrap().interval,
            base / FASTER_SPAWNS_DIVISOR
        );
        idle_ticks(&mut session, &mut out, FASTER_SPAWNS_TICKS - 1);
        assert_eq!(
            session.spawn_timer.unwrap().interval,
            base / FASTER_SPAWNS_DIVISOR
        );

        idle_ticks(&mut session, &mut out, 1);
        assert_eq!(session.spawn_timer.unwrap().interval, base);
        assert_eq!(session.effects.faster_spawns, None);
    }

    #[test]
    fn test_pause_holds_spawn_timer() {
        let mut out = RecordingFrontend::new();
        let mut session = started(Settings::default(), &mut out);
        let remaining = session.spawn_timer.unwrap().next_due - session.clock;
        session.set_paused(true);

        idle_ticks(&mut session, &mut out, 3 * remaining);
        assert!(session.round.as_ref().unwrap().items.is_empty());
        assert_eq!(session.spawn_timer.unwrap().next_due - session.clock, remaining);
    }

    #[test]
    fn test_reset_cancels_pending_reverts() {
        let mut out = RecordingFrontend::new();
        let mut session = started(no_items(), &mut out);
        BonusEffect::SpeedUp.handler()(&mut session, &mut out, 5);
        assert!(!session.events.is_empty());

        reset(&mut session, &mut out);
        reset(&mut session, &mut out);
        assert_eq!(session.phase, GamePhase::Idle);
        assert!(session.events.is_empty());
        assert!(session.round.is_none());
        assert_eq!(session.scores, vec![0, 0]);

        start_game(&mut session, &mut out).unwrap();
        session.set_paused(true);
        let speeds: Vec<f64> = session.round.as_ref().unwrap().agents.iter().map(|a| a.speed).collect();
        for _ in 0..400 {
            tick(&mut session, &KeyState::new(), &mut out);
        }
        let after: Vec<f64> = session.round.as_ref().unwrap().agents.iter().map(|a| a.speed).collect();
        assert_eq!(speeds, after);
    }

    #[test]
    fn test_shuffle_freezes_then_swaps_drivers() {
        let mut out = RecordingFrontend::new();
        let mut session = started(no_items(), &mut out);
        BonusEffect::ShuffleControls.handler()(&mut session, &mut out, 3);
        assert!(session.is_frozen());

        let positions: Vec<DVec2> = session.round.as_ref().unwrap().agents.iter().map(|a| a.position).collect();
        for _ in 0..30 {
            tick(&mut session, &KeyState::new(), &mut out);
        }
        let round = session.round.as_ref().unwrap();
        assert_eq!(round.agents[0].driver, 1);
        assert_eq!(round.agents[1].driver, 0);
        let frozen: Vec<DVec2> = round.agents.iter().map(|a| a.position).collect();
        assert_eq!(positions, frozen);
        assert_eq!(round.agents[0].owner, 0);
    }

    #[test]
    fn test_end_game_is_idempotent() {
        let mut out = RecordingFrontend::new();
        let mut session = started(no_items(), &mut out);
        end_game(&mut session, &mut out);
        end_game(&mut session, &mut out);
        assert_eq!(session.phase, GamePhase::GameEnd);
        assert_eq!(out.game_overs.len(), 1);

        let clock = session.clock;
        tick(&mut session, &KeyState::new(), &mut out);
        assert_eq!(session.clock, clock + 1);
        assert!(session.round.is_none());
    }

    #[test]
    fn test_shortened_trail_is_erased_next_tick() {
        let mut out = RecordingFrontend::new();
        let mut session = started(no_items(), &mut out);
        place(&mut session, 0, 500.0, 350.0, 0.0);
        place(&mut session, 1, 500.0, 100.0, 0.0);
        for _ in 0..10 {
            tick(&mut session, &KeyState::new(), &mut out);
        }
        BonusEffect::ShortenTrail.handler()(&mut session, &mut out, 1);
        tick(&mut session, &KeyState::new(), &mut out);
        // Flagged segments leave the draw set in the same tick
        assert_eq!(out.frames.last().unwrap().segments, 2 * 6);
        tick(&mut session, &KeyState::new(), &mut out);
        let erased: usize = out.erases.iter().map(|e| e.segments.len()).sum();
        assert_eq!(erased, 2 * 5);
    }

    #[test]
    fn test_failing_collaborators_never_stop_play() {
        let mut out = RecordingFrontend::failing();
        let mut session = GameSession::new(fast_settings(2, 1), 7).unwrap();
        start_game(&mut session, &mut out).unwrap();
        run_autopilot(&mut session, &mut out, 20_000);
        assert!(session.rounds_played >= 1);
        assert!(!out.scoreboards.is_empty());
    }

    #[test]
    fn test_same_seed_same_scores() {
        let play = || {
            let mut session = GameSession::new(fast_settings(3, 2), 99).unwrap();
            start_game(&mut session, &mut NullFrontend).unwrap();
            run_autopilot(&mut session, &mut NullFrontend, 5_000);
            (session.scores.clone(), session.rounds_played, session.clock)
        };
        assert_eq!(play(), play());
    }
}
