//! Trail Arena headless driver
//!
//! Plays a complete autopilot game and logs the result:
//! `trail-arena [settings.json] [--seed N] [--max-ticks N]`

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::env;

    use anyhow::{Context, bail};

    use trail_arena::audio::LogAudio;
    use trail_arena::frontend::{FrontendError, Presenter};
    use trail_arena::render::{DrawFrame, EraseSet, Renderer, VisualCue};
    use trail_arena::sim::{GamePhase, GameSession, autopilot, start_game, tick};
    use trail_arena::{Collaborators, Scoreboard, Settings, Standings};

    /// Default cap: ten minutes of play at 60 Hz
    const DEFAULT_MAX_TICKS: u64 = 10 * 60 * 60;

    struct Options {
        settings_path: Option<String>,
        seed: u64,
        max_ticks: u64,
    }

    fn parse_args() -> anyhow::Result<Options> {
        let mut options = Options {
            settings_path: None,
            seed: 0x5EED,
            max_ticks: DEFAULT_MAX_TICKS,
        };
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--seed" => {
                    let value = args.next().context("--seed needs a value")?;
                    options.seed = value.parse().with_context(|| format!("bad seed `{value}`"))?;
                }
                "--max-ticks" => {
                    let value = args.next().context("--max-ticks needs a value")?;
                    options.max_ticks = value
                        .parse()
                        .with_context(|| format!("bad tick count `{value}`"))?;
                }
                flag if flag.starts_with("--") => bail!("unknown option `{flag}`"),
                path => options.settings_path = Some(path.to_string()),
            }
        }
        Ok(options)
    }

    /// Renderer that only counts what it was asked to do
    #[derive(Default)]
    struct CountingRenderer {
        frames: u64,
        erased_segments: u64,
        erased_items: u64,
    }

    impl Renderer for CountingRenderer {
        fn erase(&mut self, erase: &EraseSet) -> Result<(), FrontendError> {
            self.erased_segments += erase.segments.len() as u64;
            self.erased_items += erase.items.len() as u64;
            Ok(())
        }

        fn draw(&mut self, _frame: &DrawFrame<'_>) -> Result<(), FrontendError> {
            self.frames += 1;
            Ok(())
        }

        fn visual_cue(&mut self, cue: VisualCue) -> Result<(), FrontendError> {
            log::debug!("Visual cue: {:?}", cue);
            Ok(())
        }
    }

    /// Presenter that logs scoreboards and the final ranking
    #[derive(Default)]
    struct LogPresenter {
        last: Option<Scoreboard>,
    }

    impl Presenter for LogPresenter {
        fn scoreboard(&mut self, board: &Scoreboard) -> Result<(), FrontendError> {
            if self.last.as_ref() != Some(board) {
                log::info!(
                    "Round {}/{} scores {:?} leaders {:?}",
                    board.round,
                    board.target_rounds,
                    board.scores,
                    board.leaders
                );
                self.last = Some(board.clone());
            }
            Ok(())
        }

        fn game_over(&mut self, standings: &Standings) -> Result<(), FrontendError> {
            for entry in &standings.entries {
                log::info!("#{} player {} with {} points", entry.rank, entry.player, entry.score);
            }
            Ok(())
        }
    }

    pub fn run() -> anyhow::Result<()> {
        let options = parse_args()?;
        let settings = match &options.settings_path {
            Some(path) => Settings::load_or_default(path)
                .with_context(|| format!("loading settings from {path}"))?,
            None => Settings::default(),
        };

        let mut session = GameSession::new(settings, options.seed)?;
        let mut out = Collaborators::new(
            CountingRenderer::default(),
            LogAudio::new(60),
            LogPresenter::default(),
        );
        start_game(&mut session, &mut out)?;

        while session.phase != GamePhase::GameEnd && session.clock < options.max_ticks {
            let keys = autopilot::keys_for(&session);
            tick(&mut session, &keys, &mut out);
        }

        log::info!(
            "Stopped after {} ticks: {} frames drawn, {} segments and {} items erased",
            session.clock,
            out.renderer.frames,
            out.renderer.erased_segments,
            out.renderer.erased_items
        );
        match &session.standings {
            Some(standings) => log::info!("Winners: {:?}", standings.winners()),
            None => log::warn!(
                "Tick limit reached before the game ended; scores {:?}",
                session.scores
            ),
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Trail Arena (headless) starting...");
    native::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is driven by the embedding page on wasm
}
