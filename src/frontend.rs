//! Presentation collaborator and the collaborator bundle
//!
//! The simulation talks to three collaborators: a [`Renderer`], an
//! [`AudioSink`] and a [`Presenter`]. Anything implementing all three is a
//! [`Frontend`]. Collaborator failures are logged at the call boundary and
//! never abort a tick.

use crate::audio::{AudioSink, FeedbackEvent};
use crate::render::{DrawFrame, EraseSet, Renderer, VisualCue};
use crate::sim::agent::PlayerId;
use crate::standings::{Scoreboard, Standings};

/// A collaborator refused or failed a call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrontendError {
    #[error("renderer failed: {0}")]
    Render(String),
    #[error("audio failed: {0}")]
    Audio(String),
    #[error("presenter failed: {0}")]
    Present(String),
}

/// Score and menu display
pub trait Presenter {
    fn scoreboard(&mut self, board: &Scoreboard) -> Result<(), FrontendError>;
    fn game_over(&mut self, standings: &Standings) -> Result<(), FrontendError>;
}

/// Everything the simulation reports to
pub trait Frontend: Renderer + AudioSink + Presenter {}

impl<T: Renderer + AudioSink + Presenter + ?Sized> Frontend for T {}

/// Log a failed collaborator call and carry on
pub(crate) fn report(what: &str, result: Result<(), FrontendError>) {
    if let Err(e) = result {
        log::warn!("{} ignored: {}", what, e);
    }
}

/// Three separate collaborators combined into one [`Frontend`]
#[derive(Debug, Default)]
pub struct Collaborators<R, A, P> {
    pub renderer: R,
    pub audio: A,
    pub presenter: P,
}

impl<R, A, P> Collaborators<R, A, P> {
    pub fn new(renderer: R, audio: A, presenter: P) -> Self {
        Self {
            renderer,
            audio,
            presenter,
        }
    }
}

impl<R: Renderer, A, P> Renderer for Collaborators<R, A, P> {
    fn erase(&mut self, erase: &EraseSet) -> Result<(), FrontendError> {
        self.renderer.erase(erase)
    }

    fn draw(&mut self, frame: &DrawFrame<'_>) -> Result<(), FrontendError> {
        self.renderer.draw(frame)
    }

    fn visual_cue(&mut self, cue: VisualCue) -> Result<(), FrontendError> {
        self.renderer.visual_cue(cue)
    }
}

impl<R, A: AudioSink, P> AudioSink for Collaborators<R, A, P> {
    fn feedback(&mut self, event: &FeedbackEvent) -> Result<(), FrontendError> {
        self.audio.feedback(event)
    }
}

impl<R, A, P: Presenter> Presenter for Collaborators<R, A, P> {
    fn scoreboard(&mut self, board: &Scoreboard) -> Result<(), FrontendError> {
        self.presenter.scoreboard(board)
    }

    fn game_over(&mut self, standings: &Standings) -> Result<(), FrontendError> {
        self.presenter.game_over(standings)
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFrontend;

impl Renderer for NullFrontend {
    fn erase(&mut self, _erase: &EraseSet) -> Result<(), FrontendError> {
        Ok(())
    }

    fn draw(&mut self, _frame: &DrawFrame<'_>) -> Result<(), FrontendError> {
        Ok(())
    }
}

impl AudioSink for NullFrontend {
    fn feedback(&mut self, _event: &FeedbackEvent) -> Result<(), FrontendError> {
        Ok(())
    }
}

impl Presenter for NullFrontend {
    fn scoreboard(&mut self, _board: &Scoreboard) -> Result<(), FrontendError> {
        Ok(())
    }

    fn game_over(&mut self, _standings: &Standings) -> Result<(), FrontendError> {
        Ok(())
    }
}

/// What a drawn frame contained
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSummary {
    pub tick: u64,
    pub agents: Vec<PlayerId>,
    pub segments: usize,
    pub items: usize,
}

/// Records all collaborator traffic; optionally fails every call
#[derive(Debug, Default, Clone)]
pub struct RecordingFrontend {
    pub erases: Vec<EraseSet>,
    pub frames: Vec<FrameSummary>,
    pub cues: Vec<VisualCue>,
    pub feedback: Vec<FeedbackEvent>,
    pub scoreboards: Vec<Scoreboard>,
    pub game_overs: Vec<Standings>,
    /// Record, then return an error from every call
    pub fail: bool,
}

impl RecordingFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that still fail every call
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn last_scoreboard(&self) -> Option<&Scoreboard> {
        self.scoreboards.last()
    }

    /// Feedback events other than the per-tick tempo hint
    pub fn events(&self) -> impl Iterator<Item = &FeedbackEvent> {
        self.feedback
            .iter()
            .filter(|e| !matches!(e, FeedbackEvent::Tempo { .. }))
    }

    fn outcome(&self, err: impl FnOnce() -> FrontendError) -> Result<(), FrontendError> {
        if self.fail { Err(err()) } else { Ok(()) }
    }
}

impl Renderer for RecordingFrontend {
    fn erase(&mut self, erase: &EraseSet) -> Result<(), FrontendError> {
        self.erases.push(erase.clone());
        self.outcome(|| FrontendError::Render("erase".into()))
    }

    fn draw(&mut self, frame: &DrawFrame<'_>) -> Result<(), FrontendError> {
        self.frames.push(FrameSummary {
            tick: frame.tick,
            agents: frame.agents.iter().map(|a| a.owner).collect(),
            segments: frame.agents.iter().map(|a| a.segments.len()).sum(),
            items: frame.items.len(),
        });
        self.outcome(|| FrontendError::Render("draw".into()))
    }

    fn visual_cue(&mut self, cue: VisualCue) -> Result<(), FrontendError> {
        self.cues.push(cue);
        self.outcome(|| FrontendError::Render("cue".into()))
    }
}

impl AudioSink for RecordingFrontend {
    fn feedback(&mut self, event: &FeedbackEvent) -> Result<(), FrontendError> {
        self.feedback.push(event.clone());
        self.outcome(|| FrontendError::Audio("feedback".into()))
    }
}

impl Presenter for RecordingFrontend {
    fn scoreboard(&mut self, board: &Scoreboard) -> Result<(), FrontendError> {
        self.scoreboards.push(board.clone());
        self.outcome(|| FrontendError::Present("scoreboard".into()))
    }

    fn game_over(&mut self, standings: &Standings) -> Result<(), FrontendError> {
        self.game_overs.push(standings.clone());
        self.outcome(|| FrontendError::Present("game over".into()))
    }
}
