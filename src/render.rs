//! Rendering collaborator contract
//!
//! The core never draws. Each playing tick it hands the renderer the erase
//! set (everything that must disappear) and then the current draw set.
//! Erase-before-forget: anything removed from the simulation is reported here
//! exactly once before it is dropped.

use glam::DVec2;
use serde::Serialize;

use crate::frontend::FrontendError;
use crate::sim::agent::{PlayerId, Segment};
use crate::sim::effects::ArenaTransform;
use crate::sim::items::{Item, ItemId, ItemKind};

/// A trail segment leaving the screen
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErasedSegment {
    pub owner: PlayerId,
    pub segment: Segment,
    pub line_width: f64,
}

/// Everything to erase since the previous flush
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EraseSet {
    pub items: Vec<Item>,
    pub segments: Vec<ErasedSegment>,
}

impl EraseSet {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.segments.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.segments.clear();
    }
}

/// One alive agent as the renderer sees it
#[derive(Debug, Clone, Serialize)]
pub struct AgentSprite<'a> {
    pub owner: PlayerId,
    pub color: &'a str,
    pub outline: &'a str,
    pub line_width: f64,
    pub head: DVec2,
    pub boosting: bool,
    pub segments: &'a [Segment],
}

/// One active item as the renderer sees it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ItemSprite {
    pub id: ItemId,
    pub position: DVec2,
    pub radius: f64,
    pub kind: ItemKind,
    pub color: &'static str,
}

impl From<&Item> for ItemSprite {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            position: item.position,
            radius: item.radius,
            kind: item.kind,
            color: item.kind.color(),
        }
    }
}

/// Current draw set
#[derive(Debug, Clone, Serialize)]
pub struct DrawFrame<'a> {
    /// Round tick the frame belongs to
    pub tick: u64,
    pub agents: Vec<AgentSprite<'a>>,
    pub items: Vec<ItemSprite>,
}

/// Whole-screen visual signals
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum VisualCue {
    /// New round: wipe the arena
    ClearArena,
    /// Hallucinogenic background on/off, tagged with the triggering item
    Hallucination { tag: ItemId, active: bool },
    /// Arena transform on/off
    Distortion {
        tag: ItemId,
        transform: ArenaTransform,
        active: bool,
    },
}

/// Screen output
pub trait Renderer {
    /// Erase everything in the set; called every playing tick, even when empty
    fn erase(&mut self, erase: &EraseSet) -> Result<(), FrontendError>;

    /// Draw the current frame
    fn draw(&mut self, frame: &DrawFrame<'_>) -> Result<(), FrontendError>;

    /// Whole-screen effect toggles
    fn visual_cue(&mut self, _cue: VisualCue) -> Result<(), FrontendError> {
        Ok(())
    }
}
