//! Render hook invoked at checkpoints.

use culturesim_types::RenderableState;

/// Receives a copy of the grid after every checkpoint batch.
///
/// Implementations run on the run's worker thread and should return
/// quickly. Frames are only built for sinks that ask for them.
pub trait RenderSink: Send {
    /// Whether [`render`](Self::render) wants frames at all.
    fn wants_frames(&self) -> bool {
        true
    }

    /// Called after a checkpoint row is recorded.
    fn render(&mut self, state: &RenderableState);
}

/// A render sink that ignores every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpRender;

impl RenderSink for NoOpRender {
    fn wants_frames(&self) -> bool {
        false
    }

    fn render(&mut self, _state: &RenderableState) {}
}
