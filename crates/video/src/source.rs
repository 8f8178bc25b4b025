use {
    crate::*,
    base::Vec2,
    image::{Frame, Rotation},
};

/// Stream parameters queried once at session start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub size: Vec2<usize>,
    pub frame_rate: f64,
    /// Clockwise rotation to apply so frames display upright.
    pub rotation: Rotation,
}

/// Decoded video frames in display order.
pub trait FrameSource: Send {
    fn info(&self) -> SourceInfo;

    /// The next RGBA frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn info(&self) -> SourceInfo {
        (**self).info()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        (**self).next_frame()
    }
}
