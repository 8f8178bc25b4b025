//! Contract with the platform codec and container muxer.
//!
//! The encoder never talks to a concrete codec; an `EncoderBackend` hands it a
//! `VideoCodec` and a `Muxer` for every session.

use {
    crate::*,
    base::Vec2,
    std::{path::Path, time::Duration},
};

/// Output format negotiated by the codec.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFormat {
    pub mime: String,
    pub size: Vec2<usize>,
    pub frame_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleFlags {
    pub key_frame: bool,
    /// Codec-specific setup data, not media. Never written to the muxer.
    pub codec_config: bool,
    pub end_of_stream: bool,
}

/// One unit of codec output.
#[derive(Clone, PartialEq)]
pub struct EncodedSample {
    pub data: Vec<u8>,
    pub pts_us: i64,
    pub flags: SampleFlags,
}

impl std::fmt::Debug for EncodedSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedSample")
            .field("len", &self.data.len())
            .field("pts_us", &self.pts_us)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Handle to a codec input buffer returned by `VideoCodec::acquire_input`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSlot(pub usize);

/// Result of polling the codec for output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    Sample(EncodedSample),
    /// The codec settled its output format; the muxer can start.
    FormatChanged(VideoFormat),
    /// Nothing available within the timeout.
    TryAgainLater,
    /// A status the encoder does not understand. Logged and skipped.
    Unexpected(i32),
}

/// Hardware (or software) encoder fed with NV12 frames.
pub trait VideoCodec: Send {
    fn configure(&mut self, config: &EncoderConfig) -> Result<(), PipelineError>;

    fn start(&mut self) -> Result<(), PipelineError>;

    /// Wait up to `timeout` for a free input buffer.
    fn acquire_input(&mut self, timeout: Duration) -> Result<Option<InputSlot>, PipelineError>;

    fn queue_input(&mut self, slot: InputSlot, data: &[u8], pts_us: i64)
    -> Result<(), PipelineError>;

    /// No more input follows; the codec eventually emits a sample flagged
    /// `end_of_stream`.
    fn signal_end_of_stream(&mut self) -> Result<(), PipelineError>;

    fn dequeue_output(&mut self, timeout: Duration) -> Result<OutputEvent, PipelineError>;

    /// Stop the codec and free its buffers.
    fn release(&mut self);
}

/// Container writer.
pub trait Muxer: Send {
    /// Add a track for `format`, returning its index. Only valid before `start`.
    fn add_track(&mut self, format: &VideoFormat) -> Result<usize, PipelineError>;

    fn start(&mut self) -> Result<(), PipelineError>;

    fn write_sample(&mut self, track: usize, sample: &EncodedSample) -> Result<(), PipelineError>;

    /// Finish and close the container. Also valid when `start` never ran.
    fn stop(&mut self) -> Result<(), PipelineError>;
}

/// Creates the codec/muxer pair for one session.
pub trait EncoderBackend: Send + Sync {
    fn create_codec(&self, config: &EncoderConfig) -> Result<Box<dyn VideoCodec>, PipelineError>;

    fn create_muxer(
        &self,
        path: &Path,
        config: &EncoderConfig,
    ) -> Result<Box<dyn Muxer>, PipelineError>;
}
