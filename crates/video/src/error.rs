use {image::ImageError, inference::InferError, std::fmt};

/// Failure of an enhancement session.
///
/// Cloneable so the same error can be stored by the encoder worker and handed
/// to the completion signal.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Malformed or zero-sized input.
    InvalidFrame(String),
    /// The codec or muxer could not be set up.
    ConfigurationFailure(String),
    /// The inference engine failed.
    InferenceFailure(String),
    /// A codec or muxer call failed mid-stream.
    EncodingFailure(String),
    /// The source ended before producing a single frame.
    SourceExhaustedWithNoFrames,
    /// The frame source could not be read.
    Source(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidFrame(msg) => write!(f, "invalid frame: {msg}"),
            PipelineError::ConfigurationFailure(msg) => write!(f, "configuration failure: {msg}"),
            PipelineError::InferenceFailure(msg) => write!(f, "inference failure: {msg}"),
            PipelineError::EncodingFailure(msg) => write!(f, "encoding failure: {msg}"),
            PipelineError::SourceExhaustedWithNoFrames => {
                write!(f, "source ended without producing any frames")
            }
            PipelineError::Source(msg) => write!(f, "source error: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<ImageError> for PipelineError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::InvalidFrame(msg) => PipelineError::InvalidFrame(msg),
            other => PipelineError::Source(other.to_string()),
        }
    }
}

impl From<InferError> for PipelineError {
    fn from(err: InferError) -> Self {
        match err {
            InferError::Image(ImageError::InvalidFrame(msg)) => PipelineError::InvalidFrame(msg),
            other => PipelineError::InferenceFailure(other.to_string()),
        }
    }
}
