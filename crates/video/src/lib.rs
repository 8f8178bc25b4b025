//! Streaming video enhancement.
//!
//! A `Pipeline` pulls frames from a `FrameSource`, runs them through an
//! `inference::Enhancer` and feeds the results to a `StreamingEncoder`, whose
//! background worker drives a codec/muxer pair supplied by an `EncoderBackend`.

mod codec;
pub use codec::*;

mod completion;
pub use completion::*;

mod config;
pub use config::*;

mod encoder;
pub use encoder::*;

mod error;
pub use error::*;

mod pipeline;
pub use pipeline::*;

mod raw;
pub use raw::*;

mod source;
pub use source::*;

pub mod y4m;
pub use y4m::{Y4mMuxer, Y4mSource};

pub mod testing;
