//! Marshalling between frames and network tensors, and the per-frame
//! enhancement stage built on top of an `InferenceEngine`.

pub mod codec;
pub mod enhancer;
pub mod engine;
pub mod error;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use codec::{ChannelOrder, TensorCodec, TensorCodecConfig, TensorLayout, ValueRange};
pub use engine::{InferenceEngine, PassthroughEngine};
pub use enhancer::Enhancer;
pub use error::InferError;

#[cfg(feature = "onnx")]
pub use onnx::OnnxEngine;
