//! Frame buffers and pixel transforms for the enhancement pipeline.
//!
//! In-pipeline frames are interleaved RGBA8. This crate owns the geometry
//! normalizer/restorer that fits frames to a square network input, the
//! BT.601 NV12 converter consumed by video encoders, and still-image file I/O.

mod error;
pub use error::*;

mod frame;
pub use frame::*;

mod pixelformat;
pub use pixelformat::*;

pub mod geometry;
pub use geometry::{Letterbox, Region, normalize, normalize_into, restore, restore_into};

pub mod yuv;
pub use yuv::{nv12_to_rgba, rgba_to_nv12, rgba_to_nv12_into};

mod file;
pub use file::*;
