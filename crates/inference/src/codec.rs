//! Pixel <-> tensor marshalling.
//!
//! One `TensorCodecConfig` is shared by the encode and decode call sites, so the
//! value range a network was trained with is stated exactly once.

use {
    crate::InferError,
    base::{Tensor, Vec2},
    image::Frame,
    serde::{Deserialize, Serialize},
};

const CHANNELS: usize = 3;

/// Mapping between 8-bit channel values and tensor elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueRange {
    /// `v / 255`
    #[default]
    ZeroToOne,
    /// `v / 255 * 2 - 1`
    MinusOneToOne,
}

impl ValueRange {
    pub fn to_tensor(&self, value: u8) -> f32 {
        let unit = value as f32 / 255.0;
        match self {
            ValueRange::ZeroToOne => unit,
            ValueRange::MinusOneToOne => unit * 2.0 - 1.0,
        }
    }

    pub fn to_pixel(&self, value: f32) -> u8 {
        let unit = match self {
            ValueRange::ZeroToOne => value,
            ValueRange::MinusOneToOne => (value + 1.0) / 2.0,
        };
        quantize(unit * 255.0)
    }
}

// NaN maps to 0
fn quantize(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

impl ChannelOrder {
    // RGBA byte offset feeding tensor channel `channel`
    fn pixel_offset(&self, channel: usize) -> usize {
        match self {
            ChannelOrder::Rgb => channel,
            ChannelOrder::Bgr => CHANNELS - 1 - channel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
    /// `[1, 3, H, W]`: all of channel 0, then channel 1, then channel 2.
    #[default]
    Planar,
    /// `[1, H, W, 3]`
    Interleaved,
}

impl TensorLayout {
    pub fn shape(&self, size: Vec2<usize>) -> Vec<usize> {
        match self {
            TensorLayout::Planar => vec![1, CHANNELS, size.y, size.x],
            TensorLayout::Interleaved => vec![1, size.y, size.x, CHANNELS],
        }
    }

    fn index(&self, size: Vec2<usize>, channel: usize, pixel: usize) -> usize {
        match self {
            TensorLayout::Planar => channel * size.area() + pixel,
            TensorLayout::Interleaved => pixel * CHANNELS + channel,
        }
    }
}

/// Configuration shared by tensor encode and decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TensorCodecConfig {
    range: ValueRange,
    order: ChannelOrder,
    layout: TensorLayout,
    renormalize: bool,
}

impl TensorCodecConfig {
    pub fn with_range(mut self, range: ValueRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_order(mut self, order: ChannelOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Stretch each decoded channel's min..max to 0..255 instead of applying
    /// the fixed range mapping. Only for networks whose output range is unknown.
    pub fn with_renormalize(mut self, renormalize: bool) -> Self {
        self.renormalize = renormalize;
        self
    }

    pub fn range(&self) -> ValueRange {
        self.range
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    pub fn renormalize(&self) -> bool {
        self.renormalize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TensorCodec {
    config: TensorCodecConfig,
}

impl TensorCodec {
    pub fn new(config: TensorCodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TensorCodecConfig {
        &self.config
    }

    /// Tensor shape for a frame of `size`.
    pub fn shape(&self, size: Vec2<usize>) -> Vec<usize> {
        self.config.layout.shape(size)
    }

    /// Encode `frame` into `tensor`, reusing the tensor's allocation.
    pub fn encode_into(&self, frame: &Frame, tensor: &mut Tensor<f32>) -> Result<(), InferError> {
        frame.validate()?;
        let shape = self.shape(frame.size);
        if tensor.shape != shape || tensor.len() != frame.size.area() * CHANNELS {
            tensor.reshape(shape)?;
        }
        let layout = self.config.layout;
        for (pixel, rgba) in frame.data.chunks_exact(Frame::BYTES_PER_PIXEL).enumerate() {
            for channel in 0..CHANNELS {
                let value = rgba[self.config.order.pixel_offset(channel)];
                tensor.data[layout.index(frame.size, channel, pixel)] =
                    self.config.range.to_tensor(value);
            }
        }
        Ok(())
    }

    pub fn encode(&self, frame: &Frame) -> Result<Tensor<f32>, InferError> {
        let mut tensor = Tensor::zeros(self.shape(frame.size))?;
        self.encode_into(frame, &mut tensor)?;
        Ok(tensor)
    }

    /// Decode `tensor` as a `size` frame into `frame`, reusing its allocation.
    pub fn decode_into(
        &self,
        tensor: &Tensor<f32>,
        size: Vec2<usize>,
        frame: &mut Frame,
    ) -> Result<(), InferError> {
        if size.is_empty() {
            return Err(InferError::Shape(format!("cannot decode a {size} frame")));
        }
        let expected = size.area() * CHANNELS;
        if tensor.len() != expected {
            return Err(InferError::Shape(format!(
                "tensor of {} elements cannot hold a {} frame ({} elements)",
                tensor.len(),
                size,
                expected
            )));
        }
        let layout = self.config.layout;
        let mut stretch = [None; CHANNELS];
        if self.config.renormalize {
            for (channel, bounds) in stretch.iter_mut().enumerate() {
                *bounds = channel_bounds(tensor, layout, size, channel);
            }
        }

        frame.reset(size);
        for pixel in 0..size.area() {
            let base = pixel * Frame::BYTES_PER_PIXEL;
            for channel in 0..CHANNELS {
                let value = tensor.data[layout.index(size, channel, pixel)];
                let pixel_value = match stretch[channel] {
                    Some((min, max)) => quantize((value - min) / (max - min) * 255.0),
                    None => self.config.range.to_pixel(value),
                };
                frame.data[base + self.config.order.pixel_offset(channel)] = pixel_value;
            }
        }
        Ok(())
    }

    pub fn decode(
        &self,
        tensor: &Tensor<f32>,
        width: usize,
        height: usize,
    ) -> Result<Frame, InferError> {
        let mut frame = Frame::black(Vec2::new(0, 0));
        self.decode_into(tensor, Vec2::new(width, height), &mut frame)?;
        Ok(frame)
    }
}

// (min, max) of one channel, or None when the channel is flat
fn channel_bounds(
    tensor: &Tensor<f32>,
    layout: TensorLayout,
    size: Vec2<usize>,
    channel: usize,
) -> Option<(f32, f32)> {
    let (min, max) = (0..size.area())
        .map(|pixel| tensor.data[layout.index(size, channel, pixel)])
        .filter(|value| value.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), v| {
            (min.min(v), max.max(v))
        });
    (max > min).then_some((min, max))
}
