use {
    crate::*,
    base::{Tensor, Vec2},
    image::{Frame, Rotation, geometry},
};

/// Per-frame enhancement: rotate, letterbox, encode, infer, decode, restore.
///
/// All intermediate buffers are allocated once and reused for every frame, so
/// long videos run in constant memory.
pub struct Enhancer {
    engine: Box<dyn InferenceEngine>,
    codec: TensorCodec,
    rotated: Frame,
    square: Frame,
    input: Tensor<f32>,
    output: Tensor<f32>,
    enhanced: Frame,
    restored: Frame,
}

impl Enhancer {
    pub fn new(
        engine: Box<dyn InferenceEngine>,
        config: TensorCodecConfig,
    ) -> Result<Self, InferError> {
        let input_size = engine.input_size();
        let output_size = engine.output_size();
        if input_size == 0 || output_size == 0 {
            return Err(InferError::Shape(format!(
                "network sizes must be non-zero (input {input_size}, output {output_size})"
            )));
        }
        let codec = TensorCodec::new(config);
        let input = Tensor::zeros(codec.shape(Vec2::new(input_size, input_size)))?;
        let output = Tensor::zeros(codec.shape(Vec2::new(output_size, output_size)))?;
        log::debug!(
            "enhancer: network {}px -> {}px, input tensor {} bytes",
            input_size,
            output_size,
            input.byte_len()
        );
        Ok(Self {
            engine,
            codec,
            rotated: Frame::black(Vec2::new(0, 0)),
            square: Frame::black(Vec2::new(input_size, input_size)),
            input,
            output,
            enhanced: Frame::black(Vec2::new(output_size, output_size)),
            restored: Frame::black(Vec2::new(0, 0)),
        })
    }

    pub fn input_size(&self) -> usize {
        self.engine.input_size()
    }

    /// Size of the frame `process` returns for a source frame of `size`.
    pub fn output_size_for(size: Vec2<usize>, rotation: Rotation) -> Vec2<usize> {
        rotation.apply_to(size)
    }

    /// Enhance one frame. The result borrows the enhancer's scratch buffer and
    /// is overwritten by the next call.
    pub fn process(&mut self, frame: &Frame) -> Result<&Frame, InferError> {
        frame.validate()?;
        let upright = if frame.rotation == Rotation::Deg0 {
            frame
        } else {
            geometry::rotate_into(frame, frame.rotation, &mut self.rotated);
            &self.rotated
        };

        let input_size = self.engine.input_size();
        let output_size = self.engine.output_size();
        let letterbox = geometry::normalize_into(upright, input_size, &mut self.square)?;
        self.codec.encode_into(&self.square, &mut self.input)?;
        self.engine.run(&self.input, &mut self.output)?;
        self.codec.decode_into(
            &self.output,
            Vec2::new(output_size, output_size),
            &mut self.enhanced,
        )?;
        geometry::restore_into(&self.enhanced, letterbox.original, &mut self.restored)?;
        Ok(&self.restored)
    }

    /// Enhance a still image, returning an owned frame.
    pub fn enhance(&mut self, frame: &Frame) -> Result<Frame, InferError> {
        self.process(frame).cloned()
    }
}
