use {crate::InferError, base::Tensor};

/// A network with fixed square input and output sizes.
///
/// `run` is synchronous and may be slow; callers treat any error as fatal for
/// the frame being processed and never retry.
pub trait InferenceEngine: Send {
    /// Side of the square image the network consumes.
    fn input_size(&self) -> usize;

    /// Side of the square image the network produces.
    fn output_size(&self) -> usize;

    fn run(&mut self, input: &Tensor<f32>, output: &mut Tensor<f32>) -> Result<(), InferError>;
}

/// Copies the input tensor to the output unchanged.
#[derive(Debug, Clone)]
pub struct PassthroughEngine {
    size: usize,
}

impl PassthroughEngine {
    pub fn new(size: usize) -> Self {
        Self { size }
    }
}

impl InferenceEngine for PassthroughEngine {
    fn input_size(&self) -> usize {
        self.size
    }

    fn output_size(&self) -> usize {
        self.size
    }

    fn run(&mut self, input: &Tensor<f32>, output: &mut Tensor<f32>) -> Result<(), InferError> {
        if input.len() != output.len() {
            return Err(InferError::Shape(format!(
                "passthrough needs equal tensors, got {:?} and {:?}",
                input.shape, output.shape
            )));
        }
        output.data.copy_from_slice(&input.data);
        Ok(())
    }
}
