use {
    crate::*,
    base::Tensor,
    ort::{inputs, session::Session, value::TensorRef},
    std::path::Path,
};

/// ONNX Runtime session with one image input and one image output.
pub struct OnnxEngine {
    session: Session,
    input_name: String,
    output_name: String,
    input_size: usize,
    output_size: usize,
}

impl OnnxEngine {
    pub fn load(
        model_path: impl AsRef<Path>,
        input_size: usize,
        output_size: usize,
    ) -> Result<Self, InferError> {
        let path = model_path.as_ref();
        let session = Session::builder()
            .and_then(|builder| builder.commit_from_file(path))
            .map_err(|e| {
                InferError::ModelLoad(format!("failed to load {}: {}", path.display(), e))
            })?;

        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .ok_or_else(|| InferError::ModelLoad("model has no inputs".to_string()))?;
        let output_name = session
            .outputs()
            .first()
            .map(|output| output.name().to_string())
            .ok_or_else(|| InferError::ModelLoad("model has no outputs".to_string()))?;
        log::info!(
            "loaded {} ({} -> {}, {}px -> {}px)",
            path.display(),
            input_name,
            output_name,
            input_size,
            output_size
        );

        Ok(Self {
            session,
            input_name,
            output_name,
            input_size,
            output_size,
        })
    }
}

impl InferenceEngine for OnnxEngine {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn run(&mut self, input: &Tensor<f32>, output: &mut Tensor<f32>) -> Result<(), InferError> {
        let shape: Vec<i64> = input.shape.iter().map(|&dim| dim as i64).collect();
        let tensor_ref = TensorRef::from_array_view((shape, input.data.as_slice()))
            .map_err(|e| InferError::Engine(format!("failed to create input tensor: {e}")))?;
        let outputs = self
            .session
            .run(inputs![self.input_name.as_str() => tensor_ref])
            .map_err(|e| InferError::Engine(format!("inference failed: {e}")))?;
        let (_, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferError::Engine(format!("output is not f32: {e}")))?;
        if data.len() != output.len() {
            return Err(InferError::Shape(format!(
                "network produced {} elements, expected {}",
                data.len(),
                output.len()
            )));
        }
        output.data.copy_from_slice(data);
        Ok(())
    }
}
