use {base::TensorError, image::ImageError, std::fmt};

#[derive(Debug, Clone, PartialEq)]
pub enum InferError {
    Image(ImageError),
    Tensor(TensorError),
    Shape(String),
    ModelLoad(String),
    Engine(String),
}

impl fmt::Display for InferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferError::Image(err) => write!(f, "image error: {err}"),
            InferError::Tensor(err) => write!(f, "tensor error: {err}"),
            InferError::Shape(msg) => write!(f, "shape error: {msg}"),
            InferError::ModelLoad(msg) => write!(f, "model load error: {msg}"),
            InferError::Engine(msg) => write!(f, "engine error: {msg}"),
        }
    }
}

impl std::error::Error for InferError {}

impl From<ImageError> for InferError {
    fn from(err: ImageError) -> Self {
        InferError::Image(err)
    }
}

impl From<TensorError> for InferError {
    fn from(err: TensorError) -> Self {
        InferError::Tensor(err)
    }
}
