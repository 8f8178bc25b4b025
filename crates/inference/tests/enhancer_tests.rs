use base::{Tensor, Vec2};
use image::{Frame, Rotation};
use inference::{
    Enhancer, InferError, InferenceEngine, PassthroughEngine, TensorCodecConfig, ValueRange,
};

// Network that shrinks its output to half the input side and fills it with one value.
struct FlatEngine {
    size: usize,
    value: f32,
}

impl InferenceEngine for FlatEngine {
    fn input_size(&self) -> usize {
        self.size
    }

    fn output_size(&self) -> usize {
        self.size / 2
    }

    fn run(&mut self, _input: &Tensor<f32>, output: &mut Tensor<f32>) -> Result<(), InferError> {
        output.data.fill(self.value);
        Ok(())
    }
}

struct BrokenEngine;

impl InferenceEngine for BrokenEngine {
    fn input_size(&self) -> usize {
        8
    }

    fn output_size(&self) -> usize {
        8
    }

    fn run(&mut self, _input: &Tensor<f32>, _output: &mut Tensor<f32>) -> Result<(), InferError> {
        Err(InferError::Engine("device lost".to_string()))
    }
}

#[test]
fn test_passthrough_keeps_size_and_color() {
    let mut enhancer =
        Enhancer::new(Box::new(PassthroughEngine::new(256)), TensorCodecConfig::default()).unwrap();
    let frame = Frame::filled(Vec2::new(640, 360), [40, 80, 120, 255]);
    let out = enhancer.process(&frame).unwrap();
    assert_eq!(out.size, Vec2::new(640, 360));
    assert_eq!(out.pixel(0, 0), [40, 80, 120, 255]);
    assert_eq!(out.pixel(639, 359), [40, 80, 120, 255]);
    assert_eq!(out.pixel(320, 180), [40, 80, 120, 255]);
}

#[test]
fn test_passthrough_minus_one_to_one() {
    let config = TensorCodecConfig::default().with_range(ValueRange::MinusOneToOne);
    let mut enhancer = Enhancer::new(Box::new(PassthroughEngine::new(64)), config).unwrap();
    let frame = Frame::filled(Vec2::new(50, 90), [200, 10, 99, 255]);
    let out = enhancer.enhance(&frame).unwrap();
    assert_eq!(out.size, Vec2::new(50, 90));
    assert_eq!(out.pixel(25, 45), [200, 10, 99, 255]);
}

#[test]
fn test_smaller_network_output_is_restored_to_source_size() {
    let engine = FlatEngine {
        size: 64,
        value: 1.0,
    };
    let mut enhancer = Enhancer::new(Box::new(engine), TensorCodecConfig::default()).unwrap();
    let frame = Frame::black(Vec2::new(300, 120));
    let out = enhancer.process(&frame).unwrap();
    assert_eq!(out.size, Vec2::new(300, 120));
    assert!(out.data.iter().all(|&b| b == 255));
}

#[test]
fn test_rotated_source_is_processed_upright() {
    let mut enhancer =
        Enhancer::new(Box::new(PassthroughEngine::new(32)), TensorCodecConfig::default()).unwrap();
    let frame = Frame::filled(Vec2::new(160, 90), [10, 10, 10, 255]).with_rotation(Rotation::Deg90);
    let out = enhancer.process(&frame).unwrap();
    assert_eq!(out.size, Vec2::new(90, 160));
    assert_eq!(
        Enhancer::output_size_for(frame.size, frame.rotation),
        Vec2::new(90, 160)
    );
    assert_eq!(out.rotation, Rotation::Deg0);
}

#[test]
fn test_buffers_are_reused_across_frames() {
    let mut enhancer =
        Enhancer::new(Box::new(PassthroughEngine::new(16)), TensorCodecConfig::default()).unwrap();
    let first = Frame::filled(Vec2::new(40, 30), [1, 2, 3, 255]);
    let second = Frame::filled(Vec2::new(40, 30), [50, 60, 70, 255]);
    let ptr = enhancer.process(&first).unwrap().data.as_ptr();
    let out = enhancer.process(&second).unwrap();
    assert_eq!(out.data.as_ptr(), ptr);
    assert_eq!(out.pixel(10, 10), [50, 60, 70, 255]);
}

#[test]
fn test_engine_error_is_returned() {
    let mut enhancer = Enhancer::new(Box::new(BrokenEngine), TensorCodecConfig::default()).unwrap();
    let result = enhancer.process(&Frame::black(Vec2::new(4, 4)));
    assert_eq!(result.unwrap_err(), InferError::Engine("device lost".to_string()));
}

#[test]
fn test_invalid_frame_is_rejected() {
    let mut enhancer =
        Enhancer::new(Box::new(PassthroughEngine::new(16)), TensorCodecConfig::default()).unwrap();
    let frame = Frame {
        size: Vec2::new(4, 4),
        data: vec![0; 10],
        rotation: Rotation::Deg0,
    };
    assert!(matches!(enhancer.process(&frame), Err(InferError::Image(_))));
}

#[test]
fn test_zero_network_size_is_rejected() {
    let result = Enhancer::new(Box::new(PassthroughEngine::new(0)), TensorCodecConfig::default());
    assert!(matches!(result, Err(InferError::Shape(_))));
}
