use base::{Tensor, Vec2};
use image::Frame;
use inference::{ChannelOrder, InferError, TensorCodec, TensorCodecConfig, TensorLayout, ValueRange};

fn two_pixels() -> Frame {
    Frame::new(Vec2::new(2, 1), vec![10, 20, 30, 255, 40, 50, 60, 255]).unwrap()
}

fn scaled(values: &[u8]) -> Vec<f32> {
    values.iter().map(|&v| v as f32 / 255.0).collect()
}

#[test]
fn test_encode_planar_writes_channel_by_channel() {
    let codec = TensorCodec::default();
    let tensor = codec.encode(&two_pixels()).unwrap();
    assert_eq!(tensor.shape, vec![1, 3, 1, 2]);
    assert_eq!(tensor.data, scaled(&[10, 40, 20, 50, 30, 60]));
}

#[test]
fn test_encode_interleaved_bgr() {
    let codec = TensorCodec::new(
        TensorCodecConfig::default()
            .with_layout(TensorLayout::Interleaved)
            .with_order(ChannelOrder::Bgr),
    );
    let tensor = codec.encode(&two_pixels()).unwrap();
    assert_eq!(tensor.shape, vec![1, 1, 2, 3]);
    assert_eq!(tensor.data, scaled(&[30, 20, 10, 60, 50, 40]));
    assert_eq!(codec.decode(&tensor, 2, 1).unwrap(), two_pixels());
}

#[test]
fn test_encode_minus_one_to_one() {
    let codec =
        TensorCodec::new(TensorCodecConfig::default().with_range(ValueRange::MinusOneToOne));
    let frame = Frame::new(Vec2::new(1, 1), vec![0, 255, 0, 255]).unwrap();
    let tensor = codec.encode(&frame).unwrap();
    assert_eq!(tensor.data, vec![-1.0, 1.0, -1.0]);
}

#[test]
fn test_tensor_byte_size() {
    let frame = Frame::black(Vec2::new(256, 256));
    let tensor = TensorCodec::default().encode(&frame).unwrap();
    assert_eq!(tensor.byte_len(), 3 * 256 * 256 * 4);
}

#[test]
fn test_round_trip_every_level_in_both_ranges() {
    let mut data = Vec::new();
    for v in 0..=255u8 {
        data.extend_from_slice(&[v, 255 - v, v / 2, 255]);
    }
    let frame = Frame::new(Vec2::new(16, 16), data).unwrap();

    for range in [ValueRange::ZeroToOne, ValueRange::MinusOneToOne] {
        for layout in [TensorLayout::Planar, TensorLayout::Interleaved] {
            let config = TensorCodecConfig::default()
                .with_range(range)
                .with_layout(layout);
            let codec = TensorCodec::new(config);
            let back = codec.decode(&codec.encode(&frame).unwrap(), 16, 16).unwrap();
            for (a, b) in frame.data.iter().zip(&back.data) {
                assert!((*a as i32 - *b as i32).abs() <= 1, "{range:?} {layout:?}: {a} -> {b}");
            }
        }
    }
}

#[test]
fn test_mismatched_ranges_corrupt_color() {
    let frame = Frame::filled(Vec2::new(1, 1), [128, 128, 128, 255]);
    let encoder =
        TensorCodec::new(TensorCodecConfig::default().with_range(ValueRange::MinusOneToOne));
    let decoder = TensorCodec::default();
    let back = decoder.decode(&encoder.encode(&frame).unwrap(), 1, 1).unwrap();
    assert_ne!(back.pixel(0, 0), [128, 128, 128, 255]);
}

#[test]
fn test_decode_clamps_out_of_range_values() {
    let tensor = Tensor::new(vec![1, 3, 1, 1], vec![1.7, -0.4, f32::NAN]).unwrap();
    let frame = TensorCodec::default().decode(&tensor, 1, 1).unwrap();
    assert_eq!(frame.pixel(0, 0), [255, 0, 0, 255]);
}

#[test]
fn test_renormalize_stretches_each_channel() {
    let codec = TensorCodec::new(TensorCodecConfig::default().with_renormalize(true));
    // R spans 0.2..0.6, G is flat, B spans -3..5
    let tensor = Tensor::new(vec![1, 3, 1, 2], vec![0.2, 0.6, 0.5, 0.5, -3.0, 5.0]).unwrap();
    let frame = codec.decode(&tensor, 2, 1).unwrap();
    assert_eq!(frame.pixel(0, 0), [0, 128, 0, 255]);
    assert_eq!(frame.pixel(1, 0), [255, 128, 255, 255]);
}

#[test]
fn test_decode_rejects_wrong_length() {
    let tensor = Tensor::<f32>::zeros(vec![1, 3, 4, 4]).unwrap();
    let result = TensorCodec::default().decode(&tensor, 5, 4);
    assert!(matches!(result, Err(InferError::Shape(_))));
}

#[test]
fn test_encode_into_reuses_allocation() {
    let codec = TensorCodec::default();
    let frame = Frame::filled(Vec2::new(8, 8), [1, 2, 3, 255]);
    let mut tensor = codec.encode(&frame).unwrap();
    let before = tensor.data.as_ptr();
    codec.encode_into(&Frame::filled(Vec2::new(8, 8), [9, 9, 9, 255]), &mut tensor).unwrap();
    assert_eq!(tensor.data.as_ptr(), before);
    assert_eq!(tensor.data[0], 9.0 / 255.0);
}

#[test]
fn test_config_from_json_uses_defaults() {
    let config: TensorCodecConfig =
        serde_json::from_str(r#"{ "range": "minus_one_to_one" }"#).unwrap();
    assert_eq!(config.range(), ValueRange::MinusOneToOne);
    assert_eq!(config.layout(), TensorLayout::Planar);
    assert_eq!(config.order(), ChannelOrder::Rgb);
    assert!(!config.renormalize());
}
