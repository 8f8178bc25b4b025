use base::Vec2;
use image::{
    Frame, ImageError, PixelFormat, nv12_to_rgba, rgba_to_nv12,
    yuv::{i420_to_nv12, nv12_to_i420, rgb_to_yuv, yuv_to_rgb},
};

#[test]
fn test_studio_swing_extremes() {
    assert_eq!(rgb_to_yuv(0, 0, 0), (16, 128, 128));
    assert_eq!(rgb_to_yuv(255, 255, 255), (235, 128, 128));
    assert_eq!(yuv_to_rgb(16, 128, 128), (0, 0, 0));
    assert_eq!(yuv_to_rgb(235, 128, 128), (255, 255, 255));
}

#[test]
fn test_nv12_layout() {
    let frame = Frame::filled(Vec2::new(2, 2), [255, 0, 0, 255]);
    let nv12 = rgba_to_nv12(&frame).unwrap();
    // four luma samples, then one interleaved U/V pair
    assert_eq!(nv12, vec![82, 82, 82, 82, 90, 240]);
}

#[test]
fn test_nv12_length_for_odd_sizes() {
    let frame = Frame::filled(Vec2::new(3, 3), [9, 9, 9, 255]);
    let nv12 = rgba_to_nv12(&frame).unwrap();
    assert_eq!(nv12.len(), 9 + 2 * 4);
    assert_eq!(nv12.len(), PixelFormat::Nv12.buffer_len(Vec2::new(3, 3)));
    let back = nv12_to_rgba(Vec2::new(3, 3), &nv12).unwrap();
    assert_eq!(back.size, Vec2::new(3, 3));
}

// every color sits in its own 2x2 block, so chroma subsampling loses nothing
#[test]
fn test_color_round_trip_within_two_levels() {
    let levels: Vec<u8> = (0..=255u32).step_by(17).map(|v| v as u8).collect();
    let mut colors = Vec::new();
    for &r in &levels {
        for &g in &levels {
            for &b in &levels {
                colors.push([r, g, b, 255u8]);
            }
        }
    }
    let blocks = 64;
    assert_eq!(colors.len(), blocks * blocks);

    let size = Vec2::new(blocks * 2, blocks * 2);
    let mut frame = Frame::black(size);
    for (i, color) in colors.iter().enumerate() {
        let (bx, by) = ((i % blocks) * 2, (i / blocks) * 2);
        for (x, y) in [(bx, by), (bx + 1, by), (bx, by + 1), (bx + 1, by + 1)] {
            frame.set_pixel(x, y, *color);
        }
    }

    let back = nv12_to_rgba(size, &rgba_to_nv12(&frame).unwrap()).unwrap();
    for (a, b) in frame.data.chunks_exact(4).zip(back.data.chunks_exact(4)) {
        for c in 0..3 {
            assert!(
                (a[c] as i32 - b[c] as i32).abs() <= 2,
                "{:?} came back as {:?}",
                a,
                b
            );
        }
        assert_eq!(b[3], 255);
    }
}

#[test]
fn test_i420_nv12_conversion_is_lossless() {
    let size = Vec2::new(4, 2);
    let i420: Vec<u8> = (0..12).collect();
    let nv12 = i420_to_nv12(size, &i420).unwrap();
    assert_eq!(nv12, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 9, 11]);
    assert_eq!(nv12_to_i420(size, &nv12).unwrap(), i420);
}

#[test]
fn test_nv12_wrong_length_is_rejected() {
    let result = nv12_to_rgba(Vec2::new(4, 4), &[0; 10]);
    assert!(matches!(result, Err(ImageError::InvalidFrame(_))));
}

#[test]
fn test_checked_buffer_len() {
    let size = Vec2::new(5, 3);
    assert_eq!(PixelFormat::I420.checked_buffer_len(size), Some(15 + 2 * 6));
    assert_eq!(PixelFormat::Rgba8.checked_buffer_len(size), Some(60));
    assert_eq!(PixelFormat::Nv12.checked_buffer_len(Vec2::new(usize::MAX, 2)), None);
    assert_eq!(PixelFormat::Rgba8.checked_buffer_len(Vec2::new(usize::MAX / 2, 1)), None);
}
