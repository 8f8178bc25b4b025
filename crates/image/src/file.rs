use {
    crate::*,
    base::Vec2,
    crates_image::{ImageEncoder, codecs::png::PngEncoder},
    std::path::Path,
};

fn decode_frame_inner(data: &[u8]) -> Result<Frame, ImageError> {
    let rgba = crates_image::load_from_memory(data)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    Frame::new(Vec2::new(width as usize, height as usize), rgba.into_raw())
}

/// Decodes a still image (PNG, JPEG, BMP, WebP) into an RGBA frame.
///
/// The CPU-bound decoding work runs on tokio's blocking thread pool.
pub async fn decode_frame(data: &[u8]) -> Result<Frame, ImageError> {
    let owned = data.to_vec();
    tokio::task::spawn_blocking(move || decode_frame_inner(&owned))
        .await
        .map_err(|e| ImageError::Decode(e.to_string()))?
}

pub fn load_frame(path: impl AsRef<Path>) -> Result<Frame, ImageError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let frame = decode_frame_inner(&data)?;
    log::debug!("loaded {} frame from {}", frame.size, path.display());
    Ok(frame)
}

/// Encodes a frame as lossless PNG bytes.
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>, ImageError> {
    frame.validate()?;
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(
            &frame.data,
            frame.size.x as u32,
            frame.size.y as u32,
            crates_image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    Ok(buffer)
}

pub fn save_png(path: impl AsRef<Path>, frame: &Frame) -> Result<(), ImageError> {
    let bytes = encode_png(frame)?;
    std::fs::write(path, bytes)?;
    Ok(())
}
