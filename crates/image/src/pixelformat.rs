use {crate::*, base::Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Interleaved 8-bit RGBA, the in-pipeline format.
    Rgba8,
    /// Full-resolution luma plane followed by interleaved half-resolution U/V.
    Nv12,
    /// Luma plane followed by separate U and V planes (YUV4MPEG2 C420).
    I420,
}

impl PixelFormat {
    /// Number of bytes one image of `size` occupies in this format.
    pub fn buffer_len(&self, size: Vec2<usize>) -> usize {
        match self {
            PixelFormat::Rgba8 => size.area() * Frame::BYTES_PER_PIXEL,
            PixelFormat::Nv12 | PixelFormat::I420 => {
                let chroma = chroma_size(size);
                size.area() + 2 * chroma.area()
            }
        }
    }

    /// `buffer_len`, or `None` if it does not fit in `usize`.
    pub fn checked_buffer_len(&self, size: Vec2<usize>) -> Option<usize> {
        let area = size.x.checked_mul(size.y)?;
        match self {
            PixelFormat::Rgba8 => area.checked_mul(Frame::BYTES_PER_PIXEL),
            PixelFormat::Nv12 | PixelFormat::I420 => {
                let chroma = chroma_size(size);
                chroma.x.checked_mul(chroma.y)?.checked_mul(2)?.checked_add(area)
            }
        }
    }

    pub fn ensure_len(&self, size: Vec2<usize>, len: usize) -> Result<(), ImageError> {
        let expected = self.buffer_len(size);
        if len != expected {
            return Err(ImageError::InvalidFrame(format!(
                "{:?} buffer for {} must be {} bytes, got {}",
                self, size, expected, len
            )));
        }
        Ok(())
    }
}

/// Dimensions of a 4:2:0 chroma plane; odd sizes round up.
pub fn chroma_size(size: Vec2<usize>) -> Vec2<usize> {
    Vec2::new(size.x.div_ceil(2), size.y.div_ceil(2))
}
