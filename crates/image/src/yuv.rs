//! BT.601 studio-swing conversion between RGBA frames and 4:2:0 YUV layouts.

use {crate::*, base::Vec2};

/// RGB to YUV with the integer BT.601 coefficients used by hardware encoders.
pub fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    (
        y.clamp(0, 255) as u8,
        u.clamp(0, 255) as u8,
        v.clamp(0, 255) as u8,
    )
}

// Exact inverse of the forward matrix above in 8-bit fixed point; keeps the
// round-trip error within 2 levels for every RGB triple.
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let r = (298 * c - d + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 210 * e + 128) >> 8;
    let b = (298 * c + 519 * d + 128) >> 8;
    (
        r.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        b.clamp(0, 255) as u8,
    )
}

/// Convert an RGBA frame into NV12, reusing `out`'s allocation.
///
/// Chroma for each 2x2 block comes from the rounded RGB average of the pixels
/// the block covers (edge blocks of odd-sized frames cover fewer pixels).
pub fn rgba_to_nv12_into(frame: &Frame, out: &mut Vec<u8>) -> Result<(), ImageError> {
    frame.validate()?;
    let Vec2 { x: width, y: height } = frame.size;
    let chroma = chroma_size(frame.size);
    out.clear();
    out.resize(PixelFormat::Nv12.buffer_len(frame.size), 0);
    let (luma, uv) = out.split_at_mut(width * height);

    for (i, pixel) in frame.data.chunks_exact(Frame::BYTES_PER_PIXEL).enumerate() {
        luma[i] = rgb_to_yuv(pixel[0], pixel[1], pixel[2]).0;
    }

    for cy in 0..chroma.y {
        for cx in 0..chroma.x {
            let mut sum = [0u32; 3];
            let mut count = 0u32;
            for y in (cy * 2)..(cy * 2 + 2).min(height) {
                for x in (cx * 2)..(cx * 2 + 2).min(width) {
                    let [r, g, b, _] = frame.pixel(x, y);
                    sum[0] += r as u32;
                    sum[1] += g as u32;
                    sum[2] += b as u32;
                    count += 1;
                }
            }
            let average = |total: u32| ((total + count / 2) / count) as u8;
            let (_, u, v) = rgb_to_yuv(average(sum[0]), average(sum[1]), average(sum[2]));
            let i = (cy * chroma.x + cx) * 2;
            uv[i] = u;
            uv[i + 1] = v;
        }
    }
    Ok(())
}

pub fn rgba_to_nv12(frame: &Frame) -> Result<Vec<u8>, ImageError> {
    let mut out = Vec::new();
    rgba_to_nv12_into(frame, &mut out)?;
    Ok(out)
}

/// Convert NV12 back to RGBA; every pixel of a 2x2 block reuses its chroma.
pub fn nv12_to_rgba(size: Vec2<usize>, data: &[u8]) -> Result<Frame, ImageError> {
    if size.is_empty() {
        return Err(ImageError::InvalidFrame(format!("zero-sized NV12 image ({size})")));
    }
    PixelFormat::Nv12.ensure_len(size, data.len())?;
    let chroma = chroma_size(size);
    let (luma, uv) = data.split_at(size.area());

    let mut rgba = Vec::with_capacity(size.area() * Frame::BYTES_PER_PIXEL);
    for y in 0..size.y {
        for x in 0..size.x {
            let i = ((y / 2) * chroma.x + x / 2) * 2;
            let (r, g, b) = yuv_to_rgb(luma[y * size.x + x], uv[i], uv[i + 1]);
            rgba.extend_from_slice(&[r, g, b, 0xFF]);
        }
    }
    Frame::new(size, rgba)
}

/// Split NV12's interleaved chroma into separate U and V planes.
pub fn nv12_to_i420(size: Vec2<usize>, data: &[u8]) -> Result<Vec<u8>, ImageError> {
    PixelFormat::Nv12.ensure_len(size, data.len())?;
    let chroma_len = chroma_size(size).area();
    let (luma, uv) = data.split_at(size.area());

    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(luma);
    out.extend(uv.iter().step_by(2));
    out.extend(uv.iter().skip(1).step_by(2));
    debug_assert_eq!(out.len(), size.area() + 2 * chroma_len);
    Ok(out)
}

/// Interleave I420's U and V planes into NV12 chroma.
pub fn i420_to_nv12(size: Vec2<usize>, data: &[u8]) -> Result<Vec<u8>, ImageError> {
    PixelFormat::I420.ensure_len(size, data.len())?;
    let chroma_len = chroma_size(size).area();
    let (luma, chroma) = data.split_at(size.area());
    let (u, v) = chroma.split_at(chroma_len);

    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(luma);
    for (&u, &v) in u.iter().zip(v) {
        out.push(u);
        out.push(v);
    }
    Ok(out)
}
