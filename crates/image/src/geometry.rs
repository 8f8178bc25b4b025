//! Fitting arbitrary frames into a square network input and back.
//!
//! `normalize` pads the shorter axis with black so the frame becomes a centered
//! square of side `max(width, height)` and scales that square to the network
//! size. `restore` crops the same centered region out of the network output and
//! scales it back to the original dimensions.

use {crate::*, base::Vec2};

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub origin: Vec2<usize>,
    pub size: Vec2<usize>,
}

impl Region {
    pub fn new(origin: Vec2<usize>, size: Vec2<usize>) -> Self {
        Self { origin, size }
    }

    pub fn full(size: Vec2<usize>) -> Self {
        Self::new(Vec2::new(0, 0), size)
    }
}

/// Where a frame's content sits inside its pad-to-square canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Letterbox {
    pub original: Vec2<usize>,
    pub side: usize,
    pub offset: Vec2<usize>,
}

impl Letterbox {
    pub fn new(original: Vec2<usize>) -> Result<Self, ImageError> {
        if original.is_empty() {
            return Err(ImageError::InvalidFrame(format!(
                "cannot letterbox a {original} frame"
            )));
        }
        let side = original.max_side();
        Ok(Self {
            original,
            side,
            offset: Vec2::new((side - original.x) / 2, (side - original.y) / 2),
        })
    }

    /// Content region inside a square of side `output_size`.
    pub fn content_in(&self, output_size: usize) -> Region {
        let Vec2 { x: width, y: height } = self.original;
        let crop = (output_size * self.original.min_side() / self.side).max(1);
        let offset = (output_size - crop) / 2;
        if width >= height {
            Region::new(Vec2::new(0, offset), Vec2::new(output_size, crop))
        } else {
            Region::new(Vec2::new(offset, 0), Vec2::new(crop, output_size))
        }
    }
}

// bilinear sample at (fx, fy), never reading outside `bounds`
fn sample(src: &Frame, bounds: Region, fx: f32, fy: f32) -> [u8; 4] {
    let max_x = (bounds.origin.x + bounds.size.x - 1) as f32;
    let max_y = (bounds.origin.y + bounds.size.y - 1) as f32;
    let fx = fx.clamp(bounds.origin.x as f32, max_x);
    let fy = fy.clamp(bounds.origin.y as f32, max_y);
    let x0 = fx.floor() as usize;
    let y0 = fy.floor() as usize;
    let x1 = (x0 + 1).min(max_x as usize);
    let y1 = (y0 + 1).min(max_y as usize);
    let tx = fx - x0 as f32;
    let ty = fy - y0 as f32;

    let p00 = src.pixel(x0, y0);
    let p10 = src.pixel(x1, y0);
    let p01 = src.pixel(x0, y1);
    let p11 = src.pixel(x1, y1);
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] as f32 * (1.0 - tx) + p10[c] as f32 * tx;
        let bottom = p01[c] as f32 * (1.0 - tx) + p11[c] as f32 * tx;
        out[c] = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Scale `region` of `src` to `size` into `out` (bilinear, pixel-center aligned).
pub fn resize_into(src: &Frame, region: Region, size: Vec2<usize>, out: &mut Frame) {
    out.reset(size);
    let scale_x = region.size.x as f32 / size.x as f32;
    let scale_y = region.size.y as f32 / size.y as f32;
    for dy in 0..size.y {
        let fy = region.origin.y as f32 + (dy as f32 + 0.5) * scale_y - 0.5;
        for dx in 0..size.x {
            let fx = region.origin.x as f32 + (dx as f32 + 0.5) * scale_x - 0.5;
            out.set_pixel(dx, dy, sample(src, region, fx, fy));
        }
    }
}

/// Pad `frame` to a centered square and scale it to `target x target` in `out`.
pub fn normalize_into(
    frame: &Frame,
    target: usize,
    out: &mut Frame,
) -> Result<Letterbox, ImageError> {
    frame.validate()?;
    if target == 0 {
        return Err(ImageError::InvalidFrame("network input size is 0".to_string()));
    }
    let letterbox = Letterbox::new(frame.size)?;
    let content = Region::full(frame.size);
    let scale = letterbox.side as f32 / target as f32;

    out.reset(Vec2::new(target, target));
    for dy in 0..target {
        // square-canvas pixel covering this output pixel's center
        let sy = (dy * 2 + 1) * letterbox.side / (target * 2);
        if sy < letterbox.offset.y || sy >= letterbox.offset.y + frame.size.y {
            continue;
        }
        let fy = (dy as f32 + 0.5) * scale - 0.5 - letterbox.offset.y as f32;
        for dx in 0..target {
            let sx = (dx * 2 + 1) * letterbox.side / (target * 2);
            if sx < letterbox.offset.x || sx >= letterbox.offset.x + frame.size.x {
                continue;
            }
            let fx = (dx as f32 + 0.5) * scale - 0.5 - letterbox.offset.x as f32;
            out.set_pixel(dx, dy, sample(frame, content, fx, fy));
        }
    }
    Ok(letterbox)
}

/// Returns the square network input together with the original dimensions.
pub fn normalize(frame: &Frame, target: usize) -> Result<(Frame, Vec2<usize>), ImageError> {
    let mut out = Frame::black(Vec2::new(0, 0));
    let letterbox = normalize_into(frame, target, &mut out)?;
    Ok((out, letterbox.original))
}

/// Crop the letterboxed content out of a square network output and scale it
/// back to `original` in `out`.
pub fn restore_into(
    enhanced: &Frame,
    original: Vec2<usize>,
    out: &mut Frame,
) -> Result<(), ImageError> {
    enhanced.validate()?;
    if enhanced.size.x != enhanced.size.y {
        return Err(ImageError::InvalidFrame(format!(
            "network output must be square, got {}",
            enhanced.size
        )));
    }
    let letterbox = Letterbox::new(original)?;
    let region = letterbox.content_in(enhanced.size.x);
    resize_into(enhanced, region, original, out);
    Ok(())
}

pub fn restore(
    enhanced: &Frame,
    original_width: usize,
    original_height: usize,
) -> Result<Frame, ImageError> {
    let mut out = Frame::black(Vec2::new(0, 0));
    restore_into(enhanced, Vec2::new(original_width, original_height), &mut out)?;
    Ok(out)
}

/// Rotate `src` clockwise by `rotation` into `out`.
pub fn rotate_into(src: &Frame, rotation: Rotation, out: &mut Frame) {
    let Vec2 { x: width, y: height } = src.size;
    out.reset(rotation.apply_to(src.size));
    for dy in 0..out.size.y {
        for dx in 0..out.size.x {
            let (sx, sy) = match rotation {
                Rotation::Deg0 => (dx, dy),
                Rotation::Deg90 => (dy, height - 1 - dx),
                Rotation::Deg180 => (width - 1 - dx, height - 1 - dy),
                Rotation::Deg270 => (width - 1 - dy, dx),
            };
            out.set_pixel(dx, dy, src.pixel(sx, sy));
        }
    }
}

pub fn rotate(src: &Frame, rotation: Rotation) -> Frame {
    let mut out = Frame::black(Vec2::new(0, 0));
    rotate_into(src, rotation, &mut out);
    out
}
