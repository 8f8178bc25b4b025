use {crate::*, base::Vec2, std::fmt};

/// Clockwise rotation the source asks the player to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Accepts any multiple of 90, including negative values.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    pub fn swaps_axes(&self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    /// Size of a frame of `size` after this rotation.
    pub fn apply_to(&self, size: Vec2<usize>) -> Vec2<usize> {
        if self.swaps_axes() {
            size.transposed()
        } else {
            size
        }
    }
}

/// Interleaved RGBA8 pixel buffer.
#[derive(Clone, PartialEq)]
pub struct Frame {
    pub size: Vec2<usize>,
    pub data: Vec<u8>,
    pub rotation: Rotation,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("size", &self.size)
            .field("rotation", &self.rotation)
            .finish()
    }
}

const OPAQUE_BLACK: [u8; 4] = [0, 0, 0, 255];

impl Frame {
    pub const BYTES_PER_PIXEL: usize = 4;

    pub fn new(size: Vec2<usize>, data: Vec<u8>) -> Result<Self, ImageError> {
        let frame = Self {
            size,
            data,
            rotation: Rotation::Deg0,
        };
        frame.validate()?;
        Ok(frame)
    }

    pub fn filled(size: Vec2<usize>, rgba: [u8; 4]) -> Self {
        Self {
            size,
            data: rgba.repeat(size.area()),
            rotation: Rotation::Deg0,
        }
    }

    pub fn black(size: Vec2<usize>) -> Self {
        Self::filled(size, OPAQUE_BLACK)
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn width(&self) -> usize {
        self.size.x
    }

    pub fn height(&self) -> usize {
        self.size.y
    }

    /// Rejects zero-sized frames and buffers that do not match the size.
    pub fn validate(&self) -> Result<(), ImageError> {
        if self.size.is_empty() {
            return Err(ImageError::InvalidFrame(format!(
                "frame has zero dimension ({})",
                self.size
            )));
        }
        PixelFormat::Rgba8.ensure_len(self.size, self.data.len())
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.size.x + x) * Self::BYTES_PER_PIXEL;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, rgba: [u8; 4]) {
        let i = (y * self.size.x + x) * Self::BYTES_PER_PIXEL;
        self.data[i..i + Self::BYTES_PER_PIXEL].copy_from_slice(&rgba);
    }

    /// Resize the buffer to `size` and paint it black, keeping the allocation.
    pub fn reset(&mut self, size: Vec2<usize>) {
        self.size = size;
        self.rotation = Rotation::Deg0;
        self.data.clear();
        self.data.reserve(size.area() * Self::BYTES_PER_PIXEL);
        for _ in 0..size.area() {
            self.data.extend_from_slice(&OPAQUE_BLACK);
        }
    }
}
