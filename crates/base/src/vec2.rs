use std::{fmt, ops::Mul};

/// Two-component value, used for pixel dimensions and offsets.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Vec2<T> {
    pub x: T,
    pub y: T,
}

impl<T: fmt::Debug> fmt::Debug for Vec2<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vec2")
            .field("x", &self.x)
            .field("y", &self.y)
            .finish()
    }
}

impl<T: fmt::Display> fmt::Display for Vec2<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

impl<T> Vec2<T> {
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl<T: Copy + Mul<Output = T>> Vec2<T> {
    pub fn area(&self) -> T {
        self.x * self.y
    }
}

impl<T: Copy + Ord> Vec2<T> {
    pub fn max_side(&self) -> T {
        self.x.max(self.y)
    }

    pub fn min_side(&self) -> T {
        self.x.min(self.y)
    }
}

impl Vec2<usize> {
    pub fn is_empty(&self) -> bool {
        self.x == 0 || self.y == 0
    }

    pub fn transposed(&self) -> Self {
        Self::new(self.y, self.x)
    }
}
