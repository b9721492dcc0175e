//! Integer rectangles over the image plane.

use glam::IVec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned pixel rectangle.
///
/// The lower bounds are inclusive, the upper bounds exclusive: a pixel at
/// (x, y) is inside if `x0 <= x < x1` and `y0 <= y < y1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl Rect {
    #[inline]
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Rectangle starting at (x, y) with the given size.
    #[inline]
    pub const fn from_size(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    #[inline]
    pub const fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    #[inline]
    pub const fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    #[inline]
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    /// Inclusive lower corner.
    #[inline]
    pub fn min(&self) -> IVec2 {
        IVec2::new(self.x0, self.y0)
    }

    /// Exclusive upper corner.
    #[inline]
    pub fn max(&self) -> IVec2 {
        IVec2::new(self.x1, self.y1)
    }

    /// Square window of the given radius around `center`, clamped to the rect.
    ///
    /// Returns `(low, high)` with `high` exclusive.
    #[inline]
    pub fn clamp_window(&self, center: IVec2, radius: i32) -> (IVec2, IVec2) {
        let low = center.saturating_sub(IVec2::splat(radius)).max(self.min());
        let high = center
            .saturating_add(IVec2::splat(radius.saturating_add(1)))
            .min(self.max());
        (low, high)
    }

    /// Iterate all pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (i32, i32)> {
        let Rect { x0, y0, x1, y1 } = *self;
        (y0..y1).flat_map(move |y| (x0..x1).map(move |x| (x, y)))
    }
}

/// Round `value` up to the next multiple of `alignment`.
#[inline]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    assert!(alignment > 0, "alignment must be positive");
    value.div_ceil(alignment) * alignment
}
