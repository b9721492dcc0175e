//! Flat working buffers addressed over a [`Rect`].
//!
//! Every working buffer of a prefilter pass shares one [`BufferLayout`]: rows
//! start at `(y - rect.y0) * stride` where the stride is the rect width padded
//! up to the row alignment. Padding columns are allocated but never written by
//! the kernels.

#[cfg(test)]
mod tests;

use std::ops::{Index, IndexMut};

use crate::geometry::{align_up, Rect};

/// Default row alignment in elements (one SSE register of `f32`).
pub const DEFAULT_ROW_ALIGNMENT: usize = 4;

/// Indexing scheme shared by all working buffers over the same rect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    rect: Rect,
    stride: usize,
}

impl BufferLayout {
    pub fn new(rect: Rect, alignment: usize) -> Self {
        assert!(!rect.is_empty(), "buffer rect must not be empty: {:?}", rect);
        Self {
            rect,
            stride: align_up(rect.width() as usize, alignment),
        }
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Row stride in elements, including padding.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.rect.width() as usize
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.rect.height() as usize
    }

    /// Number of elements in one layer.
    #[inline]
    pub fn len(&self) -> usize {
        self.stride * self.height()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear index of the absolute pixel (x, y).
    #[inline]
    pub fn index(&self, x: i32, y: i32) -> usize {
        debug_assert!(
            self.rect.contains(x, y),
            "pixel ({x}, {y}) outside {:?}",
            self.rect
        );
        (y - self.rect.y0) as usize * self.stride + (x - self.rect.x0) as usize
    }
}

/// 2D array of `T` over a rect, made of one or more layers of
/// [`BufferLayout::len`] elements each.
#[derive(Debug, Clone, PartialEq)]
pub struct RectBuffer<T> {
    layout: BufferLayout,
    layers: usize,
    pixels: Vec<T>,
}

impl<T> RectBuffer<T> {
    pub fn from_vec(layout: BufferLayout, layers: usize, pixels: Vec<T>) -> Self {
        assert!(layers > 0, "buffer needs at least one layer");
        assert_eq!(
            pixels.len(),
            layout.len() * layers,
            "pixels length must equal stride * height * layers"
        );
        Self {
            layout,
            layers,
            pixels,
        }
    }

    #[inline]
    pub fn layout(&self) -> BufferLayout {
        self.layout
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.layout.rect
    }

    #[inline]
    pub fn layers(&self) -> usize {
        self.layers
    }

    /// Element offset between two consecutive layers.
    #[inline]
    pub fn layer_offset(&self) -> usize {
        self.layout.len()
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> &T {
        &self.pixels[self.layout.index(x, y)]
    }

    #[inline]
    pub fn get_mut(&mut self, x: i32, y: i32) -> &mut T {
        let idx = self.layout.index(x, y);
        &mut self.pixels[idx]
    }

    #[inline]
    pub fn layer(&self, layer: usize) -> &[T] {
        assert!(layer < self.layers, "layer {layer} out of {}", self.layers);
        let len = self.layout.len();
        &self.pixels[layer * len..(layer + 1) * len]
    }

    #[inline]
    pub fn layer_mut(&mut self, layer: usize) -> &mut [T] {
        assert!(layer < self.layers, "layer {layer} out of {}", self.layers);
        let len = self.layout.len();
        &mut self.pixels[layer * len..(layer + 1) * len]
    }

    /// Both layers of a two-layer (A/B half) buffer.
    #[inline]
    pub fn halves(&self) -> (&[T], &[T]) {
        assert_eq!(self.layers, 2, "halves require a two-layer buffer");
        self.pixels.split_at(self.layout.len())
    }

    #[inline]
    pub fn halves_mut(&mut self) -> (&mut [T], &mut [T]) {
        assert_eq!(self.layers, 2, "halves require a two-layer buffer");
        self.pixels.split_at_mut(self.layout.len())
    }

    #[inline]
    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [T] {
        &mut self.pixels
    }

    #[inline]
    pub fn into_pixels(self) -> Vec<T> {
        self.pixels
    }
}

impl<T: Default + Clone> RectBuffer<T> {
    pub fn new_default(layout: BufferLayout) -> Self {
        Self::new_layered(layout, 1)
    }

    pub fn new_layered(layout: BufferLayout, layers: usize) -> Self {
        Self::from_vec(layout, layers, vec![T::default(); layout.len() * layers])
    }

    /// Single-layer buffer with every rect pixel set from `f(x, y)`.
    /// Padding is left at the default value.
    pub fn from_fn(layout: BufferLayout, f: impl Fn(i32, i32) -> T) -> Self {
        let mut buffer = Self::new_default(layout);
        for (x, y) in layout.rect().pixels() {
            *buffer.get_mut(x, y) = f(x, y);
        }
        buffer
    }
}

impl<T: Clone> RectBuffer<T> {
    pub fn new_filled(layout: BufferLayout, value: T) -> Self {
        Self::from_vec(layout, 1, vec![value; layout.len()])
    }

    #[inline]
    pub fn fill(&mut self, value: T) {
        self.pixels.fill(value);
    }
}

impl<T> Index<(i32, i32)> for RectBuffer<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (i32, i32)) -> &Self::Output {
        self.get(x, y)
    }
}

impl<T> IndexMut<(i32, i32)> for RectBuffer<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (i32, i32)) -> &mut Self::Output {
        self.get_mut(x, y)
    }
}

impl<T> AsRef<[T]> for RectBuffer<T> {
    #[inline]
    fn as_ref(&self) -> &[T] {
        &self.pixels
    }
}
