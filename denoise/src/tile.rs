//! 3x3 neighbourhood of render-buffer tiles.
//!
//! A prefilter rect usually extends past the tile being denoised into its
//! neighbours. [`TileGrid`] owns references to the nine tiles around the
//! current one plus the cut points between them, and maps an absolute pixel
//! coordinate to the owning tile and the pixel's denoising channel block.

use crate::config::FilterConfig;
use crate::error::{Error, Result};
use crate::geometry::Rect;

/// One render-buffer tile: float storage plus its pixel addressing.
///
/// Pixel (x, y) of the image lives at `(offset + y * stride + x) * pass_stride`.
#[derive(Debug, Clone, Copy)]
pub struct TileBuffer<'a> {
    pub pixels: &'a [f32],
    pub offset: isize,
    pub stride: isize,
}

impl<'a> TileBuffer<'a> {
    pub const fn new(pixels: &'a [f32], offset: isize, stride: isize) -> Self {
        Self {
            pixels,
            offset,
            stride,
        }
    }

    /// Placeholder for a neighbour that does not exist (image border).
    /// Resolving a pixel into it is a caller bug.
    pub const EMPTY: TileBuffer<'static> = TileBuffer {
        pixels: &[],
        offset: 0,
        stride: 0,
    };

    /// Float index of the first channel of pixel (x, y).
    #[inline]
    fn pixel_start(&self, x: i32, y: i32, pass_stride: usize) -> isize {
        (self.offset + y as isize * self.stride + x as isize) * pass_stride as isize
    }
}

/// The 3x3 tile neighbourhood, row-major (`ytile * 3 + xtile`).
#[derive(Debug, Clone, Copy)]
pub struct TileGrid<'a> {
    tiles: [TileBuffer<'a>; 9],
    tile_x: [i32; 4],
    tile_y: [i32; 4],
}

impl<'a> TileGrid<'a> {
    /// `tile_x`/`tile_y` hold the start of the lower, current and upper tile
    /// and the end of the upper tile (exclusive).
    pub fn new(tiles: [TileBuffer<'a>; 9], tile_x: [i32; 4], tile_y: [i32; 4]) -> Result<Self> {
        check_monotonic('x', tile_x)?;
        check_monotonic('y', tile_y)?;
        Ok(Self {
            tiles,
            tile_x,
            tile_y,
        })
    }

    /// Grid where every pixel of `rect` belongs to `tile`.
    pub fn single(tile: TileBuffer<'a>, rect: Rect) -> Self {
        Self {
            tiles: [tile; 9],
            tile_x: [rect.x0, rect.x0, rect.x1, rect.x1],
            tile_y: [rect.y0, rect.y0, rect.y1, rect.y1],
        }
    }

    #[inline]
    pub fn tile_x(&self) -> [i32; 4] {
        self.tile_x
    }

    #[inline]
    pub fn tile_y(&self) -> [i32; 4] {
        self.tile_y
    }

    #[inline]
    pub fn tile(&self, index: usize) -> &TileBuffer<'a> {
        &self.tiles[index]
    }

    /// Index (0..9) of the tile owning pixel (x, y).
    #[inline]
    pub fn tile_index(&self, x: i32, y: i32) -> usize {
        let xtile = bucket(x, &self.tile_x);
        let ytile = bucket(y, &self.tile_y);
        ytile * 3 + xtile
    }

    /// Owning tile storage and the float index of the pixel's denoising block.
    #[inline]
    pub fn resolve(&self, x: i32, y: i32, config: &FilterConfig) -> (&'a [f32], usize) {
        let tile = &self.tiles[self.tile_index(x, y)];
        let start = tile.pixel_start(x, y, config.pass_stride) as usize;
        (tile.pixels, start + config.pass_denoising_offset)
    }

    /// Denoising channels of pixel (x, y), starting at the denoising block.
    #[inline]
    pub fn denoising_passes(&self, x: i32, y: i32, config: &FilterConfig) -> &'a [f32] {
        let (pixels, start) = self.resolve(x, y, config);
        &pixels[start..]
    }

    /// Check that the boundaries bracket `rect` and that every tile holds the
    /// `channels` denoising floats of each pixel of `rect` it owns.
    pub fn check_coverage(
        &self,
        rect: Rect,
        config: &FilterConfig,
        channels: usize,
    ) -> Result<()> {
        check_brackets('x', self.tile_x, rect.x0, rect.x1, rect)?;
        check_brackets('y', self.tile_y, rect.y0, rect.y1, rect)?;

        for ytile in 0..3 {
            let y0 = self.tile_y[ytile].max(rect.y0);
            let y1 = self.tile_y[ytile + 1].min(rect.y1);
            for xtile in 0..3 {
                let x0 = self.tile_x[xtile].max(rect.x0);
                let x1 = self.tile_x[xtile + 1].min(rect.x1);
                if x0 >= x1 || y0 >= y1 {
                    continue;
                }

                let index = ytile * 3 + xtile;
                let tile = &self.tiles[index];
                // Tile addressing is affine, so the extremes sit at the corners.
                for (x, y) in [(x0, y0), (x1 - 1, y0), (x0, y1 - 1), (x1 - 1, y1 - 1)] {
                    let start = tile.pixel_start(x, y, config.pass_stride)
                        + config.pass_denoising_offset as isize;
                    let required = start + channels as isize;
                    if start < 0 || required as usize > tile.pixels.len() {
                        return Err(Error::TileBufferTooSmall {
                            tile: index,
                            x,
                            y,
                            len: tile.pixels.len(),
                            required: required.max(0) as usize,
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

#[inline]
fn bucket(v: i32, bounds: &[i32; 4]) -> usize {
    if v < bounds[1] {
        0
    } else if v < bounds[2] {
        1
    } else {
        2
    }
}

fn check_monotonic(axis: char, bounds: [i32; 4]) -> Result<()> {
    if bounds.windows(2).all(|w| w[0] <= w[1]) {
        Ok(())
    } else {
        Err(Error::NonMonotonicTileBounds { axis, bounds })
    }
}

fn check_brackets(axis: char, bounds: [i32; 4], lo: i32, hi: i32, rect: Rect) -> Result<()> {
    if bounds[0] <= lo && hi <= bounds[3] {
        Ok(())
    } else {
        Err(Error::TileBoundsDoNotCoverRect { axis, bounds, rect })
    }
}
