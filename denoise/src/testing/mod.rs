//! Testing utilities for denoise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::buffer::RectBuffer;
use crate::config::FilterConfig;
use crate::geometry::Rect;
use crate::tile::{TileBuffer, TileGrid};

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
/// Respects RUST_LOG env var, defaults to "info".
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Zero-initialized render tile covering exactly `rect`.
#[derive(Debug, Clone)]
pub struct RenderTile {
    pub pixels: Vec<f32>,
    pub rect: Rect,
    pass_stride: usize,
    denoising_offset: usize,
}

impl RenderTile {
    pub fn new(rect: Rect, config: &FilterConfig) -> Self {
        let count = (rect.width() * rect.height()) as usize;
        Self {
            pixels: vec![0.0; count * config.pass_stride],
            rect,
            pass_stride: config.pass_stride,
            denoising_offset: config.pass_denoising_offset,
        }
    }

    /// Set a channel of the denoising block of pixel (x, y).
    pub fn set(&mut self, x: i32, y: i32, channel: usize, value: f32) {
        let local = (y - self.rect.y0) * self.rect.width() + (x - self.rect.x0);
        self.pixels[local as usize * self.pass_stride + self.denoising_offset + channel] = value;
    }

    pub fn tile(&self) -> TileBuffer<'_> {
        let width = self.rect.width() as isize;
        let offset = -(self.rect.y0 as isize * width + self.rect.x0 as isize);
        TileBuffer::new(&self.pixels, offset, width)
    }

    pub fn grid(&self) -> TileGrid<'_> {
        TileGrid::single(self.tile(), self.rect)
    }
}

/// Shadow render of `sample` samples per pixel: every sample is visible with
/// probability `truth(x, y)`. Even samples go to half A, odd ones to half B.
pub fn noisy_shadow_render(
    rect: Rect,
    config: &FilterConfig,
    sample: u32,
    seed: u64,
    truth: impl Fn(i32, i32) -> f32,
) -> RenderTile {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tile = RenderTile::new(rect, config);
    let passes = config.shadow;

    for (x, y) in rect.pixels() {
        let p = truth(x, y);
        let mut halves = [(0.0f32, 0.0f32, Vec::new()), (0.0f32, 0.0f32, Vec::new())];
        for s in 0..sample {
            let visible = if rng.random::<f32>() < p { 1.0 } else { 0.0 };
            let half = &mut halves[(s % 2) as usize];
            half.0 += 1.0;
            half.1 += visible;
            half.2.push(visible);
        }

        for (i, (denominator, numerator, values)) in halves.iter().enumerate() {
            let mean = numerator / denominator.max(1.0);
            let sq_dev: f32 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
            let (d, n, v) = if i == 0 {
                (passes.denominator_a, passes.numerator_a, passes.variance_a)
            } else {
                (passes.denominator_b, passes.numerator_b, passes.variance_b)
            };
            tile.set(x, y, d, *denominator);
            tile.set(x, y, n, *numerator);
            tile.set(x, y, v, sq_dev);
        }
    }

    tile
}

/// Root mean square difference over the pixels of `rect`.
pub fn rmse(buffer: &RectBuffer<f32>, truth: impl Fn(i32, i32) -> f32) -> f32 {
    let rect = buffer.rect();
    let sum: f64 = rect
        .pixels()
        .map(|(x, y)| {
            let d = (buffer[(x, y)] - truth(x, y)) as f64;
            d * d
        })
        .sum();
    (sum / (rect.width() * rect.height()) as f64).sqrt() as f32
}
