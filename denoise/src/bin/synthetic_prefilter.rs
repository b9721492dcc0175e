//! Synthetic prefilter run.
//!
//! Renders a noisy shadow and a noisy feature pass into a 3x3 grid of tiles,
//! prefilters the rect spanning all nine of them and logs the error of the
//! raw and the filtered estimate against ground truth.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin synthetic_prefilter -- [config.yaml|config.json]
//! ```

use std::env;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use denoise::log_setup::setup_logging;
use denoise::{
    combine_halves, divide_shadow, get_feature, prefilter_feature, prefilter_shadow, FeaturePass,
    FilterConfig, Rect, RectBuffer, ShadowPasses, TileBuffer, TileGrid,
};

const TILE_SIZE: i32 = 16;
const SAMPLES: u32 = 32;
const SEED: u64 = 0x5EED;
const FEATURE_PASS: FeaturePass = FeaturePass::new(0, 1);
const FEATURE_NOISE: f32 = 0.25;

/// Soft-edged disk shadow in the middle of the image.
fn shadow_truth(x: i32, y: i32) -> f32 {
    let center = 1.5 * TILE_SIZE as f32;
    let d = ((x as f32 - center).powi(2) + (y as f32 - center).powi(2)).sqrt();
    let t = ((d - 10.0) / 6.0).clamp(0.0, 1.0);
    0.15 + 0.7 * t
}

fn feature_truth(x: i32, y: i32) -> f32 {
    0.5 + 0.3 * (x as f32 * 0.1).sin() * (y as f32 * 0.07).cos()
}

/// Sum of the values and of their squared deviations from the mean.
fn accumulate(values: &[f32]) -> (f32, f32) {
    let sum: f32 = values.iter().sum();
    let mean = sum / values.len().max(1) as f32;
    let sq_dev = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (sum, sq_dev)
}

fn render_shadow(block: &mut [f32], passes: &ShadowPasses, truth: f32, rng: &mut StdRng) {
    let halves = [
        (passes.denominator_a, passes.numerator_a, passes.variance_a),
        (passes.denominator_b, passes.numerator_b, passes.variance_b),
    ];
    for (denominator, numerator, variance) in halves {
        let visible: Vec<f32> = (0..SAMPLES / 2)
            .map(|_| if rng.random::<f32>() < truth { 1.0 } else { 0.0 })
            .collect();
        let (sum, sq_dev) = accumulate(&visible);
        block[denominator] = visible.len() as f32;
        block[numerator] = sum;
        block[variance] = sq_dev;
    }
}

fn render_feature(block: &mut [f32], truth: f32, rng: &mut StdRng) {
    let values: Vec<f32> = (0..SAMPLES)
        .map(|_| truth + (rng.random::<f32>() - 0.5) * 2.0 * FEATURE_NOISE)
        .collect();
    let (sum, sq_dev) = accumulate(&values);
    block[FEATURE_PASS.mean_offset] = sum;
    block[FEATURE_PASS.variance_offset] = sq_dev;
}

fn render_tile(rect: Rect, config: &FilterConfig, rng: &mut StdRng) -> Vec<f32> {
    let width = rect.width() as usize;
    let mut pixels = vec![0.0f32; width * rect.height() as usize * config.pass_stride];
    for (x, y) in rect.pixels() {
        let local = (y - rect.y0) as usize * width + (x - rect.x0) as usize;
        let start = local * config.pass_stride + config.pass_denoising_offset;
        let block = &mut pixels[start..(local + 1) * config.pass_stride];
        render_shadow(block, &config.shadow, shadow_truth(x, y), rng);
        render_feature(block, feature_truth(x, y), rng);
    }
    pixels
}

fn rmse(buffer: &RectBuffer<f32>, truth: impl Fn(i32, i32) -> f32) -> f32 {
    let rect = buffer.rect();
    let sum: f64 = rect
        .pixels()
        .map(|(x, y)| ((buffer[(x, y)] - truth(x, y)) as f64).powi(2))
        .sum();
    (sum / (rect.width() * rect.height()) as f64).sqrt() as f32
}

fn main() -> Result<()> {
    setup_logging("info");

    let config = match env::args().nth(1) {
        Some(path) => FilterConfig::from_file(&path)
            .with_context(|| format!("Failed to load filter config from {}", path))?,
        None => FilterConfig::default(),
    };
    config.validate();
    anyhow::ensure!(
        config.channel_fits(FEATURE_PASS.max_offset()),
        "pass_stride {} too small for the feature pass",
        config.pass_stride
    );

    let cuts = [0, TILE_SIZE, 2 * TILE_SIZE, 3 * TILE_SIZE];
    let mut rng = StdRng::seed_from_u64(SEED);
    let storages: Vec<Vec<f32>> = (0..9)
        .map(|index| {
            let (x0, y0) = (cuts[index % 3], cuts[index / 3]);
            let rect = Rect::from_size(x0, y0, TILE_SIZE, TILE_SIZE);
            render_tile(rect, &config, &mut rng)
        })
        .collect();
    let tiles: [TileBuffer<'_>; 9] = std::array::from_fn(|index| {
        let (x0, y0) = (cuts[index % 3] as isize, cuts[index / 3] as isize);
        let stride = TILE_SIZE as isize;
        TileBuffer::new(&storages[index], -(y0 * stride + x0), stride)
    });
    let grid = TileGrid::new(tiles, cuts, cuts)?;
    let rect = Rect::new(0, 0, cuts[3], cuts[3]);
    tracing::info!(?rect, samples = SAMPLES, "Rendered synthetic tiles");

    let raw = divide_shadow(&grid, SAMPLES, rect, &config)?;
    let mut raw_mean = RectBuffer::new_default(raw.layout());
    let (a, b) = raw.unfiltered.halves();
    combine_halves(&raw.layout(), a, b, Some(raw_mean.pixels_mut()), None);

    let shadow = prefilter_shadow(&grid, SAMPLES, rect, &config)?;
    tracing::info!(
        raw_rmse = rmse(&raw_mean, shadow_truth),
        filtered_rmse = rmse(&shadow.mean, shadow_truth),
        collapsed = shadow.stats.collapsed,
        "Shadow"
    );

    let raw = get_feature(&grid, SAMPLES, FEATURE_PASS, rect, &config)?;
    let feature = prefilter_feature(&grid, SAMPLES, FEATURE_PASS, rect, &config)?;
    tracing::info!(
        raw_rmse = rmse(&raw.mean, feature_truth),
        filtered_rmse = rmse(&feature.mean, feature_truth),
        collapsed = feature.stats.collapsed,
        "Feature"
    );

    Ok(())
}
