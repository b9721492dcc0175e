//! Prefilter pipelines built from the extraction, combination and NLM kernels.
//!
//! The shadow pipeline runs, in order:
//! 1. [`divide_shadow`] over the rect
//! 2. buffer variance smoothed with the sample variance as guide
//! 3. each half filtered with the other half as guide, using the smoothed variance
//! 4. residual variance from the disagreement of the filtered halves
//! 5. a second cross-guided pass driven by the residual variance
//! 6. the final halves combined into mean and variance
//!
//! Every stage completes before the next one reads its output.

use rayon::join;

use crate::buffer::RectBuffer;
use crate::combine::combine_halves;
use crate::config::{FeaturePass, FilterConfig, NlmParams};
use crate::error::Result;
use crate::extract::{divide_shadow, get_feature, FeatureBuffers, ShadowBuffers};
use crate::geometry::Rect;
use crate::nlm::{non_local_means, NlmInputs, NlmStats};
use crate::tile::TileGrid;

/// Filtered feature with its variance estimate.
#[derive(Debug, Clone)]
pub struct PrefilterOutput {
    pub mean: RectBuffer<f32>,
    pub variance: RectBuffer<f32>,
    /// Accumulated over every NLM pass of the pipeline.
    pub stats: NlmStats,
}

/// Denoise the shadow feature over `rect`.
pub fn prefilter_shadow(
    grid: &TileGrid<'_>,
    sample: u32,
    rect: Rect,
    config: &FilterConfig,
) -> Result<PrefilterOutput> {
    let ShadowBuffers {
        unfiltered,
        sample_variance,
        sample_variance_v,
        buffer_variance,
    } = divide_shadow(grid, sample, rect, config)?;
    let layout = unfiltered.layout();
    let stages = &config.shadow_prefilter;

    let mut clean_variance = RectBuffer::new_default(layout);
    let smoothing = NlmInputs::new(
        layout,
        buffer_variance.pixels(),
        sample_variance.pixels(),
        sample_variance_v.pixels(),
    );
    let mut stats = non_local_means(
        &smoothing,
        &stages.variance_smoothing,
        clean_variance.pixels_mut(),
    );

    let mut filtered = RectBuffer::new_layered(layout, 2);
    stats = stats.merge(cross_filter(
        &unfiltered,
        &clean_variance,
        &stages.half_filter,
        &mut filtered,
    ));

    let mut residual_variance = RectBuffer::new_default(layout);
    let (a, b) = filtered.halves();
    combine_halves(&layout, a, b, None, Some(residual_variance.pixels_mut()));

    let mut final_halves = RectBuffer::new_layered(layout, 2);
    stats = stats.merge(cross_filter(
        &filtered,
        &residual_variance,
        &stages.residual_filter,
        &mut final_halves,
    ));

    let mut mean = RectBuffer::new_default(layout);
    let mut variance = RectBuffer::new_default(layout);
    let (a, b) = final_halves.halves();
    combine_halves(
        &layout,
        a,
        b,
        Some(mean.pixels_mut()),
        Some(variance.pixels_mut()),
    );

    tracing::info!(
        ?rect,
        sample,
        pixels = layout.width() * layout.height(),
        collapsed = stats.collapsed,
        "Shadow prefilter done"
    );

    Ok(PrefilterOutput {
        mean,
        variance,
        stats,
    })
}

/// Filter each half of `halves` guided by the other one.
fn cross_filter(
    halves: &RectBuffer<f32>,
    variance: &RectBuffer<f32>,
    params: &NlmParams,
    output: &mut RectBuffer<f32>,
) -> NlmStats {
    let layout = halves.layout();
    let (a, b) = halves.halves();
    let (out_a, out_b) = output.halves_mut();

    let (stats_a, stats_b) = join(
        || non_local_means(&NlmInputs::new(layout, a, b, variance.pixels()), params, out_a),
        || non_local_means(&NlmInputs::new(layout, b, a, variance.pixels()), params, out_b),
    );
    stats_a.merge(stats_b)
}

/// Denoise a regular feature pass over `rect`.
///
/// The mean is filtered guided by itself; the variance is returned as extracted.
pub fn prefilter_feature(
    grid: &TileGrid<'_>,
    sample: u32,
    pass: FeaturePass,
    rect: Rect,
    config: &FilterConfig,
) -> Result<PrefilterOutput> {
    let FeatureBuffers { mean, variance } = get_feature(grid, sample, pass, rect, config)?;
    let layout = mean.layout();

    let mut filtered = RectBuffer::new_default(layout);
    let inputs = NlmInputs::new(layout, mean.pixels(), mean.pixels(), variance.pixels());
    let stats = non_local_means(&inputs, &config.feature_filter, filtered.pixels_mut());

    tracing::info!(
        ?rect,
        sample,
        ?pass,
        collapsed = stats.collapsed,
        "Feature prefilter done"
    );

    Ok(PrefilterOutput {
        mean: filtered,
        variance,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::error::Error;
    use crate::testing::{init_tracing, noisy_shadow_render, rmse, RenderTile};

    fn gradient(x: i32, _y: i32) -> f32 {
        0.2 + 0.6 * x as f32 / 24.0
    }

    #[test]
    fn test_shadow_prefilter_reduces_error() {
        init_tracing();

        let config = FilterConfig::default();
        let rect = Rect::new(0, 0, 24, 24);
        let tile = noisy_shadow_render(rect, &config, 16, 42, gradient);
        let grid = tile.grid();

        let raw = divide_shadow(&grid, 16, rect, &config).unwrap();
        let mut raw_mean = RectBuffer::new_default(raw.layout());
        let (a, b) = raw.unfiltered.halves();
        combine_halves(&raw.layout(), a, b, Some(raw_mean.pixels_mut()), None);

        let out = prefilter_shadow(&grid, 16, rect, &config).unwrap();
        let raw_error = rmse(&raw_mean, gradient);
        let filtered_error = rmse(&out.mean, gradient);
        tracing::info!(raw_error, filtered_error, "Shadow prefilter error");

        assert!(
            filtered_error < 0.7 * raw_error,
            "filtered {filtered_error} vs raw {raw_error}"
        );
        assert_eq!(out.stats.pixels, 5 * 24 * 24);
        assert_eq!(out.stats.collapsed, 0);
        assert_eq!(out.mean.rect(), rect);
        for (x, y) in rect.pixels() {
            assert!(out.variance[(x, y)] >= 0.0);
        }
    }

    #[test]
    fn test_shadow_prefilter_keeps_noiseless_constant() {
        let config = FilterConfig::default();
        let ch = config.shadow;
        let rect = Rect::new(-4, 3, 7, 12);
        let mut tile = RenderTile::new(rect, &config);
        for (x, y) in rect.pixels() {
            for (n, d) in [
                (ch.numerator_a, ch.denominator_a),
                (ch.numerator_b, ch.denominator_b),
            ] {
                tile.set(x, y, n, 4.0);
                tile.set(x, y, d, 8.0);
            }
        }

        let out = prefilter_shadow(&tile.grid(), 16, rect, &config).unwrap();
        for (x, y) in rect.pixels() {
            assert_eq!(out.mean[(x, y)], 0.5);
            assert_eq!(out.variance[(x, y)], 0.0);
        }
    }

    #[test]
    fn test_shadow_prefilter_propagates_errors() {
        let config = FilterConfig::default();
        let rect = Rect::new(0, 0, 4, 4);
        let tile = RenderTile::new(rect, &config);
        let err = prefilter_shadow(&tile.grid(), 1, rect, &config).unwrap_err();
        assert!(matches!(err, Error::InsufficientSamples { sample: 1 }));
    }

    fn noisy_feature(rect: Rect, config: &FilterConfig, sample: u32, truth: f32) -> RenderTile {
        // Uniform noise in [-0.1, 0.1) on the per-pixel mean.
        let noise_variance = 0.01 / 3.0;
        let pairs = (sample * (sample - 1)) as f32;
        let mut rng = StdRng::seed_from_u64(11);
        let mut tile = RenderTile::new(rect, config);
        for (x, y) in rect.pixels() {
            let mean = truth + (rng.random::<f32>() - 0.5) * 0.2;
            tile.set(x, y, 0, mean * sample as f32);
            tile.set(x, y, 1, noise_variance * pairs);
        }
        tile
    }

    #[test]
    fn test_feature_prefilter_reduces_noise() {
        let config = FilterConfig::default();
        let rect = Rect::new(0, 0, 16, 16);
        let tile = noisy_feature(rect, &config, 8, 0.3);
        let grid = tile.grid();
        let pass = FeaturePass::new(0, 1);

        let raw = get_feature(&grid, 8, pass, rect, &config).unwrap();
        let out = prefilter_feature(&grid, 8, pass, rect, &config).unwrap();

        let raw_error = rmse(&raw.mean, |_, _| 0.3);
        let filtered_error = rmse(&out.mean, |_, _| 0.3);
        assert!(
            filtered_error < 0.8 * raw_error,
            "filtered {filtered_error} vs raw {raw_error}"
        );
        assert_eq!(out.variance, raw.variance);
        assert_eq!(out.stats.pixels, 16 * 16);
    }

    #[test]
    fn test_feature_prefilter_matches_manual_nlm() {
        let config = FilterConfig::default();
        let rect = Rect::new(0, 0, 9, 7);
        let tile = noisy_feature(rect, &config, 4, 0.6);
        let grid = tile.grid();
        let pass = FeaturePass::new(0, 1);

        let raw = get_feature(&grid, 4, pass, rect, &config).unwrap();
        let layout = raw.mean.layout();
        let mut expected = RectBuffer::new_default(layout);
        let inputs = NlmInputs::new(
            layout,
            raw.mean.pixels(),
            raw.mean.pixels(),
            raw.variance.pixels(),
        );
        non_local_means(&inputs, &config.feature_filter, expected.pixels_mut());

        let out = prefilter_feature(&grid, 4, pass, rect, &config).unwrap();
        assert_eq!(out.mean, expected);
    }
}
