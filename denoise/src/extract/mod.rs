//! Extraction of denoising statistics from render buffers.
//!
//! The shadow feature is a ratio of two accumulated passes, rendered as two
//! independent halves (A/B) of the samples. For every pixel of the prefilter
//! rect this stage computes:
//! - `unfiltered`: both half images of the shadow ratio (two-layer buffer)
//! - `sample_variance`: variance estimated from the accumulated squares while
//!   rendering. Smooth but biased, more so for a ratio feature.
//! - `sample_variance_v`: variance of that estimate, i.e. the buffer variance
//!   of the two variance halves. Quite noisy.
//! - `buffer_variance`: variance from the disagreement of the two half images.
//!   Unbiased but noisy.
//!
//! Regular features (normal, albedo, depth) only need their mean and the
//! variance of the mean, see [`get_feature`].


use rayon::prelude::*;

use crate::buffer::{BufferLayout, RectBuffer};
use crate::config::{FeaturePass, FilterConfig};
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::tile::TileGrid;

/// Shadow statistics of one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSample {
    pub unfiltered_a: f32,
    pub unfiltered_b: f32,
    pub sample_variance: f32,
    pub sample_variance_v: f32,
    pub buffer_variance: f32,
}

/// Mean and variance of a feature at one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSample {
    pub mean: f32,
    pub variance: f32,
}

/// Number of ordered sample pairs, `n * (n - 1)`.
#[inline]
fn sample_pairs(sample: u32) -> f32 {
    let n = sample as f32;
    n * (n - 1.0)
}

/// Shadow statistics of pixel (x, y).
///
/// `sample` must be at least 2 and (x, y) must resolve inside the grid.
#[inline]
pub fn divide_shadow_pixel(
    grid: &TileGrid<'_>,
    sample: u32,
    x: i32,
    y: i32,
    config: &FilterConfig,
) -> ShadowSample {
    let passes = grid.denoising_passes(x, y, config);
    let ch = &config.shadow;

    let unfiltered_a = passes[ch.numerator_a] / passes[ch.denominator_a].max(config.ratio_epsilon);
    let unfiltered_b = passes[ch.numerator_b] / passes[ch.denominator_b].max(config.ratio_epsilon);

    let var_fac = 1.0 / sample_pairs(sample);
    let var_a = passes[ch.variance_a];
    let var_b = passes[ch.variance_b];
    let dv = var_a - var_b;
    let du = unfiltered_a - unfiltered_b;

    ShadowSample {
        unfiltered_a,
        unfiltered_b,
        sample_variance: (var_a + var_b) * var_fac,
        sample_variance_v: 0.5 * dv * dv * var_fac,
        buffer_variance: 0.5 * du * du,
    }
}

/// Mean and variance of a feature pass at pixel (x, y).
#[inline]
pub fn feature_pixel(
    grid: &TileGrid<'_>,
    sample: u32,
    pass: FeaturePass,
    x: i32,
    y: i32,
    config: &FilterConfig,
) -> FeatureSample {
    let passes = grid.denoising_passes(x, y, config);
    FeatureSample {
        mean: passes[pass.mean_offset] / sample as f32,
        variance: passes[pass.variance_offset] / sample_pairs(sample),
    }
}

/// Working buffers produced by [`divide_shadow`].
#[derive(Debug, Clone)]
pub struct ShadowBuffers {
    /// Half A in layer 0, half B in layer 1.
    pub unfiltered: RectBuffer<f32>,
    pub sample_variance: RectBuffer<f32>,
    pub sample_variance_v: RectBuffer<f32>,
    pub buffer_variance: RectBuffer<f32>,
}

impl ShadowBuffers {
    pub fn new(layout: BufferLayout) -> Self {
        Self {
            unfiltered: RectBuffer::new_layered(layout, 2),
            sample_variance: RectBuffer::new_default(layout),
            sample_variance_v: RectBuffer::new_default(layout),
            buffer_variance: RectBuffer::new_default(layout),
        }
    }

    #[inline]
    pub fn layout(&self) -> BufferLayout {
        self.sample_variance.layout()
    }
}

/// Working buffers produced by [`get_feature`].
#[derive(Debug, Clone)]
pub struct FeatureBuffers {
    pub mean: RectBuffer<f32>,
    pub variance: RectBuffer<f32>,
}

/// Run the shadow division over every pixel of `rect`.
pub fn divide_shadow(
    grid: &TileGrid<'_>,
    sample: u32,
    rect: Rect,
    config: &FilterConfig,
) -> Result<ShadowBuffers> {
    check_pass_inputs(rect, sample)?;
    config.validate();
    grid.check_coverage(rect, config, config.shadow.max_offset() + 1)?;

    let layout = BufferLayout::new(rect, config.row_alignment);
    let stride = layout.stride();
    let width = layout.width();
    let mut out = ShadowBuffers::new(layout);

    let ShadowBuffers {
        unfiltered,
        sample_variance,
        sample_variance_v,
        buffer_variance,
    } = &mut out;
    let (unfiltered_a, unfiltered_b) = unfiltered.halves_mut();

    unfiltered_a
        .par_chunks_mut(stride)
        .zip(unfiltered_b.par_chunks_mut(stride))
        .zip(sample_variance.pixels_mut().par_chunks_mut(stride))
        .zip(sample_variance_v.pixels_mut().par_chunks_mut(stride))
        .zip(buffer_variance.pixels_mut().par_chunks_mut(stride))
        .enumerate()
        .for_each(|(row, ((((a, b), sv), svv), bv))| {
            let y = rect.y0 + row as i32;
            for i in 0..width {
                let s = divide_shadow_pixel(grid, sample, rect.x0 + i as i32, y, config);
                a[i] = s.unfiltered_a;
                b[i] = s.unfiltered_b;
                sv[i] = s.sample_variance;
                svv[i] = s.sample_variance_v;
                bv[i] = s.buffer_variance;
            }
        });

    tracing::debug!(?rect, sample, "Divided shadow passes");
    Ok(out)
}

/// Load the mean and variance of a feature pass over every pixel of `rect`.
pub fn get_feature(
    grid: &TileGrid<'_>,
    sample: u32,
    pass: FeaturePass,
    rect: Rect,
    config: &FilterConfig,
) -> Result<FeatureBuffers> {
    check_pass_inputs(rect, sample)?;
    config.validate();
    if !config.channel_fits(pass.max_offset()) {
        return Err(Error::ChannelOutOfRange {
            offset: pass.max_offset(),
            denoising_offset: config.pass_denoising_offset,
            pass_stride: config.pass_stride,
        });
    }
    grid.check_coverage(rect, config, pass.max_offset() + 1)?;

    let layout = BufferLayout::new(rect, config.row_alignment);
    let stride = layout.stride();
    let width = layout.width();
    let mut mean = RectBuffer::new_default(layout);
    let mut variance = RectBuffer::new_default(layout);

    mean.pixels_mut()
        .par_chunks_mut(stride)
        .zip(variance.pixels_mut().par_chunks_mut(stride))
        .enumerate()
        .for_each(|(row, (m, v))| {
            let y = rect.y0 + row as i32;
            for i in 0..width {
                let s = feature_pixel(grid, sample, pass, rect.x0 + i as i32, y, config);
                m[i] = s.mean;
                v[i] = s.variance;
            }
        });

    tracing::debug!(?rect, sample, ?pass, "Loaded feature pass");
    Ok(FeatureBuffers { mean, variance })
}

fn check_pass_inputs(rect: Rect, sample: u32) -> Result<()> {
    if rect.is_empty() {
        return Err(Error::EmptyRect(rect));
    }
    if sample < 2 {
        return Err(Error::InsufficientSamples { sample });
    }
    Ok(())
}
