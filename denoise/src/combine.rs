//! Combination of two independent half-sample estimates.
//!
//! Halves A and B each hold the estimate from half of the samples. Their
//! average is the full estimate and half their squared difference is an
//! unbiased estimate of the variance of that average.

use rayon::prelude::*;

use crate::buffer::BufferLayout;

#[inline]
fn half_mean(a: f32, b: f32) -> f32 {
    0.5 * (a + b)
}

#[inline]
fn half_variance(a: f32, b: f32) -> f32 {
    let d = a - b;
    0.5 * d * d
}

/// Combine the halves at pixel (x, y). Outputs passed as `None` are skipped.
#[inline]
pub fn combine_halves_pixel(
    x: i32,
    y: i32,
    layout: &BufferLayout,
    a: &[f32],
    b: &[f32],
    mean: Option<&mut [f32]>,
    variance: Option<&mut [f32]>,
) {
    let idx = layout.index(x, y);
    if let Some(mean) = mean {
        mean[idx] = half_mean(a[idx], b[idx]);
    }
    if let Some(variance) = variance {
        variance[idx] = half_variance(a[idx], b[idx]);
    }
}

/// Combine the halves over every pixel of the layout rect.
///
/// Only rect pixels are written, padding columns keep their contents.
pub fn combine_halves(
    layout: &BufferLayout,
    a: &[f32],
    b: &[f32],
    mean: Option<&mut [f32]>,
    variance: Option<&mut [f32]>,
) {
    assert_eq!(a.len(), layout.len(), "half A must match the layout");
    assert_eq!(b.len(), layout.len(), "half B must match the layout");

    if let Some(mean) = mean {
        fill_rect(layout, mean, |i| half_mean(a[i], b[i]));
    }
    if let Some(variance) = variance {
        fill_rect(layout, variance, |i| half_variance(a[i], b[i]));
    }

    tracing::debug!(rect = ?layout.rect(), "Combined halves");
}

fn fill_rect(layout: &BufferLayout, out: &mut [f32], f: impl Fn(usize) -> f32 + Sync) {
    assert_eq!(out.len(), layout.len(), "output must match the layout");
    let stride = layout.stride();
    let width = layout.width();

    out.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(row, chunk)| {
            let base = row * stride;
            for (i, v) in chunk[..width].iter_mut().enumerate() {
                *v = f(base + i);
            }
        });
}
