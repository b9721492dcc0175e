//! Generalized non-local-means filter.
//!
//! Every pixel is replaced by a weighted average of the pixels in its search
//! window. The weight of a candidate depends on how similar the patches around
//! the two pixels are in a separate guide image, measured against the guide's
//! per-pixel variance:
//!
//! ```text
//! d(p, q) = mean over patch offsets t of
//!     ((g[p+t] - g[q+t])^2 - a * (v[p+t] + min(v[p+t], v[q+t])))
//!     / (eps + k_2 * (v[p+t] + v[q+t]))
//! w(p, q) = exp(-max(0, d(p, q)))
//! ```
//!
//! Patches are truncated so that both of them stay inside the rect, so the
//! filter never reads outside the rect or into padding columns.


use glam::IVec2;
use rayon::prelude::*;

use crate::buffer::BufferLayout;
use crate::config::NlmParams;
use crate::math::fast_exp;

/// Read-only images of one NLM pass, all sharing `layout`.
#[derive(Debug, Clone, Copy)]
pub struct NlmInputs<'a> {
    /// Image that gets averaged.
    pub noisy: &'a [f32],
    /// Image the patch distances are computed on.
    pub guide: &'a [f32],
    /// Per-pixel variance of `guide`.
    pub variance: &'a [f32],
    pub layout: BufferLayout,
}

impl<'a> NlmInputs<'a> {
    pub fn new(
        layout: BufferLayout,
        noisy: &'a [f32],
        guide: &'a [f32],
        variance: &'a [f32],
    ) -> Self {
        let len = layout.len();
        assert_eq!(noisy.len(), len, "noisy image must match the layout");
        assert_eq!(guide.len(), len, "guide image must match the layout");
        assert_eq!(variance.len(), len, "variance image must match the layout");
        Self {
            noisy,
            guide,
            variance,
            layout,
        }
    }
}

/// Result of filtering a single pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NlmPixel {
    pub value: f32,
    pub weight_sum: f32,
    /// The weight sum was not above `min_weight_sum` and `value` is the
    /// unfiltered input.
    pub collapsed: bool,
}

/// Counters of one NLM pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NlmStats {
    pub pixels: usize,
    pub collapsed: usize,
}

impl NlmStats {
    pub fn merge(self, other: Self) -> Self {
        Self {
            pixels: self.pixels + other.pixels,
            collapsed: self.collapsed + other.collapsed,
        }
    }
}

/// Patch distance between `p` and `q`, normalized by the patch element count.
#[inline]
fn patch_distance(inputs: &NlmInputs<'_>, p: IVec2, q: IVec2, params: &NlmParams) -> f32 {
    let layout = &inputs.layout;
    let rect = layout.rect();
    let f = IVec2::splat(params.patch_radius);

    let low = (rect.min() - q).max(rect.min() - p).max(-f);
    let high = (rect.max() - q)
        .min(rect.max() - p)
        .min(f.saturating_add(IVec2::ONE));
    let extent = high - low;
    let width = extent.x as usize;

    let mut distance = 0.0f32;
    for dy in low.y..high.y {
        let p_row = layout.index(p.x + low.x, p.y + dy);
        let q_row = layout.index(q.x + low.x, q.y + dy);
        let guide_p = &inputs.guide[p_row..p_row + width];
        let guide_q = &inputs.guide[q_row..q_row + width];
        let var_p = &inputs.variance[p_row..p_row + width];
        let var_q = &inputs.variance[q_row..q_row + width];

        for i in 0..width {
            let diff = guide_p[i] - guide_q[i];
            let vp = var_p[i];
            let vq = var_q[i];
            distance += (diff * diff - params.bias_correction * (vp + vp.min(vq)))
                / (params.weight_epsilon + params.strength_sq * (vp + vq));
        }
    }

    distance / (extent.x * extent.y) as f32
}

/// Filter pixel (x, y) of the layout rect.
#[inline]
pub fn non_local_means_pixel(
    x: i32,
    y: i32,
    inputs: &NlmInputs<'_>,
    params: &NlmParams,
) -> NlmPixel {
    let rect = inputs.layout.rect();
    let p = IVec2::new(x, y);
    let (low, high) = rect.clamp_window(p, params.radius);

    let mut sum_image = 0.0f32;
    let mut sum_weight = 0.0f32;
    for qy in low.y..high.y {
        for qx in low.x..high.x {
            let q = IVec2::new(qx, qy);
            let distance = patch_distance(inputs, p, q, params);
            // A NaN distance must poison the weight sum, `max` would map it to 0.
            let weight = if distance.is_nan() {
                f32::NAN
            } else {
                fast_exp(-distance.max(0.0))
            };
            sum_image += weight * inputs.noisy[inputs.layout.index(qx, qy)];
            sum_weight += weight;
        }
    }

    if sum_weight.is_nan() || sum_weight <= params.min_weight_sum {
        return NlmPixel {
            value: inputs.noisy[inputs.layout.index(x, y)],
            weight_sum: sum_weight,
            collapsed: true,
        };
    }

    NlmPixel {
        value: sum_image / sum_weight,
        weight_sum: sum_weight,
        collapsed: false,
    }
}

/// Filter every pixel of the layout rect into `output`.
///
/// Rows are distributed across the rayon pool. Padding columns of `output`
/// are left untouched.
pub fn non_local_means(
    inputs: &NlmInputs<'_>,
    params: &NlmParams,
    output: &mut [f32],
) -> NlmStats {
    params.validate();
    let layout = inputs.layout;
    assert_eq!(output.len(), layout.len(), "output must match the layout");

    let rect = layout.rect();
    let stride = layout.stride();
    let width = layout.width();

    let stats = output
        .par_chunks_mut(stride)
        .enumerate()
        .map(|(row, chunk)| {
            let y = rect.y0 + row as i32;
            let mut stats = NlmStats::default();
            for (i, out) in chunk[..width].iter_mut().enumerate() {
                let pixel = non_local_means_pixel(rect.x0 + i as i32, y, inputs, params);
                *out = pixel.value;
                stats.pixels += 1;
                stats.collapsed += usize::from(pixel.collapsed);
            }
            stats
        })
        .reduce(NlmStats::default, NlmStats::merge);

    if stats.collapsed > 0 {
        tracing::warn!(
            ?rect,
            collapsed = stats.collapsed,
            pixels = stats.pixels,
            "NLM weights collapsed, kept unfiltered values"
        );
    }
    tracing::debug!(
        ?rect,
        radius = params.radius,
        patch_radius = params.patch_radius,
        "NLM pass done"
    );

    stats
}
