//! Configuration types for the prefilter.
//!
//! [`FilterConfig`] replaces the renderer-global film constants (pass stride
//! and denoising pass offset) with an explicit value, and carries the named
//! epsilons and the per-stage NLM parameters of the prefilter pipelines.
//! Configs can be loaded from YAML or JSON; missing fields take defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::buffer::DEFAULT_ROW_ALIGNMENT;
use crate::error::{Error, Result};

/// Floor applied to half-sample denominators before the shadow division.
pub const DEFAULT_RATIO_EPSILON: f32 = 1e-7;

/// Added to the variance normalization of every patch element.
pub const DEFAULT_WEIGHT_EPSILON: f32 = 1e-7;

// ============================================================================
// Render pass layout
// ============================================================================

/// Channel offsets of the shadow passes, relative to the denoising block of
/// a render-buffer pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowPasses {
    /// Sample-weighted denominator of half A.
    pub denominator_a: usize,
    /// Shadow ratio numerator of half A.
    pub numerator_a: usize,
    /// Squared-sample accumulator of half A.
    pub variance_a: usize,
    pub denominator_b: usize,
    pub numerator_b: usize,
    pub variance_b: usize,
}

impl Default for ShadowPasses {
    fn default() -> Self {
        Self {
            denominator_a: 14,
            numerator_a: 15,
            variance_a: 16,
            denominator_b: 17,
            numerator_b: 18,
            variance_b: 19,
        }
    }
}

impl ShadowPasses {
    /// Highest channel offset used.
    pub fn max_offset(&self) -> usize {
        [
            self.denominator_a,
            self.numerator_a,
            self.variance_a,
            self.denominator_b,
            self.numerator_b,
            self.variance_b,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Channel offsets of a generic feature pass (normal, albedo, depth, ...),
/// relative to the denoising block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturePass {
    /// Accumulated sum of the feature.
    pub mean_offset: usize,
    /// Accumulated squared deviation of the feature.
    pub variance_offset: usize,
}

impl FeaturePass {
    pub const fn new(mean_offset: usize, variance_offset: usize) -> Self {
        Self {
            mean_offset,
            variance_offset,
        }
    }

    pub fn max_offset(&self) -> usize {
        self.mean_offset.max(self.variance_offset)
    }
}

// ============================================================================
// NLM parameters
// ============================================================================

/// Parameters of a single non-local-means pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NlmParams {
    /// Half size of the search window (`r`).
    pub radius: i32,
    /// Half size of the compared patches (`f`).
    pub patch_radius: i32,
    /// Bias correction factor (`a`), nominally 1.0.
    /// Larger values tolerate noisier variance estimates.
    pub bias_correction: f32,
    /// Squared filter strength (`k_2`). Higher is smoother.
    pub strength_sq: f32,
    /// Keeps the per-element normalization finite for zero variance.
    pub weight_epsilon: f32,
    /// A pixel whose total weight is not above this value keeps its noisy
    /// value and is counted as collapsed.
    pub min_weight_sum: f32,
}

impl Default for NlmParams {
    fn default() -> Self {
        Self::new(5, 3, 1.0, 0.25)
    }
}

impl NlmParams {
    pub const fn new(
        radius: i32,
        patch_radius: i32,
        bias_correction: f32,
        strength_sq: f32,
    ) -> Self {
        Self {
            radius,
            patch_radius,
            bias_correction,
            strength_sq,
            weight_epsilon: DEFAULT_WEIGHT_EPSILON,
            min_weight_sum: 0.0,
        }
    }

    pub fn validate(&self) {
        assert!(
            self.radius >= 0,
            "radius must be non-negative, got {}",
            self.radius
        );
        assert!(
            self.patch_radius >= 0,
            "patch_radius must be non-negative, got {}",
            self.patch_radius
        );
        assert!(
            self.bias_correction.is_finite(),
            "bias_correction must be finite, got {}",
            self.bias_correction
        );
        assert!(
            self.strength_sq >= 0.0,
            "strength_sq must be non-negative, got {}",
            self.strength_sq
        );
        assert!(
            self.weight_epsilon > 0.0,
            "weight_epsilon must be positive, got {}",
            self.weight_epsilon
        );
        assert!(
            self.min_weight_sum >= 0.0,
            "min_weight_sum must be non-negative, got {}",
            self.min_weight_sum
        );
    }
}

// ============================================================================
// Pipeline stages
// ============================================================================

/// NLM parameters of the shadow prefilter stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowPrefilterConfig {
    /// Buffer variance filtered with the sample variance as guide.
    pub variance_smoothing: NlmParams,
    /// Each half filtered with the other half as guide.
    pub half_filter: NlmParams,
    /// Second cross-guided pass driven by the residual variance.
    pub residual_filter: NlmParams,
}

impl Default for ShadowPrefilterConfig {
    fn default() -> Self {
        Self {
            variance_smoothing: NlmParams::new(6, 3, 4.0, 1.0),
            half_filter: NlmParams::new(5, 3, 1.0, 0.25),
            residual_filter: NlmParams::new(4, 2, 1.0, 0.5),
        }
    }
}

impl ShadowPrefilterConfig {
    pub fn validate(&self) {
        self.variance_smoothing.validate();
        self.half_filter.validate();
        self.residual_filter.validate();
    }
}

// ============================================================================
// Filter config
// ============================================================================

/// Top-level prefilter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Floats per render-buffer pixel.
    pub pass_stride: usize,
    /// Offset of the denoising block inside a render-buffer pixel.
    pub pass_denoising_offset: usize,
    /// Row alignment of working buffers, in elements.
    pub row_alignment: usize,
    /// Floor for the shadow ratio denominators.
    pub ratio_epsilon: f32,
    pub shadow: ShadowPasses,
    pub shadow_prefilter: ShadowPrefilterConfig,
    /// Self-guided pass applied to extracted features.
    pub feature_filter: NlmParams,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            pass_stride: 20,
            pass_denoising_offset: 0,
            row_alignment: DEFAULT_ROW_ALIGNMENT,
            ratio_epsilon: DEFAULT_RATIO_EPSILON,
            shadow: ShadowPasses::default(),
            shadow_prefilter: ShadowPrefilterConfig::default(),
            feature_filter: NlmParams::new(2, 2, 1.0, 0.25),
        }
    }
}

impl FilterConfig {
    /// Whether a channel offset of the denoising block lies inside a pixel.
    #[inline]
    pub fn channel_fits(&self, offset: usize) -> bool {
        self.pass_denoising_offset + offset < self.pass_stride
    }

    pub fn validate(&self) {
        assert!(self.pass_stride > 0, "pass_stride must be positive");
        assert!(self.row_alignment > 0, "row_alignment must be positive");
        assert!(
            self.ratio_epsilon > 0.0,
            "ratio_epsilon must be positive, got {}",
            self.ratio_epsilon
        );
        assert!(
            self.channel_fits(self.shadow.max_offset()),
            "shadow channel {} exceeds pass_stride {} (denoising offset {})",
            self.shadow.max_offset(),
            self.pass_stride,
            self.pass_denoising_offset
        );
        self.shadow_prefilter.validate();
        self.feature_filter.validate();
    }

    /// Load a config from a `.yaml`/`.yml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let text = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = match format {
            ConfigFormat::Yaml => {
                serde_yml::from_str(&text).map_err(|source| Error::ParseYaml {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            ConfigFormat::Json => {
                serde_json::from_str(&text).map_err(|source| Error::ParseJson {
                    path: path.to_path_buf(),
                    source,
                })?
            }
        };

        tracing::debug!(path = %path.display(), ?format, "Loaded filter config");
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(Error::UnsupportedConfigFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}
