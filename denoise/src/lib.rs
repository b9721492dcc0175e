//! Denoise - prefiltering of Monte-Carlo render buffers.
//!
//! This library prepares the auxiliary passes of a path-traced render for
//! denoising:
//! - Extraction of shadow and feature statistics from 3x3 tile neighbourhoods
//! - Combination of independent half-sample estimates
//! - A generalized non-local-means filter guided by a secondary image and its variance
//! - The full shadow and feature prefilter pipelines built from those kernels
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use denoise::{prefilter_shadow, FilterConfig, Rect, TileBuffer, TileGrid};
//!
//! let config = FilterConfig::default();
//! let rect = Rect::new(0, 0, 64, 64);
//! let grid = TileGrid::single(TileBuffer::new(&render_pixels, 0, 64), rect);
//!
//! let shadow = prefilter_shadow(&grid, 128, rect, &config)?;
//! println!("collapsed pixels: {}", shadow.stats.collapsed);
//! ```

pub(crate) mod math;

pub mod buffer;
pub mod combine;
pub mod config;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod log_setup;
pub mod nlm;
pub mod prefilter;
pub mod tile;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Geometry and buffers
// ============================================================================

pub use buffer::{BufferLayout, RectBuffer, DEFAULT_ROW_ALIGNMENT};
pub use geometry::{align_up, Rect};
pub use tile::{TileBuffer, TileGrid};

// ============================================================================
// Configuration and errors
// ============================================================================

pub use config::{FeaturePass, FilterConfig, NlmParams, ShadowPasses, ShadowPrefilterConfig};
pub use error::{Error, Result};

// ============================================================================
// Kernels
// ============================================================================

pub use combine::{combine_halves, combine_halves_pixel};
pub use extract::{
    divide_shadow, divide_shadow_pixel, feature_pixel, get_feature, FeatureBuffers,
    FeatureSample, ShadowBuffers, ShadowSample,
};
pub use nlm::{non_local_means, non_local_means_pixel, NlmInputs, NlmPixel, NlmStats};

// ============================================================================
// Pipelines
// ============================================================================

pub use prefilter::{prefilter_feature, prefilter_shadow, PrefilterOutput};
