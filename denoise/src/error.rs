//! Error types for prefilter passes and configuration loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::geometry::Rect;

/// Errors returned by pass-level drivers and config loading.
///
/// Per-pixel kernels never return errors; invalid geometry there is a caller
/// bug. The pass drivers check geometry once up front instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Prefilter rect is empty: {0:?}")]
    EmptyRect(Rect),

    #[error("At least 2 samples are required for variance estimation, got {sample}")]
    InsufficientSamples { sample: u32 },

    #[error("Tile {axis} boundaries must be non-decreasing, got {bounds:?}")]
    NonMonotonicTileBounds { axis: char, bounds: [i32; 4] },

    #[error("Tile {axis} boundaries {bounds:?} do not cover rect {rect:?}")]
    TileBoundsDoNotCoverRect {
        axis: char,
        bounds: [i32; 4],
        rect: Rect,
    },

    #[error("Tile {tile} buffer holds {len} floats, pixel ({x}, {y}) needs {required}")]
    TileBufferTooSmall {
        tile: usize,
        x: i32,
        y: i32,
        len: usize,
        required: usize,
    },

    #[error("Channel {offset} at offset {denoising_offset} exceeds pass_stride {pass_stride}")]
    ChannelOutOfRange {
        offset: usize,
        denoising_offset: usize,
        pass_stride: usize,
    },

    #[error("Failed to read config file '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse YAML config '{path}': {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    #[error("Failed to parse JSON config '{path}': {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported config file extension: '{path}'")]
    UnsupportedConfigFormat { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, Error>;
