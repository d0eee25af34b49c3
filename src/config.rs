use crate::error::{Result, TiledPredictError};
use crate::window::{DEFAULT_SPLINE_POWER, MIN_WINDOW_SIZE};
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_OVERLAP_FRACTION: f64 = 0.25;
pub const DEFAULT_EPSILON: f64 = 1e-6;
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Patch geometry for one reconstruction run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchSpec {
    patch_size: usize,
    overlap_fraction: f64,
    stride: usize,
}

impl PatchSpec {
    pub fn new(patch_size: usize, overlap_fraction: f64) -> Result<Self> {
        if patch_size < MIN_WINDOW_SIZE {
            return Err(TiledPredictError::WindowTooSmall(patch_size));
        }
        if !(0.0..1.0).contains(&overlap_fraction) {
            return Err(TiledPredictError::InvalidOverlap(overlap_fraction));
        }

        let overlap = (patch_size as f64 * overlap_fraction).floor() as usize;
        let stride = patch_size - overlap;
        if stride == 0 {
            return Err(TiledPredictError::InvalidStride { patch_size, stride });
        }

        Ok(Self {
            patch_size,
            overlap_fraction,
            stride,
        })
    }

    /// Patch spec with the default quarter overlap: `stride = patch_size - patch_size / 4`.
    pub fn with_quarter_overlap(patch_size: usize) -> Result<Self> {
        Self::new(patch_size, DEFAULT_OVERLAP_FRACTION)
    }

    pub fn patch_size(&self) -> usize {
        self.patch_size
    }

    pub fn overlap_fraction(&self) -> f64 {
        self.overlap_fraction
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn overlap(&self) -> usize {
        self.patch_size - self.stride
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One patch at a time, in row-major order.
    #[default]
    Sequential,
    /// Predictions for `batch_size` patches run on the rayon pool, then are
    /// accumulated in row-major order.
    Parallel { batch_size: usize },
}

/// Algorithm parameters for a reconstruction run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    pub patch_size: usize,
    pub overlap_fraction: f64,
    pub spline_power: f64,
    pub epsilon: f64,
    pub execution: ExecutionMode,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            patch_size: 64,
            overlap_fraction: DEFAULT_OVERLAP_FRACTION,
            spline_power: DEFAULT_SPLINE_POWER,
            epsilon: DEFAULT_EPSILON,
            execution: ExecutionMode::Sequential,
        }
    }
}

/// Layout of a config file: algorithm settings live under `[cnn]`, other
/// tables and keys (model paths and the like) are ignored.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    cnn: ReconstructionConfig,
}

impl ReconstructionConfig {
    pub fn with_patch_size(patch_size: usize) -> Self {
        Self {
            patch_size,
            ..Self::default()
        }
    }

    /// Parse the `[cnn]` table of a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| TiledPredictError::Config(e.to_string()))?;
        Ok(file.cnn)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| {
            TiledPredictError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let file: ConfigFile = toml::from_str(&text).map_err(|e| {
            TiledPredictError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        Ok(file.cnn)
    }

    /// Check every value and derive the patch geometry.
    pub fn validate(&self) -> Result<PatchSpec> {
        if self.patch_size == 0 {
            return Err(TiledPredictError::InvalidPatchSize(self.patch_size));
        }
        if !self.spline_power.is_finite() || self.spline_power <= 0.0 {
            return Err(TiledPredictError::InvalidSplinePower(self.spline_power));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(TiledPredictError::InvalidEpsilon(self.epsilon));
        }
        if let ExecutionMode::Parallel { batch_size: 0 } = self.execution {
            return Err(TiledPredictError::InvalidBatchSize(0));
        }
        PatchSpec::new(self.patch_size, self.overlap_fraction)
    }
}
