use crate::grid::PatchOrigin;
use thiserror::Error;

/// Error returned by a [`crate::predictor::Predictor`] implementation.
pub type PredictorError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum TiledPredictError {
    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("Invalid patch size: {0} (must be positive)")]
    InvalidPatchSize(usize),

    #[error("Invalid overlap fraction: {0} (must be in [0, 1))")]
    InvalidOverlap(f64),

    #[error("Invalid stride {stride} for patch size {patch_size} (must be at least 1)")]
    InvalidStride { patch_size: usize, stride: usize },

    #[error("Patch size {patch_size} exceeds raster dimensions {width}x{height}")]
    PatchLargerThanRaster {
        patch_size: usize,
        width: usize,
        height: usize,
    },

    #[error("Spline window size {0} is too small (minimum 4)")]
    WindowTooSmall(usize),

    #[error("Invalid spline power: {0} (must be finite and positive)")]
    InvalidSplinePower(f64),

    #[error("Invalid epsilon: {0} (must be finite and positive)")]
    InvalidEpsilon(f64),

    #[error("Invalid batch size: {0} (must be positive)")]
    InvalidBatchSize(usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Prediction failed for patch at {origin}: {source}")]
    Prediction {
        origin: PatchOrigin,
        #[source]
        source: PredictorError,
    },

    #[error("Prediction for patch at {origin} has shape {found:?}, expected {expected:?}")]
    DimensionMismatch {
        origin: PatchOrigin,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Input raster has invalid dimensions: {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("Pixel size is non-positive: {0}")]
    InvalidPixelSize(f64),

    #[error("Invalid compression type: {0}")]
    InvalidCompression(String),

    #[error("Invalid tile size: {0} (must be multiple of 16)")]
    InvalidTileSize(usize),
}

impl TiledPredictError {
    /// True for errors caused by invalid patch, window or run settings.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPatchSize(_)
                | Self::InvalidOverlap(_)
                | Self::InvalidStride { .. }
                | Self::PatchLargerThanRaster { .. }
                | Self::WindowTooSmall(_)
                | Self::InvalidSplinePower(_)
                | Self::InvalidEpsilon(_)
                | Self::InvalidBatchSize(_)
                | Self::Config(_)
        )
    }

    /// Origin of the failing patch, for prediction and shape errors.
    pub fn origin(&self) -> Option<PatchOrigin> {
        match self {
            Self::Prediction { origin, .. } | Self::DimensionMismatch { origin, .. } => {
                Some(*origin)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TiledPredictError>;
