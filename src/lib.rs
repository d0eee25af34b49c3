// Library exports for testing and reuse

pub mod accumulate;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod grid;
#[cfg(feature = "gdal")]
pub mod io;
pub mod output;
pub mod predictor;
pub mod raster;
pub mod reconstruct;
pub mod window;

// Re-export commonly used types
pub use accumulate::{AccumulationBuffer, Reconstruction};
pub use config::{ExecutionMode, PatchSpec, ReconstructionConfig};
pub use error::{PredictorError, Result, TiledPredictError};
pub use executor::PatchExecutor;
pub use grid::{PatchGrid, PatchOrigin};
#[cfg(feature = "gdal")]
pub use io::{write_prediction, GdalRaster};
pub use output::{Compression, OutputOptions};
pub use predictor::{predictor_fn, BandPredictor, LinearPredictor, Predictor};
pub use raster::{MemoryRaster, RasterMetadata, RasterSource};
pub use reconstruct::{reconstruct, reconstruct_source, Reconstructor};
pub use window::{create_weight_mask, spline_window, weight_mask};
