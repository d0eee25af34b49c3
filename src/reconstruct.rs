//! Tiled prediction over a whole raster with spline-window blending.

use crate::accumulate::{AccumulationBuffer, Reconstruction};
use crate::config::{ExecutionMode, PatchSpec, ReconstructionConfig};
use crate::error::Result;
use crate::executor::PatchExecutor;
use crate::grid::{PatchGrid, PatchOrigin};
use crate::predictor::Predictor;
use crate::raster::RasterSource;
use crate::window::create_weight_mask;
use log::{info, warn};
use ndarray::{Array2, ArrayView3};

/// Validated settings plus the weight mask shared by every patch of a run.
#[derive(Debug, Clone)]
pub struct Reconstructor {
    spec: PatchSpec,
    mask: Array2<f64>,
    epsilon: f64,
    execution: ExecutionMode,
}

impl Reconstructor {
    pub fn new(config: &ReconstructionConfig) -> Result<Self> {
        let spec = config.validate()?;
        let mask = create_weight_mask(spec.patch_size(), config.spline_power)?;

        Ok(Self {
            spec,
            mask,
            epsilon: config.epsilon,
            execution: config.execution,
        })
    }

    pub fn spec(&self) -> &PatchSpec {
        &self.spec
    }

    pub fn weight_mask(&self) -> &Array2<f64> {
        &self.mask
    }

    /// Patch plan for a `height` x `width` raster.
    pub fn plan(&self, height: usize, width: usize) -> Result<PatchGrid> {
        let grid = PatchGrid::new(height, width, self.spec.patch_size(), self.spec.stride())?;

        info!(
            "Patch grid: {} patches ({}x{}), patch size {}, stride {}",
            grid.total_patches,
            grid.num_patches_x,
            grid.num_patches_y,
            self.spec.patch_size(),
            self.spec.stride()
        );
        if grid.uncovered_rows() > 0 || grid.uncovered_cols() > 0 {
            warn!(
                "Last {} rows and {} columns are not covered by any patch",
                grid.uncovered_rows(),
                grid.uncovered_cols()
            );
        }

        Ok(grid)
    }

    /// Run one patch at a time, in row-major order.
    pub fn run<P: Predictor + ?Sized>(
        &self,
        raster: ArrayView3<'_, f32>,
        predictor: &P,
    ) -> Result<Reconstruction> {
        let (_, height, width) = raster.dim();
        let grid = self.plan(height, width)?;
        let executor = PatchExecutor::new(raster, predictor, self.spec.patch_size());
        let mut buffer = AccumulationBuffer::new(height, width);

        for result in executor.iter(&grid) {
            let (origin, tile) = result?;
            buffer.accumulate(origin, tile.view(), self.mask.view())?;
        }

        Ok(self.finish(buffer))
    }

    /// Predict `batch_size` patches at a time on the rayon pool.
    ///
    /// Accumulation stays in row-major order, so the output is identical to
    /// [`Reconstructor::run`].
    pub fn run_parallel<P: Predictor + Sync + ?Sized>(
        &self,
        raster: ArrayView3<'_, f32>,
        predictor: &P,
        batch_size: usize,
    ) -> Result<Reconstruction> {
        let (_, height, width) = raster.dim();
        let grid = self.plan(height, width)?;
        let executor = PatchExecutor::new(raster, predictor, self.spec.patch_size());
        let mut buffer = AccumulationBuffer::new(height, width);

        let origins: Vec<PatchOrigin> = grid.iter().collect();
        for batch in origins.chunks(batch_size.max(1)) {
            let tiles = executor.predict_batch(batch)?;
            for (&origin, tile) in batch.iter().zip(&tiles) {
                buffer.accumulate(origin, tile.view(), self.mask.view())?;
            }
            info!(
                "Processed {}/{} patches",
                buffer.patch_count(),
                grid.total_patches
            );
        }

        Ok(self.finish(buffer))
    }

    /// Run with the execution mode from the configuration.
    pub fn execute<P: Predictor + Sync + ?Sized>(
        &self,
        raster: ArrayView3<'_, f32>,
        predictor: &P,
    ) -> Result<Reconstruction> {
        match self.execution {
            ExecutionMode::Sequential => self.run(raster, predictor),
            ExecutionMode::Parallel { batch_size } => {
                self.run_parallel(raster, predictor, batch_size)
            }
        }
    }

    fn finish(&self, buffer: AccumulationBuffer) -> Reconstruction {
        info!("Blending {} patch predictions", buffer.patch_count());
        buffer.finalize(self.epsilon)
    }
}

/// Reconstruct a full raster from patch predictions.
pub fn reconstruct<P: Predictor + Sync + ?Sized>(
    raster: ArrayView3<'_, f32>,
    predictor: &P,
    config: &ReconstructionConfig,
) -> Result<Reconstruction> {
    Reconstructor::new(config)?.execute(raster, predictor)
}

/// Read `source` and reconstruct it.
pub fn reconstruct_source<S, P>(
    source: &S,
    predictor: &P,
    config: &ReconstructionConfig,
) -> Result<Reconstruction>
where
    S: RasterSource + ?Sized,
    P: Predictor + Sync + ?Sized,
{
    let reconstructor = Reconstructor::new(config)?;
    let data = source.read()?;
    reconstructor.execute(data.view(), predictor)
}
