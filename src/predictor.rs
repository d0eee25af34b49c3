//! Prediction capability consumed by the patch executor.

use crate::error::PredictorError;
use ndarray::{Array2, ArrayView3, Axis};

/// Maps a multi-band tile `(bands, size, size)` to a single-band tile
/// `(size, size)`.
///
/// Implementations may be expensive (a loaded model, say) but must not
/// depend on the engine's state. The sequential executor never calls the
/// same instance concurrently; parallel execution additionally needs `Sync`.
pub trait Predictor {
    fn predict(&self, tile: ArrayView3<'_, f32>) -> Result<Array2<f32>, PredictorError>;
}

/// Adapter turning a closure into a [`Predictor`]; see [`predictor_fn`].
#[derive(Clone)]
pub struct FnPredictor<F> {
    func: F,
}

/// Wraps `func` so it can be handed to the executor as a predictor.
pub fn predictor_fn<F>(func: F) -> FnPredictor<F>
where
    F: Fn(ArrayView3<'_, f32>) -> Result<Array2<f32>, PredictorError>,
{
    FnPredictor { func }
}

impl<F> Predictor for FnPredictor<F>
where
    F: Fn(ArrayView3<'_, f32>) -> Result<Array2<f32>, PredictorError>,
{
    fn predict(&self, tile: ArrayView3<'_, f32>) -> Result<Array2<f32>, PredictorError> {
        (self.func)(tile)
    }
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn predict(&self, tile: ArrayView3<'_, f32>) -> Result<Array2<f32>, PredictorError> {
        (**self).predict(tile)
    }
}

/// Passes one input band through unchanged.
#[derive(Debug, Clone)]
pub struct BandPredictor {
    pub band: usize,
}

impl Predictor for BandPredictor {
    fn predict(&self, tile: ArrayView3<'_, f32>) -> Result<Array2<f32>, PredictorError> {
        let bands = tile.len_of(Axis(0));
        if self.band >= bands {
            return Err(format!("band {} requested but tile has {} bands", self.band, bands).into());
        }
        Ok(tile.index_axis(Axis(0), self.band).to_owned())
    }
}

/// Per-pixel linear model: `bias + sum(weights[b] * tile[b])`.
#[derive(Debug, Clone)]
pub struct LinearPredictor {
    pub weights: Vec<f32>,
    pub bias: f32,
}

impl Predictor for LinearPredictor {
    fn predict(&self, tile: ArrayView3<'_, f32>) -> Result<Array2<f32>, PredictorError> {
        let (bands, height, width) = tile.dim();
        if bands != self.weights.len() {
            return Err(format!(
                "linear model expects {} bands, tile has {}",
                self.weights.len(),
                bands
            )
            .into());
        }

        let mut output = Array2::from_elem((height, width), self.bias);
        for (band, &weight) in tile.axis_iter(Axis(0)).zip(&self.weights) {
            output.scaled_add(weight, &band);
        }
        Ok(output)
    }
}
