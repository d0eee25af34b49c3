use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use geotiff_tiled_predict::cli::Args;
use geotiff_tiled_predict::error::{Result, TiledPredictError};
use geotiff_tiled_predict::io::{self, GdalRaster};
use geotiff_tiled_predict::raster::RasterSource;
use geotiff_tiled_predict::reconstruct::Reconstructor;

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("=== GeoTIFF Tiled Predictor ===");

    // Set thread pool size if specified
    if let Some(n_threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build_global()
            .map_err(|e| TiledPredictError::Config(format!("failed to build thread pool: {}", e)))?;
        info!("Using {} threads", n_threads);
    } else {
        info!("Using all available threads");
    }

    // Validate everything before touching the input
    let config = args.reconstruction_config()?;
    let predictor = args.predictor()?;
    let output_options = args.output_options()?;
    let reconstructor = Reconstructor::new(&config)?;

    info!(
        "Patch size: {}, stride: {}, spline power: {}, epsilon: {:e}",
        reconstructor.spec().patch_size(),
        reconstructor.spec().stride(),
        config.spline_power,
        config.epsilon
    );

    // Read input raster
    let raster = GdalRaster::open(&args.input)?;
    let metadata = raster.metadata().clone();
    info!(
        "Raster size: {}x{}, {} bands",
        metadata.width, metadata.height, metadata.band_count
    );

    let data = raster.read()?;

    // Predict and blend
    let result = reconstructor.execute(data.view(), &*predictor)?;

    let uncovered = result.uncovered_count(0.0);
    if uncovered > 0 {
        warn!(
            "{} of {} pixels are outside every patch",
            uncovered,
            metadata.width * metadata.height
        );
    }

    let values = if output_options.mask_uncovered {
        result.values_with_nodata(0.0, f32::NAN)
    } else {
        result.values
    };

    // Write output
    info!("Writing output: {}", args.output);
    io::write_prediction(&args.output, &values, &metadata, &output_options)?;

    info!("=== Done! ===");
    Ok(())
}
