use crate::config::{ExecutionMode, ReconstructionConfig, DEFAULT_BATCH_SIZE};
use crate::error::{Result, TiledPredictError};
use crate::output::{Compression, OutputOptions};
use crate::predictor::{BandPredictor, LinearPredictor, Predictor};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "tiled-predict")]
#[command(about = "Predict a single-band raster from stacked predictors using blended overlapping patches")]
#[command(version)]
#[command(author = "Huimori Project")]
pub struct Args {
    /// Input GeoTIFF path (stacked predictor bands)
    #[arg(short, long, value_name = "FILE")]
    pub input: String,

    /// Output GeoTIFF path (single-band float32)
    #[arg(short, long, value_name = "FILE")]
    pub output: String,

    /// TOML configuration file; settings are read from its [cnn] table
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// Patch edge length in pixels (overrides the config file)
    #[arg(short, long, value_name = "PIXELS")]
    pub patch_size: Option<usize>,

    /// Fraction of the patch shared with the next patch (default 0.25)
    #[arg(long, value_name = "FRACTION")]
    pub overlap: Option<f64>,

    /// Exponent of the spline blending window (default 2)
    #[arg(long, value_name = "POWER")]
    pub spline_power: Option<f64>,

    /// Floor applied to accumulated weights before dividing (default 1e-6)
    #[arg(long, value_name = "VALUE")]
    pub epsilon: Option<f64>,

    /// Pass this input band (0-based) through as the prediction
    #[arg(long, value_name = "INDEX", conflicts_with = "weights")]
    pub band: Option<usize>,

    /// Linear model weights, one per input band (comma separated)
    #[arg(long, value_name = "W1,W2,...", value_delimiter = ',', allow_hyphen_values = true)]
    pub weights: Option<Vec<f32>>,

    /// Intercept of the linear model
    #[arg(long, value_name = "VALUE", default_value_t = 0.0, allow_hyphen_values = true)]
    pub bias: f32,

    /// Run predictions on a thread pool, in batches of --batch-size patches
    #[arg(long)]
    pub parallel: bool,

    /// Patches predicted per parallel batch
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Number of threads (default: all available)
    #[arg(short, long, value_name = "N")]
    pub threads: Option<usize>,

    /// Output compression: DEFLATE, LZW, ZSTD or NONE
    #[arg(long, value_name = "TYPE", default_value = "DEFLATE")]
    pub compression: String,

    /// Output block size (multiple of 16); 0 writes a striped GeoTIFF
    #[arg(long, value_name = "PIXELS", default_value_t = 512)]
    pub tile_size: usize,

    /// Write NaN nodata where no patch contributed
    #[arg(long)]
    pub mask_uncovered: bool,

    /// Build overviews in the output
    #[arg(long)]
    pub overviews: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Defaults, overridden by the config file, overridden by flags.
    pub fn reconstruction_config(&self) -> Result<ReconstructionConfig> {
        let mut config = match &self.config {
            Some(path) => ReconstructionConfig::from_toml_file(path)?,
            None => ReconstructionConfig::default(),
        };

        if let Some(patch_size) = self.patch_size {
            config.patch_size = patch_size;
        }
        if let Some(overlap) = self.overlap {
            config.overlap_fraction = overlap;
        }
        if let Some(power) = self.spline_power {
            config.spline_power = power;
        }
        if let Some(epsilon) = self.epsilon {
            config.epsilon = epsilon;
        }

        if self.parallel || self.batch_size.is_some() {
            let batch_size = match (self.batch_size, config.execution) {
                (Some(n), _) => n,
                (None, ExecutionMode::Parallel { batch_size }) => batch_size,
                (None, ExecutionMode::Sequential) => DEFAULT_BATCH_SIZE,
            };
            config.execution = ExecutionMode::Parallel { batch_size };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn predictor(&self) -> Result<Box<dyn Predictor + Sync>> {
        match (&self.weights, self.band) {
            (Some(weights), None) => Ok(Box::new(LinearPredictor {
                weights: weights.clone(),
                bias: self.bias,
            })),
            (None, Some(band)) => Ok(Box::new(BandPredictor { band })),
            _ => Err(TiledPredictError::Config(
                "select a predictor with either --band or --weights".to_string(),
            )),
        }
    }

    pub fn output_options(&self) -> Result<OutputOptions> {
        let options = OutputOptions {
            compression: self.compression.parse::<Compression>()?,
            tile_size: (self.tile_size > 0).then_some(self.tile_size),
            mask_uncovered: self.mask_uncovered,
            build_overviews: self.overviews,
        };
        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["tiled-predict", "-i", "in.tif", "-o", "out.tif"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--band", "0"]);
        let config = args.reconstruction_config().unwrap();
        assert_eq!(config, ReconstructionConfig::default());

        let options = args.output_options().unwrap();
        assert_eq!(options, OutputOptions::default());
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[cnn]\npatch_size = 128\nepsilon = 1e-4").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = parse(&["--config", &path, "--patch-size", "32", "--band", "1"]);
        let config = args.reconstruction_config().unwrap();
        assert_eq!(config.patch_size, 32);
        assert_eq!(config.epsilon, 1e-4);
    }

    #[test]
    fn test_parallel_flags() {
        let args = parse(&["--band", "0", "--parallel"]);
        assert_eq!(
            args.reconstruction_config().unwrap().execution,
            ExecutionMode::Parallel {
                batch_size: DEFAULT_BATCH_SIZE
            }
        );

        let args = parse(&["--band", "0", "--batch-size", "8"]);
        assert_eq!(
            args.reconstruction_config().unwrap().execution,
            ExecutionMode::Parallel { batch_size: 8 }
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let args = parse(&["--band", "0", "--patch-size", "2"]);
        assert!(args.reconstruction_config().is_err());

        let args = parse(&["--band", "0", "--overlap", "1.5"]);
        assert!(args.reconstruction_config().is_err());

        let args = parse(&["--band", "0", "--compression", "JPEG"]);
        assert!(args.output_options().is_err());

        let args = parse(&["--band", "0", "--tile-size", "100"]);
        assert!(args.output_options().is_err());
    }

    #[test]
    fn test_striped_output() {
        let args = parse(&["--band", "0", "--tile-size", "0"]);
        assert_eq!(args.output_options().unwrap().tile_size, None);
    }

    #[test]
    fn test_linear_predictor_from_flags() {
        let args = parse(&["--weights", "0.5,-1.5,2", "--bias", "-0.25"]);
        assert_eq!(args.weights, Some(vec![0.5, -1.5, 2.0]));
        assert_eq!(args.bias, -0.25);
        assert!(args.predictor().is_ok());
    }

    #[test]
    fn test_predictor_required() {
        let args = parse(&[]);
        assert!(matches!(args.predictor(), Err(e) if e.is_configuration_error()));

        let args = parse(&["--band", "2"]);
        assert!(args.predictor().is_ok());
    }

    #[test]
    fn test_band_and_weights_conflict() {
        let argv = ["tiled-predict", "-i", "a", "-o", "b", "--band", "0", "--weights", "1,2"];
        assert!(Args::try_parse_from(argv).is_err());
    }
}
