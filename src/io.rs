use crate::error::{Result, TiledPredictError};
use crate::output::{overview_levels, OutputOptions};
use crate::raster::{RasterMetadata, RasterSource};
use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, RasterBand};
use gdal::{Dataset, DriverManager, Metadata};
use log::{debug, info};
use ndarray::{Array2, Array3, Axis};
use std::path::{Path, PathBuf};

/// Multi-band raster on disk, read through GDAL.
#[derive(Debug, Clone)]
pub struct GdalRaster {
    path: PathBuf,
    metadata: RasterMetadata,
}

impl GdalRaster {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info!("Opening input raster: {}", path.display());
        let dataset = Dataset::open(&path)?;
        let metadata = extract_metadata_from_dataset(&dataset)?;

        debug!(
            "Raster dimensions: {}x{}, {} bands",
            metadata.width, metadata.height, metadata.band_count
        );
        debug!(
            "Pixel size: {:.6} x {:.6}",
            metadata.pixel_width(),
            metadata.pixel_height()
        );

        Ok(Self { path, metadata })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RasterSource for GdalRaster {
    fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    /// Read every band as `f32` into a `(bands, height, width)` array.
    fn read(&self) -> Result<Array3<f32>> {
        let dataset = Dataset::open(&self.path)?;
        let (width, height) = (self.metadata.width, self.metadata.height);
        let mut data = Array3::<f32>::zeros((self.metadata.band_count, height, width));

        for (i, mut band_data) in data.axis_iter_mut(Axis(0)).enumerate() {
            let band_index = i + 1;
            debug!("Reading band {}", band_index);

            let rasterband: RasterBand = dataset.rasterband(band_index)?;
            let buffer = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
            let data_vec: Vec<f32> = buffer.into_iter().collect();
            band_data.assign(&Array2::from_shape_vec((height, width), data_vec)?);
        }

        Ok(data)
    }
}

/// Extract metadata from a dataset without reading pixel data.
pub fn extract_metadata_from_dataset(dataset: &Dataset) -> Result<RasterMetadata> {
    let band_count = dataset.raster_count() as usize;
    let (width, height) = dataset.raster_size();

    if width == 0 || height == 0 || band_count == 0 {
        return Err(TiledPredictError::InvalidDimensions(width, height));
    }

    let nodata = dataset.rasterband(1)?.no_data_value();
    let geotransform = dataset.geo_transform()?;

    let pixel_width = geotransform[1].abs();
    if pixel_width <= 0.0 {
        return Err(TiledPredictError::InvalidPixelSize(pixel_width));
    }

    Ok(RasterMetadata {
        width,
        height,
        band_count,
        geotransform,
        projection: dataset.projection(),
        nodata,
    })
}

/// Write a single-band Float32 GeoTIFF with the input's georeferencing.
pub fn write_prediction(
    path: &str,
    data: &Array2<f32>,
    metadata: &RasterMetadata,
    options: &OutputOptions,
) -> Result<()> {
    let (height, width) = data.dim();
    if (height, width) != (metadata.height, metadata.width) {
        return Err(TiledPredictError::InvalidDimensions(width, height));
    }
    options.validate()?;

    let mut dataset = create_output_dataset(path, metadata, options.creation_options())?;
    dataset.set_geo_transform(&metadata.geotransform)?;
    dataset.set_projection(&metadata.projection)?;

    {
        let mut raster_band = dataset.rasterband(1)?;

        // GDAL expects row-major data, which is how a standard-layout Array2 is stored
        let values: Vec<f32> = data.iter().copied().collect();
        let mut buffer = Buffer::new((width, height), values);
        raster_band.write((0, 0), (width, height), &mut buffer)?;

        raster_band.set_description("prediction")?;
        // NaN marks uncovered pixels; otherwise the input's nodata tag carries over
        let nodata = if options.mask_uncovered {
            Some(f64::NAN)
        } else {
            metadata.nodata
        };
        if nodata.is_some() {
            raster_band.set_no_data_value(nodata)?;
        }
    }

    if options.build_overviews {
        build_overviews(&mut dataset)?;
    }

    info!("Successfully wrote prediction to {}", path);
    Ok(())
}

fn create_output_dataset(
    path: &str,
    metadata: &RasterMetadata,
    options: Vec<String>,
) -> Result<Dataset> {
    info!("Creating output dataset: {}", path);

    let driver = DriverManager::get_driver_by_name("GTiff")?;

    let mut gdal_options = CslStringList::new();
    for opt in options {
        gdal_options.add_string(&opt)?;
    }

    let dataset = driver.create_with_band_type_with_options::<f32, _>(
        path,
        metadata.width,
        metadata.height,
        1,
        &gdal_options,
    )?;

    Ok(dataset)
}

fn build_overviews(dataset: &mut Dataset) -> Result<()> {
    let (width, height) = dataset.raster_size();
    let levels = overview_levels(width, height);

    if levels.is_empty() {
        debug!("Raster too small for overviews ({}x{}), skipping", width, height);
        return Ok(());
    }

    info!("Creating {} overview levels: {:?}", levels.len(), levels);
    dataset.build_overviews("AVERAGE", &levels, &[])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read_prediction() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prediction.tif");
        let path_str = path.to_str().unwrap();

        let metadata = RasterMetadata {
            width: 40,
            height: 32,
            band_count: 1,
            geotransform: [500000.0, 5.0, 0.0, 4800000.0, 0.0, -5.0],
            projection: String::new(),
            nodata: None,
        };
        let data = Array3::from_shape_fn((1, 32, 40), |(_, r, c)| (r * 40 + c) as f32);
        let band = data.index_axis(Axis(0), 0).to_owned();

        let options = OutputOptions {
            tile_size: Some(16),
            ..OutputOptions::default()
        };
        write_prediction(path_str, &band, &metadata, &options).unwrap();

        let raster = GdalRaster::open(&path).unwrap();
        assert_eq!(raster.metadata().width, 40);
        assert_eq!(raster.metadata().height, 32);
        assert_eq!(raster.metadata().geotransform, metadata.geotransform);
        assert_eq!(raster.read().unwrap(), data);
    }

    #[test]
    fn test_nodata_tag_carried_over() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nodata.tif");
        let mut metadata = RasterMetadata::plain(1, 16, 16);
        metadata.nodata = Some(-9999.0);
        let data = Array2::<f32>::ones((16, 16));

        write_prediction(path.to_str().unwrap(), &data, &metadata, &OutputOptions::default())
            .unwrap();
        let raster = GdalRaster::open(&path).unwrap();
        assert_eq!(raster.metadata().nodata, Some(-9999.0));

        let masked = dir.path().join("masked.tif");
        let options = OutputOptions {
            mask_uncovered: true,
            ..OutputOptions::default()
        };
        write_prediction(masked.to_str().unwrap(), &data, &metadata, &options).unwrap();
        let raster = GdalRaster::open(&masked).unwrap();
        assert!(raster.metadata().nodata.is_some_and(f64::is_nan));
    }

    #[test]
    fn test_write_rejects_wrong_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.tif");
        let metadata = RasterMetadata::plain(1, 10, 10);
        let data = Array2::<f32>::zeros((10, 11));

        let err = write_prediction(
            path.to_str().unwrap(),
            &data,
            &metadata,
            &OutputOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TiledPredictError::InvalidDimensions(11, 10)));
    }
}
