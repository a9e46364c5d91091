//! Fixed request settings for the Nome quad download.

use std::path::PathBuf;

use crate::request::BoundingBox;

pub const DATASET: &str = "reanalysis-era5-single-levels";
pub const PRODUCT_TYPE: &str = "reanalysis";
pub const FORMAT: &str = "netcdf";
pub const VARIABLE: &str = "skin_temperature";
pub const OUTPUT_DIR: &str = "/workspace/UA/kmredilla/Nome_Mets/data";

/// Label used in output file names for the area below.
pub const AREA_NAME: &str = "Nome_quad";

/// Four grid cells around Nome, longitudes in 0..360.
pub const NOME_QUAD: BoundingBox = BoundingBox {
    north: 64.75,
    west: 194.50,
    south: 64.25,
    east: 195.0,
};

/// Chunk boundaries, each chunk covering `[b[i], b[i + 1])`.
///
/// The last chunk is shorter than the others.
pub const CHUNK_BOUNDARIES: [u16; 5] = [1979, 1991, 2003, 2015, 2019];

/// Everything in a request that does not change between chunks.
#[derive(Debug, Clone)]
pub struct Settings {
    pub dataset: String,
    pub product_type: String,
    pub format: String,
    pub area: BoundingBox,
    pub area_name: String,
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dataset: DATASET.to_string(),
            product_type: PRODUCT_TYPE.to_string(),
            format: FORMAT.to_string(),
            area: NOME_QUAD,
            area_name: AREA_NAME.to_string(),
            output_dir: PathBuf::from(OUTPUT_DIR),
        }
    }
}

impl Settings {
    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = output_dir;
        self
    }
}

// -- Tests -------------------------------------------------------------------
