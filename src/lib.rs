//! # envisat
//!
//! Random-access reader for ENVISAT satellite product files (MERIS, AATSR,
//! ASAR), with limited in-place writing of dataset fields.
//!
//! A product is a fixed ASCII header followed by a table of dataset
//! descriptors and the datasets themselves: sequences of fixed-size
//! big-endian records made of typed fields. Bands reinterpret a field across
//! all records of a dataset as a 2-D geophysical raster.
//!
//! ## Modules
//!
//! - [`util`] - Type system, decoded values, errors
//! - [`format`] - On-disk layout: headers, DSD table, byte store, DDDB
//! - [`core`] - Object model: Product, Dataset, Record, Field, Band, Raster
//!
//! ## Example
//!
//! ```ignore
//! use envisat::prelude::*;
//!
//! let product = Product::open("MER_RR__2P.N1")?;
//! let band = product.get_band("water_vapour")?;
//! let raster = band.read_raster(0, 0, None)?;
//! println!("{} {}", raster, band.unit().unwrap_or(""));
//!
//! for record in &product.get_dataset("Quality_ADS")? {
//!     println!("{}", record?);
//! }
//! ```

pub mod util;
pub mod format;
pub mod core;

use std::path::Path;

// Re-export commonly used types
pub use util::{
    data_type_id_to_str, get_data_type_size, ElemArray, EprCode, Error, ErrorKind, Mjd, Result,
    TypeId, Value,
};
pub use format::{Dddb, OpenMode};
pub use crate::core::{
    create_bitmask_raster, create_raster, get_sample_model_name, get_scaling_method_name, Band,
    Dataset, Dsd, Field, FieldMut, OpenOptions, Product, Raster, RasterData, Record,
};

/// Open a product read-only.
pub fn open(path: impl AsRef<Path>) -> Result<Product> {
    Product::open(path)
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{ElemArray, Error, ErrorKind, Mjd, Result, TypeId, Value};
    pub use crate::format::{Dddb, OpenMode};
    pub use crate::core::{
        create_bitmask_raster, create_raster, Band, BitmaskEvaluator, Dataset, Dsd, Field,
        FieldMut, OpenOptions, Product, Raster, RasterData, Record, SampleModel, ScalingMethod,
    };
}
