//! Object model of an open product.
//!
//! This module provides:
//! - [`Product`] / [`OpenOptions`] - open products and their lifecycle
//! - [`Dataset`] / [`Dsd`] - datasets and their descriptors
//! - [`Record`] / [`Field`] / [`FieldMut`] - binary records and typed fields
//! - [`Band`] / [`Raster`] - geophysical raster views and pixel buffers
//! - [`BitmaskEvaluator`] - flag expression evaluation

mod dsd;
mod catalog;
mod product;
mod dataset;
mod record;
mod field;
mod band;
mod decode;
mod raster;
mod bitmask;

pub use dsd::Dsd;
pub use product::{OpenOptions, Product};
pub use dataset::{Dataset, Records};
pub use record::Record;
pub use field::{Field, FieldMut};
pub use band::{
    get_sample_model_name, get_scaling_method_name, Band, RawRasterDescriptor, SampleModel,
    ScalingMethod,
};
pub use raster::{
    create_bitmask_raster, create_raster, Raster, RasterData, RasterElement, RasterView,
};
pub use bitmask::{BitmaskEvaluator, FlagExpressionEvaluator};
