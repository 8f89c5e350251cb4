//! Bands: geophysical raster views over a dataset field.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::format::FlagSpec;
use crate::util::{EprCode, Error, Result, TypeId};

use super::catalog::BandEntry;
use super::decode::read_band_lines;
use super::product::ProductInner;
use super::raster::RasterData;
use super::{create_raster, Dataset, Raster};

// ============================================================================
// Sample Models and Scaling
// ============================================================================

/// How one band's samples are laid out in a field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum SampleModel {
    /// Every element is a sample
    #[default]
    #[serde(rename = "1OF1")]
    OneOfOne = 0,
    /// First of two interleaved samples
    #[serde(rename = "1OF2")]
    OneOfTwo = 1,
    /// Second of two interleaved samples
    #[serde(rename = "2OF2")]
    TwoOfTwo = 2,
    /// Three bytes forming one big-endian integer
    #[serde(rename = "3TOI")]
    ThreeToInt = 3,
    /// Two bytes forming one big-endian integer, converted to float
    #[serde(rename = "2TOF")]
    TwoToFloat = 4,
}

impl SampleModel {
    pub const ALL: [SampleModel; 5] = [
        Self::OneOfOne,
        Self::OneOfTwo,
        Self::TwoOfTwo,
        Self::ThreeToInt,
        Self::TwoToFloat,
    ];

    pub fn from_u32(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.id() == id)
    }

    #[inline]
    pub const fn id(self) -> u32 {
        self as u32
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::OneOfOne => "1OF1",
            Self::OneOfTwo => "1OF2",
            Self::TwoOfTwo => "2OF2",
            Self::ThreeToInt => "3TOI",
            Self::TwoToFloat => "2TOF",
        }
    }

    /// Field elements spanned by one sample.
    #[inline]
    pub const fn stride(self) -> u32 {
        match self {
            Self::OneOfOne => 1,
            Self::OneOfTwo | Self::TwoOfTwo | Self::TwoToFloat => 2,
            Self::ThreeToInt => 3,
        }
    }
}

/// Conversion from raw samples to geophysical values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ScalingMethod {
    #[default]
    #[serde(rename = "NONE")]
    None = 0,
    /// `raw * factor + offset`
    #[serde(rename = "LIN")]
    Linear = 1,
    /// `10 ^ (offset + factor * raw)`
    #[serde(rename = "LOG")]
    Log = 2,
}

impl ScalingMethod {
    pub const ALL: [ScalingMethod; 3] = [Self::None, Self::Linear, Self::Log];

    pub fn from_u32(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.id() == id)
    }

    #[inline]
    pub const fn id(self) -> u32 {
        self as u32
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Linear => "LIN",
            Self::Log => "LOG",
        }
    }

    #[inline]
    pub fn apply(self, raw: f64, factor: f64, offset: f64) -> f64 {
        match self {
            Self::None => raw,
            Self::Linear => raw * factor + offset,
            Self::Log => 10f64.powf(offset + factor * raw),
        }
    }
}

/// Name of a sample model id.
pub fn get_sample_model_name(id: u32) -> Result<&'static str> {
    SampleModel::from_u32(id)
        .map(SampleModel::name)
        .ok_or_else(|| Error::invalid(format!("invalid sample model id: {}", id)))
}

/// Name of a scaling method id.
pub fn get_scaling_method_name(id: u32) -> Result<&'static str> {
    ScalingMethod::from_u32(id)
        .map(ScalingMethod::name)
        .ok_or_else(|| Error::invalid(format!("invalid scaling method id: {}", id)))
}

// ============================================================================
// Band
// ============================================================================

/// Location of a band's raw samples in the product file, for external raw
/// raster readers (e.g. a GDAL VRT).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawRasterDescriptor {
    /// File offset of the first sample
    pub offset: u64,
    /// Bytes between the starts of consecutive lines
    pub line_offset: u64,
    /// Bytes between consecutive samples of a line
    pub pixel_offset: u64,
    /// On-disk sample type
    pub data_type: TypeId,
}

/// A band of an open product.
///
/// Numeric properties of a band whose product has been closed read as
/// defaults; name lookups and raster reads fail.
#[derive(Clone)]
pub struct Band {
    inner: Arc<ProductInner>,
    index: usize,
}

impl Band {
    pub(crate) fn new(inner: Arc<ProductInner>, index: usize) -> Self {
        Self { inner, index }
    }

    #[inline]
    fn entry(&self) -> &BandEntry {
        &self.inner.catalog.bands[self.index]
    }

    fn open_entry(&self) -> Result<&BandEntry> {
        self.inner.check_open()?;
        Ok(self.entry())
    }

    /// The entry, or `None` once the product is closed.
    fn live_entry(&self) -> Option<&BandEntry> {
        (!self.inner.is_closed()).then(|| self.entry())
    }

    pub fn get_name(&self) -> Result<&str> {
        Ok(&self.open_entry()?.name)
    }

    pub fn description(&self) -> Result<&str> {
        Ok(&self.open_entry()?.description)
    }

    pub fn spectr_band_index(&self) -> Result<i32> {
        Ok(self.open_entry()?.spectr_band_index)
    }

    /// The dataset holding the band's samples.
    pub fn dataset(&self) -> Result<Dataset> {
        let entry = self.open_entry()?;
        Ok(Dataset::new(self.inner.clone(), entry.dataset))
    }

    /// Flags of a flag band, `None` for other bands.
    pub fn get_flags(&self) -> Result<Option<&[FlagSpec]>> {
        let entry = self.open_entry()?;
        Ok(entry
            .flag_coding
            .as_ref()
            .and_then(|c| self.inner.catalog.flag_codings.get(c))
            .map(Vec::as_slice))
    }

    // === Properties with closed-product defaults ===

    pub fn field_index(&self) -> i32 {
        self.live_entry().map_or(0, |e| e.field_index)
    }

    pub fn elem_index(&self) -> i32 {
        self.live_entry().map_or(0, |e| e.elem_index)
    }

    pub fn sample_model(&self) -> SampleModel {
        self.live_entry().map_or(SampleModel::OneOfOne, |e| e.sample_model)
    }

    /// Type of the rasters this band reads into.
    pub fn data_type(&self) -> TypeId {
        self.live_entry().map_or(TypeId::Unknown, |e| e.data_type)
    }

    pub fn scaling_method(&self) -> ScalingMethod {
        self.live_entry().map_or(ScalingMethod::Linear, |e| e.scaling_method)
    }

    pub fn scaling_offset(&self) -> f64 {
        self.live_entry().map_or(0.0, |e| e.scaling_offset)
    }

    pub fn scaling_factor(&self) -> f64 {
        self.live_entry().map_or(0.0, |e| e.scaling_factor)
    }

    pub fn lines_mirrored(&self) -> bool {
        self.live_entry().is_some_and(|e| e.lines_mirrored)
    }

    pub fn unit(&self) -> Option<&str> {
        self.live_entry().and_then(|e| e.unit.as_deref())
    }

    pub fn bm_expr(&self) -> Option<&str> {
        self.live_entry().and_then(|e| e.bm_expr.as_deref())
    }

    // === Raw layout ===

    /// On-disk type of the bound field (`Unknown` for unbound bands).
    pub fn raw_type(&self) -> Result<TypeId> {
        let entry = self.open_entry()?;
        let info = &self.inner.catalog.datasets[entry.dataset].info;
        Ok(usize::try_from(entry.field_index)
            .ok()
            .and_then(|i| info.fields.get(i))
            .map_or(TypeId::Unknown, |f| f.type_id))
    }

    /// File layout of the band's samples.
    pub fn raw_descriptor(&self) -> Result<RawRasterDescriptor> {
        let entry = self.open_entry()?;
        let dataset = &self.inner.catalog.datasets[entry.dataset];
        let field = usize::try_from(entry.field_index)
            .ok()
            .and_then(|i| dataset.info.fields.get(i))
            .ok_or_else(|| Error::epr(EprCode::InvalidBand, "band is not bound to a field"))?;

        let size = field.type_id.size() as u64;
        let elem = entry.elem_index.max(0) as u64;
        let mut offset = dataset.dsd.ds_offset + field.offset as u64 + elem * size;
        let pixel_offset = match entry.sample_model {
            SampleModel::OneOfOne => size,
            SampleModel::TwoOfTwo => {
                offset += size;
                size * 2
            }
            model => size * model.stride() as u64,
        };
        Ok(RawRasterDescriptor {
            offset,
            line_offset: dataset.dsd.dsr_size as u64,
            pixel_offset,
            data_type: field.type_id,
        })
    }

    // === Rasters ===

    /// Allocate a raster of the band's type for a source region and step.
    pub fn create_compatible_raster(
        &self,
        source_width: u32,
        source_height: u32,
        step_x: u32,
        step_y: u32,
    ) -> Result<Raster> {
        let entry = self.open_entry()?;
        let (scene_w, scene_h) = (self.inner.catalog.scene_width, self.inner.catalog.scene_height);
        if source_width > scene_w || source_height > scene_h {
            return Err(Error::invalid(format!(
                "raster size {}x{} exceeds scene size {}x{}",
                source_width, source_height, scene_w, scene_h
            )));
        }
        create_raster(entry.data_type, source_width, source_height, step_x, step_y)
    }

    /// Allocate a raster covering the whole scene.
    pub fn create_scene_raster(&self) -> Result<Raster> {
        self.inner.check_open()?;
        let catalog = &self.inner.catalog;
        self.create_compatible_raster(catalog.scene_width, catalog.scene_height, 1, 1)
    }

    /// Fill `raster` with samples starting at scene pixel `(x_off, y_off)`.
    pub fn read_raster_into(&self, x_off: u32, y_off: u32, raster: &mut Raster) -> Result<()> {
        let entry = self.open_entry()?;
        if entry.field_index < 0 {
            return Err(Error::epr(EprCode::InvalidBand, format!(
                "band {} is not bound to a field",
                entry.name
            )));
        }
        if raster.data_type() != entry.data_type {
            return Err(Error::type_mismatch(
                format!("{} raster", entry.data_type),
                format!("{} raster", raster.data_type()),
            ));
        }

        let (scene_w, scene_h) = (self.inner.catalog.scene_width, self.inner.catalog.scene_height);
        let fits = |off: u32, len: u32, scene: u32| off.checked_add(len).is_some_and(|end| end <= scene);
        if !fits(x_off, raster.source_width(), scene_w) || !fits(y_off, raster.source_height(), scene_h) {
            return Err(Error::invalid(format!(
                "region at ({}, {}) of {}x{} exceeds scene size {}x{}",
                x_off,
                y_off,
                raster.source_width(),
                raster.source_height(),
                scene_w,
                scene_h
            )));
        }

        read_band_lines(&self.inner, entry, x_off, y_off, raster)
    }

    /// Fill `raster`, or a new raster covering the scene from the offset on.
    pub fn read_raster(&self, x_off: u32, y_off: u32, raster: Option<Raster>) -> Result<Raster> {
        let mut raster = match raster {
            Some(r) => r,
            None => {
                self.inner.check_open()?;
                let catalog = &self.inner.catalog;
                if x_off >= catalog.scene_width || y_off >= catalog.scene_height {
                    return Err(Error::invalid(format!(
                        "offset ({}, {}) outside scene {}x{}",
                        x_off, y_off, catalog.scene_width, catalog.scene_height
                    )));
                }
                self.create_compatible_raster(
                    catalog.scene_width - x_off,
                    catalog.scene_height - y_off,
                    1,
                    1,
                )?
            }
        };
        self.read_raster_into(x_off, y_off, &mut raster)?;
        Ok(raster)
    }

    /// Read a region straight into a pixel array.
    pub fn read_as_array(
        &self,
        width: u32,
        height: u32,
        x_off: u32,
        y_off: u32,
        step_x: u32,
        step_y: u32,
    ) -> Result<RasterData> {
        let mut raster = self.create_compatible_raster(width, height, step_x, step_y)?;
        self.read_raster_into(x_off, y_off, &mut raster)?;
        Ok(raster.into_data())
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epr.Band({}) of epr.Product({})",
            self.entry().name,
            self.inner.id_string
        )
    }
}

impl fmt::Debug for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_and_method_names() {
        let names: Vec<_> = (0..5).map(|i| get_sample_model_name(i).unwrap()).collect();
        assert_eq!(names, ["1OF1", "1OF2", "2OF2", "3TOI", "2TOF"]);
        assert_eq!(get_scaling_method_name(0).unwrap(), "NONE");
        assert_eq!(get_scaling_method_name(1).unwrap(), "LIN");
        assert_eq!(get_scaling_method_name(2).unwrap(), "LOG");
        assert!(matches!(get_sample_model_name(500), Err(Error::InvalidArgument(_))));
        assert!(matches!(get_scaling_method_name(500), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_scaling() {
        assert_eq!(ScalingMethod::None.apply(7.0, 0.5, 1.0), 7.0);
        assert_eq!(ScalingMethod::Linear.apply(7.0, 0.5, 1.0), 4.5);
        assert!((ScalingMethod::Log.apply(2.0, 0.5, 1.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_serde_names() {
        let m: SampleModel = serde_json::from_str("\"2OF2\"").unwrap();
        assert_eq!(m, SampleModel::TwoOfTwo);
        assert_eq!(serde_json::to_string(&ScalingMethod::Log).unwrap(), "\"LOG\"");
    }
}
