//! In-memory rasters filled from bands and bitmask expressions.
//!
//! A raster covers a source region of `source_width x source_height`
//! scene pixels sampled every `source_step_x`/`source_step_y` pixels, so its
//! own size is the decimated one:
//!
//! ```text
//! width  = (source_width  - 1) / source_step_x + 1
//! height = (source_height - 1) / source_step_y + 1
//! ```
//!
//! Pixel storage is shared: [`Raster::data`] hands out [`RasterView`]s that
//! alias the same buffer and outlive the raster itself.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use ndarray::Array2;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::util::{EprPod, Error, Result, TypeId, Value};

/// Pixel buffer of a raster, one variant per numeric type.
///
/// Arrays are indexed `[[y, x]]` (lines by pixels).
#[derive(Clone, Debug, PartialEq)]
pub enum RasterData {
    UChar(Array2<u8>),
    Char(Array2<i8>),
    UShort(Array2<u16>),
    Short(Array2<i16>),
    UInt(Array2<u32>),
    Int(Array2<i32>),
    Float(Array2<f32>),
    Double(Array2<f64>),
}

macro_rules! raster_dispatch {
    ($self:expr, $a:ident => $body:expr) => {
        match $self {
            RasterData::UChar($a) => $body,
            RasterData::Char($a) => $body,
            RasterData::UShort($a) => $body,
            RasterData::Short($a) => $body,
            RasterData::UInt($a) => $body,
            RasterData::Int($a) => $body,
            RasterData::Float($a) => $body,
            RasterData::Double($a) => $body,
        }
    };
}

impl RasterData {
    /// Zero-filled buffer of `height` lines by `width` pixels.
    pub fn zeros(data_type: TypeId, height: usize, width: usize) -> Result<Self> {
        let shape = (height, width);
        Ok(match data_type {
            TypeId::UChar => Self::UChar(Array2::zeros(shape)),
            TypeId::Char => Self::Char(Array2::zeros(shape)),
            TypeId::UShort => Self::UShort(Array2::zeros(shape)),
            TypeId::Short => Self::Short(Array2::zeros(shape)),
            TypeId::UInt => Self::UInt(Array2::zeros(shape)),
            TypeId::Int => Self::Int(Array2::zeros(shape)),
            TypeId::Float => Self::Float(Array2::zeros(shape)),
            TypeId::Double => Self::Double(Array2::zeros(shape)),
            other => return Err(Error::type_mismatch("numeric raster type", other.name())),
        })
    }

    pub fn data_type(&self) -> TypeId {
        match self {
            Self::UChar(_) => TypeId::UChar,
            Self::Char(_) => TypeId::Char,
            Self::UShort(_) => TypeId::UShort,
            Self::Short(_) => TypeId::Short,
            Self::UInt(_) => TypeId::UInt,
            Self::Int(_) => TypeId::Int,
            Self::Float(_) => TypeId::Float,
            Self::Double(_) => TypeId::Double,
        }
    }

    /// `(height, width)`
    pub fn dim(&self) -> (usize, usize) {
        raster_dispatch!(self, a => a.dim())
    }

    /// Pixel value, or `None` outside the buffer.
    pub fn get(&self, x: usize, y: usize) -> Option<Value> {
        raster_dispatch!(self, a => a.get([y, x]).map(|v| v.to_value()))
    }

    /// Pixel value as f64, or `None` outside the buffer.
    #[inline]
    pub fn get_f64(&self, x: usize, y: usize) -> Option<f64> {
        raster_dispatch!(self, a => a.get([y, x]).map(|v| v.to_f64()))
    }

    /// Store a pixel, converting (saturating) to the raster type.
    /// Returns false outside the buffer.
    #[inline]
    pub fn set_f64(&mut self, x: usize, y: usize, value: f64) -> bool {
        raster_dispatch!(self, a => match a.get_mut([y, x]) {
            Some(p) => {
                *p = EprPod::from_f64(value);
                true
            }
            None => false,
        })
    }

    /// Typed view of the array.
    pub fn as_array<T: RasterElement>(&self) -> Option<&Array2<T>> {
        T::array(self)
    }

    /// Typed mutable view of the array.
    pub fn as_array_mut<T: RasterElement>(&mut self) -> Option<&mut Array2<T>> {
        T::array_mut(self)
    }

    /// Every pixel converted to f64.
    pub fn to_f64(&self) -> Array2<f64> {
        raster_dispatch!(self, a => a.mapv(|v| v.to_f64()))
    }

    /// Pixels as native-endian bytes in row-major order.
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        raster_dispatch!(self, a => match a.as_slice() {
            Some(s) => bytemuck::cast_slice(s).to_vec(),
            None => {
                let owned: Vec<_> = a.iter().copied().collect();
                bytemuck::cast_slice(&owned).to_vec()
            }
        })
    }
}

/// Numeric pixel types with typed access into [`RasterData`].
pub trait RasterElement: EprPod {
    fn array(data: &RasterData) -> Option<&Array2<Self>>;
    fn array_mut(data: &mut RasterData) -> Option<&mut Array2<Self>>;
}

macro_rules! raster_element {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl RasterElement for $t {
                #[inline]
                fn array(data: &RasterData) -> Option<&Array2<Self>> {
                    match data {
                        RasterData::$variant(a) => Some(a),
                        _ => None,
                    }
                }
                #[inline]
                fn array_mut(data: &mut RasterData) -> Option<&mut Array2<Self>> {
                    match data {
                        RasterData::$variant(a) => Some(a),
                        _ => None,
                    }
                }
            }
        )*
    };
}

raster_element!(
    u8 => UChar,
    i8 => Char,
    u16 => UShort,
    i16 => Short,
    u32 => UInt,
    i32 => Int,
    f32 => Float,
    f64 => Double,
);

/// Shared handle to a raster's pixel buffer.
///
/// Clones alias the same storage; a write through one view is seen by all.
#[derive(Clone, Debug)]
pub struct RasterView(Arc<RwLock<RasterData>>);

impl RasterView {
    fn new(data: RasterData) -> Self {
        Self(Arc::new(RwLock::new(data)))
    }

    /// Lock for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, RasterData> {
        self.0.read()
    }

    /// Lock for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, RasterData> {
        self.0.write()
    }

    /// True if both views alias the same buffer.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Take the buffer if this is the last handle, else copy it.
    pub fn into_inner(self) -> RasterData {
        match Arc::try_unwrap(self.0) {
            Ok(lock) => lock.into_inner(),
            Err(shared) => shared.read().clone(),
        }
    }
}

/// A 2-D pixel buffer with its source sampling geometry.
#[derive(Clone)]
pub struct Raster {
    data_type: TypeId,
    width: u32,
    height: u32,
    source_width: u32,
    source_height: u32,
    source_step_x: u32,
    source_step_y: u32,
    data: RasterView,
}

/// Decimated size of a source extent.
#[inline]
pub(crate) fn decimated(source: u32, step: u32) -> u32 {
    (source - 1) / step + 1
}

impl Raster {
    /// Allocate a zeroed raster for a source region and sampling step.
    pub fn new(
        data_type: TypeId,
        source_width: u32,
        source_height: u32,
        source_step_x: u32,
        source_step_y: u32,
    ) -> Result<Self> {
        if source_width == 0 || source_height == 0 {
            return Err(Error::invalid(format!(
                "raster source size must be positive ({}x{})",
                source_width, source_height
            )));
        }
        if source_step_x == 0 || source_step_y == 0 {
            return Err(Error::invalid(format!(
                "raster step must be positive ({}, {})",
                source_step_x, source_step_y
            )));
        }
        if !data_type.is_numeric() {
            return Err(Error::type_mismatch("numeric raster type", data_type.name()));
        }

        let width = decimated(source_width, source_step_x);
        let height = decimated(source_height, source_step_y);
        let bytes = (width as u64)
            .checked_mul(height as u64)
            .and_then(|n| n.checked_mul(data_type.size() as u64))
            .filter(|&n| n <= isize::MAX as u64)
            .ok_or_else(|| {
                Error::Overflow(format!("raster of {}x{} {} pixels", width, height, data_type))
            })?;

        tracing::trace!(%data_type, width, height, bytes, "allocate raster");
        let data = RasterData::zeros(data_type, height as usize, width as usize)?;

        Ok(Self {
            data_type,
            width,
            height,
            source_width,
            source_height,
            source_step_x,
            source_step_y,
            data: RasterView::new(data),
        })
    }

    #[inline]
    pub fn data_type(&self) -> TypeId {
        self.data_type
    }

    #[inline]
    pub fn get_width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn get_height(&self) -> u32 {
        self.height
    }

    /// Size in bytes of one pixel.
    #[inline]
    pub fn get_elem_size(&self) -> u32 {
        self.data_type.size()
    }

    #[inline]
    pub fn source_width(&self) -> u32 {
        self.source_width
    }

    #[inline]
    pub fn source_height(&self) -> u32 {
        self.source_height
    }

    #[inline]
    pub fn source_step_x(&self) -> u32 {
        self.source_step_x
    }

    #[inline]
    pub fn source_step_y(&self) -> u32 {
        self.source_step_y
    }

    fn check_pixel(&self, x: u32, y: u32) -> Result<()> {
        if x >= self.width {
            return Err(Error::out_of_range("pixel x", x, self.width));
        }
        if y >= self.height {
            return Err(Error::out_of_range("pixel y", y, self.height));
        }
        Ok(())
    }

    /// Pixel value at `(x, y)`.
    pub fn get_pixel(&self, x: u32, y: u32) -> Result<Value> {
        self.check_pixel(x, y)?;
        self.data
            .read()
            .get(x as usize, y as usize)
            .ok_or_else(|| Error::out_of_range("pixel", x, self.width))
    }

    /// Pixel value at `(x, y)` as f64.
    pub fn get_pixel_f64(&self, x: u32, y: u32) -> Result<f64> {
        self.check_pixel(x, y)?;
        self.data
            .read()
            .get_f64(x as usize, y as usize)
            .ok_or_else(|| Error::out_of_range("pixel", x, self.width))
    }

    /// Shared view of the pixel buffer.
    pub fn data(&self) -> RasterView {
        self.data.clone()
    }

    /// Consume the raster, returning its pixels.
    pub fn into_data(self) -> RasterData {
        self.data.into_inner()
    }

    /// Pixels as native-endian bytes in row-major order.
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        self.data.read().to_ne_bytes()
    }

    /// Write the raw pixels (native byte order, row-major).
    pub fn write_raw<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.to_ne_bytes())?;
        Ok(())
    }
}

impl fmt::Display for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epr.Raster {} ({}L x {}P)",
            self.data_type, self.height, self.width
        )
    }
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raster")
            .field("data_type", &self.data_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("source_width", &self.source_width)
            .field("source_height", &self.source_height)
            .field("source_step_x", &self.source_step_x)
            .field("source_step_y", &self.source_step_y)
            .finish()
    }
}

/// Allocate a raster of any numeric type.
pub fn create_raster(
    data_type: TypeId,
    source_width: u32,
    source_height: u32,
    source_step_x: u32,
    source_step_y: u32,
) -> Result<Raster> {
    Raster::new(data_type, source_width, source_height, source_step_x, source_step_y)
}

/// Allocate a `uchar` raster for bitmask evaluation.
pub fn create_bitmask_raster(
    source_width: u32,
    source_height: u32,
    source_step_x: u32,
    source_step_y: u32,
) -> Result<Raster> {
    Raster::new(TypeId::UChar, source_width, source_height, source_step_x, source_step_y)
}
