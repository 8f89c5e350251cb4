//! On-disk primitive types of ENVISAT records.

use byteorder::{BigEndian, ByteOrder};
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Value;

/// Type identifier of a field element, with the EPR numeric ids.
///
/// Every type except `Unknown` has a fixed element size. `String` and `Spare`
/// are byte sized but variable in count, and `Time` is the 12-byte MJD
/// structure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum TypeId {
    #[default]
    Unknown = 0,
    UChar = 1,
    Char = 2,
    UShort = 3,
    Short = 4,
    UInt = 5,
    Int = 6,
    Float = 7,
    Double = 8,
    String = 11,
    Spare = 13,
    Time = 21,
}

/// Host representation a [`TypeId`] decodes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
    /// Byte sequence, decoded as text
    Bytes,
    /// `{days: i32, seconds: u32, microseconds: u32}`
    Time,
    /// No element representation (spare, unknown)
    None,
}

impl TypeId {
    /// All known type ids, in id order.
    pub const ALL: [TypeId; 12] = [
        Self::Unknown,
        Self::UChar,
        Self::Char,
        Self::UShort,
        Self::Short,
        Self::UInt,
        Self::Int,
        Self::Float,
        Self::Double,
        Self::String,
        Self::Spare,
        Self::Time,
    ];

    /// Convert from the numeric id. Unrecognized ids map to `Unknown`.
    pub const fn from_u32(v: u32) -> Self {
        match v {
            1 => Self::UChar,
            2 => Self::Char,
            3 => Self::UShort,
            4 => Self::Short,
            5 => Self::UInt,
            6 => Self::Int,
            7 => Self::Float,
            8 => Self::Double,
            11 => Self::String,
            13 => Self::Spare,
            21 => Self::Time,
            _ => Self::Unknown,
        }
    }

    /// Numeric id.
    #[inline]
    pub const fn id(self) -> u32 {
        self as u32
    }

    /// Size in bytes of one element. String and spare are 1 per element,
    /// unknown is 0.
    #[inline]
    pub const fn size(self) -> u32 {
        match self {
            Self::UChar | Self::Char => 1,
            Self::UShort | Self::Short => 2,
            Self::UInt | Self::Int | Self::Float => 4,
            Self::Double => 8,
            Self::String | Self::Spare => 1,
            Self::Time => 12,
            Self::Unknown => 0,
        }
    }

    /// Canonical lowercase name; empty for `Unknown`.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::UChar => "uchar",
            Self::Char => "char",
            Self::UShort => "ushort",
            Self::Short => "short",
            Self::UInt => "uint",
            Self::Int => "int",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Spare => "spare",
            Self::Time => "time",
        }
    }

    /// Parse from the canonical name.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|t| *t != Self::Unknown && t.name() == name)
            .unwrap_or(Self::Unknown)
    }

    /// Host type elements of this type decode to.
    pub const fn host_type(self) -> HostType {
        match self {
            Self::UChar => HostType::U8,
            Self::Char => HostType::I8,
            Self::UShort => HostType::U16,
            Self::Short => HostType::I16,
            Self::UInt => HostType::U32,
            Self::Int => HostType::I32,
            Self::Float => HostType::F32,
            Self::Double => HostType::F64,
            Self::String => HostType::Bytes,
            Self::Time => HostType::Time,
            Self::Spare | Self::Unknown => HostType::None,
        }
    }

    /// True for the eight fixed-size numeric types.
    #[inline]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::UChar
                | Self::Char
                | Self::UShort
                | Self::Short
                | Self::UInt
                | Self::Int
                | Self::Float
                | Self::Double
        )
    }

    /// True for integer types.
    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::UChar | Self::Char | Self::UShort | Self::Short | Self::UInt | Self::Int
        )
    }

    /// True for floating point types.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Size in bytes of the type with the given numeric id (0 for unknown ids).
pub fn get_data_type_size(type_id: u32) -> u32 {
    TypeId::from_u32(type_id).size()
}

/// Name of the type with the given numeric id (empty for unknown ids).
pub fn data_type_id_to_str(type_id: u32) -> &'static str {
    TypeId::from_u32(type_id).name()
}

// === Typed element access ===

/// Numeric element types stored big-endian in product files.
pub trait EprPod: Pod + Zeroable + Copy + Default + PartialEq + fmt::Debug {
    /// The corresponding on-disk type.
    const TYPE_ID: TypeId;

    /// Size of this type in bytes.
    const SIZE: usize = std::mem::size_of::<Self>();

    /// Decode one element from big-endian bytes.
    fn read_be(buf: &[u8]) -> Self;

    /// Encode one element as big-endian bytes.
    fn write_be(self, buf: &mut [u8]);

    fn to_f64(self) -> f64;

    /// Saturating conversion used when storing raster samples.
    fn from_f64(v: f64) -> Self;

    fn to_value(self) -> Value;
}

impl EprPod for u8 {
    const TYPE_ID: TypeId = TypeId::UChar;
    #[inline]
    fn read_be(buf: &[u8]) -> Self {
        buf[0]
    }
    #[inline]
    fn write_be(self, buf: &mut [u8]) {
        buf[0] = self;
    }
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
    #[inline]
    fn from_f64(v: f64) -> Self {
        v as u8
    }
    fn to_value(self) -> Value {
        Value::UInt(self as u64)
    }
}

impl EprPod for i8 {
    const TYPE_ID: TypeId = TypeId::Char;
    #[inline]
    fn read_be(buf: &[u8]) -> Self {
        buf[0] as i8
    }
    #[inline]
    fn write_be(self, buf: &mut [u8]) {
        buf[0] = self as u8;
    }
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
    #[inline]
    fn from_f64(v: f64) -> Self {
        v as i8
    }
    fn to_value(self) -> Value {
        Value::Int(self as i64)
    }
}

macro_rules! impl_epr_pod {
    ($t:ty, $tid:expr, $read:ident, $write:ident, $variant:ident, $wide:ty) => {
        impl EprPod for $t {
            const TYPE_ID: TypeId = $tid;
            #[inline]
            fn read_be(buf: &[u8]) -> Self {
                BigEndian::$read(buf)
            }
            #[inline]
            fn write_be(self, buf: &mut [u8]) {
                BigEndian::$write(buf, self)
            }
            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }
            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $t
            }
            fn to_value(self) -> Value {
                Value::$variant(self as $wide)
            }
        }
    };
}

impl_epr_pod!(u16, TypeId::UShort, read_u16, write_u16, UInt, u64);
impl_epr_pod!(i16, TypeId::Short, read_i16, write_i16, Int, i64);
impl_epr_pod!(u32, TypeId::UInt, read_u32, write_u32, UInt, u64);
impl_epr_pod!(i32, TypeId::Int, read_i32, write_i32, Int, i64);
impl_epr_pod!(f32, TypeId::Float, read_f32, write_f32, Float, f64);
impl_epr_pod!(f64, TypeId::Double, read_f64, write_f64, Float, f64);
