//! Decoded field values and their on-disk encoding.

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{EprPod, Error, Result, TypeId};

/// Modified Julian Date as stored in ENVISAT products (12 bytes, big-endian).
///
/// Days are counted from 2000-01-01 00:00 UTC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mjd {
    pub days: i32,
    pub seconds: u32,
    pub microseconds: u32,
}

impl Mjd {
    pub const SIZE: usize = 12;

    pub const fn new(days: i32, seconds: u32, microseconds: u32) -> Self {
        Self {
            days,
            seconds,
            microseconds,
        }
    }

    pub fn read_be(buf: &[u8]) -> Self {
        Self {
            days: BigEndian::read_i32(&buf[0..4]),
            seconds: BigEndian::read_u32(&buf[4..8]),
            microseconds: BigEndian::read_u32(&buf[8..12]),
        }
    }

    pub fn write_be(&self, buf: &mut [u8]) {
        BigEndian::write_i32(&mut buf[0..4], self.days);
        BigEndian::write_u32(&mut buf[4..8], self.seconds);
        BigEndian::write_u32(&mut buf[8..12], self.microseconds);
    }

    /// Fractional days since the epoch.
    pub fn as_days(&self) -> f64 {
        self.days as f64 + (self.seconds as f64 + self.microseconds as f64 * 1e-6) / 86_400.0
    }
}

impl fmt::Display for Mjd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{days={}, seconds={}, microseconds={}}}",
            self.days, self.seconds, self.microseconds
        )
    }
}

/// A single decoded element.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    UInt(u64),
    Int(i64),
    Float(f64),
    /// Text of a string field
    Str(String),
    /// Raw bytes of a spare field
    Bytes(Vec<u8>),
    Time(Mjd),
}

impl Value {
    /// Numeric value as f64, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::UInt(v) => Some(*v as f64),
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer value as i64, if this is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::UInt(v) => i64::try_from(*v).ok(),
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer value as u64, if this is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<Mjd> {
        match self {
            Self::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Short name of the variant, used in type errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::UInt(_) => "unsigned integer",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Time(_) => "time",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UInt(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(s) => write!(f, "\"{}\"", s),
            Self::Bytes(b) => {
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Self::Time(t) => write!(f, "{}", t),
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident as $wide:ty),* $(,)?) => {
        $(
            impl From<$t> for Value {
                #[inline]
                fn from(v: $t) -> Self {
                    Self::$variant(v as $wide)
                }
            }
        )*
    };
}

value_from!(
    u8 => UInt as u64,
    u16 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    f32 => Float as f64,
    f64 => Float as f64,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Mjd> for Value {
    fn from(v: Mjd) -> Self {
        Self::Time(v)
    }
}

/// Densely packed elements of one field, typed per [`TypeId::host_type`].
#[derive(Clone, Debug, PartialEq)]
pub enum ElemArray {
    UChar(Vec<u8>),
    Char(Vec<i8>),
    UShort(Vec<u16>),
    Short(Vec<i16>),
    UInt(Vec<u32>),
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    /// A string field decodes to one text value
    Str(String),
    Time(Vec<Mjd>),
    /// Spare and unknown fields expose their raw bytes
    Raw(Vec<u8>),
}

macro_rules! elem_dispatch {
    ($self:expr, $v:ident => $body:expr) => {
        match $self {
            ElemArray::UChar($v) => $body,
            ElemArray::Char($v) => $body,
            ElemArray::UShort($v) => $body,
            ElemArray::Short($v) => $body,
            ElemArray::UInt($v) => $body,
            ElemArray::Int($v) => $body,
            ElemArray::Float($v) => $body,
            ElemArray::Double($v) => $body,
            ElemArray::Time($v) => $body,
            ElemArray::Raw($v) => $body,
            ElemArray::Str($v) => $body,
        }
    };
}

impl ElemArray {
    /// Number of elements (characters for strings).
    pub fn len(&self) -> usize {
        elem_dispatch!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Type id of the elements.
    pub fn type_id(&self) -> TypeId {
        match self {
            Self::UChar(_) => TypeId::UChar,
            Self::Char(_) => TypeId::Char,
            Self::UShort(_) => TypeId::UShort,
            Self::Short(_) => TypeId::Short,
            Self::UInt(_) => TypeId::UInt,
            Self::Int(_) => TypeId::Int,
            Self::Float(_) => TypeId::Float,
            Self::Double(_) => TypeId::Double,
            Self::Str(_) => TypeId::String,
            Self::Time(_) => TypeId::Time,
            Self::Raw(_) => TypeId::Spare,
        }
    }

    /// Convert every element to a [`Value`].
    pub fn values(&self) -> Vec<Value> {
        match self {
            Self::UChar(v) => v.iter().map(|x| x.to_value()).collect(),
            Self::Char(v) => v.iter().map(|x| x.to_value()).collect(),
            Self::UShort(v) => v.iter().map(|x| x.to_value()).collect(),
            Self::Short(v) => v.iter().map(|x| x.to_value()).collect(),
            Self::UInt(v) => v.iter().map(|x| x.to_value()).collect(),
            Self::Int(v) => v.iter().map(|x| x.to_value()).collect(),
            Self::Float(v) => v.iter().map(|x| x.to_value()).collect(),
            Self::Double(v) => v.iter().map(|x| x.to_value()).collect(),
            Self::Str(s) => vec![Value::Str(s.clone())],
            Self::Time(v) => v.iter().map(|t| Value::Time(*t)).collect(),
            Self::Raw(v) => vec![Value::Bytes(v.clone())],
        }
    }
}

// === Decode / encode against the type system ===

/// Decode a string field: bytes up to the first NUL without trailing space
/// padding, lossily as UTF-8.
pub(crate) fn decode_string(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let text = &bytes[..len];
    let len = text.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    String::from_utf8_lossy(&text[..len]).into_owned()
}

/// Decode the element starting at `buf[0]`.
///
/// For string and spare types `buf` is the whole field.
pub(crate) fn decode_elem(type_id: TypeId, buf: &[u8]) -> Value {
    match type_id {
        TypeId::UChar => u8::read_be(buf).to_value(),
        TypeId::Char => i8::read_be(buf).to_value(),
        TypeId::UShort => u16::read_be(buf).to_value(),
        TypeId::Short => i16::read_be(buf).to_value(),
        TypeId::UInt => u32::read_be(buf).to_value(),
        TypeId::Int => i32::read_be(buf).to_value(),
        TypeId::Float => f32::read_be(buf).to_value(),
        TypeId::Double => f64::read_be(buf).to_value(),
        TypeId::Time => Value::Time(Mjd::read_be(buf)),
        TypeId::String => Value::Str(decode_string(buf)),
        TypeId::Spare | TypeId::Unknown => Value::Bytes(buf.to_vec()),
    }
}

fn decode_vec<T: EprPod>(buf: &[u8], n: usize) -> Vec<T> {
    buf.chunks_exact(T::SIZE).take(n).map(T::read_be).collect()
}

/// Decode `n` consecutive elements.
pub(crate) fn decode_elems(type_id: TypeId, buf: &[u8], n: usize) -> ElemArray {
    match type_id {
        TypeId::UChar => ElemArray::UChar(buf[..n].to_vec()),
        TypeId::Char => ElemArray::Char(decode_vec(buf, n)),
        TypeId::UShort => ElemArray::UShort(decode_vec(buf, n)),
        TypeId::Short => ElemArray::Short(decode_vec(buf, n)),
        TypeId::UInt => ElemArray::UInt(decode_vec(buf, n)),
        TypeId::Int => ElemArray::Int(decode_vec(buf, n)),
        TypeId::Float => ElemArray::Float(decode_vec(buf, n)),
        TypeId::Double => ElemArray::Double(decode_vec(buf, n)),
        TypeId::Time => ElemArray::Time(
            buf.chunks_exact(Mjd::SIZE).take(n).map(Mjd::read_be).collect(),
        ),
        TypeId::String => ElemArray::Str(decode_string(&buf[..n])),
        TypeId::Spare | TypeId::Unknown => ElemArray::Raw(buf[..n].to_vec()),
    }
}

fn coerce_int(type_id: TypeId, value: &Value, min: i64, max: i64) -> Result<i64> {
    let v = match value {
        Value::Int(v) => *v as i128,
        Value::UInt(v) => *v as i128,
        other => return Err(Error::type_mismatch(type_id.name(), other.kind_name())),
    };
    if v < min as i128 || v > max as i128 {
        return Err(Error::Overflow(format!(
            "value {} out of range for {} field",
            v, type_id
        )));
    }
    Ok(v as i64)
}

fn coerce_float(type_id: TypeId, value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| Error::type_mismatch(type_id.name(), value.kind_name()))
}

/// Encode one numeric element into `buf`, coercing `value` to `type_id`.
///
/// Integers are range-checked, floats are rejected for integer types.
/// Non-numeric types cannot be encoded.
pub(crate) fn encode_elem(type_id: TypeId, value: &Value, buf: &mut [u8]) -> Result<()> {
    match type_id {
        TypeId::UChar => (coerce_int(type_id, value, 0, u8::MAX as i64)? as u8).write_be(buf),
        TypeId::Char => {
            (coerce_int(type_id, value, i8::MIN as i64, i8::MAX as i64)? as i8).write_be(buf)
        }
        TypeId::UShort => {
            (coerce_int(type_id, value, 0, u16::MAX as i64)? as u16).write_be(buf)
        }
        TypeId::Short => {
            (coerce_int(type_id, value, i16::MIN as i64, i16::MAX as i64)? as i16).write_be(buf)
        }
        TypeId::UInt => (coerce_int(type_id, value, 0, u32::MAX as i64)? as u32).write_be(buf),
        TypeId::Int => {
            (coerce_int(type_id, value, i32::MIN as i64, i32::MAX as i64)? as i32).write_be(buf)
        }
        TypeId::Float => (coerce_float(type_id, value)? as f32).write_be(buf),
        TypeId::Double => coerce_float(type_id, value)?.write_be(buf),
        other => {
            return Err(Error::NotImplemented(format!(
                "writing elements of type \"{}\"",
                other.name()
            )))
        }
    }
    Ok(())
}
