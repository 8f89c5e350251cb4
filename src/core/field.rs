//! Fields: typed element arrays inside a record buffer.

use std::fmt;
use std::io::Write;
use std::ptr;

use crate::format::FieldInfo;
use crate::util::{
    decode_elem, decode_elems, decode_string, encode_elem, ElemArray, EprPod, Error, Result,
    TypeId, Value,
};

use super::Record;

/// Read-only view of one field of a record.
///
/// Two fields are equal when they are the same field of the same record.
#[derive(Clone, Copy)]
pub struct Field<'r> {
    record: &'r Record,
    index: usize,
}

impl<'r> Field<'r> {
    pub(crate) fn new(record: &'r Record, index: usize) -> Self {
        Self { record, index }
    }

    #[inline]
    fn info(&self) -> &'r FieldInfo {
        &self.record.info.fields[self.index]
    }

    /// Bytes of the whole field.
    #[inline]
    pub fn as_bytes(&self) -> &'r [u8] {
        let info = self.info();
        &self.record.buffer[info.offset as usize..info.end() as usize]
    }

    #[inline]
    pub fn get_name(&self) -> &'r str {
        &self.info().name
    }

    #[inline]
    pub fn get_type(&self) -> TypeId {
        self.info().type_id
    }

    #[inline]
    pub fn get_num_elems(&self) -> u32 {
        self.info().num_elems
    }

    #[inline]
    pub fn get_description(&self) -> &'r str {
        &self.info().description
    }

    #[inline]
    pub fn get_unit(&self) -> &'r str {
        &self.info().unit
    }

    /// Byte offset of the field within its record.
    #[inline]
    pub fn get_offset(&self) -> u32 {
        self.info().offset
    }

    /// Position of the field in its record.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Absolute file offset of the field, for records read from a dataset.
    pub fn file_offset(&self) -> Option<u64> {
        Some(self.record.file_offset()? + self.get_offset() as u64)
    }

    /// Decode one element. String fields decode to their whole text, and
    /// element 0 exists even when the text is empty.
    pub fn get_elem(&self, index: u32) -> Result<Value> {
        self.record.product.check_open()?;
        let info = self.info();
        let whole_text = info.type_id == TypeId::String && index == 0;
        if index >= info.num_elems && !whole_text {
            return Err(Error::out_of_range("element", index, info.num_elems));
        }
        let bytes = self.as_bytes();
        match info.type_id {
            TypeId::String | TypeId::Spare | TypeId::Unknown => Ok(decode_elem(info.type_id, bytes)),
            t => {
                let start = (index * t.size()) as usize;
                Ok(decode_elem(t, &bytes[start..]))
            }
        }
    }

    /// Decode all elements.
    pub fn get_elems(&self) -> Result<ElemArray> {
        self.record.product.check_open()?;
        let info = self.info();
        Ok(decode_elems(info.type_id, self.as_bytes(), info.num_elems as usize))
    }

    /// Decode all elements as `T`, which must be the field's own type.
    pub fn get_elems_as<T: EprPod>(&self) -> Result<Vec<T>> {
        self.record.product.check_open()?;
        if T::TYPE_ID != self.get_type() {
            return Err(Error::type_mismatch(self.get_type().name(), T::TYPE_ID.name()));
        }
        Ok(self.as_bytes().chunks_exact(T::SIZE).map(T::read_be).collect())
    }

    /// Number of elements; for string fields the length of the text.
    pub fn len(&self) -> Result<usize> {
        self.record.product.check_open()?;
        Ok(match self.get_type() {
            TypeId::String => decode_string(self.as_bytes()).len(),
            _ => self.get_num_elems() as usize,
        })
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Write `name = value` followed by a newline.
    pub fn print<W: Write>(&self, w: &mut W) -> Result<()> {
        self.record.product.check_open()?;
        writeln!(w, "{}", self)?;
        Ok(())
    }
}

impl PartialEq for Field<'_> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.record, other.record) && self.index == other.index
    }
}

impl Eq for Field<'_> {}

impl fmt::Display for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = self.info();
        write!(f, "{} = ", info.name)?;
        let bytes = self.as_bytes();
        match info.type_id {
            TypeId::String => write!(f, "\"{}\"", decode_string(bytes)),
            TypeId::Spare | TypeId::Unknown => write!(f, "{}", decode_elem(info.type_id, bytes)),
            t => {
                let values = decode_elems(t, bytes, info.num_elems as usize).values();
                if values.len() == 1 {
                    return write!(f, "{}", values[0]);
                }
                write!(f, "{{")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl fmt::Debug for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epr.Field(\"{}\") {} {} elements",
            self.get_name(),
            self.get_num_elems(),
            self.get_type()
        )
    }
}

/// Writable view of one field of a record.
///
/// Writes update the record buffer and the product file in place.
pub struct FieldMut<'r> {
    record: &'r mut Record,
    index: usize,
}

impl<'r> FieldMut<'r> {
    pub(crate) fn new(record: &'r mut Record, index: usize) -> Self {
        Self { record, index }
    }

    /// Read-only view of the same field.
    pub fn as_field(&self) -> Field<'_> {
        Field::new(self.record, self.index)
    }

    pub fn get_name(&self) -> &str {
        &self.record.info.fields[self.index].name
    }

    pub fn get_elem(&self, index: u32) -> Result<Value> {
        self.as_field().get_elem(index)
    }

    pub fn get_elems(&self) -> Result<ElemArray> {
        self.as_field().get_elems()
    }

    fn check_writable(&self) -> Result<()> {
        self.record.product.check_open()?;
        if self.record.is_header() {
            return Err(Error::NotImplemented(format!(
                "writing {} field \"{}\"",
                self.record.dataset_name(),
                self.get_name()
            )));
        }
        if !self.record.product.mode.is_writable() {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }

    /// Store `bytes` at `start` within the field, in the file and the buffer.
    fn commit(&mut self, start: u32, bytes: &[u8]) -> Result<()> {
        let info = &self.record.info.fields[self.index];
        let record_pos = self
            .record
            .file_offset()
            .ok_or_else(|| Error::invalid("record has not been read from a dataset"))?;
        let offset = info.offset + start;
        let pos = record_pos + offset as u64;

        tracing::trace!(field = %info.name, pos, len = bytes.len(), "write field");
        self.record.product.with_streams(|s| s.write_at(pos, bytes))?;
        let offset = offset as usize;
        self.record.buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Encode one element in place.
    pub fn set_elem(&mut self, value: impl Into<Value>, index: u32) -> Result<()> {
        self.check_writable()?;
        let info = &self.record.info.fields[self.index];
        if index >= info.num_elems {
            return Err(Error::out_of_range("element", index, info.num_elems));
        }
        let size = info.type_id.size();
        let mut bytes = vec![0u8; size as usize];
        encode_elem(info.type_id, &value.into(), &mut bytes)?;
        self.commit(index * size, &bytes)
    }

    /// Encode all elements in place; `values` must have one entry per element.
    pub fn set_elems(&mut self, values: &[Value]) -> Result<()> {
        self.check_writable()?;
        let info = &self.record.info.fields[self.index];
        if values.len() != info.num_elems as usize {
            return Err(Error::invalid(format!(
                "field \"{}\" has {} elements, got {} values",
                info.name,
                info.num_elems,
                values.len()
            )));
        }
        let size = info.type_id.size() as usize;
        let mut bytes = vec![0u8; info.byte_size() as usize];
        for (value, chunk) in values.iter().zip(bytes.chunks_exact_mut(size.max(1))) {
            encode_elem(info.type_id, value, chunk)?;
        }
        self.commit(0, &bytes)
    }

    /// Typed form of [`set_elems`](Self::set_elems).
    pub fn set_elems_from<T: EprPod>(&mut self, values: &[T]) -> Result<()> {
        let values: Vec<Value> = values.iter().map(|v| v.to_value()).collect();
        self.set_elems(&values)
    }
}

impl fmt::Debug for FieldMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.as_field(), f)
    }
}
