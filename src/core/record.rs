//! Records: fixed-size binary structures made of typed fields.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use crate::format::RecordInfo;
use crate::util::{Error, Result};

use super::product::ProductInner;
use super::{Field, FieldMut};

/// Where a record's bytes come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RecordOrigin {
    /// Records of the dataset at this catalog index
    Dataset(usize),
    Mph,
    Sph,
}

/// A record of a dataset, or one of the product headers.
///
/// The record owns its byte buffer; [`Field`]s are views into it. A record
/// created with [`Dataset::create_record`](super::Dataset::create_record) is
/// unassigned until it is filled by a read.
#[derive(Clone)]
pub struct Record {
    pub(crate) product: Arc<ProductInner>,
    pub(crate) origin: RecordOrigin,
    pub(crate) info: Arc<RecordInfo>,
    pub(crate) index: Option<u32>,
    pub(crate) buffer: Vec<u8>,
}

impl Record {
    /// Zeroed, unassigned record.
    pub(crate) fn new(product: Arc<ProductInner>, origin: RecordOrigin, info: Arc<RecordInfo>) -> Self {
        let buffer = vec![0u8; info.tot_size as usize];
        Self {
            product,
            origin,
            info,
            index: None,
            buffer,
        }
    }

    /// Copy of the MPH or SPH record.
    pub(crate) fn from_header(product: Arc<ProductInner>, origin: RecordOrigin) -> Self {
        let (info, buffer) = match product.header_block(origin) {
            Some(block) => (block.info.clone(), block.buffer.clone()),
            None => (Arc::new(RecordInfo::builder("").build()), Vec::new()),
        };
        Self {
            product,
            origin,
            info,
            index: Some(0),
            buffer,
        }
    }

    /// Index within the dataset, `None` until the record has been read.
    #[inline]
    pub fn index(&self) -> Option<u32> {
        self.index
    }

    /// Size of the record in bytes.
    #[inline]
    pub fn tot_size(&self) -> u32 {
        self.info.tot_size
    }

    #[inline]
    pub fn get_num_fields(&self) -> usize {
        self.info.num_fields()
    }

    /// Record layout.
    pub fn info(&self) -> &RecordInfo {
        &self.info
    }

    /// Raw record bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// True for the MPH and SPH records.
    pub fn is_header(&self) -> bool {
        !matches!(self.origin, RecordOrigin::Dataset(_))
    }

    /// Name of the dataset the record belongs to (`"MPH"`/`"SPH"` for headers).
    pub fn dataset_name(&self) -> &str {
        match self.origin {
            RecordOrigin::Dataset(i) => &self.product.catalog.datasets[i].name,
            RecordOrigin::Mph => "MPH",
            RecordOrigin::Sph => "SPH",
        }
    }

    /// Byte offset of the record from the start of its dataset.
    pub fn get_offset(&self) -> Option<u64> {
        let index = self.index?;
        match self.origin {
            RecordOrigin::Dataset(_) => Some(index as u64 * self.dsr_size()? as u64),
            _ => None,
        }
    }

    /// Absolute file offset of the record.
    pub fn file_offset(&self) -> Option<u64> {
        let index = self.index?;
        match self.origin {
            RecordOrigin::Dataset(i) => Some(self.product.catalog.datasets[i].dsd.record_offset(index)),
            _ => None,
        }
    }

    fn dsr_size(&self) -> Option<u32> {
        match self.origin {
            RecordOrigin::Dataset(i) => Some(self.product.catalog.datasets[i].dsd.dsr_size),
            _ => None,
        }
    }

    // === Field lookup ===

    /// First field with the given name.
    pub fn get_field(&self, name: &str) -> Result<Field<'_>> {
        let index = self.field_index(name)?;
        Ok(Field::new(self, index))
    }

    pub fn get_field_at(&self, index: usize) -> Result<Field<'_>> {
        self.check_field_index(index)?;
        Ok(Field::new(self, index))
    }

    /// Writable view of the first field with the given name.
    pub fn get_field_mut(&mut self, name: &str) -> Result<FieldMut<'_>> {
        let index = self.field_index(name)?;
        Ok(FieldMut::new(self, index))
    }

    pub fn get_field_mut_at(&mut self, index: usize) -> Result<FieldMut<'_>> {
        self.check_field_index(index)?;
        Ok(FieldMut::new(self, index))
    }

    /// All fields in on-disk order.
    pub fn fields(&self) -> Result<Vec<Field<'_>>> {
        self.product.check_open()?;
        Ok((0..self.info.num_fields()).map(|i| Field::new(self, i)).collect())
    }

    pub fn get_field_names(&self) -> Result<Vec<&str>> {
        self.product.check_open()?;
        Ok(self.info.fields.iter().map(|f| f.name.as_str()).collect())
    }

    fn field_index(&self, name: &str) -> Result<usize> {
        self.product.check_open()?;
        if name.is_empty() {
            return Err(Error::invalid("empty field name"));
        }
        self.info
            .field_index(name)
            .ok_or_else(|| Error::not_found("field", name))
    }

    fn check_field_index(&self, index: usize) -> Result<()> {
        self.product.check_open()?;
        let count = self.info.num_fields();
        if index >= count {
            return Err(Error::out_of_range("field", index as u64, count as u64));
        }
        Ok(())
    }

    // === Printing ===

    /// Write every field, one per line.
    pub fn print<W: Write>(&self, w: &mut W) -> Result<()> {
        for field in self.fields()? {
            field.print(w)?;
        }
        Ok(())
    }

    /// Write a single element of a field.
    pub fn print_element<W: Write>(&self, field_index: usize, elem_index: u32, w: &mut W) -> Result<()> {
        let field = self.get_field_at(field_index)?;
        let value = field.get_elem(elem_index)?;
        writeln!(w, "{}[{}] = {}", field.get_name(), elem_index, value)?;
        Ok(())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.info.num_fields() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", Field::new(self, i))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epr.Record({}) {} fields",
            self.dataset_name(),
            self.info.num_fields()
        )
    }
}
