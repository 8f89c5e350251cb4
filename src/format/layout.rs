//! Record layouts: the ordered, typed fields of a fixed-size record.

use crate::util::{Error, Result, TypeId};

use super::GENERIC_FIELD_NAME;

/// Layout of one field inside a record.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub type_id: TypeId,
    pub num_elems: u32,
    /// Byte offset relative to the start of the record.
    pub offset: u32,
    pub unit: String,
    pub description: String,
}

impl FieldInfo {
    /// Number of bytes spanned by the field.
    #[inline]
    pub fn byte_size(&self) -> u32 {
        self.num_elems * self.type_id.size()
    }

    /// Offset one past the last byte of the field.
    #[inline]
    pub fn end(&self) -> u32 {
        self.offset + self.byte_size()
    }
}

/// Layout of a record: fields in on-disk order plus the total size.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordInfo {
    pub name: String,
    pub fields: Vec<FieldInfo>,
    pub tot_size: u32,
}

impl RecordInfo {
    /// Start a layout; fields are appended back to back.
    pub fn builder(name: impl Into<String>) -> RecordInfoBuilder {
        RecordInfoBuilder {
            name: name.into(),
            fields: Vec::new(),
            offset: 0,
        }
    }

    /// Single `uchar` field spanning the whole record, for datasets with no
    /// known layout.
    pub fn generic(name: impl Into<String>, dsr_size: u32) -> Self {
        Self {
            name: name.into(),
            fields: vec![FieldInfo {
                name: GENERIC_FIELD_NAME.to_string(),
                type_id: TypeId::UChar,
                num_elems: dsr_size,
                offset: 0,
                unit: String::new(),
                description: String::new(),
            }],
            tot_size: dsr_size,
        }
    }

    /// Index of the first field with the given name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        self.fields.iter().position(|f| f.name == name)
    }

    #[inline]
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }
}

/// Incremental builder for [`RecordInfo`].
#[derive(Debug)]
pub struct RecordInfoBuilder {
    name: String,
    fields: Vec<FieldInfo>,
    offset: u32,
}

impl RecordInfoBuilder {
    /// Append a field with no unit or description.
    pub fn field(self, name: impl Into<String>, type_id: TypeId, num_elems: u32) -> Result<Self> {
        self.field_with(name, type_id, num_elems, "", "")
    }

    /// Append a field. Fails when the record would exceed `u32::MAX` bytes.
    pub fn field_with(
        mut self,
        name: impl Into<String>,
        type_id: TypeId,
        num_elems: u32,
        unit: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let end = num_elems
            .checked_mul(type_id.size())
            .and_then(|size| size.checked_add(self.offset))
            .ok_or_else(|| {
                Error::InvalidProduct(format!(
                    "record {} overflows at field {} ({} x {})",
                    self.name, name, num_elems, type_id
                ))
            })?;
        self.fields.push(FieldInfo {
            name,
            type_id,
            num_elems,
            offset: self.offset,
            unit: unit.into(),
            description: description.into(),
        });
        self.offset = end;
        Ok(self)
    }

    /// Current end offset (the size so far).
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn build(self) -> RecordInfo {
        RecordInfo {
            name: self.name,
            fields: self.fields,
            tot_size: self.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_offsets() {
        let info = RecordInfo::builder("test")
            .field("time", TypeId::Time, 1)
            .and_then(|b| b.field("flag", TypeId::UChar, 1))
            .and_then(|b| b.field("values", TypeId::UShort, 4))
            .and_then(|b| b.field("values", TypeId::Float, 1))
            .unwrap()
            .build();

        assert_eq!(info.tot_size, 12 + 1 + 8 + 4);
        assert_eq!(info.fields[1].offset, 12);
        assert_eq!(info.fields[2].offset, 13);
        assert_eq!(info.fields[3].offset, 21);
        // first match wins
        assert_eq!(info.field_index("values"), Some(2));
        assert_eq!(info.field_index(""), None);
        assert_eq!(info.field_index("missing"), None);
    }

    #[test]
    fn test_builder_overflow() {
        let err = RecordInfo::builder("big")
            .field("values", TypeId::UShort, 4_000_000_000)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidProduct(_)));

        let err = RecordInfo::builder("big")
            .field("head", TypeId::UChar, u32::MAX)
            .and_then(|b| b.field("tail", TypeId::UChar, 1))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidProduct(_)));
    }

    #[test]
    fn test_generic_layout() {
        let info = RecordInfo::generic("MDS1", 170);
        assert_eq!(info.tot_size, 170);
        assert_eq!(info.num_fields(), 1);
        assert_eq!(info.fields[0].name, GENERIC_FIELD_NAME);
    }
}
