//! Main/Specific Product Header and DSD table parsing.
//!
//! Headers are ASCII blocks of `KEYWORD=value` lines. Quoted values are
//! strings, signed numbers are integers or doubles, and a trailing `<unit>`
//! names the unit of a number. Parsed values are re-encoded big-endian into
//! a binary record so headers can be read through the same field API as
//! dataset records.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::core::Dsd;
use crate::util::{EprPod, Error, Result, TypeId};

use super::{
    has_product_magic, FieldInfo, ProductStreams, RecordInfo, KEYWORD_SEPARATOR,
    LINE_TERMINATOR, MPH_SIZE, PRODUCT_ID_LEN,
};

/// Value of a header keyword.
#[derive(Clone, Debug, PartialEq)]
pub enum HeaderValue {
    Str(String),
    Int(i64),
    Double(f64),
}

impl HeaderValue {
    /// On-disk type used for this value in the header record.
    fn type_id(&self) -> TypeId {
        match self {
            Self::Str(_) => TypeId::String,
            Self::Int(v) if i32::try_from(*v).is_ok() => TypeId::Int,
            Self::Int(v) if u32::try_from(*v).is_ok() => TypeId::UInt,
            Self::Int(_) | Self::Double(_) => TypeId::Double,
        }
    }

    fn num_elems(&self) -> u32 {
        match self {
            Self::Str(s) => s.len() as u32,
            _ => 1,
        }
    }
}

/// One `KEYWORD=value<unit>` entry.
#[derive(Clone, Debug, PartialEq)]
pub struct HeaderEntry {
    pub key: String,
    pub value: HeaderValue,
    pub unit: Option<String>,
}

/// A parsed header: keyword entries plus their binary record form.
#[derive(Clone, Debug)]
pub struct HeaderBlock {
    pub entries: Vec<HeaderEntry>,
    pub info: Arc<RecordInfo>,
    pub buffer: Vec<u8>,
}

impl HeaderBlock {
    /// Build the binary record for a list of entries.
    pub fn from_entries(name: &str, entries: Vec<HeaderEntry>) -> Result<Self> {
        let mut builder = RecordInfo::builder(name);
        for entry in &entries {
            builder = builder.field_with(
                entry.key.clone(),
                entry.value.type_id(),
                entry.value.num_elems(),
                entry.unit.clone().unwrap_or_default(),
                "",
            )?;
        }
        let info = builder.build();

        let mut buffer = vec![0u8; info.tot_size as usize];
        for (entry, field) in entries.iter().zip(&info.fields) {
            encode_entry(&entry.value, field, &mut buffer);
        }

        Ok(Self {
            entries,
            info: Arc::new(info),
            buffer,
        })
    }

    /// Look up an entry by keyword.
    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.value)
    }

    /// String value with its space padding removed.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            HeaderValue::Str(s) => Some(s.trim_end()),
            _ => None,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            HeaderValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get_i64(key).and_then(|v| u64::try_from(v).ok())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            HeaderValue::Int(v) => Some(*v as f64),
            HeaderValue::Double(v) => Some(*v),
            HeaderValue::Str(_) => None,
        }
    }

    fn require_u64(&self, key: &str) -> Result<u64> {
        self.get_u64(key)
            .ok_or_else(|| Error::InvalidProduct(format!("missing or invalid keyword {}", key)))
    }
}

fn encode_entry(value: &HeaderValue, field: &FieldInfo, buffer: &mut [u8]) {
    let dst = &mut buffer[field.offset as usize..field.end() as usize];
    match (value, field.type_id) {
        (HeaderValue::Str(s), _) => dst.copy_from_slice(s.as_bytes()),
        (HeaderValue::Int(v), TypeId::Int) => (*v as i32).write_be(dst),
        (HeaderValue::Int(v), TypeId::UInt) => (*v as u32).write_be(dst),
        (HeaderValue::Int(v), _) => (*v as f64).write_be(dst),
        (HeaderValue::Double(v), _) => v.write_be(dst),
    }
}

// ============================================================================
// Keyword Parsing
// ============================================================================

/// Parse a value text (everything after `=`). Quoted strings keep their
/// padding so header fields span their on-disk width.
fn parse_value(raw: &str) -> (HeaderValue, Option<String>) {
    if let Some(rest) = raw.strip_prefix('"') {
        let text = match rest.find('"') {
            Some(end) => &rest[..end],
            None => rest.trim_end(),
        };
        return (HeaderValue::Str(text.to_string()), None);
    }

    let (num_text, unit) = match raw.find('<') {
        Some(start) => {
            let unit = raw[start + 1..].split('>').next().unwrap_or_default();
            (&raw[..start], Some(unit.to_string()))
        }
        None => (raw, None),
    };
    let num_text = num_text.trim();

    let digits = num_text.strip_prefix(['+', '-']).unwrap_or(num_text);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(v) = num_text.parse::<i64>() {
            return (HeaderValue::Int(v), unit);
        }
    }
    if !num_text.is_empty() && num_text.bytes().any(|b| b.is_ascii_digit()) {
        if let Ok(v) = num_text.parse::<f64>() {
            return (HeaderValue::Double(v), unit);
        }
    }
    (HeaderValue::Str(num_text.to_string()), unit)
}

/// Parse all `KEYWORD=value` lines of a header block.
pub fn parse_keywords(data: &[u8]) -> Vec<HeaderEntry> {
    let mut entries = Vec::new();

    for line in data.split(|&b| b == LINE_TERMINATOR) {
        let Some(eq) = line.iter().position(|&b| b == KEYWORD_SEPARATOR) else {
            continue;
        };
        let key = String::from_utf8_lossy(&line[..eq]).trim().to_string();
        if key.is_empty() {
            continue;
        }
        let raw = String::from_utf8_lossy(&line[eq + 1..]);
        let (value, unit) = parse_value(raw.trim_end());
        trace!(key = %key, ?value, "header keyword");
        entries.push(HeaderEntry { key, value, unit });
    }

    entries
}

/// Parse one DSD table entry. Blank entries yield `None`.
pub fn parse_dsd(index: u32, data: &[u8]) -> Result<Option<Dsd>> {
    let block = HeaderBlock::from_entries("DSD", parse_keywords(data))?;
    let Some(ds_name) = block.get_str("DS_NAME") else {
        return Ok(None);
    };
    if ds_name.trim().is_empty() {
        return Ok(None);
    }

    let ds_type = match block.get("DS_TYPE") {
        Some(HeaderValue::Str(s)) => s.chars().next().unwrap_or(' '),
        _ => ' ',
    };
    let num = |key: &str| block.get_u64(key).unwrap_or(0);

    Ok(Some(Dsd {
        product: 0,
        index,
        ds_name: ds_name.to_string(),
        ds_type,
        filename: block.get_str("FILENAME").unwrap_or_default().to_string(),
        ds_offset: num("DS_OFFSET"),
        ds_size: num("DS_SIZE"),
        num_dsr: u32::try_from(num("NUM_DSR"))
            .map_err(|_| Error::InvalidProduct(format!("NUM_DSR too large in DSD {}", index)))?,
        dsr_size: u32::try_from(num("DSR_SIZE"))
            .map_err(|_| Error::InvalidProduct(format!("DSR_SIZE too large in DSD {}", index)))?,
    }))
}

// ============================================================================
// Product Header
// ============================================================================

/// MPH, SPH and DSD table of a product.
#[derive(Clone, Debug)]
pub struct ProductHeader {
    pub mph: HeaderBlock,
    pub sph: HeaderBlock,
    pub dsds: Vec<Dsd>,
}

impl ProductHeader {
    /// Read and parse the product headers.
    pub fn read(streams: &mut ProductStreams) -> Result<Self> {
        if streams.size() < MPH_SIZE as u64 {
            return Err(Error::InvalidProduct(format!(
                "file too small for an MPH ({} bytes)",
                streams.size()
            )));
        }

        let mph_bytes = streams.read_bytes(0, MPH_SIZE)?;
        if !has_product_magic(&mph_bytes) {
            return Err(Error::InvalidProduct("missing PRODUCT keyword in MPH".into()));
        }
        let mph = HeaderBlock::from_entries("MPH", parse_keywords(&mph_bytes))?;

        let sph_size = mph.require_u64("SPH_SIZE")?;
        if sph_size > streams.size() - MPH_SIZE as u64 {
            return Err(Error::InvalidProduct(format!(
                "SPH_SIZE {} exceeds the file ({} bytes)",
                sph_size,
                streams.size()
            )));
        }
        let sph_size = sph_size as usize;
        let num_dsd = mph.require_u64("NUM_DSD")? as usize;
        let dsd_size = mph.require_u64("DSD_SIZE")? as usize;
        let dsd_total = num_dsd
            .checked_mul(dsd_size)
            .filter(|&t| t <= sph_size)
            .ok_or_else(|| Error::InvalidProduct("DSD table exceeds SPH_SIZE".into()))?;

        let sph_bytes = streams.read_bytes(MPH_SIZE as u64, sph_size)?;
        let (sph_part, dsd_part) = sph_bytes.split_at(sph_size - dsd_total);
        let sph = HeaderBlock::from_entries("SPH", parse_keywords(sph_part))?;

        let mut dsds = Vec::with_capacity(num_dsd);
        if dsd_size > 0 {
            for (i, chunk) in dsd_part.chunks_exact(dsd_size).enumerate() {
                if let Some(dsd) = parse_dsd(i as u32, chunk)? {
                    dsds.push(dsd);
                }
            }
        }

        debug!(
            sph_size,
            num_dsd,
            parsed = dsds.len(),
            "parsed product header"
        );
        Ok(Self { mph, sph, dsds })
    }

    /// Full product name from the `PRODUCT` keyword.
    pub fn product_name(&self) -> &str {
        self.mph.get_str("PRODUCT").unwrap_or_default()
    }

    /// Product id: the first 48 characters of the product name.
    pub fn id_string(&self) -> String {
        self.product_name().chars().take(PRODUCT_ID_LEN).collect()
    }

    /// Numeric keyword from the SPH, falling back to the MPH.
    pub fn keyword_u64(&self, key: &str) -> Option<u64> {
        self.sph.get_u64(key).or_else(|| self.mph.get_u64(key))
    }
}
