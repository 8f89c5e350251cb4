//! Data description database (DDDB).
//!
//! The DDDB describes, per product type, the record layouts of each dataset,
//! the bands derived from dataset fields and the flag codings of flag bands.
//! It is stored as JSON:
//!
//! ```text
//! {
//!   "products": [{
//!     "product_type": "MER_RR__2P",
//!     "scene_width": "Quality_ADS.num_pixels" | 1121,
//!     "scene_height": "MDS1" | 1500,
//!     "records": { "MDS1_rec": [ {"name": "dsr_time", "type": "time"}, ... ] },
//!     "datasets": [ {"name": "MDS1", "dsd_name": "MDS1", "record": "MDS1_rec"} ],
//!     "bands": [ {"name": "water_vapour", "dataset": "MDS1", "field": "wvapour", ...} ],
//!     "flag_codings": { "l2_flags": [ {"name": "CLOUD", "mask": 4} ] }
//!   }]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{SampleModel, ScalingMethod};
use crate::util::{EprCode, Error, Result, TypeId};

use super::DDDB_ENV_VAR;

/// Element count of a field in a record layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CountSpec {
    /// Fixed number of elements
    Fixed(u32),
    /// `"*"` (fill the rest of the record) or an MPH/SPH keyword name
    Keyword(String),
}

impl Default for CountSpec {
    fn default() -> Self {
        Self::Fixed(1)
    }
}

impl CountSpec {
    /// Marker for a count filling the remainder of the record.
    pub const REST: &'static str = "*";
}

/// One field of a record layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_id: TypeId,
    #[serde(default)]
    pub count: CountSpec,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
}

/// A dataset bound to a DSD and a record layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub name: String,
    /// DSD name as it appears in `DS_NAME` (defaults to `name`)
    #[serde(default)]
    pub dsd_name: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Key into [`ProductSpec::records`]
    pub record: String,
}

impl DatasetSpec {
    pub fn dsd_name(&self) -> &str {
        self.dsd_name.as_deref().unwrap_or(&self.name)
    }
}

/// Scene dimension: a number, a dataset name (its record count) or a
/// `"Dataset.field"` reference read from the first record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DimSpec {
    Fixed(u32),
    Ref(String),
}

/// Scaling factor or offset: a number or a `"Dataset.field[.elem]"`
/// reference read from the first record of a dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScaleSpec {
    Value(f64),
    Ref(String),
}

/// Tie-point grid geometry of an annotation band. An absent spacing spreads
/// the grid evenly over the scene: `(extent - 1) / (points - 1)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TiePointSpec {
    /// Scene pixels between tie-point columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsampling_x: Option<f64>,
    /// Scene lines between tie-point rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsampling_y: Option<f64>,
}

fn default_spectr_index() -> i32 {
    -1
}

/// A band bound to a dataset field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandSpec {
    pub name: String,
    pub dataset: String,
    /// Field name; absent for bands not bound to a field
    #[serde(default)]
    pub field: Option<String>,
    /// First element used within the field
    #[serde(default)]
    pub elem: Option<u32>,
    #[serde(default)]
    pub sample_model: SampleModel,
    pub data_type: TypeId,
    #[serde(default)]
    pub scaling_method: ScalingMethod,
    #[serde(default)]
    pub scaling_offset: Option<ScaleSpec>,
    #[serde(default)]
    pub scaling_factor: Option<ScaleSpec>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub bm_expr: Option<String>,
    #[serde(default = "default_spectr_index")]
    pub spectr_band_index: i32,
    #[serde(default)]
    pub lines_mirrored: bool,
    /// Key into [`ProductSpec::flag_codings`]
    #[serde(default)]
    pub flag_coding: Option<String>,
    #[serde(default)]
    pub tie_points: Option<TiePointSpec>,
}

/// One named flag of a flag coding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSpec {
    pub name: String,
    pub mask: u32,
    #[serde(default)]
    pub description: String,
}

/// Description of one product type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSpec {
    /// First 10 characters of the product id (e.g. `"ASA_IMP_1P"`)
    pub product_type: String,
    #[serde(default)]
    pub scene_width: Option<DimSpec>,
    #[serde(default)]
    pub scene_height: Option<DimSpec>,
    #[serde(default)]
    pub records: BTreeMap<String, Vec<FieldSpec>>,
    #[serde(default)]
    pub datasets: Vec<DatasetSpec>,
    #[serde(default)]
    pub bands: Vec<BandSpec>,
    #[serde(default)]
    pub flag_codings: BTreeMap<String, Vec<FlagSpec>>,
}

impl ProductSpec {
    /// Check internal references and types.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| {
            Err(Error::epr(
                EprCode::InvalidDddbFormat,
                format!("{}: {}", self.product_type, msg),
            ))
        };

        for (name, fields) in &self.records {
            for field in fields {
                if field.type_id == TypeId::Unknown {
                    return invalid(format!("field {}.{} has unknown type", name, field.name));
                }
                if let CountSpec::Keyword(k) = &field.count {
                    if k.is_empty() {
                        return invalid(format!("field {}.{} has an empty count", name, field.name));
                    }
                }
            }
        }
        for ds in &self.datasets {
            if !self.records.contains_key(&ds.record) {
                return invalid(format!("dataset {} uses undefined record {}", ds.name, ds.record));
            }
        }
        for band in &self.bands {
            if !band.data_type.is_numeric() {
                return invalid(format!("band {} has non-numeric type {}", band.name, band.data_type));
            }
            if let Some(coding) = &band.flag_coding {
                if !self.flag_codings.contains_key(coding) {
                    return invalid(format!("band {} uses undefined flag coding {}", band.name, coding));
                }
            }
            if let Some(tp) = band.tie_points {
                let positive = |s: Option<f64>| s.map_or(true, |v| v > 0.0 && v.is_finite());
                if !positive(tp.subsampling_x) || !positive(tp.subsampling_y) {
                    return invalid(format!("band {} has non-positive tie-point subsampling", band.name));
                }
            }
        }
        Ok(())
    }
}

/// Data description database: product specs keyed by product type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dddb {
    #[serde(default)]
    pub products: Vec<ProductSpec>,
}

/// Descriptions compiled into the crate.
const BUILTIN_JSON: &str = include_str!("builtin_dddb.json");

static BUILTIN: OnceLock<Arc<Dddb>> = OnceLock::new();

impl Dddb {
    /// Database with no product types; every product uses the generic layout.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in descriptions of `ASA_IMP_1P` and `MER_RR__2P`, used when no
    /// database is given and `$ENVISAT_DDDB` is unset.
    pub fn builtin() -> Result<Arc<Self>> {
        if let Some(dddb) = BUILTIN.get() {
            return Ok(dddb.clone());
        }
        let dddb = Arc::new(Self::from_json_str(BUILTIN_JSON)?);
        Ok(BUILTIN.get_or_init(|| dddb).clone())
    }

    /// Parse and validate a JSON database.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let dddb: Dddb = serde_json::from_str(json)?;
        for spec in &dddb.products {
            spec.validate()?;
        }
        Ok(dddb)
    }

    /// Load a JSON database from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let dddb = Self::from_json_str(&json)?;
        debug!(path = %path.display(), products = dddb.products.len(), "loaded DDDB");
        Ok(dddb)
    }

    /// Load the database named by `$ENVISAT_DDDB`, if set.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var_os(DDDB_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::from_path(path).map(Some),
            _ => Ok(None),
        }
    }

    /// Spec for a product type.
    pub fn find(&self, product_type: &str) -> Option<&ProductSpec> {
        self.products.iter().find(|p| p.product_type == product_type)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
