//! Dataset and band tables of an open product.
//!
//! The catalog binds the DSD table to record layouts and band definitions
//! from the DDDB. Product types with no DDDB entry get one generic dataset
//! per DSD with data, and no bands.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::format::{
    CountSpec, DimSpec, FieldSpec, FlagSpec, ProductHeader, ProductSpec, ProductStreams,
    RecordInfo, ScaleSpec, TiePointSpec, DS_TYPE_MEASUREMENT,
};
use crate::util::{decode_elem, EprCode, Error, Result, TypeId};

use super::{Dsd, SampleModel, ScalingMethod};

/// A dataset bound to its DSD and record layout.
#[derive(Clone, Debug)]
pub(crate) struct DatasetEntry {
    pub name: String,
    pub description: String,
    pub dsd: Dsd,
    pub info: Arc<RecordInfo>,
}

/// A band bound to a dataset field.
#[derive(Clone, Debug)]
pub(crate) struct BandEntry {
    pub name: String,
    pub dataset: usize,
    /// -1 when the band is not bound to a field
    pub field_index: i32,
    /// -1 when the band starts at the first element
    pub elem_index: i32,
    pub sample_model: SampleModel,
    pub data_type: TypeId,
    pub scaling_method: ScalingMethod,
    pub scaling_offset: f64,
    pub scaling_factor: f64,
    pub bm_expr: Option<String>,
    pub unit: Option<String>,
    pub description: String,
    pub spectr_band_index: i32,
    pub lines_mirrored: bool,
    pub flag_coding: Option<String>,
    pub tie_points: Option<TiePointSpec>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Catalog {
    pub datasets: Vec<DatasetEntry>,
    pub bands: Vec<BandEntry>,
    pub scene_width: u32,
    pub scene_height: u32,
    pub flag_codings: BTreeMap<String, Vec<FlagSpec>>,
}

fn dddb_error(msg: impl Into<String>) -> Error {
    Error::epr(EprCode::InvalidDddbFormat, msg)
}

impl Catalog {
    /// Build the catalog for a parsed header.
    pub fn build(
        header: &ProductHeader,
        spec: Option<&ProductSpec>,
        streams: &mut ProductStreams,
    ) -> Result<Self> {
        let catalog = match spec {
            Some(spec) => Self::from_spec(header, spec, streams)?,
            None => Self::generic(header),
        };
        debug!(
            datasets = catalog.datasets.len(),
            bands = catalog.bands.len(),
            width = catalog.scene_width,
            height = catalog.scene_height,
            "built product catalog"
        );
        Ok(catalog)
    }

    /// One raw dataset per DSD with data.
    fn generic(header: &ProductHeader) -> Self {
        let datasets = header
            .dsds
            .iter()
            .filter(|dsd| dsd.has_data())
            .map(|dsd| {
                let name = dsd.dataset_name();
                DatasetEntry {
                    info: Arc::new(RecordInfo::generic(name.clone(), dsd.dsr_size)),
                    name,
                    description: String::new(),
                    dsd: dsd.clone(),
                }
            })
            .collect();

        Self {
            datasets,
            scene_height: first_measurement_rows(header),
            ..Self::default()
        }
    }

    fn from_spec(
        header: &ProductHeader,
        spec: &ProductSpec,
        streams: &mut ProductStreams,
    ) -> Result<Self> {
        let mut catalog = Self {
            flag_codings: spec.flag_codings.clone(),
            ..Self::default()
        };

        for ds in &spec.datasets {
            let dsd_name = ds.dsd_name().trim();
            let Some(dsd) = header.dsds.iter().find(|d| d.ds_name == dsd_name) else {
                debug!(dataset = %ds.name, "no DSD for dataset");
                continue;
            };
            if !dsd.has_data() {
                warn!(dataset = %ds.name, dsd = %dsd.ds_name, "DSD references no data");
                continue;
            }
            let fields = spec
                .records
                .get(&ds.record)
                .ok_or_else(|| dddb_error(format!("undefined record {}", ds.record)))?;
            let info = resolve_layout(&ds.record, fields, header, dsd.dsr_size)?;
            if info.tot_size > dsd.dsr_size {
                warn!(
                    dataset = %ds.name,
                    record = %ds.record,
                    size = info.tot_size,
                    dsr_size = dsd.dsr_size,
                    "record layout larger than DSR_SIZE"
                );
                continue;
            }
            catalog.datasets.push(DatasetEntry {
                name: ds.name.clone(),
                description: ds.description.clone(),
                dsd: dsd.clone(),
                info: Arc::new(info),
            });
        }

        for band in &spec.bands {
            let Some(dataset) = catalog.dataset_index(&band.dataset) else {
                debug!(band = %band.name, dataset = %band.dataset, "band dataset not present");
                continue;
            };
            let info = &catalog.datasets[dataset].info;
            let field_index = match &band.field {
                Some(name) => match info.field_index(name) {
                    Some(i) => i as i32,
                    None => {
                        warn!(band = %band.name, field = %name, "band field not found");
                        continue;
                    }
                },
                None => -1,
            };

            let scaling_factor = match catalog.resolve_scale(band.scaling_factor.as_ref(), 1.0, streams) {
                Ok(v) => v,
                Err(e) => {
                    warn!(band = %band.name, error = %e, "cannot resolve scaling factor");
                    continue;
                }
            };
            let scaling_offset = match catalog.resolve_scale(band.scaling_offset.as_ref(), 0.0, streams) {
                Ok(v) => v,
                Err(e) => {
                    warn!(band = %band.name, error = %e, "cannot resolve scaling offset");
                    continue;
                }
            };

            catalog.bands.push(BandEntry {
                name: band.name.clone(),
                dataset,
                field_index,
                elem_index: band.elem.map_or(-1, |e| e as i32),
                sample_model: band.sample_model,
                data_type: band.data_type,
                scaling_method: band.scaling_method,
                scaling_offset,
                scaling_factor,
                bm_expr: band.bm_expr.clone(),
                unit: band.unit.clone(),
                description: band.description.clone(),
                spectr_band_index: band.spectr_band_index,
                lines_mirrored: band.lines_mirrored,
                flag_coding: band.flag_coding.clone(),
                tie_points: band.tie_points,
            });
        }

        catalog.scene_width = match &spec.scene_width {
            Some(dim) => catalog.resolve_dim(dim, streams)?,
            None => 0,
        };
        catalog.scene_height = match &spec.scene_height {
            Some(dim) => catalog.resolve_dim(dim, streams)?,
            None => first_measurement_rows(header),
        };
        Ok(catalog)
    }

    pub fn dataset_index(&self, name: &str) -> Option<usize> {
        self.datasets.iter().position(|d| d.name == name)
    }

    pub fn band_index(&self, name: &str) -> Option<usize> {
        self.bands.iter().position(|b| b.name == name)
    }

    fn resolve_dim(&self, dim: &DimSpec, streams: &mut ProductStreams) -> Result<u32> {
        match dim {
            DimSpec::Fixed(n) => Ok(*n),
            DimSpec::Ref(r) if r.contains('.') => {
                let v = self.read_reference(r, streams)?;
                if v < 0.0 || v > u32::MAX as f64 {
                    return Err(dddb_error(format!("scene dimension {} out of range: {}", r, v)));
                }
                Ok(v as u32)
            }
            DimSpec::Ref(name) => self
                .dataset_index(name)
                .map(|i| self.datasets[i].dsd.num_dsr)
                .ok_or_else(|| dddb_error(format!("scene dimension dataset {} not present", name))),
        }
    }

    fn resolve_scale(
        &self,
        scale: Option<&ScaleSpec>,
        default: f64,
        streams: &mut ProductStreams,
    ) -> Result<f64> {
        match scale {
            None => Ok(default),
            Some(ScaleSpec::Value(v)) => Ok(*v),
            Some(ScaleSpec::Ref(r)) => self.read_reference(r, streams),
        }
    }

    /// Read `Dataset.field[.elem]` from the first record of a dataset.
    fn read_reference(&self, reference: &str, streams: &mut ProductStreams) -> Result<f64> {
        let mut parts = reference.split('.');
        let (Some(ds_name), Some(field_name)) = (parts.next(), parts.next()) else {
            return Err(dddb_error(format!("malformed reference {}", reference)));
        };
        let elem = match parts.next() {
            Some(e) => e
                .parse::<u32>()
                .map_err(|_| dddb_error(format!("malformed reference {}", reference)))?,
            None => 0,
        };

        let entry = self
            .dataset_index(ds_name)
            .map(|i| &self.datasets[i])
            .ok_or_else(|| Error::epr(EprCode::InvalidDatasetName, ds_name))?;
        let field = entry
            .info
            .field_index(field_name)
            .map(|i| &entry.info.fields[i])
            .ok_or_else(|| Error::epr(EprCode::InvalidKeywordName, reference))?;
        if !field.type_id.is_numeric() || elem >= field.num_elems {
            return Err(dddb_error(format!("reference {} is not a numeric element", reference)));
        }

        let size = field.type_id.size();
        let pos = entry.dsd.record_offset(0) + (field.offset + elem * size) as u64;
        let bytes = streams.read_bytes(pos, size as usize)?;
        decode_elem(field.type_id, &bytes)
            .as_f64()
            .ok_or_else(|| dddb_error(format!("reference {} is not numeric", reference)))
    }
}

/// Resolve a DDDB record description against the header and DSR size.
fn resolve_layout(
    name: &str,
    fields: &[FieldSpec],
    header: &ProductHeader,
    dsr_size: u32,
) -> Result<RecordInfo> {
    let mut builder = RecordInfo::builder(name);
    for field in fields {
        let num_elems = match &field.count {
            CountSpec::Fixed(n) => *n,
            CountSpec::Keyword(k) if k == CountSpec::REST => {
                dsr_size
                    .saturating_sub(builder.offset())
                    .checked_div(field.type_id.size())
                    .unwrap_or(0)
            }
            CountSpec::Keyword(k) => header
                .keyword_u64(k)
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| dddb_error(format!("count keyword {} not in header", k)))?,
        };
        builder = builder.field_with(
            field.name.clone(),
            field.type_id,
            num_elems,
            field.unit.clone(),
            field.description.clone(),
        )?;
    }

    Ok(builder.build())
}

fn first_measurement_rows(header: &ProductHeader) -> u32 {
    header
        .dsds
        .iter()
        .find(|d| d.ds_type == DS_TYPE_MEASUREMENT)
        .map_or(0, |d| d.num_dsr)
}
